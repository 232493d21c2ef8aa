pub mod models;
pub mod repositories;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<MySqlPool> {
    use std::time::Duration;

    let url = config.url();
    tracing::info!(
        "Connecting to database at {}:{}/{}",
        config.host,
        config.port,
        config.name
    );

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&url)
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

    tracing::info!(
        "Database connection pool created (max: {}, min: 2)",
        config.max_connections
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &MySqlPool) -> AppResult<()> {
    // One row per managed sub-address in the shared container
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS addresses (
            id INT PRIMARY KEY AUTO_INCREMENT,
            address VARCHAR(255) UNIQUE NOT NULL,
            block_height BIGINT UNSIGNED NOT NULL DEFAULT 0,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Ingested transaction history. `dest` is '' for incoming records; the
    // unique key over (addr_id, hash, dest) makes re-scanning a range a no-op.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INT PRIMARY KEY AUTO_INCREMENT,
            addr_id INT NOT NULL,
            dest VARCHAR(255) NOT NULL DEFAULT '',
            hash VARCHAR(64) NOT NULL,
            payment_id VARCHAR(64) NOT NULL DEFAULT '',
            amount DECIMAL(30, 8) NOT NULL,
            timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (addr_id) REFERENCES addresses(id) ON DELETE CASCADE,
            UNIQUE KEY unique_ingest (addr_id, hash, dest),
            INDEX idx_addr_cursor (addr_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
