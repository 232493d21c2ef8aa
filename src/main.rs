use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_node_service::config::ServiceConfig;
use wallet_node_service::db;
use wallet_node_service::rpc::WalletdClient;
use wallet_node_service::supervisor::{self, ServiceContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with console and file output
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".into());
    std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // File appender - rotates when > 500MB, keeps 10 backup files
    let log_path = std::path::Path::new(&log_dir).join("wallet-node.log");
    let file_appender = rolling_file::RollingFileAppender::new(
        log_path,
        rolling_file::RollingConditionBasic::new().max_size(500 * 1024 * 1024),
        10,
    )
    .context("Failed to create log file appender")?;

    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sqlx=warn".into()),
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    tracing::info!("Starting wallet node service");

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded; daemon at {}:{}, database {}:{}/{}",
        config.daemon.bind_address,
        config.daemon.rpc_port,
        config.database.host,
        config.database.port,
        config.database.name
    );

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let rpc = Arc::new(WalletdClient::new(&config.daemon).context("Failed to create RPC client")?);

    let ctx = ServiceContext::new(config, rpc, pool)
        .context("Failed to initialize service context")?;

    supervisor::run_supervised(&ctx)
        .await
        .context("Supervisor terminated with an error")?;

    tracing::info!("wallet node service stopped");
    Ok(())
}
