use crate::db::models::TrackedAddress;
use crate::error::{AppError, AppResult};
use sqlx::MySqlPool;

#[derive(Clone)]
pub struct AddressRepository {
    pool: MySqlPool,
}

impl AddressRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, address: &str) -> AppResult<TrackedAddress> {
        sqlx::query("INSERT INTO addresses (address) VALUES (?)")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::AlreadyExists(format!("address {}", address))
                }
                other => other.into(),
            })?;

        self.find_by_address(address)
            .await?
            .ok_or_else(|| AppError::Internal("address row missing after insert".to_string()))
    }

    pub async fn find_by_address(&self, address: &str) -> AppResult<Option<TrackedAddress>> {
        let row = sqlx::query_as::<_, TrackedAddress>(
            "SELECT id, address, block_height, created_at FROM addresses WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Records that every tracked address has been scanned through `height`.
    pub async fn update_scanned_height(&self, height: u64) -> AppResult<()> {
        sqlx::query("UPDATE addresses SET block_height = ? WHERE block_height < ?")
            .bind(height)
            .bind(height)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Removes the address row; its transaction rows go with it via
    /// the `ON DELETE CASCADE` foreign key.
    pub async fn delete(&self, address: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM addresses WHERE address = ?")
            .bind(address)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
