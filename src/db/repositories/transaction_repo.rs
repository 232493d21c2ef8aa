use crate::db::models::{ClassifiedTransfer, TransactionRecord, TransactionRow};
use crate::error::AppResult;
use sqlx::MySqlPool;

/// Page size for history queries
const HISTORY_PAGE_SIZE: i32 = 15;

#[derive(Clone)]
pub struct TransactionRepository {
    pool: MySqlPool,
}

impl TransactionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Inserts one classified transfer, resolving the source address to its
    /// tracked-address row. Re-inserting the same (addr_id, hash, dest)
    /// triple is a no-op so an overlapping re-scan never duplicates history.
    ///
    /// Returns true if a row was written, false if it already existed or the
    /// source address is not tracked by this container.
    pub async fn insert_idempotent(&self, transfer: &ClassifiedTransfer) -> AppResult<bool> {
        let result = sqlx::query(
            r#"INSERT IGNORE INTO transactions (addr_id, dest, hash, payment_id, amount)
               SELECT id, ?, ?, ?, ? FROM addresses WHERE address = ?"#,
        )
        .bind(transfer.destination.as_deref().unwrap_or(""))
        .bind(&transfer.hash)
        .bind(&transfer.payment_id)
        .bind(transfer.amount)
        .bind(&transfer.source)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// History page for one address: rows past the cursor, newest first.
    pub async fn list_by_address(
        &self,
        address: &str,
        cursor: i32,
    ) -> AppResult<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"SELECT id, addr_id, dest, hash, payment_id, amount, timestamp
               FROM transactions
               WHERE addr_id = (SELECT id FROM addresses WHERE address = ?) AND id > ?
               ORDER BY id DESC
               LIMIT ?"#,
        )
        .bind(address)
        .bind(cursor)
        .bind(HISTORY_PAGE_SIZE)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TransactionRecord::from).collect())
    }

}
