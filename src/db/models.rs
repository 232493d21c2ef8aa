use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackedAddress {
    pub id: i32,
    pub address: String,
    /// Last block height scanned for this address
    pub block_height: u64,
    pub created_at: DateTime<Utc>,
}

/// Raw `transactions` row. Incoming records store `dest = ''` so the
/// idempotency key stays total; the public record maps that back to `None`.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i32,
    pub addr_id: i32,
    pub dest: String,
    pub hash: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub id: i32,
    pub destination: Option<String>,
    pub hash: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<TransactionRow> for TransactionRecord {
    fn from(row: TransactionRow) -> Self {
        TransactionRecord {
            id: row.id,
            destination: if row.dest.is_empty() {
                None
            } else {
                Some(row.dest)
            },
            hash: row.hash,
            payment_id: row.payment_id,
            amount: row.amount,
            timestamp: row.timestamp,
        }
    }
}

/// One classified transfer ready for insertion, produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTransfer {
    /// Tracked address the record is filed under
    pub source: String,
    /// Outgoing destination; `None` for incoming records
    pub destination: Option<String>,
    pub hash: String,
    pub payment_id: String,
    /// Display-unit amount (minor units already divided by the chain divisor)
    pub amount: Decimal,
}

// Response DTOs for the layer above

#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub block_count: u64,
    pub known_block_count: u64,
    pub peer_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub available_balance: Decimal,
    pub locked_amount: Decimal,
}

/// Status answer for one address. Fields stay `None` ("no data yet") until
/// the daemon has completed its first sync.
#[derive(Debug, Clone, Serialize)]
pub struct WalletStatusResponse {
    pub status: Option<ChainStatus>,
    pub balance: Option<WalletBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyExport {
    pub view_secret_key: String,
    pub spend_public_key: String,
    pub spend_secret_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dest: &str) -> TransactionRow {
        TransactionRow {
            id: 7,
            addr_id: 1,
            dest: dest.to_string(),
            hash: "ab".repeat(32),
            payment_id: String::new(),
            amount: Decimal::new(150, 2),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_dest_maps_to_none() {
        let record = TransactionRecord::from(row(""));
        assert_eq!(record.destination, None);
    }

    #[test]
    fn outgoing_dest_is_preserved() {
        let record = TransactionRecord::from(row("TRTLdest"));
        assert_eq!(record.destination.as_deref(), Some("TRTLdest"));
    }
}
