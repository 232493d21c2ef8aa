mod client;
pub mod types;

pub use client::WalletdClient;

use crate::error::AppResult;
use async_trait::async_trait;
use types::{BalanceInfo, SpendKeys, StatusInfo, TransactionBatch};

/// Abstract seam over the wallet daemon's JSON-RPC surface.
///
/// The periodic supervision tasks only talk to the daemon through this
/// trait, so they can run against a mock in tests.
#[async_trait]
pub trait WalletRpc: Send + Sync {
    /// Chain position as the daemon sees it
    async fn get_status(&self) -> AppResult<StatusInfo>;

    /// Balance of one sub-address, in minor units
    async fn get_balance(&self, address: &str) -> AppResult<BalanceInfo>;

    /// Transactions for `block_count` blocks starting at `first_block_index`
    async fn get_transactions(
        &self,
        first_block_index: u64,
        block_count: u64,
    ) -> AppResult<TransactionBatch>;

    /// Flush daemon-side wallet state to the container file
    async fn save(&self) -> AppResult<()>;

    /// Provision a new sub-address inside the container
    async fn create_address(&self) -> AppResult<String>;

    /// Delete a sub-address and its key material
    async fn delete_address(&self, address: &str) -> AppResult<()>;

    /// Send `amount` minor units from `source` to `destination`.
    /// Returns the transaction hash.
    async fn send_transaction(
        &self,
        source: &str,
        destination: &str,
        amount: u64,
        fee: u64,
        anonymity: u64,
        payment_id: &str,
    ) -> AppResult<String>;

    async fn get_spend_keys(&self, address: &str) -> AppResult<SpendKeys>;

    async fn get_view_key(&self) -> AppResult<String>;
}
