use serde::{Deserialize, Serialize};

// Wire envelopes

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a, T> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub password: &'a str,
    pub method: &'static str,
    pub params: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
    #[allow(dead_code)]
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

// walletd result payloads

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub block_count: u64,
    pub known_block_count: u64,
    #[serde(default)]
    pub peer_count: u64,
}

impl StatusInfo {
    /// Within one block of the network's known height. The one-block slack
    /// absorbs ordinary propagation lag.
    pub fn is_synced(&self) -> bool {
        self.block_count + 1 >= self.known_block_count
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInfo {
    /// Spendable minor units
    pub available_balance: u64,
    /// Minor units still locked by unconfirmed transactions
    pub locked_amount: u64,
}

/// Nested `getTransactions` result: blocks, each holding transactions,
/// each holding a transfer list.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransactionBatch {
    pub items: Vec<BlockItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockItem {
    #[serde(default)]
    pub transactions: Vec<TransactionItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub transaction_hash: String,
    #[serde(default)]
    pub payment_id: String,
    /// Net amount for the container: positive when funds were received,
    /// non-positive when funds were sent outward
    pub amount: i64,
    #[serde(default)]
    pub transfers: Vec<TransferEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferEntry {
    pub address: String,
    /// Signed minor-unit amount for this transfer leg
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendKeys {
    pub spend_public_key: String,
    pub spend_secret_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddressResult {
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendTransactionResult {
    pub transaction_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewKeyResult {
    pub view_secret_key: String,
}

/// walletd returns `{}` for calls without a payload
#[derive(Debug, Deserialize)]
pub(crate) struct EmptyResult {}

// walletd request params

#[derive(Debug, Serialize)]
pub(crate) struct EmptyParams {}

#[derive(Debug, Serialize)]
pub(crate) struct AddressParams<'a> {
    pub address: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetTransactionsParams {
    pub first_block_index: u64,
    pub block_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendTransactionParams<'a> {
    pub addresses: Vec<&'a str>,
    pub transfers: Vec<TransferParam<'a>>,
    pub fee: u64,
    pub unlock_time: u64,
    pub anonymity: u64,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub extra: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub payment_id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub change_address: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TransferParam<'a> {
    pub address: &'a str,
    pub amount: u64,
}
