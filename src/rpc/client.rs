use async_trait::async_trait;
use serde::Serialize;

use crate::config::DaemonConfig;
use crate::error::{AppError, AppResult};
use crate::rpc::types::*;
use crate::rpc::WalletRpc;

/// JSON-RPC client for the wallet daemon's local HTTP endpoint.
///
/// Every request carries the RPC password in the body, the way walletd
/// expects it. The HTTP client carries a request timeout so no periodic
/// task can hang on a stuck daemon call indefinitely; the health monitor
/// layers its own tighter ping timeout on top.
pub struct WalletdClient {
    http: reqwest::Client,
    url: String,
    password: String,
}

const REQUEST_TIMEOUT_SECS: u64 = 30;

impl WalletdClient {
    pub fn new(config: &DaemonConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Rpc(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: format!("http://{}:{}/json_rpc", config.bind_address, config.rpc_port),
            password: config.rpc_password.clone(),
        })
    }

    async fn rpc_call<T: serde::de::DeserializeOwned, P: Serialize>(
        &self,
        method: &'static str,
        params: P,
    ) -> AppResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            password: &self.password,
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Rpc(format!("{} request failed: {}", method, e)))?;

        let rpc_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Rpc(format!("Failed to parse {} response: {}", method, e)))?;

        if let Some(error) = rpc_response.error {
            return Err(AppError::Rpc(format!(
                "{} error {}: {}",
                method, error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| AppError::Rpc(format!("Empty {} response", method)))
    }
}

#[async_trait]
impl WalletRpc for WalletdClient {
    async fn get_status(&self) -> AppResult<StatusInfo> {
        self.rpc_call("getStatus", EmptyParams {}).await
    }

    async fn get_balance(&self, address: &str) -> AppResult<BalanceInfo> {
        self.rpc_call("getBalance", AddressParams { address }).await
    }

    async fn get_transactions(
        &self,
        first_block_index: u64,
        block_count: u64,
    ) -> AppResult<TransactionBatch> {
        self.rpc_call(
            "getTransactions",
            GetTransactionsParams {
                first_block_index,
                block_count,
            },
        )
        .await
    }

    async fn save(&self) -> AppResult<()> {
        let _: EmptyResult = self.rpc_call("save", EmptyParams {}).await?;
        Ok(())
    }

    async fn create_address(&self) -> AppResult<String> {
        let result: AddressResult = self.rpc_call("createAddress", EmptyParams {}).await?;
        Ok(result.address)
    }

    async fn delete_address(&self, address: &str) -> AppResult<()> {
        let _: EmptyResult = self
            .rpc_call("deleteAddress", AddressParams { address })
            .await?;
        Ok(())
    }

    async fn send_transaction(
        &self,
        source: &str,
        destination: &str,
        amount: u64,
        fee: u64,
        anonymity: u64,
        payment_id: &str,
    ) -> AppResult<String> {
        let params = SendTransactionParams {
            addresses: vec![source],
            transfers: vec![TransferParam {
                address: destination,
                amount,
            }],
            fee,
            unlock_time: 0,
            anonymity,
            extra: "",
            payment_id,
            change_address: "",
        };

        let result: SendTransactionResult = self.rpc_call("sendTransaction", params).await?;
        Ok(result.transaction_hash)
    }

    async fn get_spend_keys(&self, address: &str) -> AppResult<SpendKeys> {
        self.rpc_call("getSpendKeys", AddressParams { address })
            .await
    }

    async fn get_view_key(&self) -> AppResult<String> {
        let result: ViewKeyResult = self.rpc_call("getViewKey", EmptyParams {}).await?;
        Ok(result.view_secret_key)
    }
}
