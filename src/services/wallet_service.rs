use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::ChainConfig;
use crate::db::models::{
    ChainStatus, KeyExport, TrackedAddress, TransactionRecord, WalletBalance,
    WalletStatusResponse,
};
use crate::db::repositories::{AddressRepository, TransactionRepository};
use crate::error::{AppError, AppResult};
use crate::rpc::WalletRpc;
use crate::supervisor::state::ServiceState;

/// Address lifecycle, history queries and sends, exposed to the HTTP layer
/// above this crate. Destination, amount and payment id are validated here,
/// before any daemon call is made.
pub struct WalletService {
    rpc: Arc<dyn WalletRpc>,
    addresses: AddressRepository,
    transactions: TransactionRepository,
    state: Arc<ServiceState>,
    chain: ChainConfig,
}

impl WalletService {
    pub fn new(
        rpc: Arc<dyn WalletRpc>,
        addresses: AddressRepository,
        transactions: TransactionRepository,
        state: Arc<ServiceState>,
        chain: ChainConfig,
    ) -> Self {
        Self {
            rpc,
            addresses,
            transactions,
            state,
            chain,
        }
    }

    /// Creates a sub-address in the daemon's container and tracks it.
    pub async fn provision_address(&self) -> AppResult<TrackedAddress> {
        let address = self.rpc.create_address().await?;
        let tracked = self.addresses.create(&address).await?;
        tracing::info!("provisioned address {}", tracked.address);
        Ok(tracked)
    }

    /// Deletes the daemon-side key material, then the tracked row; the
    /// address's transaction history goes with it via cascade.
    pub async fn retire_address(&self, address: &str) -> AppResult<()> {
        self.require_tracked(address).await?;
        self.rpc.delete_address(address).await?;
        self.addresses.delete(address).await?;
        tracing::info!("retired address {}", address);
        Ok(())
    }

    /// Chain status and balance for one address. Until the first sync has
    /// completed there is no data to report and both fields stay `None`.
    pub async fn get_status(&self, address: &str) -> AppResult<WalletStatusResponse> {
        self.require_tracked(address).await?;

        let snapshot = self.state.snapshot().await;
        if !snapshot.synced {
            return Ok(WalletStatusResponse {
                status: None,
                balance: None,
            });
        }

        let status = self.rpc.get_status().await?;
        let balance = self.rpc.get_balance(address).await?;
        let divisor = Decimal::from(self.chain.divisor);

        Ok(WalletStatusResponse {
            status: Some(ChainStatus {
                block_count: status.block_count,
                known_block_count: status.known_block_count,
                peer_count: status.peer_count,
            }),
            balance: Some(WalletBalance {
                available_balance: Decimal::from(balance.available_balance) / divisor,
                locked_amount: Decimal::from(balance.locked_amount) / divisor,
            }),
        })
    }

    /// History page for `address`: records with id past `cursor`, newest
    /// first.
    pub async fn get_transaction_history(
        &self,
        address: &str,
        cursor: i32,
    ) -> AppResult<Vec<TransactionRecord>> {
        self.require_tracked(address).await?;
        self.transactions.list_by_address(address, cursor).await
    }

    /// Validates and submits a send. Returns the transaction hash.
    pub async fn send_transaction(
        &self,
        address: &str,
        destination: &str,
        amount: &str,
        payment_id: &str,
    ) -> AppResult<String> {
        if !is_valid_address(destination, &self.chain) {
            return Err(AppError::Validation("Incorrect Address Format".to_string()));
        }
        let minor_amount = parse_amount(amount, self.chain.divisor)?;
        if !is_valid_payment_id(payment_id) {
            return Err(AppError::Validation(
                "Incorrect Payment ID Format".to_string(),
            ));
        }
        self.require_tracked(address).await?;

        let hash = self
            .rpc
            .send_transaction(
                address,
                destination,
                minor_amount,
                self.chain.fee,
                self.chain.mixin,
                payment_id,
            )
            .await?;
        tracing::info!("sent transaction {} from {}", hash, address);
        Ok(hash)
    }

    /// Exports the container view key plus the address's spend key pair.
    pub async fn export_keys(&self, address: &str) -> AppResult<KeyExport> {
        self.require_tracked(address).await?;

        let view_secret_key = self.rpc.get_view_key().await?;
        let spend_keys = self.rpc.get_spend_keys(address).await?;
        Ok(KeyExport {
            view_secret_key,
            spend_public_key: spend_keys.spend_public_key,
            spend_secret_key: spend_keys.spend_secret_key,
        })
    }

    async fn require_tracked(&self, address: &str) -> AppResult<TrackedAddress> {
        self.addresses
            .find_by_address(address)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("address {}", address)))
    }
}

/// Structural address check: known prefix, an accepted body length and
/// alphanumeric characters throughout.
pub fn is_valid_address(address: &str, chain: &ChainConfig) -> bool {
    let Some(body) = address.strip_prefix(chain.address_prefix.as_str()) else {
        return false;
    };
    chain.address_body_lengths.contains(&body.len())
        && body.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parses a display-unit amount string into minor units. The fractional
/// part must fit the chain divisor (2 digits for a divisor of 100).
pub fn parse_amount(amount: &str, divisor: u32) -> AppResult<u64> {
    let parsed = Decimal::from_str(amount)
        .map_err(|_| AppError::Validation("Incorrect Amount Format".to_string()))?;

    if parsed <= Decimal::ZERO {
        return Err(AppError::Validation("Incorrect Amount Format".to_string()));
    }

    let minor = parsed * Decimal::from(divisor);
    if !minor.fract().is_zero() {
        return Err(AppError::Validation("Incorrect Amount Format".to_string()));
    }

    minor
        .to_u64()
        .ok_or_else(|| AppError::Validation("Incorrect Amount Format".to_string()))
}

/// Payment ids are optional; when present they are 64 hex characters.
pub fn is_valid_payment_id(payment_id: &str) -> bool {
    payment_id.is_empty()
        || (payment_id.len() == 64 && payment_id.chars().all(|c| c.is_ascii_hexdigit()))
}
