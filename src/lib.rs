//! Wallet daemon supervisor and transaction-synchronization engine.
//!
//! Runs a walletd-style daemon as a subprocess, watches its health,
//! periodically persists wallet state, and mirrors on-chain transactions
//! into a relational history store exactly once across restarts.
//!
//! The HTTP layer above this crate consumes [`services::WalletService`]
//! for address lifecycle, status, history and send operations.

pub mod config;
pub mod db;
pub mod error;
pub mod rpc;
pub mod services;
pub mod supervisor;
