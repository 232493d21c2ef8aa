use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // Validation errors - rejected before any daemon call
    #[error("Validation error: {0}")]
    Validation(String),

    // Resource errors
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // Transient daemon RPC errors (transport failures, timeouts) - retried
    // on the next cycle
    #[error("RPC error: {0}")]
    Rpc(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Local filesystem errors (progress file, container backup)
    #[error("I/O error: {0}")]
    Io(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Rpc(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Unrecoverable conditions escalated to the supervised run loop.
///
/// These terminate the daemon instance; the outer loop decides whether to
/// restart with backoff or give up.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("daemon process exited: {0}")]
    DaemonExited(String),
    #[error("daemon reported unrecoverable synchronization error")]
    SyncError,
    #[error("{failures} consecutive ping failures (max {max})")]
    PingFailures { failures: u32, max: u32 },
    #[error("{failures} consecutive container backup failures (max {max})")]
    BackupFailures { failures: u32, max: u32 },
}
