pub mod monitor;
pub mod persistence;
pub mod process;
pub mod progress;
pub mod scanner;
pub mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::MySqlPool;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;

use crate::config::ServiceConfig;
use crate::db::repositories::{AddressRepository, TransactionRepository};
use crate::error::{AppResult, FatalError};
use crate::rpc::WalletRpc;
use monitor::HealthMonitor;
use persistence::PersistenceManager;
use process::{DaemonEvent, DaemonProcess};
use progress::ProgressStore;
use scanner::TransactionScanner;
use state::ServiceState;

/// How often readiness is probed over RPC while the daemon syncs up
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// An instance that stayed up this long resets the restart backoff
const BACKOFF_RESET_AFTER: Duration = Duration::from_secs(60);

/// Everything a daemon instance and its periodic tasks need, constructed
/// once at startup and passed explicitly instead of living in globals.
pub struct ServiceContext {
    pub config: ServiceConfig,
    pub rpc: Arc<dyn WalletRpc>,
    pub state: Arc<ServiceState>,
    pub progress: Arc<ProgressStore>,
    pub addresses: AddressRepository,
    pub transactions: TransactionRepository,
}

impl ServiceContext {
    /// Loads the persisted scan position; a corrupt progress file is fatal
    /// here because the service cannot safely guess where it left off.
    pub fn new(
        config: ServiceConfig,
        rpc: Arc<dyn WalletRpc>,
        pool: MySqlPool,
    ) -> AppResult<Self> {
        let progress_store = ProgressStore::new(&config.supervisor.progress_file);
        let progress = progress_store.load()?;
        tracing::info!(
            "resuming from scanHeight={} lastBlock={}",
            progress.scan_height,
            progress.last_block
        );

        Ok(Self {
            state: Arc::new(ServiceState::new(progress)),
            progress: Arc::new(progress_store),
            addresses: AddressRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool),
            config,
            rpc,
        })
    }
}

fn next_backoff(current: Duration, cap: Duration) -> Duration {
    (current * 2).min(cap)
}

/// Runs daemon instances until shutdown. A fatal error tears the instance
/// down and restarts it after an exponential backoff instead of aborting
/// the whole service.
pub async fn run_supervised(ctx: &ServiceContext) -> AppResult<()> {
    let base = Duration::from_millis(ctx.config.supervisor.restart_backoff_ms);
    let cap = Duration::from_millis(ctx.config.supervisor.restart_backoff_cap_ms);
    let mut backoff = base;

    loop {
        let started = Instant::now();
        match run_instance(ctx).await {
            Ok(()) => {
                tracing::info!("shutdown requested, supervisor exiting");
                return Ok(());
            }
            Err(fatal) => {
                if started.elapsed() >= BACKOFF_RESET_AFTER {
                    backoff = base;
                }
                tracing::error!("daemon instance failed: {}; restarting in {:?}", fatal, backoff);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff, cap);
            }
        }
    }
}

/// One daemon lifetime: spawn, wait for readiness, run the periodic tasks,
/// tear everything down on the first fatal signal.
async fn run_instance(ctx: &ServiceContext) -> Result<(), FatalError> {
    let (mut daemon, mut events) = DaemonProcess::spawn(&ctx.config.daemon)
        .map_err(|e| FatalError::DaemonExited(e.to_string()))?;

    if let Err(fatal) = wait_until_ready(ctx, &mut daemon, &mut events).await {
        return Err(fatal);
    }
    tracing::info!("wallet ready, starting monitoring routines");

    let (fatal_tx, mut fatal_rx) = mpsc::channel::<FatalError>(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(
        HealthMonitor::new(
            ctx.rpc.clone(),
            ctx.state.clone(),
            ctx.progress.clone(),
            ctx.config.supervisor.clone(),
        )
        .run(fatal_tx.clone(), shutdown_rx.clone()),
    );
    tokio::spawn(
        PersistenceManager::new(
            ctx.rpc.clone(),
            ctx.state.clone(),
            ctx.config.daemon.container_file.clone(),
            ctx.config.supervisor.clone(),
        )
        .run(fatal_tx.clone(), shutdown_rx.clone()),
    );
    tokio::spawn(
        TransactionScanner::new(
            ctx.rpc.clone(),
            ctx.state.clone(),
            ctx.progress.clone(),
            ctx.addresses.clone(),
            ctx.transactions.clone(),
            ctx.config.chain.divisor,
            ctx.config.supervisor.clone(),
        )
        .run(shutdown_rx.clone()),
    );

    let mut events_open = true;
    let mut daemon_exited = false;
    let result = loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(DaemonEvent::WalletChanged) => {
                    // out-of-band save; the periodic cycle handles failures
                    let rpc = ctx.rpc.clone();
                    tokio::spawn(async move {
                        if let Err(e) = rpc.save().await {
                            tracing::warn!("out-of-band save failed: {}", e);
                        }
                    });
                }
                Some(DaemonEvent::FatalSyncError) => break Err(FatalError::SyncError),
                Some(DaemonEvent::ReadyHint) => {}
                None => events_open = false,
            },
            exit = daemon.wait() => {
                daemon_exited = true;
                let status = exit
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| e.to_string());
                break Err(FatalError::DaemonExited(status));
            }
            Some(fatal) = fatal_rx.recv() => break Err(fatal),
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    // Stop the periodic tasks; dropping the sender wakes any receiver that
    // missed the send.
    let _ = shutdown_tx.send(true);
    if !daemon_exited {
        daemon.kill().await;
    }
    result
}

/// Readiness is primarily the RPC status endpoint answering; the legacy
/// stdout marker short-circuits the wait. A fatal marker or process exit
/// during initial sync aborts the instance.
async fn wait_until_ready(
    ctx: &ServiceContext,
    daemon: &mut DaemonProcess,
    events: &mut mpsc::Receiver<DaemonEvent>,
) -> Result<(), FatalError> {
    let mut poll = interval(READY_POLL_INTERVAL);
    let mut events_open = true;

    let result = loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(DaemonEvent::ReadyHint) => {
                    tracing::info!("wallet started");
                    break Ok(());
                }
                Some(DaemonEvent::FatalSyncError) => break Err(FatalError::SyncError),
                Some(DaemonEvent::WalletChanged) => {}
                None => events_open = false,
            },
            exit = daemon.wait() => {
                let status = exit
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| e.to_string());
                return Err(FatalError::DaemonExited(status));
            }
            _ = poll.tick() => {
                if ctx.rpc.get_status().await.is_ok() {
                    break Ok(());
                }
            }
        }
    };

    if matches!(result, Err(FatalError::SyncError)) {
        daemon.kill().await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let cap = Duration::from_secs(60);
        let mut backoff = Duration::from_secs(1);

        backoff = next_backoff(backoff, cap);
        assert_eq!(backoff, Duration::from_secs(2));
        backoff = next_backoff(backoff, cap);
        assert_eq!(backoff, Duration::from_secs(4));

        for _ in 0..10 {
            backoff = next_backoff(backoff, cap);
        }
        assert_eq!(backoff, cap);
    }
}
