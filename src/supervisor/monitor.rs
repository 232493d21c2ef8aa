use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::config::SupervisorConfig;
use crate::error::FatalError;
use crate::rpc::WalletRpc;
use crate::supervisor::progress::ProgressStore;
use crate::supervisor::state::ServiceState;

/// Outcome of one ping cycle.
#[derive(Debug, PartialEq, Eq)]
enum PingOutcome {
    Healthy,
    Failed(u32),
    Escalate(u32),
}

/// Periodically pings the daemon with a bounded timeout and escalates after
/// too many consecutive failures.
///
/// The status future is dropped when the timeout wins the race, so a slow
/// ping that would have completed later can never resurrect stale state.
pub struct HealthMonitor {
    rpc: Arc<dyn WalletRpc>,
    state: Arc<ServiceState>,
    progress: Arc<ProgressStore>,
    config: SupervisorConfig,
}

impl HealthMonitor {
    pub fn new(
        rpc: Arc<dyn WalletRpc>,
        state: Arc<ServiceState>,
        progress: Arc<ProgressStore>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            rpc,
            state,
            progress,
            config,
        }
    }

    pub async fn run(
        self,
        fatal_tx: mpsc::Sender<FatalError>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(self.config.polling_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let PingOutcome::Escalate(failures) = self.ping_once().await {
                        let _ = fatal_tx
                            .send(FatalError::PingFailures {
                                failures,
                                max: self.config.max_ping_failures,
                            })
                            .await;
                        break;
                    }
                }
            }
        }
        tracing::debug!("health monitor stopped");
    }

    async fn ping_once(&self) -> PingOutcome {
        match timeout(self.config.ping_timeout(), self.rpc.get_status()).await {
            Ok(Ok(status)) => {
                let snapshot = self.state.record_ping_success(&status).await;
                if let Err(e) = self.progress.save(snapshot.progress()) {
                    tracing::warn!("Failed to persist progress after ping: {}", e);
                }
                tracing::debug!(
                    "ping ok: block={} known={} synced={}",
                    status.block_count,
                    status.known_block_count,
                    snapshot.synced
                );
                PingOutcome::Healthy
            }
            Ok(Err(e)) => {
                tracing::warn!("ping failed: {}", e);
                self.register_failure().await
            }
            Err(_) => {
                tracing::warn!(
                    "ping timed out after {:?}",
                    self.config.ping_timeout()
                );
                self.register_failure().await
            }
        }
    }

    async fn register_failure(&self) -> PingOutcome {
        let failures = self.state.record_ping_failure().await;
        tracing::warn!(
            "consecutive ping failures: {}/{}",
            failures,
            self.config.max_ping_failures
        );
        if failures > self.config.max_ping_failures {
            PingOutcome::Escalate(failures)
        } else {
            PingOutcome::Failed(failures)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::rpc::types::{BalanceInfo, SpendKeys, StatusInfo, TransactionBatch};
    use crate::supervisor::progress::SyncProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyRpc {
        healthy: AtomicBool,
        hang: AtomicBool,
    }

    impl FlakyRpc {
        fn new() -> Self {
            Self {
                healthy: AtomicBool::new(true),
                hang: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl WalletRpc for FlakyRpc {
        async fn get_status(&self) -> AppResult<StatusInfo> {
            if self.hang.load(Ordering::SeqCst) {
                // never completes inside the test timeout
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
            if self.healthy.load(Ordering::SeqCst) {
                Ok(StatusInfo {
                    block_count: 500,
                    known_block_count: 500,
                    peer_count: 8,
                })
            } else {
                Err(AppError::Rpc("connection refused".to_string()))
            }
        }

        async fn get_balance(&self, _address: &str) -> AppResult<BalanceInfo> {
            unimplemented!()
        }

        async fn get_transactions(&self, _first: u64, _count: u64) -> AppResult<TransactionBatch> {
            unimplemented!()
        }

        async fn save(&self) -> AppResult<()> {
            Ok(())
        }

        async fn create_address(&self) -> AppResult<String> {
            unimplemented!()
        }

        async fn delete_address(&self, _address: &str) -> AppResult<()> {
            unimplemented!()
        }

        async fn send_transaction(
            &self,
            _source: &str,
            _destination: &str,
            _amount: u64,
            _fee: u64,
            _anonymity: u64,
            _payment_id: &str,
        ) -> AppResult<String> {
            unimplemented!()
        }

        async fn get_spend_keys(&self, _address: &str) -> AppResult<SpendKeys> {
            unimplemented!()
        }

        async fn get_view_key(&self) -> AppResult<String> {
            unimplemented!()
        }
    }

    fn monitor_with(
        rpc: Arc<FlakyRpc>,
        max_failures: u32,
    ) -> (HealthMonitor, Arc<ServiceState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let progress_path = dir.path().join("ha.data");

        let state = Arc::new(ServiceState::new(SyncProgress::default()));
        let mut config = crate::config::ServiceConfig::default().supervisor;
        config.max_ping_failures = max_failures;
        config.ping_timeout_ms = 50;

        let monitor = HealthMonitor::new(
            rpc,
            state.clone(),
            Arc::new(ProgressStore::new(progress_path)),
            config,
        );
        (monitor, state, dir)
    }

    #[tokio::test]
    async fn healthy_ping_updates_state() {
        let rpc = Arc::new(FlakyRpc::new());
        let (monitor, state, _dir) = monitor_with(rpc, 3);

        assert_eq!(monitor.ping_once().await, PingOutcome::Healthy);
        let snap = state.snapshot().await;
        assert_eq!(snap.last_known_block, 500);
        assert!(snap.synced);
    }

    #[tokio::test]
    async fn transport_errors_count_toward_escalation() {
        let rpc = Arc::new(FlakyRpc::new());
        rpc.healthy.store(false, Ordering::SeqCst);
        let (monitor, _state, _dir) = monitor_with(rpc, 2);

        assert_eq!(monitor.ping_once().await, PingOutcome::Failed(1));
        assert_eq!(monitor.ping_once().await, PingOutcome::Failed(2));
        assert_eq!(monitor.ping_once().await, PingOutcome::Escalate(3));
    }

    #[tokio::test]
    async fn hung_ping_times_out_and_counts_as_failure() {
        let rpc = Arc::new(FlakyRpc::new());
        rpc.hang.store(true, Ordering::SeqCst);
        let (monitor, state, _dir) = monitor_with(rpc, 5);

        assert_eq!(monitor.ping_once().await, PingOutcome::Failed(1));
        assert_eq!(state.snapshot().await.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn success_between_failures_resets_the_counter() {
        let rpc = Arc::new(FlakyRpc::new());
        let (monitor, state, _dir) = monitor_with(rpc.clone(), 3);

        rpc.healthy.store(false, Ordering::SeqCst);
        monitor.ping_once().await;
        monitor.ping_once().await;

        rpc.healthy.store(true, Ordering::SeqCst);
        monitor.ping_once().await;
        assert_eq!(state.snapshot().await.consecutive_failures, 0);

        rpc.healthy.store(false, Ordering::SeqCst);
        assert_eq!(monitor.ping_once().await, PingOutcome::Failed(1));
    }
}
