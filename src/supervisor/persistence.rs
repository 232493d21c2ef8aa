use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::SupervisorConfig;
use crate::error::{AppResult, FatalError};
use crate::rpc::WalletRpc;
use crate::supervisor::state::ServiceState;

const BACKUP_SUFFIX: &str = ".backup";

/// Periodically flushes daemon-side wallet state and copies the container
/// file to a sibling backup, but only while the wallet is synced.
///
/// Individual failures are logged and retried on the next cycle; a run of
/// consecutive failures long enough to suggest an unwritable disk escalates
/// to the supervisor.
pub struct PersistenceManager {
    rpc: Arc<dyn WalletRpc>,
    state: Arc<ServiceState>,
    container_file: PathBuf,
    config: SupervisorConfig,
}

impl PersistenceManager {
    pub fn new(
        rpc: Arc<dyn WalletRpc>,
        state: Arc<ServiceState>,
        container_file: impl Into<PathBuf>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            rpc,
            state,
            container_file: container_file.into(),
            config,
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut os_string = self.container_file.clone().into_os_string();
        os_string.push(BACKUP_SUFFIX);
        PathBuf::from(os_string)
    }

    pub async fn run(
        self,
        fatal_tx: mpsc::Sender<FatalError>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(self.config.save_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if !self.state.snapshot().await.synced {
                        tracing::info!("not saving: wallet not synced");
                        continue;
                    }
                    match self.save_and_backup().await {
                        Ok(()) => {
                            consecutive_failures = 0;
                            tracing::info!("wallet saved and backed up");
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            tracing::error!(
                                "save/backup failed ({}/{}): {}",
                                consecutive_failures,
                                self.config.max_backup_failures,
                                e
                            );
                            if consecutive_failures >= self.config.max_backup_failures {
                                let _ = fatal_tx
                                    .send(FatalError::BackupFailures {
                                        failures: consecutive_failures,
                                        max: self.config.max_backup_failures,
                                    })
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!("persistence manager stopped");
    }

    /// Daemon-side save first, then a byte-for-byte copy of the container
    /// file over any previous backup.
    async fn save_and_backup(&self) -> AppResult<()> {
        self.rpc.save().await?;
        tokio::fs::copy(&self.container_file, self.backup_path()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::rpc::types::{BalanceInfo, SpendKeys, StatusInfo, TransactionBatch};
    use crate::supervisor::progress::SyncProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct SaveCountingRpc {
        saves: AtomicU32,
        fail_saves: bool,
    }

    #[async_trait]
    impl WalletRpc for SaveCountingRpc {
        async fn get_status(&self) -> AppResult<StatusInfo> {
            unimplemented!()
        }

        async fn get_balance(&self, _address: &str) -> AppResult<BalanceInfo> {
            unimplemented!()
        }

        async fn get_transactions(&self, _first: u64, _count: u64) -> AppResult<TransactionBatch> {
            unimplemented!()
        }

        async fn save(&self) -> AppResult<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_saves {
                Err(AppError::Rpc("save failed".to_string()))
            } else {
                Ok(())
            }
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

    #[tokio::test]
    async fn backup_copies_container_to_sibling_path() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("container.wallet");
        std::fs::write(&container, b"wallet bytes v1").unwrap();

        let rpc = Arc::new(SaveCountingRpc {
            saves: AtomicU32::new(0),
            fail_saves: false,
        });
        let manager = PersistenceManager::new(
            rpc.clone(),
            Arc::new(ServiceState::new(SyncProgress::default())),
            &container,
            crate::config::ServiceConfig::default().supervisor,
        );

        manager.save_and_backup().await.unwrap();
        assert_eq!(rpc.saves.load(Ordering::SeqCst), 1);
        let backup = std::fs::read(manager.backup_path()).unwrap();
        assert_eq!(backup, b"wallet bytes v1");
    }

    #[tokio::test]
    async fn backup_overwrites_previous_copy() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("container.wallet");
        let rpc = Arc::new(SaveCountingRpc {
            saves: AtomicU32::new(0),
            fail_saves: false,
        });
        let manager = PersistenceManager::new(
            rpc,
            Arc::new(ServiceState::new(SyncProgress::default())),
            &container,
            crate::config::ServiceConfig::default().supervisor,
        );

        std::fs::write(&container, b"v1").unwrap();
        manager.save_and_backup().await.unwrap();
        std::fs::write(&container, b"v2 longer contents").unwrap();
        manager.save_and_backup().await.unwrap();

        assert_eq!(
            std::fs::read(manager.backup_path()).unwrap(),
            b"v2 longer contents"
        );
    }

    #[tokio::test]
    async fn failed_save_surfaces_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("container.wallet");
        std::fs::write(&container, b"bytes").unwrap();

        let rpc = Arc::new(SaveCountingRpc {
            saves: AtomicU32::new(0),
            fail_saves: true,
        });
        let manager = PersistenceManager::new(
            rpc,
            Arc::new(ServiceState::new(SyncProgress::default())),
            &container,
            crate::config::ServiceConfig::default().supervisor,
        );

        assert!(manager.save_and_backup().await.is_err());
        assert!(!manager.backup_path().exists());
    }
}
