use std::io::Write;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::DaemonConfig;
use crate::error::{AppError, AppResult};

/// Daemon log line the service is synchronized through tip
const READY_MARKER: &str = "Outdated pool transactions processed";
/// Generic daemon error line
const ERROR_MARKER: &str = "ERROR";
/// Unrecoverable synchronization failure
const FATAL_SYNC_MARKER: &str = "Synchronization error";
/// Wallet state changed out-of-band, worth an immediate save
const WALLET_CHANGED_MARKER: &str = "New wallet added";

/// Signals extracted from the daemon's stdout stream.
///
/// Readiness is primarily detected by polling the RPC status endpoint; the
/// ready marker only short-circuits the first poll wait. The fatal marker is
/// authoritative because the daemon offers no structured alternative for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonEvent {
    ReadyHint,
    WalletChanged,
    FatalSyncError,
}

pub(crate) fn classify_line(line: &str) -> Option<DaemonEvent> {
    if line.contains(READY_MARKER) {
        return Some(DaemonEvent::ReadyHint);
    }
    if line.contains(ERROR_MARKER) {
        tracing::warn!("daemon: {}", line);
        if line.contains(FATAL_SYNC_MARKER) {
            return Some(DaemonEvent::FatalSyncError);
        }
        return None;
    }
    if line.contains(WALLET_CHANGED_MARKER) {
        return Some(DaemonEvent::WalletChanged);
    }
    None
}

/// A running wallet daemon plus the scoped directory holding its generated
/// configuration. Dropping the handle removes the directory; the child is
/// killed on drop as a last resort if the supervisor did not already stop it.
pub struct DaemonProcess {
    child: Child,
    _workdir: tempfile::TempDir,
}

impl DaemonProcess {
    /// Writes the generated daemon configuration to a temporary path and
    /// launches the subprocess with stdout piped for marker watching.
    /// Returns the handle and the stream of stdout signals.
    pub fn spawn(config: &DaemonConfig) -> AppResult<(Self, mpsc::Receiver<DaemonEvent>)> {
        let workdir = tempfile::TempDir::new()
            .map_err(|e| AppError::Io(format!("Failed to create daemon work dir: {}", e)))?;
        let config_path = workdir.path().join("walletd.conf");
        write_daemon_config(config, &config_path)?;

        let mut child = Command::new(&config.path)
            .arg("--config")
            .arg(&config_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::Io(format!("Failed to start daemon {}: {}", config.path, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Internal("daemon stdout not captured".to_string()))?;

        let (event_tx, events) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = classify_line(&line) {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });

        tracing::info!("daemon started: {}", config.path);
        Ok((
            Self {
                child,
                _workdir: workdir,
            },
            events,
        ))
    }

    /// Blocks until the subprocess exits.
    pub async fn wait(&mut self) -> AppResult<std::process::ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|e| AppError::Io(format!("daemon wait failed: {}", e)))
    }

    /// Termination path: signal-kill the daemon and reap it.
    pub async fn kill(&mut self) {
        tracing::warn!("killing daemon process");
        if let Err(e) = self.child.kill().await {
            tracing::error!("Failed to kill daemon: {}", e);
        }
    }
}

fn write_daemon_config(config: &DaemonConfig, path: &std::path::Path) -> AppResult<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| AppError::Io(format!("Failed to write daemon config: {}", e)))?;
    writeln!(file, "container-file={}", config.container_file)?;
    writeln!(file, "container-password={}", config.container_password)?;
    writeln!(file, "rpc-password={}", config.rpc_password)?;
    writeln!(file, "bind-address={}", config.bind_address)?;
    writeln!(file, "bind-port={}", config.rpc_port)?;
    writeln!(file, "daemon-address={}", config.node_address)?;
    writeln!(file, "daemon-port={}", config.node_port)?;
    writeln!(file, "log-file={}", config.log_file)?;
    writeln!(file, "log-level={}", config.log_level)?;
    Ok(())
}
