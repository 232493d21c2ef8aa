use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Durable scan position, written after every successful health-monitor
/// cycle and every completed scanner pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    #[serde(rename = "scanHeight")]
    pub scan_height: u64,
    #[serde(rename = "lastBlock")]
    pub last_block: u64,
}

impl Default for SyncProgress {
    fn default() -> Self {
        // Fresh install: nothing scanned, chain position unknown
        SyncProgress {
            scan_height: 0,
            last_block: 1,
        }
    }
}

pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means a fresh install and yields defaults. An existing
    /// but unreadable or corrupt file is an error: the service cannot safely
    /// guess its scan position.
    pub fn load(&self) -> AppResult<SyncProgress> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No progress file at {}, starting fresh",
                    self.path.display()
                );
                return Ok(SyncProgress::default());
            }
            Err(e) => {
                return Err(AppError::Io(format!(
                    "Failed to read progress file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Io(format!(
                "Corrupt progress file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write-temp-then-rename so a crash mid-write can never leave a
    /// truncated file behind.
    pub fn save(&self, progress: SyncProgress) -> AppResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &progress)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| {
            AppError::Io(format!(
                "Failed to replace progress file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            "Progress saved: scanHeight={} lastBlock={}",
            progress.scan_height,
            progress.last_block
        );
        Ok(())
    }
}
