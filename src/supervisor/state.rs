use tokio::sync::RwLock;

use crate::rpc::types::StatusInfo;
use crate::supervisor::progress::SyncProgress;

/// Fields shared by the periodic tasks. Every read-modify-write goes through
/// the lock in one critical section, so the tasks can interleave arbitrarily
/// and still observe consistent heights.
#[derive(Debug, Clone, Copy)]
struct StateInner {
    scan_height: u64,
    last_known_block: u64,
    known_block_count: u64,
    consecutive_failures: u32,
    synced: bool,
}

/// Consistent point-in-time view handed out to the tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub scan_height: u64,
    pub last_known_block: u64,
    pub known_block_count: u64,
    pub consecutive_failures: u32,
    pub synced: bool,
}

impl StateSnapshot {
    pub fn progress(&self) -> SyncProgress {
        SyncProgress {
            scan_height: self.scan_height,
            last_block: self.last_known_block,
        }
    }
}

pub struct ServiceState {
    inner: RwLock<StateInner>,
}

impl ServiceState {
    pub fn new(progress: SyncProgress) -> Self {
        Self {
            inner: RwLock::new(StateInner {
                scan_height: progress.scan_height,
                last_known_block: progress.last_block.max(progress.scan_height),
                known_block_count: 0,
                consecutive_failures: 0,
                synced: false,
            }),
        }
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read().await;
        StateSnapshot {
            scan_height: inner.scan_height,
            last_known_block: inner.last_known_block,
            known_block_count: inner.known_block_count,
            consecutive_failures: inner.consecutive_failures,
            synced: inner.synced,
        }
    }

    /// A successful ping refreshes the chain heights and clears the failure
    /// counter. `last_known_block` never drops below `scan_height`.
    pub async fn record_ping_success(&self, status: &StatusInfo) -> StateSnapshot {
        let mut inner = self.inner.write().await;
        inner.last_known_block = status.block_count.max(inner.scan_height);
        inner.known_block_count = status.known_block_count;
        inner.synced = status.is_synced();
        inner.consecutive_failures = 0;
        snapshot_of(&inner)
    }

    /// Returns the new consecutive-failure count.
    pub async fn record_ping_failure(&self) -> u32 {
        let mut inner = self.inner.write().await;
        inner.consecutive_failures += 1;
        inner.consecutive_failures
    }

    /// Advances the scan height after a completed scanner pass. The height is
    /// monotone: a target below the current value is ignored, and it is
    /// clamped to `last_known_block`.
    pub async fn advance_scan_height(&self, target: u64) -> StateSnapshot {
        let mut inner = self.inner.write().await;
        let target = target.min(inner.last_known_block);
        if target > inner.scan_height {
            inner.scan_height = target;
        }
        snapshot_of(&inner)
    }
}

fn snapshot_of(inner: &StateInner) -> StateSnapshot {
    StateSnapshot {
        scan_height: inner.scan_height,
        last_known_block: inner.last_known_block,
        known_block_count: inner.known_block_count,
        consecutive_failures: inner.consecutive_failures,
        synced: inner.synced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(block_count: u64, known_block_count: u64) -> StatusInfo {
        StatusInfo {
            block_count,
            known_block_count,
            peer_count: 8,
        }
    }

    #[tokio::test]
    async fn ping_success_resets_failures_and_updates_heights() {
        let state = ServiceState::new(SyncProgress {
            scan_height: 10,
            last_block: 10,
        });
        state.record_ping_failure().await;
        state.record_ping_failure().await;

        let snap = state.record_ping_success(&status(120, 121)).await;
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.last_known_block, 120);
        assert!(snap.synced);
    }

    #[tokio::test]
    async fn failures_accumulate_until_a_success() {
        let state = ServiceState::new(SyncProgress::default());
        for expected in 1..=30 {
            assert_eq!(state.record_ping_failure().await, expected);
        }
        state.record_ping_success(&status(5, 5)).await;
        assert_eq!(state.snapshot().await.consecutive_failures, 0);
        assert_eq!(state.record_ping_failure().await, 1);
    }

    #[tokio::test]
    async fn scan_height_is_monotone_and_bounded() {
        let state = ServiceState::new(SyncProgress {
            scan_height: 50,
            last_block: 50,
        });
        state.record_ping_success(&status(100, 100)).await;

        // clamped to last_known_block
        let snap = state.advance_scan_height(200).await;
        assert_eq!(snap.scan_height, 100);

        // never goes backwards
        let snap = state.advance_scan_height(40).await;
        assert_eq!(snap.scan_height, 100);
        assert!(snap.scan_height <= snap.last_known_block);
    }

    #[tokio::test]
    async fn last_known_block_never_drops_below_scan_height() {
        let state = ServiceState::new(SyncProgress {
            scan_height: 80,
            last_block: 90,
        });
        // daemon restarting from low height must not violate the invariant
        let snap = state.record_ping_success(&status(3, 100)).await;
        assert_eq!(snap.last_known_block, 80);
        assert!(snap.scan_height <= snap.last_known_block);
    }
}
