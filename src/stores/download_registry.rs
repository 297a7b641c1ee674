use crate::models::download::{DownloadId, DownloadOutput, DownloadState};
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

struct DownloadEntry {
    output: DownloadOutput,
    state: watch::Receiver<DownloadState>,
    sweep_attempts: u32,
}

/// A download taken out of the registry for sweeping
#[derive(Debug, Clone)]
pub struct ExpiredDownload {
    pub output: DownloadOutput,
    /// State at the time it was taken, always `Completed`
    pub state: DownloadState,
    /// Earlier sweeps of this download that failed to list its directory
    pub sweep_attempts: u32,
}

/// In-memory registry of launched downloads
///
/// Maps each download to its output location and lifecycle state. Entries
/// leave the registry when the reaper takes them for sweeping, and only come
/// back through `requeue` when that sweep could not list the directory.
pub struct DownloadRegistry {
    downloads: DashMap<DownloadId, DownloadEntry>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self {
            downloads: DashMap::new(),
        }
    }

    /// Track a freshly launched download.
    ///
    /// Returns the sender the supervisor publishes the agent outcome on.
    pub fn register(&self, output: DownloadOutput) -> watch::Sender<DownloadState> {
        let (tx, rx) = watch::channel(DownloadState::Running);
        self.downloads.insert(
            output.id.clone(),
            DownloadEntry {
                output,
                state: rx,
                sweep_attempts: 0,
            },
        );
        tx
    }

    /// Put back a download whose sweep failed so the next pass retries it
    pub fn requeue(&self, expired: ExpiredDownload) {
        let (_tx, rx) = watch::channel(expired.state);
        self.downloads.insert(
            expired.output.id.clone(),
            DownloadEntry {
                output: expired.output,
                state: rx,
                sweep_attempts: expired.sweep_attempts + 1,
            },
        );
    }

    /// Watch a download's state until it is reaped
    pub fn subscribe(&self, id: &DownloadId) -> Option<watch::Receiver<DownloadState>> {
        self.downloads.get(id).map(|entry| entry.state.clone())
    }

    pub fn state(&self, id: &DownloadId) -> Option<DownloadState> {
        self.downloads.get(id).map(|entry| entry.state.borrow().clone())
    }

    /// Remove and return every download whose agent finished at least `grace` before `now`
    pub fn take_expired(&self, now: Instant, grace: Duration) -> Vec<ExpiredDownload> {
        let expired: Vec<DownloadId> = self
            .downloads
            .iter()
            .filter(|entry| match &*entry.state.borrow() {
                DownloadState::Completed { finished_at, .. } => *finished_at + grace <= now,
                DownloadState::Running => false,
            })
            .map(|entry| entry.key().clone())
            .collect();

        // Removal is atomic, a concurrent caller never gets the same entry
        expired
            .into_iter()
            .filter_map(|id| self.downloads.remove(&id))
            .map(|(_, entry)| {
                let state = entry.state.borrow().clone();
                ExpiredDownload {
                    output: entry.output,
                    state,
                    sweep_attempts: entry.sweep_attempts,
                }
            })
            .collect()
    }

    pub fn running(&self) -> usize {
        self.downloads
            .iter()
            .filter(|entry| matches!(*entry.state.borrow(), DownloadState::Running))
            .count()
    }

    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }
}

impl Default for DownloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}
