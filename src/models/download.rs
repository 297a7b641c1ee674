use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

const ID_LEN: usize = 16;

/// Identity of one upload: the stem of its persisted `.torrent` file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadId(String);

impl DownloadId {
    pub fn random() -> Self {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Recover the id from a persisted torrent path
    pub fn from_stem(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(|stem| Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the download agent ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Exited { code: i32 },
    /// Terminated by a signal, no exit code available
    Signaled,
    /// Killed after exceeding the configured max runtime
    TimedOut,
    WaitFailed { reason: String },
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Exited { code: 0 })
    }
}

/// Lifecycle of a launched download as seen by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    Running,
    Completed {
        outcome: AgentOutcome,
        finished_at: Instant,
    },
}

/// What gets swept once a download expires
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    pub id: DownloadId,
    pub torrent_path: PathBuf,
    pub output_dir: PathBuf,
    /// The output directory belongs to this download alone
    pub isolated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub download_url: String,
}
