// Application state (AppState)

use crate::agent::supervisor::Supervisor;
use crate::core::config::{Config, Layout};
use crate::models::download::DownloadId;
use crate::retention::reaper::Reaper;
use crate::stores::{download_registry::DownloadRegistry, torrent_store::TorrentStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state
///
/// Built once from the configuration and handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Where uploaded `.torrent` files are persisted
    pub torrent_store: Arc<TorrentStore>,

    /// Launched downloads awaiting their sweep
    pub registry: Arc<DownloadRegistry>,

    /// Download agent launcher
    pub supervisor: Arc<Supervisor>,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        Self {
            torrent_store: Arc::new(TorrentStore::new(config.storage.torrent_dir.clone())),
            registry: Arc::new(DownloadRegistry::new()),
            supervisor: Arc::new(Supervisor::new(&config.agent)),
            config,
        }
    }

    /// Directory the agent writes this download into
    pub fn output_dir(&self, id: &DownloadId) -> PathBuf {
        match self.config.storage.layout {
            Layout::Isolated => self.config.storage.download_dir.join(id.as_str()),
            Layout::Shared => self.config.storage.download_dir.clone(),
        }
    }

    /// URL handed back to the uploader
    pub fn download_url(&self, id: &DownloadId) -> String {
        if self.config.public.per_download_url {
            format!("{}/{}/", self.config.public.url.trim_end_matches('/'), id)
        } else {
            self.config.public.url.clone()
        }
    }

    pub fn reaper(&self) -> Reaper {
        Reaper::new(
            Arc::clone(&self.registry),
            self.config.retention.grace_period(),
            self.config.retention.remove_torrent_files,
        )
    }
}
