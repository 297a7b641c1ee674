use crate::core::error::SweepError;
use crate::models::download::DownloadOutput;
use crate::retention::sweeper::sweep_dir;
use crate::stores::download_registry::DownloadRegistry;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Sweeps of one download that may fail to list its directory before it is dropped
pub const MAX_SWEEP_ATTEMPTS: u32 = 3;

/// Sweeps the output of downloads whose grace period has run out
pub struct Reaper {
    registry: Arc<DownloadRegistry>,
    grace_period: Duration,
    remove_torrent_files: bool,
}

impl Reaper {
    pub fn new(registry: Arc<DownloadRegistry>, grace_period: Duration, remove_torrent_files: bool) -> Self {
        Self {
            registry,
            grace_period,
            remove_torrent_files,
        }
    }

    /// Sweep every download expired at `now`.
    ///
    /// Returns how many downloads left the registry. One whose directory could
    /// not be listed goes back into the registry and is retried on the next
    /// pass, up to `MAX_SWEEP_ATTEMPTS` sweeps in total.
    pub async fn reap_expired(&self, now: Instant) -> usize {
        let expired = self.registry.take_expired(now, self.grace_period);
        let mut reaped = 0;

        for download in expired {
            let err = match self.reap(&download.output).await {
                Ok(()) => {
                    reaped += 1;
                    continue;
                }
                Err(e) => e,
            };

            let attempts = download.sweep_attempts + 1;
            if attempts < MAX_SWEEP_ATTEMPTS {
                warn!(
                    download_id = %download.output.id,
                    attempts,
                    error = %err,
                    "Sweep aborted, retrying on next pass"
                );
                self.registry.requeue(download);
            } else {
                error!(
                    download_id = %download.output.id,
                    output_dir = %download.output.output_dir.display(),
                    attempts,
                    error = %err,
                    "Giving up on sweep, output left on disk"
                );
                reaped += 1;
            }
        }

        reaped
    }

    async fn reap(&self, output: &DownloadOutput) -> Result<(), SweepError> {
        // The shared directory may hold trees this download never wrote
        let report = sweep_dir(&output.output_dir, output.isolated).await?;
        info!(
            download_id = %output.id,
            output_dir = %output.output_dir.display(),
            removed = report.removed,
            failed = report.failed,
            skipped = report.skipped,
            shared = !output.isolated,
            "Download output swept"
        );

        if output.isolated {
            // Fails if the agent wrote again after the snapshot; the files stay
            match fs::remove_dir(&output.output_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    debug!(
                        output_dir = %output.output_dir.display(),
                        error = %e,
                        "Output directory left in place"
                    );
                }
            }
        }

        if self.remove_torrent_files {
            match fs::remove_file(&output.torrent_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(
                        torrent_path = %output.torrent_path.display(),
                        error = %e,
                        "Failed to remove torrent file"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Spawn the background task that periodically reaps expired downloads
pub fn spawn_reaper_task(reaper: Reaper, reap_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_interval);

        loop {
            interval.tick().await;

            debug!("Running download reaper");
            let reaped = reaper.reap_expired(Instant::now()).await;

            if reaped > 0 {
                info!(
                    reaped_downloads = reaped,
                    tracked_downloads = reaper.registry.len(),
                    "Download reaper completed"
                );
            }
        }
    })
}
