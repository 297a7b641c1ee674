use crate::core::config::AgentConfig;
use crate::models::download::{AgentOutcome, DownloadId, DownloadState};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// Launches the external download agent and watches it until it exits
pub struct Supervisor {
    program: PathBuf,
    extra_args: Vec<String>,
    max_runtime: Option<Duration>,
}

impl Supervisor {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
            max_runtime: config.max_runtime(),
        }
    }

    /// Agent arguments: extra args, the fixed flags, then the torrent path last
    pub fn args(&self, output_dir: &Path, torrent_path: &Path) -> Vec<OsString> {
        let mut dir_flag = OsString::from("--dir=");
        dir_flag.push(output_dir);

        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push(dir_flag);
        args.push(OsString::from("--file-allocation=trunc"));
        args.push(OsString::from("--enable-mmap=true"));
        args.push(torrent_path.as_os_str().to_os_string());
        args
    }

    /// Start the agent without waiting for it
    pub fn launch(&self, output_dir: &Path, torrent_path: &Path) -> io::Result<Child> {
        Command::new(&self.program)
            .args(self.args(output_dir, torrent_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }

    /// Await the agent on a detached task and publish its outcome
    pub fn supervise(
        &self,
        id: DownloadId,
        child: Child,
        state: watch::Sender<DownloadState>,
    ) -> JoinHandle<AgentOutcome> {
        let max_runtime = self.max_runtime;

        tokio::spawn(async move {
            let outcome = wait_for_agent(child, max_runtime).await;

            if outcome.is_success() {
                info!(download_id = %id, outcome = ?outcome, "Download agent finished");
            } else {
                warn!(download_id = %id, outcome = ?outcome, "Download agent ended unsuccessfully");
            }

            state.send_replace(DownloadState::Completed {
                outcome: outcome.clone(),
                finished_at: Instant::now(),
            });

            outcome
        })
    }
}

async fn wait_for_agent(mut child: Child, max_runtime: Option<Duration>) -> AgentOutcome {
    let status = match max_runtime {
        Some(limit) => {
            let waited = tokio::time::timeout(limit, child.wait()).await;
            match waited {
                Ok(status) => status,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill download agent after max runtime");
                    }
                    return AgentOutcome::TimedOut;
                }
            }
        }
        None => child.wait().await,
    };

    match status {
        Ok(status) => match status.code() {
            Some(code) => AgentOutcome::Exited { code },
            None => AgentOutcome::Signaled,
        },
        Err(e) => AgentOutcome::WaitFailed {
            reason: e.to_string(),
        },
    }
}
