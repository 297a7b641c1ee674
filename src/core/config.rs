use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub public: PublicConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Where downloads write their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every download gets `<download_dir>/<download_id>/`.
    Isolated,
    /// Every download writes straight into `<download_dir>` and each sweep
    /// clears the whole directory, output of other downloads included.
    Shared,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub torrent_dir: PathBuf,
    pub download_dir: PathBuf,
    #[serde(default = "default_layout")]
    pub layout: Layout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicConfig {
    pub url: String,
    #[serde(default)]
    pub per_download_url: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_program")]
    pub program: PathBuf,
    #[serde(default)]
    pub extra_args: Vec<String>,
    pub max_runtime_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
    #[serde(default)]
    pub remove_torrent_files: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            extra_args: Vec::new(),
            max_runtime_secs: None,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period(),
            reap_interval_secs: default_reap_interval(),
            remove_torrent_files: false,
        }
    }
}

impl AgentConfig {
    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime_secs.map(Duration::from_secs)
    }
}

impl RetentionConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024 // 10 MiB
}

fn default_layout() -> Layout {
    Layout::Isolated
}

fn default_agent_program() -> PathBuf {
    PathBuf::from("aria2c")
}

fn default_grace_period() -> u64 {
    30
}

fn default_reap_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        if self.server.port == 0 {
            bail!("Server port must be greater than 0");
        }

        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if self.server.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be greater than 0");
        }

        // Validate storage config
        if self.storage.torrent_dir.as_os_str().is_empty() {
            bail!("torrent_dir must not be empty");
        }

        if self.storage.download_dir.as_os_str().is_empty() {
            bail!("download_dir must not be empty");
        }

        if self.storage.layout == Layout::Shared {
            if self.storage.torrent_dir == self.storage.download_dir {
                bail!(
                    "torrent_dir ({}) must differ from download_dir with the shared layout",
                    self.storage.torrent_dir.display()
                );
            }

            // Every shared sweep clears download_dir
            if self.storage.torrent_dir.starts_with(&self.storage.download_dir) {
                bail!(
                    "torrent_dir ({}) must not be inside download_dir ({}) with the shared layout",
                    self.storage.torrent_dir.display(),
                    self.storage.download_dir.display()
                );
            }
        }

        // Validate public config
        if self.public.url.is_empty() {
            bail!("public url must not be empty");
        }

        if self.public.per_download_url && self.storage.layout == Layout::Shared {
            bail!("per_download_url requires the isolated layout");
        }

        // Validate agent config
        if self.agent.program.as_os_str().is_empty() {
            bail!("agent program must not be empty");
        }

        if self.agent.max_runtime_secs == Some(0) {
            bail!("max_runtime_secs must be greater than 0 when set");
        }

        // Validate retention config
        if self.retention.reap_interval_secs == 0 {
            bail!("reap_interval_secs must be greater than 0");
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }
}
