// Fake download agents for tests

use crate::core::config::{
    AgentConfig, Config, Layout, LoggingConfig, PublicConfig, RetentionConfig, ServerConfig,
    StorageConfig,
};
use std::path::{Path, PathBuf};

pub const TEST_PUBLIC_URL: &str = "http://files.example.test/files";

/// Write a shell script that records its arguments, drops a payload file into
/// `--dir`, then runs `tail`. Each run records to its own `invocation-<pid>.log`.
pub fn fake_agent(dir: &Path, tail: &str) -> PathBuf {
    let agent_dir = dir.join("agent");
    std::fs::create_dir_all(&agent_dir).unwrap();

    let script = agent_dir.join("agent.sh");
    let body = format!(
        r#"#!/bin/sh
log="$(dirname "$0")/invocation-$$.log"
: > "$log"
dir=""
for arg in "$@"; do
  printf '%s\n' "$arg" >> "$log"
  case "$arg" in
    --dir=*) dir="${{arg#--dir=}}" ;;
  esac
done
if [ -n "$dir" ] && [ -d "$dir" ]; then
  printf 'payload' > "$dir/payload-$$.bin"
fi
{}
"#,
        tail
    );
    std::fs::write(&script, body).unwrap();
    script
}

/// Run the script through `/bin/sh` so it never has to be executable
pub fn shell_agent_config(script: &Path, max_runtime_secs: Option<u64>) -> AgentConfig {
    AgentConfig {
        program: PathBuf::from("/bin/sh"),
        extra_args: vec![script.display().to_string()],
        max_runtime_secs,
    }
}

/// Arguments of every recorded run, sorted for stable comparisons
pub fn read_invocations(script: &Path) -> Vec<Vec<String>> {
    let agent_dir = script.parent().unwrap();
    let mut invocations: Vec<Vec<String>> = std::fs::read_dir(agent_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with("invocation-") && name.ends_with(".log"))
                .unwrap_or(false)
        })
        .map(|entry| {
            std::fs::read_to_string(entry.path())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        })
        .collect();
    invocations.sort();
    invocations
}

pub fn create_test_config(root: &Path, agent: AgentConfig, layout: Layout) -> Config {
    Config {
        server: ServerConfig {
            port: 8080,
            num_threads: 2,
            max_upload_bytes: 1024 * 1024,
        },
        storage: StorageConfig {
            torrent_dir: root.join("torrents").join(".torrents"),
            download_dir: root.join("downloads"),
            layout,
        },
        public: PublicConfig {
            url: TEST_PUBLIC_URL.to_string(),
            per_download_url: false,
        },
        agent,
        retention: RetentionConfig {
            grace_period_secs: 0,
            reap_interval_secs: 1,
            remove_torrent_files: false,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "json".to_string(),
            console: true,
        },
    }
}
