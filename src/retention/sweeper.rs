use crate::core::error::SweepError;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Result of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
    /// Subdirectories left alone because `remove_dirs` was off
    pub skipped: usize,
}

/// Delete every entry of `dir` present when the sweep starts.
///
/// The listing is taken once up front, so entries created while the sweep runs
/// survive it. A single entry failing to delete is logged and skipped; failing
/// to list the directory aborts the sweep. A missing directory is already clean.
///
/// Subdirectories are removed recursively only when `remove_dirs` is set.
/// Otherwise they are kept, so a sweep of a shared directory never descends
/// into a tree it does not own.
pub async fn sweep_dir(dir: &Path, remove_dirs: bool) -> Result<SweepReport, SweepError> {
    let snapshot = match snapshot_entries(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Nothing to sweep, directory is gone");
            return Ok(SweepReport::default());
        }
        Err(source) => {
            return Err(SweepError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut report = SweepReport::default();

    for (path, is_dir) in snapshot {
        if is_dir && !remove_dirs {
            debug!(path = %path.display(), "Keeping subdirectory during sweep");
            report.skipped += 1;
            continue;
        }

        match remove_entry(&path, is_dir).await {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                let err = SweepError::RemoveEntry { path, source };
                warn!(error = %err, "Skipping entry during sweep");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn snapshot_entries(dir: &Path) -> io::Result<Vec<(PathBuf, bool)>> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        // file_type() does not follow symlinks, a link to a directory is unlinked
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push((entry.path(), is_dir));
    }

    Ok(entries)
}

async fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_removes_all_entries() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        std::fs::write(dir.join("a.iso"), b"a").unwrap();
        std::fs::write(dir.join("b.bin"), b"b").unwrap();
        std::fs::create_dir(dir.join("album")).unwrap();
        std::fs::write(dir.join("album").join("track.flac"), b"c").unwrap();

        let report = sweep_dir(dir, true).await.unwrap();

        assert_eq!(report.removed, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
        assert!(dir.exists());
    }

    #[tokio::test]
    async fn test_sweep_keeps_subdirectories_when_asked() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        std::fs::write(dir.join("a.iso"), b"a").unwrap();
        std::fs::create_dir(dir.join(".torrents")).unwrap();
        std::fs::write(dir.join(".torrents").join("queued.torrent"), b"d4:infode").unwrap();

        let report = sweep_dir(dir, false).await.unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!dir.join("a.iso").exists());
        assert!(dir.join(".torrents").join("queued.torrent").exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_directory_is_clean() {
        let temp_dir = TempDir::new().unwrap();
        let report = sweep_dir(&temp_dir.path().join("gone"), true).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let report = sweep_dir(temp_dir.path(), true).await.unwrap();
        assert_eq!(report.removed, 0);
    }

    #[tokio::test]
    async fn test_sweep_is_a_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join("old.bin"), b"old").unwrap();

        let snapshot = snapshot_entries(dir).await.unwrap();

        // Written after the listing was taken
        std::fs::write(dir.join("new.bin"), b"new").unwrap();

        for (path, is_dir) in snapshot {
            remove_entry(&path, is_dir).await.unwrap();
        }

        assert!(!dir.join("old.bin").exists());
        assert!(dir.join("new.bin").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sweep_unlinks_symlink_without_following() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("keep.txt"), b"keep").unwrap();

        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        // A link to a directory is not a directory entry, even when subdirectories are kept
        let report = sweep_dir(temp_dir.path(), false).await.unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.skipped, 0);
        assert!(!temp_dir.path().join("link").exists());
        assert!(outside.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_sweep_file_path_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let result = sweep_dir(&file, true).await;
        assert!(matches!(result, Err(SweepError::ReadDir { .. })));
    }
}
