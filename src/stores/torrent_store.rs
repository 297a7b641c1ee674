use crate::models::download::DownloadId;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

const TORRENT_EXTENSION: &str = "torrent";
const MAX_CREATE_ATTEMPTS: usize = 8;

/// Directory of uploaded `.torrent` files, one uniquely named file per upload
pub struct TorrentStore {
    dir: PathBuf,
}

/// An upload being written to disk
pub struct PendingTorrent {
    id: DownloadId,
    path: PathBuf,
    file: File,
    written: u64,
}

/// A fully written upload, read-only from here on
#[derive(Debug, Clone)]
pub struct PersistedTorrent {
    pub id: DownloadId,
    pub path: PathBuf,
    pub size: u64,
}

impl TorrentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory and any missing parents
    pub async fn ensure_dir(&self) -> io::Result<()> {
        create_dir_all(&self.dir).await
    }

    /// Create a new empty `<id>.torrent` file.
    ///
    /// Uses create-new semantics so concurrent uploads never share a file; a
    /// name collision retries with a fresh id.
    pub async fn create(&self) -> io::Result<PendingTorrent> {
        self.ensure_dir().await?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = DownloadId::random();
            let path = self.dir.join(format!("{}.{}", id, TORRENT_EXTENSION));

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    return Ok(PendingTorrent {
                        id,
                        path,
                        file,
                        written: 0,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not find an unused torrent file name",
        ))
    }
}

impl PendingTorrent {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and close the file
    pub async fn finish(mut self) -> io::Result<PersistedTorrent> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        Ok(PersistedTorrent {
            id: self.id,
            path: self.path,
            size: self.written,
        })
    }

    /// Close and delete a partially written file
    pub async fn discard(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.path).await {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partially written torrent"
            );
        }
    }
}

/// Recursive directory creation, `0755` on unix
pub async fn create_dir_all(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(path).await
}
