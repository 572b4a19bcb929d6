//! Filesystem access used by the resolver, listings and delivery.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::resolve::shortcut;

/// Kind of a directory entry as seen by `lstat` (links are not followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    pub len: u64,
    pub modified: SystemTime,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        Self {
            kind,
            len: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    /// "Not found" or "not a directory": resolution continues.
    #[error("no such entry: {0}")]
    Missing(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        if is_missing(&err) {
            FsError::Missing(path.to_path_buf())
        } else {
            FsError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FsError::Missing(_))
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Injectable filesystem access. Every call is async and never blocks
/// other requests.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Metadata without following a final symbolic link.
    async fn stat_link(&self, path: &Path) -> Result<FileStat, FsError>;

    /// Canonical path with every link resolved.
    async fn real_path(&self, path: &Path) -> Result<PathBuf, FsError>;

    /// Entry names of a directory, in no particular order.
    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, FsError>;

    /// Stream the file (or an inclusive byte range of it). Dropping the
    /// stream releases the file handle.
    async fn open_read(&self, path: &Path, range: Option<ByteRange>) -> Result<ByteStream, FsError>;

    /// Target of a Windows `.lnk` shortcut, if this platform can read one.
    async fn resolve_shortcut(&self, _path: &Path) -> Result<Option<PathBuf>, FsError> {
        Ok(None)
    }
}

/// [`FileSystem`] backed by `tokio::fs`. Shortcuts are followed on
/// Windows only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

impl TokioFs {
    /// Local target recorded in the shell link at `path`. Files that are
    /// not shell links, or links without a local path, yield `None`.
    pub async fn read_shortcut(path: &Path) -> Result<Option<PathBuf>, FsError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        match shortcut::parse_target(&data) {
            Ok(target) => Ok(target),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Not a readable shortcut");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl FileSystem for TokioFs {
    async fn stat_link(&self, path: &Path) -> Result<FileStat, FsError> {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        Ok(FileStat::from_metadata(&meta))
    }

    async fn real_path(&self, path: &Path) -> Result<PathBuf, FsError> {
        tokio::fs::canonicalize(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, FsError> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(path, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    async fn open_read(&self, path: &Path, range: Option<ByteRange>) -> Result<ByteStream, FsError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        match range {
            Some(range) => {
                file.seek(io::SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| FsError::from_io(path, e))?;
                Ok(ReaderStream::new(file.take(range.len())).boxed())
            }
            None => Ok(ReaderStream::new(file).boxed()),
        }
    }

    async fn resolve_shortcut(&self, path: &Path) -> Result<Option<PathBuf>, FsError> {
        if cfg!(windows) {
            Self::read_shortcut(path).await
        } else {
            Ok(None)
        }
    }
}
