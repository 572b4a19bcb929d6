//! Weak ETag computation with an mtime-keyed cache.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dashmap::DashMap;
use futures_util::StreamExt;
use sha1::{Digest, Sha1};

use crate::observability::metrics::record_etag_cache_size;
use crate::resolve::{FileStat, FileSystem, FsError};

/// Process-wide cache of content hashes, constructed with the server.
///
/// Entries are replaced when the file's mtime changes and never evicted
/// otherwise. Concurrent recomputation for one path may run twice; the last
/// write wins.
#[derive(Debug, Default)]
pub struct EtagCache {
    entries: DashMap<PathBuf, (SystemTime, String)>,
}

impl EtagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `W/"<sha1>"` over the file extension, `-`, and the file bytes.
    pub async fn etag(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
        stat: &FileStat,
    ) -> Result<String, FsError> {
        let cached = self.entries.get(path).map(|entry| entry.value().clone());
        if let Some((mtime, sha)) = cached {
            if mtime == stat.modified {
                return Ok(format_etag(&sha));
            }
        }

        let sha = hash_file(fs, path).await?;
        self.entries
            .insert(path.to_path_buf(), (stat.modified, sha.clone()));
        record_etag_cache_size(self.entries.len());

        Ok(format_etag(&sha))
    }
}

fn format_etag(sha: &str) -> String {
    format!("W/\"{sha}\"")
}

async fn hash_file(fs: &dyn FileSystem, path: &Path) -> Result<String, FsError> {
    let mut hasher = Sha1::new();
    if let Some(ext) = path.extension() {
        hasher.update(b".");
        hasher.update(ext.to_string_lossy().as_bytes());
    }
    hasher.update(b"-");

    let mut stream = fs.open_read(path, None).await?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FsError::from_io(path, e))?;
        hasher.update(&chunk);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
