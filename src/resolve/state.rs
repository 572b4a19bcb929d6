//! Per-request path state and the resolver's final disposition.

use std::path::{Path, PathBuf};

use crate::resolve::fs::FileStat;
use crate::rules::encode::normalize_posix;
use crate::rules::RedirectTarget;

/// Request-path views, all POSIX-style and rooted at `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualPath {
    /// Normalized, still percent-encoded.
    pub original: String,
    /// Normalized and decoded.
    pub decoded: String,
    /// Result of internal rewrites, if any applied.
    pub rewritten: Option<String>,
}

impl VirtualPath {
    /// The path used for filesystem lookups.
    pub fn effective(&self) -> &str {
        self.rewritten.as_deref().unwrap_or(&self.decoded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealPath {
    pub root: PathBuf,
    pub absolute: PathBuf,
    pub stat: Option<FileStat>,
    pub is_symlink: bool,
}

/// Owned by one request's handling task; never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathState {
    pub virtual_path: VirtualPath,
    pub real: RealPath,
}

impl PathState {
    pub fn new(root: &Path) -> Self {
        Self {
            virtual_path: VirtualPath::default(),
            real: RealPath {
                root: root.to_path_buf(),
                absolute: root.to_path_buf(),
                stat: None,
                is_symlink: false,
            },
        }
    }

    /// Path of the resolved entry relative to the root, `/`-separated and
    /// with a leading slash. Falls back to the virtual path when the entry
    /// lives outside the root (a followed symlink).
    pub fn relative_to_root(&self) -> String {
        match self.real.absolute.strip_prefix(&self.real.root) {
            Ok(rest) => {
                let joined = rest
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                normalize_posix(&format!("/{joined}"))
            }
            Err(_) => self.virtual_path.effective().to_string(),
        }
    }
}

/// Outcome of path resolution. Exactly one applies per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Inline `data:` URI to decode and serve.
    DataPayload(String),
    /// Client-visible redirect.
    Redirect(RedirectTarget),
    /// Forward to an absolute upstream URL.
    Proxy(RedirectTarget),
    NotFound,
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: PathState,
    pub disposition: Disposition,
}

/// Join a normalized virtual path onto `root` one segment at a time, so the
/// result never leaves `root`.
pub fn join_within(root: &Path, virtual_path: &str) -> PathBuf {
    normalize_posix(virtual_path)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}
