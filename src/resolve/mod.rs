//! Path resolution subsystem.
//!
//! # Data Flow
//! ```text
//! request path + Settings
//!     → resolver.rs (decode, rewrite, redirect decision)
//!     → symlink.rs (optional link walk; shortcut.rs reads .lnk targets)
//!     → fs.rs (lstat through the injected FileSystem)
//!     → Resolution { PathState, Disposition }
//! ```
//!
//! # Design Decisions
//! - `PathState` is owned by one request and threaded through the steps
//! - Virtual paths are joined segment by segment, so lookups never leave the root
//! - Missing entries are a normal outcome; only other I/O failures are errors

pub mod fs;
pub mod redirect;
pub mod resolver;
pub mod shortcut;
pub mod state;
pub mod symlink;

pub use fs::{ByteRange, ByteStream, EntryKind, FileStat, FileSystem, FsError, TokioFs};
pub use resolver::Resolver;
pub use state::{join_within, Disposition, PathState, RealPath, Resolution, VirtualPath};

use thiserror::Error;

use crate::rules::RuleError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request path is not valid percent-encoded UTF-8")]
    BadRequest,

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Fs(#[from] FsError),
}
