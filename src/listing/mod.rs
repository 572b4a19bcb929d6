//! Directory listing subsystem.
//!
//! # Data Flow
//! ```text
//! resolved directory + decoded virtual path
//!     → assembler.rs (readdir, unlisted filter, link resolution)
//!     → format.rs (human sizes, local mtimes)
//!     → ListingOutcome { Listing | SingleFile | Disabled }
//!     → renderer (HTML) or serde_json (JSON)
//! ```
//!
//! # Design Decisions
//! - The assembler produces data only; bytes come from an injected renderer
//! - Entries that vanish or fail to stat mid-listing are dropped, not errors

pub mod assembler;
pub mod format;

pub use assembler::{
    assemble, Breadcrumb, DirectoryListing, EntryType, ListingEntry, ListingOutcome, SingleFile,
};
