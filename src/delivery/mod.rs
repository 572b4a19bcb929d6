//! File delivery subsystem.
//!
//! # Data Flow
//! ```text
//! resolved file (path + FileStat)
//!     → etag.rs (cached weak validator) or Last-Modified
//!     → headers.rs (defaults, then custom header rules)
//!     → conditional.rs (If-* and Range against the final headers)
//!     → Delivery { Full | Partial | NotModified | PreconditionFailed | RangeNotSatisfiable }
//! ```
//!
//! # Design Decisions
//! - Custom header rules run before conditional evaluation, so a rule that
//!   removes `ETag` also disables ETag-based conditionals
//! - Only the first satisfiable range is served; no multipart responses

pub mod conditional;
pub mod etag;
pub mod headers;
pub mod range;

pub use conditional::{evaluate, Delivery};
pub use etag::EtagCache;
pub use headers::{apply_custom_headers, content_type_for, file_headers, Validator};
pub use range::{parse_range, RangeError};
