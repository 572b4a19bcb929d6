//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events through `tracing`)
//!     → metrics.rs (request counters, latency histogram, ETag cache gauge)
//!     → tracing.rs (one span per request, keyed by x-request-id)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Metric macros are no-ops until a recorder is installed, so library
//!   users that never call `init_metrics` pay nothing
//! - Request ID flows through every log line via the request span

pub mod logging;
pub mod metrics;
pub mod tracing;
