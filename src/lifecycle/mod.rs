//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     CLI overrides → find/load config → validate → Settings → handler
//!     config file watcher → debounce → overrides re-applied → Settings → server
//!
//! Shutdown (shutdown.rs):
//!     Signal received → watch flag set → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then handler, then listener
//! - Command-line flags win over the config file, on reload too

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{bootstrap, watch_config, Bootstrap, Overrides};
