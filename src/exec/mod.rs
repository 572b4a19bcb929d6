//! Script execution subsystem.
//!
//! # Data Flow
//! ```text
//! resolved file path
//!     → cgi.rs (first matching cgiBin rule, token expansion)
//!     → runner.rs (shell, stdin pipe, timeout, output cap)
//!     → stdout or stderr bytes
//! ```
//!
//! # Design Decisions
//! - Any execution failure falls back to plain file delivery
//! - The runner is a trait so tests and embedders can swap it out

pub mod cgi;
pub mod runner;

pub use cgi::{prepare, response_body, select, Tokens};
pub use runner::{ScriptError, ScriptOutput, ScriptRequest, ScriptRunner, ShellRunner};
