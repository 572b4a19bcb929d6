//! Path rule subsystem.
//!
//! # Data Flow
//! ```text
//! RuleConfig ──▶ Rule::compile ──▶ Matcher (route | glob | regex | text)
//!                                      │
//! request path ──▶ RuleSet::rewrite ───┤   internal rewrites (decoded)
//!              └─▶ RuleSet::redirect ──┘   redirects / proxy targets
//! ```
//!
//! # Design Decisions
//! - Rules are compiled once per configuration generation, never per request
//! - Chained evaluation is bounded; a cycle fails closed instead of spinning
//! - An empty rewrite result counts as "no match"

pub mod encode;
pub mod engine;
pub mod evaluate;
pub mod glob;
pub mod route;

pub use engine::{RewriteMode, Rule};
pub use evaluate::{default_redirect_status, RedirectTarget, RuleSet, MAX_RULE_PASSES};

use thiserror::Error;

/// Rule compilation and evaluation errors.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("invalid route template '{template}': {reason}")]
    InvalidRoute { template: String, reason: String },

    #[error("rule evaluation exceeded {0} passes")]
    RecursionLimit(usize),
}
