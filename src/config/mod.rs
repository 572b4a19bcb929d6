//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServeConfig (validated, immutable)
//!     → settings.rs (rules and headers compiled)
//!     → shared via ArcSwap<Settings> with the request handler
//!
//! On file change:
//!     watcher.rs detects change, waits out the event burst
//!     → loader.rs loads new config
//!     → CLI overrides re-applied, validation.rs validates again
//!     → Settings::from_config (failures surface as ReloadError)
//!     → atomic swap; in-flight requests keep the old generation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;
pub mod watcher;

pub use loader::{find_config, load_config, ConfigError};
pub use schema::{
    AuthConfig, EngineKind, HeaderEntry, HeaderRuleConfig, ListenerConfig, ObservabilityConfig,
    RuleConfig, ScriptConfig, ServeConfig, Toggle,
};
pub use settings::{HeaderRule, Settings, ToggleSet};
pub use validation::{validate_config, ValidationError};
pub use watcher::{ConfigWatcher, ReloadError};
