//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServeConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::rules::RuleError;

/// File names looked for, in order, when no config path is given.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["serve.json", "serve.toml"];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid rule: {0}")]
    Rule(#[from] RuleError),

    #[error("Invalid header rule: {0}")]
    Header(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a JSON (`.json`) or TOML file.
///
/// Relative `public` and `proxyCookieJar` paths are resolved against the
/// file's directory.
pub fn load_config(path: &Path) -> Result<ServeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut config: ServeConfig = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for relative in [&mut config.public, &mut config.proxy_cookie_jar] {
        if let Some(p) = relative.as_mut().filter(|p| p.is_relative()) {
            *p = base.join(&*p);
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Find the first known config file inside `dir`.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}
