//! Compiled, request-ready view of a [`ServeConfig`].
//!
//! Rules, globs and header values are compiled once here; each reload builds
//! a fresh `Settings` that is swapped in atomically.

use std::path::PathBuf;

use axum::http::{HeaderName, HeaderValue};

use crate::config::loader::ConfigError;
use crate::config::schema::{AuthConfig, ScriptConfig, ServeConfig, Toggle};
use crate::rules::{Rule, RuleSet};

/// Names never shown in directory listings.
pub const ALWAYS_UNLISTED: [&str; 2] = [".DS_Store", ".git"];

/// A boolean-or-glob-list switch, compiled.
#[derive(Debug, Clone)]
pub enum ToggleSet {
    Flag(bool),
    Sources(RuleSet),
}

impl ToggleSet {
    fn compile(toggle: Option<&Toggle>, default: bool) -> Result<Self, ConfigError> {
        Ok(match toggle {
            None => ToggleSet::Flag(default),
            Some(Toggle::Flag(flag)) => ToggleSet::Flag(*flag),
            Some(Toggle::Sources(sources)) => ToggleSet::Sources(RuleSet::globs(sources)?),
        })
    }

    /// Whether the switch is on for a decoded virtual path.
    pub fn applies(&self, path: &str) -> bool {
        match self {
            ToggleSet::Flag(flag) => *flag,
            ToggleSet::Sources(rules) => rules.any_match(path),
        }
    }
}

/// Custom headers for paths matching one glob.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub rule: Rule,
    /// `None` removes the header.
    pub headers: Vec<(HeaderName, Option<HeaderValue>)>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub rewrites: RuleSet,
    pub redirects: RuleSet,
    pub headers: Vec<HeaderRule>,
    pub clean_urls: ToggleSet,
    pub directory_listing: ToggleSet,
    pub unlisted: RuleSet,
    pub trailing_slash: Option<bool>,
    pub render_single: bool,
    pub symlinks: bool,
    pub etag: bool,
    pub auth: Option<AuthConfig>,
    pub cgi_bin: RuleSet,
    pub proxy_middleware: RuleSet,
    /// Read once when the handler is built; reloads do not swap the jar.
    pub proxy_cookie_jar: Option<PathBuf>,
    pub log_req: bool,
    pub log_res: bool,
    pub scripts: ScriptConfig,
    pub max_body_bytes: usize,
}

impl Settings {
    pub fn from_config(config: &ServeConfig) -> Result<Self, ConfigError> {
        let root = match &config.public {
            Some(public) if public.is_absolute() => public.clone(),
            other => {
                let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
                    path: PathBuf::from("."),
                    source,
                })?;
                match other {
                    Some(public) => cwd.join(public),
                    None => cwd,
                }
            }
        };

        let headers = config
            .headers
            .iter()
            .map(|entry| {
                let rule = Rule::glob(&entry.source)?;
                let headers = entry
                    .headers
                    .iter()
                    .map(|header| {
                        let name = HeaderName::try_from(header.key.as_str())
                            .map_err(|e| ConfigError::Header(format!("{}: {e}", header.key)))?;
                        let value = header
                            .value
                            .as_deref()
                            .map(HeaderValue::try_from)
                            .transpose()
                            .map_err(|e| ConfigError::Header(format!("{}: {e}", header.key)))?;
                        Ok((name, value))
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok(HeaderRule { rule, headers })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let unlisted: Vec<String> = ALWAYS_UNLISTED
            .iter()
            .map(|name| name.to_string())
            .chain(config.unlisted.iter().cloned())
            .collect();

        Ok(Self {
            root,
            rewrites: RuleSet::compile(&config.rewrites)?,
            redirects: RuleSet::compile(&config.redirects)?,
            headers,
            clean_urls: ToggleSet::compile(config.clean_urls.as_ref(), false)?,
            directory_listing: ToggleSet::compile(config.directory_listing.as_ref(), true)?,
            unlisted: RuleSet::globs(&unlisted)?,
            trailing_slash: config.trailing_slash,
            render_single: config.render_single,
            symlinks: config.symlinks,
            etag: config.etag,
            auth: config.auth.clone(),
            cgi_bin: RuleSet::compile(&config.cgi_bin)?,
            proxy_middleware: RuleSet::compile(&config.proxy_middleware)?,
            proxy_cookie_jar: config.proxy_cookie_jar.clone(),
            log_req: config.log_req,
            log_res: config.log_res,
            scripts: config.scripts.clone(),
            max_body_bytes: config.limits.max_body_bytes,
        })
    }
}
