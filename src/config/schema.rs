//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the serving engine.
//! Field names are camelCase so an existing `serve.json` deserializes unchanged;
//! TOML files use the same keys.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the serving engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServeConfig {
    /// Directory served as the virtual root (defaults to the working directory).
    pub public: Option<PathBuf>,

    /// Try `.html`/`.htm`/`index` variants and strip `.html` suffixes.
    pub clean_urls: Option<Toggle>,

    /// Server-internal path rewrites, evaluated in order.
    pub rewrites: Vec<RuleConfig>,

    /// Client-visible redirects (or proxy targets), evaluated in order.
    pub redirects: Vec<RuleConfig>,

    /// Custom response headers keyed by a glob source.
    pub headers: Vec<HeaderRuleConfig>,

    /// Enable directory listings (globally or for matching paths).
    pub directory_listing: Option<Toggle>,

    /// Glob sources hidden from directory listings.
    pub unlisted: Vec<String>,

    /// Force (`true`) or strip (`false`) trailing slashes; unset leaves paths alone.
    pub trailing_slash: Option<bool>,

    /// Serve a directory's only file instead of listing it.
    pub render_single: bool,

    /// Follow symbolic links (and shortcuts) inside the root.
    pub symlinks: bool,

    /// Emit weak `ETag` headers instead of `Last-Modified`.
    pub etag: bool,

    /// HTTP basic authentication credentials.
    pub auth: Option<AuthConfig>,

    /// Script-execution rules, matched against the absolute file path.
    pub cgi_bin: Vec<RuleConfig>,

    /// Proxy response transforms, matched against the upstream URL.
    pub proxy_middleware: Vec<RuleConfig>,

    /// File that keeps upstream cookies across proxied requests and
    /// restarts. Relative paths resolve against the config file.
    pub proxy_cookie_jar: Option<PathBuf>,

    /// Log every incoming request.
    pub log_req: bool,

    /// Log every outgoing response.
    pub log_res: bool,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Script execution limits.
    pub scripts: ScriptConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            public: None,
            clean_urls: None,
            rewrites: Vec::new(),
            redirects: Vec::new(),
            headers: Vec::new(),
            directory_listing: None,
            unlisted: Vec::new(),
            trailing_slash: None,
            render_single: false,
            symlinks: false,
            etag: true,
            auth: None,
            cgi_bin: Vec::new(),
            proxy_middleware: Vec::new(),
            proxy_cookie_jar: None,
            log_req: false,
            log_res: false,
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            scripts: ScriptConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A feature switch that is either a plain flag or a list of glob sources.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Toggle {
    Flag(bool),
    Sources(Vec<String>),
}

/// Matching strategy of a rule.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Path template with named segments (`/user/:id`).
    Route,
    /// Case-insensitive wildcard pattern.
    Glob,
    /// User-supplied regular expression.
    Regex,
    /// Exact or substring match.
    #[default]
    Text,
}

/// One entry of a rule list (`rewrites`, `redirects`, `cgiBin`, `proxyMiddleware`).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleConfig {
    pub engine: EngineKind,
    pub source: String,
    pub destination: Option<String>,

    /// Regex flags (`i`, `m`, `s`, `x`, `g`).
    pub flags: Option<String>,

    /// Percent-decode the path before matching.
    pub decode: bool,

    /// Text engine: require the whole path to equal `source`.
    pub exact: bool,

    /// Stop rewrite/redirect recursion (or the middleware chain) after this rule applies.
    #[serde(alias = "terminalMiddleware")]
    pub terminal: bool,

    /// Redirect status (defaults to 301, or 307 for body-bearing methods).
    pub status_code: Option<u16>,

    pub preserve_query: bool,
    pub preserve_hash: bool,

    /// Forward the request to an absolute `http(s)` destination instead of redirecting.
    pub proxy: bool,

    /// Script command line (cgiBin rules).
    pub command: Option<String>,

    /// Script environment (cgiBin rules).
    pub env: Option<HashMap<String, String>>,

    /// Registered middleware name (proxyMiddleware rules).
    pub middleware: Option<String>,

    /// Body class the middleware applies to: `html`, `json`, `js` or `text`.
    #[serde(alias = "type")]
    pub middleware_type: Option<String>,
}

/// Custom headers applied to paths matching `source`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HeaderRuleConfig {
    pub source: String,
    pub headers: Vec<HeaderEntry>,
}

/// A header to set; a `null` value deletes a default header.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HeaderEntry {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Basic authentication credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthConfig {
    pub name: String,
    pub pass: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 120 }
    }
}

/// Script execution limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptConfig {
    /// Wall-clock limit for one script run, in seconds.
    pub timeout_secs: u64,

    /// Maximum bytes captured from stdout or stderr.
    pub max_buffer_bytes: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_buffer_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Maximum request body buffered for proxying or script input.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
