//! Startup orchestration.
//!
//! # Responsibilities
//! - Locate and load the configuration file
//! - Apply command-line overrides
//! - Feed reloaded configurations to the server
//!
//! # Design Decisions
//! - Fail fast: an invalid config at startup is fatal
//! - An invalid config on reload is logged and skipped

use std::path::{Path, PathBuf};

use notify::RecommendedWatcher;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::{
    find_config, load_config, validate_config, ConfigError, EngineKind, RuleConfig, ServeConfig, Settings,
};

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub public: Option<PathBuf>,
    pub listen: Option<String>,
    /// Rewrite every path to `/index.html` (single-page apps).
    pub single: bool,
    pub symlinks: bool,
    pub no_etag: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut ServeConfig) {
        if let Some(public) = &self.public {
            config.public = Some(public.clone());
        }
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if self.single {
            config.rewrites.insert(
                0,
                RuleConfig {
                    engine: EngineKind::Glob,
                    source: "**".into(),
                    destination: Some("/index.html".into()),
                    terminal: true,
                    ..RuleConfig::default()
                },
            );
        }
        if self.symlinks {
            config.symlinks = true;
        }
        if self.no_etag {
            config.etag = false;
        }
    }
}

#[derive(Debug)]
pub struct Bootstrap {
    pub config: ServeConfig,
    /// The file the config came from, if any; watched for reloads.
    pub config_path: Option<PathBuf>,
}

/// Load the explicit config file, or the first `serve.json`/`serve.toml`
/// found in `search_dir`, or defaults; then apply `overrides`.
pub fn bootstrap(
    config_path: Option<&Path>,
    search_dir: &Path,
    overrides: &Overrides,
) -> Result<Bootstrap, ConfigError> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .or_else(|| find_config(search_dir));

    let mut config = match &config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => {
            tracing::info!("No configuration file found; using defaults");
            ServeConfig::default()
        }
    };

    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(Bootstrap { config, config_path })
}

/// Watch `path` and forward each reloaded, compiled config with
/// `overrides` re-applied. Keep the returned watcher alive for as long as
/// reloads should happen.
pub fn watch_config(
    path: &Path,
    overrides: Overrides,
) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<Settings>), notify::Error> {
    ConfigWatcher::new(path)
        .prepare(move |config| overrides.apply(config))
        .spawn()
}
