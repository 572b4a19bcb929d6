//! Config file hot reload.
//!
//! notify events only mark the file dirty; a task waits for a quiet window
//! before reloading, so an editor's write-rename-chmod burst produces one
//! reload that sees the final contents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ServeConfig;
use crate::config::settings::Settings;
use crate::config::validation::validate_config;

/// Quiet period after the last change event before reloading.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Why a reload was rejected. The previous settings stay live.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("reloaded config is invalid: {0}")]
    Invalid(#[source] ConfigError),

    #[error("reloaded config did not compile: {0}")]
    Compile(#[source] ConfigError),
}

type Prepare = Arc<dyn Fn(&mut ServeConfig) + Send + Sync>;

pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    prepare: Option<Prepare>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            debounce: DEFAULT_DEBOUNCE,
            prepare: None,
        }
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Adjust every loaded config before it is validated, e.g. to re-apply
    /// command-line overrides.
    pub fn prepare<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ServeConfig) + Send + Sync + 'static,
    {
        self.prepare = Some(Arc::new(f));
        self
    }

    /// Load, adjust, validate and compile the watched file once.
    pub fn reload(&self) -> Result<Settings, ReloadError> {
        let mut config = load_config(&self.path).map_err(|source| ReloadError::Load {
            path: self.path.clone(),
            source,
        })?;
        if let Some(prepare) = &self.prepare {
            prepare(&mut config);
            validate_config(&config).map_err(|errors| ReloadError::Invalid(ConfigError::Validation(errors)))?;
        }
        Settings::from_config(&config).map_err(ReloadError::Compile)
    }

    /// Start watching. Compiled settings arrive on the receiver after each
    /// debounced change; rejected reloads are logged and skipped. Keep the
    /// returned watcher alive for as long as reloads should happen.
    pub fn spawn(self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<Settings>), notify::Error> {
        let (dirty_tx, mut dirty_rx) = mpsc::unbounded_channel::<()>();
        let (settings_tx, settings_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = dirty_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), debounce_ms = self.debounce.as_millis() as u64, "Config watcher started");

        tokio::spawn(async move {
            while dirty_rx.recv().await.is_some() {
                let mut coalesced = 1u32;
                while let Ok(Some(())) = tokio::time::timeout(self.debounce, dirty_rx.recv()).await {
                    coalesced += 1;
                }

                match self.reload() {
                    Ok(settings) => {
                        tracing::info!(events = coalesced, "Config file changed; reloaded");
                        if settings_tx.send(settings).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Config reload rejected; keeping current configuration");
                    }
                }
            }
        });

        Ok((watcher, settings_rx))
    }
}
