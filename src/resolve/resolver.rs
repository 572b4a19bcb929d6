//! Path resolution state machine.
//!
//! ```text
//! raw path ─▶ Decode ─▶ Rewrite ─┬─▶ DataPayload
//!                                ▼
//!                      Redirect decision ─┬─▶ DataPayload | Proxy | Redirect
//!                                         ▼
//!                      Symlink walk ─▶ Stat ─▶ Related-file fallback
//!                                               ▼
//!                                 NotFound | Directory | File
//! ```

use std::path::{Path, PathBuf};

use axum::http::Method;

use crate::config::Settings;
use crate::resolve::fs::{FileStat, FileSystem, FsError};
use crate::resolve::redirect::should_redirect;
use crate::resolve::state::{join_within, Disposition, PathState, Resolution};
use crate::resolve::symlink;
use crate::resolve::ResolveError;
use crate::rules::encode::{normalize_posix, percent_decode};

pub struct Resolver<'a> {
    settings: &'a Settings,
    fs: &'a dyn FileSystem,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a Settings, fs: &'a dyn FileSystem) -> Self {
        Self { settings, fs }
    }

    pub async fn resolve(&self, raw_path: &str, method: &Method) -> Result<Resolution, ResolveError> {
        let settings = self.settings;
        let mut state = PathState::new(&settings.root);

        // Decode
        let original = normalize_posix(raw_path);
        let decoded = percent_decode(&original)
            .filter(|decoded| !decoded.contains('\0'))
            .ok_or(ResolveError::BadRequest)?;
        state.virtual_path.original = original;
        state.virtual_path.decoded = normalize_posix(&decoded);

        // Rewrite
        state.virtual_path.rewritten = settings.rewrites.rewrite(&state.virtual_path.original)?;
        if let Some(rewritten) = &state.virtual_path.rewritten {
            if is_data_uri(rewritten) {
                let payload = rewritten.clone();
                return Ok(finish(state, Disposition::DataPayload(payload)));
            }
        }
        state.real.absolute = join_within(&settings.root, state.virtual_path.effective());

        // Redirect decision
        let clean_url = settings.clean_urls.applies(&state.virtual_path.decoded);
        if let Some(redirect) = should_redirect(&state.virtual_path.original, settings, clean_url, method)? {
            let disposition = if is_data_uri(&redirect.target) {
                Disposition::DataPayload(redirect.target)
            } else if redirect.proxy && is_http_url(&redirect.target) {
                Disposition::Proxy(redirect)
            } else {
                Disposition::Redirect(redirect)
            };
            return Ok(finish(state, disposition));
        }

        // Symlink walk
        if settings.symlinks {
            if let Some(linked) = symlink::walk(self.fs, &settings.root, state.virtual_path.effective()).await? {
                state.real.is_symlink = true;
                if let Some(stat) = linked.stat {
                    state.real.absolute = linked.absolute;
                    state.real.stat = Some(stat);
                }
            }
        }

        // Stat
        if state.real.stat.is_none() {
            state.real.stat = self.stat_entry(&state.real.absolute).await?;
        }

        // Related-file fallback
        let needs_related = state.real.stat.as_ref().map_or(true, FileStat::is_dir);
        if clean_url && needs_related {
            if let Some((absolute, stat)) = self.find_related(&state).await? {
                tracing::debug!(path = %absolute.display(), "Clean URL resolved");
                state.real.absolute = absolute;
                state.real.stat = Some(stat);
            }
        }

        let disposition = match state.real.stat {
            Some(stat) if stat.is_dir() => Disposition::Directory,
            Some(stat) if stat.is_file() => Disposition::File,
            _ => Disposition::NotFound,
        };
        Ok(finish(state, disposition))
    }

    /// `lstat` that treats a missing entry as `None`.
    async fn stat_entry(&self, path: &Path) -> Result<Option<FileStat>, FsError> {
        match self.fs.stat_link(path).await {
            Ok(stat) => Ok(Some(stat)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_related(&self, state: &PathState) -> Result<Option<(PathBuf, FileStat)>, FsError> {
        let candidates = match &state.real.stat {
            Some(stat) if stat.is_dir() => vec![
                state.real.absolute.join("index.htm"),
                state.real.absolute.join("index.html"),
            ],
            _ => {
                let relative = state.virtual_path.effective().trim_end_matches('/');
                let (dirname, filename) = relative.rsplit_once('/').unwrap_or(("", relative));
                if filename.is_empty() {
                    return Ok(None);
                }

                let mut parent = join_within(&self.settings.root, dirname);
                if self.settings.symlinks {
                    let linked = symlink::walk(self.fs, &self.settings.root, dirname).await?;
                    if let Some(linked) = linked.filter(|l| l.stat.is_some()) {
                        parent = linked.absolute;
                    }
                }

                vec![
                    parent.join(format!("{filename}.htm")),
                    parent.join(format!("{filename}.html")),
                    parent.join(filename),
                ]
            }
        };

        for candidate in candidates {
            if let Some(stat) = self.stat_entry(&candidate).await? {
                return Ok(Some((candidate, stat)));
            }
        }
        Ok(None)
    }
}

fn finish(state: PathState, disposition: Disposition) -> Resolution {
    tracing::trace!(path = %state.virtual_path.original, disposition = ?disposition, "Path resolved");
    Resolution { state, disposition }
}

fn is_data_uri(target: &str) -> bool {
    target
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

fn is_http_url(target: &str) -> bool {
    target
        .get(..4)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineKind, RuleConfig, ServeConfig, Toggle};
    use crate::resolve::fs::TokioFs;
    use axum::http::StatusCode;

    struct Site {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    fn site() -> Site {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/index.html"), b"<h1>docs</h1>").unwrap();
        std::fs::write(root.join("about.html"), b"about").unwrap();
        std::fs::write(root.join("notes.txt"), b"notes").unwrap();
        Site { _dir: dir, root }
    }

    fn settings(site: &Site, mut config: ServeConfig) -> Settings {
        config.public = Some(site.root.clone());
        Settings::from_config(&config).unwrap()
    }

    async fn resolve(settings: &Settings, path: &str) -> Result<Resolution, ResolveError> {
        Resolver::new(settings, &TokioFs).resolve(path, &Method::GET).await
    }

    #[tokio::test]
    async fn test_file_and_directory() {
        let site = site();
        let settings = settings(&site, ServeConfig::default());

        let file = resolve(&settings, "/notes.txt").await.unwrap();
        assert_eq!(file.disposition, Disposition::File);
        assert_eq!(file.state.real.absolute, site.root.join("notes.txt"));

        let dir = resolve(&settings, "/docs").await.unwrap();
        assert_eq!(dir.disposition, Disposition::Directory);

        let missing = resolve(&settings, "/nope").await.unwrap();
        assert_eq!(missing.disposition, Disposition::NotFound);
    }

    #[tokio::test]
    async fn test_bad_encoding() {
        let site = site();
        let settings = settings(&site, ServeConfig::default());
        assert!(matches!(resolve(&settings, "/bad%zz").await, Err(ResolveError::BadRequest)));
        assert!(matches!(resolve(&settings, "/nul%00").await, Err(ResolveError::BadRequest)));
    }

    #[tokio::test]
    async fn test_traversal_stays_in_root() {
        let site = site();
        let settings = settings(&site, ServeConfig::default());
        let resolution = resolve(&settings, "/%2e%2e/%2e%2e/etc/passwd").await.unwrap();
        assert!(resolution.state.real.absolute.starts_with(&site.root));
        assert_eq!(resolution.disposition, Disposition::NotFound);
    }

    #[tokio::test]
    async fn test_clean_urls() {
        let site = site();
        let settings = settings(
            &site,
            ServeConfig {
                clean_urls: Some(Toggle::Flag(true)),
                ..ServeConfig::default()
            },
        );

        let about = resolve(&settings, "/about").await.unwrap();
        assert_eq!(about.disposition, Disposition::File);
        assert_eq!(about.state.real.absolute, site.root.join("about.html"));

        let docs = resolve(&settings, "/docs").await.unwrap();
        assert_eq!(docs.disposition, Disposition::File);
        assert_eq!(docs.state.real.absolute, site.root.join("docs/index.html"));

        match resolve(&settings, "/about.html").await.unwrap().disposition {
            Disposition::Redirect(target) => assert_eq!(target.target, "/about"),
            other => panic!("unexpected disposition: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rewrite_and_data_uri() {
        let site = site();
        let settings = settings(
            &site,
            ServeConfig {
                rewrites: vec![
                    RuleConfig {
                        engine: EngineKind::Glob,
                        source: "/app/**".into(),
                        destination: Some("/notes.txt".into()),
                        ..RuleConfig::default()
                    },
                    RuleConfig {
                        source: "/inline".into(),
                        destination: Some("data:text/plain,hi".into()),
                        exact: true,
                        ..RuleConfig::default()
                    },
                ],
                ..ServeConfig::default()
            },
        );

        let app = resolve(&settings, "/app/deep/route").await.unwrap();
        assert_eq!(app.disposition, Disposition::File);
        assert_eq!(app.state.virtual_path.rewritten.as_deref(), Some("/notes.txt"));

        let inline = resolve(&settings, "/inline").await.unwrap();
        assert_eq!(inline.disposition, Disposition::DataPayload("data:text/plain,hi".into()));
    }

    #[tokio::test]
    async fn test_proxy_disposition() {
        let site = site();
        let settings = settings(
            &site,
            ServeConfig {
                redirects: vec![RuleConfig {
                    engine: EngineKind::Route,
                    source: "/api/:rest*".into(),
                    destination: Some("http://127.0.0.1:9/:rest*".into()),
                    proxy: true,
                    ..RuleConfig::default()
                }],
                ..ServeConfig::default()
            },
        );

        match resolve(&settings, "/api/v1/items").await.unwrap().disposition {
            Disposition::Proxy(target) => {
                assert_eq!(target.target, "http://127.0.0.1:9/v1/items");
                assert_eq!(target.status, StatusCode::MOVED_PERMANENTLY);
            }
            other => panic!("unexpected disposition: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_policy() {
        let site = site();
        std::os::unix::fs::symlink(site.root.join("notes.txt"), site.root.join("link.txt")).unwrap();

        let disabled = settings(&site, ServeConfig::default());
        let blocked = resolve(&disabled, "/link.txt").await.unwrap();
        assert_eq!(blocked.disposition, Disposition::NotFound);

        let enabled = settings(
            &site,
            ServeConfig {
                symlinks: true,
                ..ServeConfig::default()
            },
        );
        let followed = resolve(&enabled, "/link.txt").await.unwrap();
        assert_eq!(followed.disposition, Disposition::File);
        assert!(followed.state.real.is_symlink);
        assert_eq!(followed.state.real.absolute, site.root.join("notes.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_marked() {
        let site = site();
        std::os::unix::fs::symlink(site.root.join("gone.txt"), site.root.join("dead.txt")).unwrap();

        let enabled = settings(
            &site,
            ServeConfig {
                symlinks: true,
                ..ServeConfig::default()
            },
        );
        let resolution = resolve(&enabled, "/dead.txt").await.unwrap();
        assert_eq!(resolution.disposition, Disposition::NotFound);
        assert!(resolution.state.real.is_symlink);
        assert_eq!(resolution.state.real.absolute, site.root.join("dead.txt"));
    }
}
