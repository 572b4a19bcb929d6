//! Upstream cookie store shared by every proxied request.
//!
//! Cookies live in a [`reqwest::cookie::Jar`]. With a backing file each
//! accepted `Set-Cookie` is appended as `<url>\t<set-cookie>` and the file
//! is replayed into the jar on startup.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use axum::http::HeaderValue;
use reqwest::cookie::{CookieStore, Jar};
use url::Url;

#[derive(Debug, Default)]
pub struct CookieJar {
    jar: Jar,
    file: Option<PathBuf>,
    writes: Mutex<()>,
}

impl CookieJar {
    /// In-memory jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar persisted to `path`. A missing file starts empty; lines that do
    /// not parse are skipped.
    pub fn open(path: &Path) -> io::Result<Self> {
        let jar = Jar::default();
        match fs::read_to_string(path) {
            Ok(content) => {
                let mut restored = 0usize;
                for line in content.lines() {
                    let Some((url, cookie)) = line.split_once('\t') else {
                        continue;
                    };
                    let Ok(url) = Url::parse(url) else {
                        continue;
                    };
                    jar.add_cookie_str(cookie, &url);
                    restored += 1;
                }
                tracing::debug!(path = %path.display(), cookies = restored, "Proxy cookie jar restored");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        Ok(Self {
            jar,
            file: Some(path.to_path_buf()),
            writes: Mutex::new(()),
        })
    }

    fn persist(&self, url: &Url, cookies: &[String]) -> io::Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let _guard = self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for cookie in cookies {
            writeln!(file, "{url}\t{cookie}")?;
        }
        Ok(())
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies: Vec<String> = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        if cookies.is_empty() {
            return;
        }

        for cookie in &cookies {
            self.jar.add_cookie_str(cookie, url);
        }
        if let Err(e) = self.persist(url, &cookies) {
            tracing::warn!(error = %e, "Failed to persist proxy cookies");
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_cookies_scoped_to_host() {
        let jar = CookieJar::new();
        let set = HeaderValue::from_static("session=abc; Path=/");
        jar.set_cookies(&mut std::iter::once(&set), &url("http://api.local/login"));

        assert_eq!(jar.cookies(&url("http://api.local/data")).unwrap(), "session=abc");
        assert!(jar.cookies(&url("http://other.local/")).is_none());
    }

    #[test]
    fn test_jar_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");

        let jar = CookieJar::open(&path).unwrap();
        assert!(jar.cookies(&url("http://api.local/")).is_none());
        let set = HeaderValue::from_static("token=xyz; Path=/");
        jar.set_cookies(&mut std::iter::once(&set), &url("http://api.local/"));
        drop(jar);

        let reopened = CookieJar::open(&path).unwrap();
        assert_eq!(reopened.cookies(&url("http://api.local/a")).unwrap(), "token=xyz");
    }
}
