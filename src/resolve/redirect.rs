//! Redirect decision: explicit rules, then clean-URL suffix stripping, then
//! trailing-slash normalization.

use axum::http::Method;

use crate::config::Settings;
use crate::rules::encode::squeeze_slashes;
use crate::rules::{default_redirect_status, RedirectTarget, RuleError};

pub fn should_redirect(
    original: &str,
    settings: &Settings,
    clean_url: bool,
    method: &Method,
) -> Result<Option<RedirectTarget>, RuleError> {
    let slashing = settings.trailing_slash.is_some();
    if settings.redirects.is_empty() && !slashing && !clean_url {
        return Ok(None);
    }

    if let Some(target) = settings.redirects.redirect(original, method)? {
        return Ok(Some(target));
    }

    if clean_url {
        if let Some(stripped) = strip_html_suffix(original) {
            return Ok(Some(builtin(&stripped, method)));
        }
    }

    if let Some(trailing) = settings.trailing_slash {
        if let Some(adjusted) = adjust_trailing_slash(original, trailing) {
            return Ok(Some(builtin(&adjusted, method)));
        }
    }

    Ok(None)
}

fn builtin(path: &str, method: &Method) -> RedirectTarget {
    let squeezed = squeeze_slashes(path);
    let target = if squeezed.starts_with('/') {
        squeezed
    } else {
        format!("/{squeezed}")
    };

    RedirectTarget {
        target,
        status: default_redirect_status(method),
        preserve_query: true,
        preserve_hash: true,
        proxy: false,
    }
}

/// Strip a trailing `.html`/`.htm` (and a preceding `/index`), ignoring case.
fn strip_html_suffix(path: &str) -> Option<String> {
    let lower = path.to_ascii_lowercase();
    let stem_len = if lower.ends_with(".html") {
        path.len() - 5
    } else if lower.ends_with(".htm") {
        path.len() - 4
    } else {
        return None;
    };

    let mut stem = &path[..stem_len];
    if lower[..stem_len].ends_with("/index") {
        stem = &stem[..stem_len - "/index".len()];
    }
    Some(stem.to_string())
}

fn adjust_trailing_slash(path: &str, trailing: bool) -> Option<String> {
    let is_trailed = path.ends_with('/');

    if !trailing && is_trailed {
        let trimmed = path.trim_end_matches('/');
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    if trailing && !is_trailed {
        let last = path.rsplit('/').next().unwrap_or_default();
        let is_dotfile = last.starts_with('.');
        let has_ext = last
            .rfind('.')
            .is_some_and(|dot| dot > 0);
        if !has_ext && !is_dotfile {
            return Some(format!("{path}/"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, ServeConfig};
    use axum::http::StatusCode;

    fn settings(config: ServeConfig) -> Settings {
        Settings::from_config(&config).unwrap()
    }

    #[test]
    fn test_nothing_configured() {
        let settings = settings(ServeConfig::default());
        assert_eq!(should_redirect("/a.html", &settings, false, &Method::GET).unwrap(), None);
    }

    #[test]
    fn test_clean_url_strips_suffix() {
        let settings = settings(ServeConfig::default());
        let found = should_redirect("/docs/index.html", &settings, true, &Method::GET)
            .unwrap()
            .unwrap();
        assert_eq!(found.target, "/docs");
        assert_eq!(found.status, StatusCode::MOVED_PERMANENTLY);

        let root = should_redirect("/index.html", &settings, true, &Method::GET)
            .unwrap()
            .unwrap();
        assert_eq!(root.target, "/");

        let page = should_redirect("/About.HTM", &settings, true, &Method::GET)
            .unwrap()
            .unwrap();
        assert_eq!(page.target, "/About");
    }

    #[test]
    fn test_trailing_slash_add_and_remove() {
        let add = settings(ServeConfig {
            trailing_slash: Some(true),
            ..ServeConfig::default()
        });
        let found = should_redirect("/docs", &add, false, &Method::GET).unwrap().unwrap();
        assert_eq!(found.target, "/docs/");
        assert!(found.preserve_query && found.preserve_hash);
        assert_eq!(should_redirect("/app.js", &add, false, &Method::GET).unwrap(), None);
        assert_eq!(should_redirect("/.env", &add, false, &Method::GET).unwrap(), None);

        let remove = settings(ServeConfig {
            trailing_slash: Some(false),
            ..ServeConfig::default()
        });
        let found = should_redirect("/docs/", &remove, false, &Method::GET)
            .unwrap()
            .unwrap();
        assert_eq!(found.target, "/docs");
        assert_eq!(should_redirect("/", &remove, false, &Method::GET).unwrap(), None);
    }

    #[test]
    fn test_explicit_rule_wins() {
        let config = ServeConfig {
            trailing_slash: Some(true),
            redirects: vec![RuleConfig {
                source: "/docs".into(),
                destination: Some("/manual".into()),
                exact: true,
                status_code: Some(303),
                ..RuleConfig::default()
            }],
            ..ServeConfig::default()
        };
        let settings = settings(config);
        let found = should_redirect("/docs", &settings, false, &Method::GET)
            .unwrap()
            .unwrap();
        assert_eq!(found.target, "/manual");
        assert_eq!(found.status, StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_builtin_keeps_body_methods() {
        let add = settings(ServeConfig {
            trailing_slash: Some(true),
            ..ServeConfig::default()
        });
        let found = should_redirect("/form", &add, false, &Method::POST).unwrap().unwrap();
        assert_eq!(found.status, StatusCode::TEMPORARY_REDIRECT);
    }
}
