//! Glob patterns with serve semantics: case-insensitive, dotfiles included,
//! basename matching for slash-free patterns, and `!` negation.

use globset::{GlobBuilder, GlobMatcher};

use crate::rules::RuleError;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    matcher: GlobMatcher,
    negated: bool,
    match_base: bool,
}

impl GlobPattern {
    pub fn new(source: &str) -> Result<Self, RuleError> {
        let (negated, pattern) = match source.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| RuleError::InvalidGlob {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            matcher: glob.compile_matcher(),
            negated,
            match_base: !pattern.contains('/'),
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        let subject = if self.match_base {
            path.rsplit('/').next().unwrap_or(path)
        } else {
            path
        };
        self.matcher.is_match(subject) != self.negated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path() {
        let glob = GlobPattern::new("/blog/**").unwrap();
        assert!(glob.is_match("/blog/2024/post"));
        assert!(glob.is_match("/BLOG/post"));
        assert!(!glob.is_match("/docs/post"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let glob = GlobPattern::new("/assets/*.css").unwrap();
        assert!(glob.is_match("/assets/site.css"));
        assert!(!glob.is_match("/assets/vendor/site.css"));
    }

    #[test]
    fn test_basename_and_dotfiles() {
        let glob = GlobPattern::new("*.js").unwrap();
        assert!(glob.is_match("/static/app.JS"));

        let dot = GlobPattern::new(".git").unwrap();
        assert!(dot.is_match("/.git"));

        let star = GlobPattern::new("/*").unwrap();
        assert!(star.is_match("/.env"));
    }

    #[test]
    fn test_negation() {
        let glob = GlobPattern::new("!/private/**").unwrap();
        assert!(glob.is_match("/public/index.html"));
        assert!(!glob.is_match("/private/key"));
    }

    #[test]
    fn test_invalid() {
        assert!(GlobPattern::new("/a/[").is_err());
    }
}
