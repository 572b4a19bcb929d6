//! Ordered rule lists and their recursive evaluation.

use axum::http::{Method, StatusCode};

use crate::config::RuleConfig;
use crate::rules::engine::{RewriteMode, Rule};
use crate::rules::RuleError;

/// Upper bound on chained rewrite or redirect passes.
pub const MAX_RULE_PASSES: usize = 32;

/// Outcome of redirect evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub target: String,
    pub status: StatusCode,
    pub preserve_query: bool,
    pub preserve_hash: bool,
    pub proxy: bool,
}

/// Redirect status when a rule sets none: 307 keeps the body of
/// POST/PUT/PATCH requests, 301 otherwise.
pub fn default_redirect_status(method: &Method) -> StatusCode {
    if method == Method::POST || method == Method::PUT || method == Method::PATCH {
        StatusCode::TEMPORARY_REDIRECT
    } else {
        StatusCode::MOVED_PERMANENTLY
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(configs: &[RuleConfig]) -> Result<Self, RuleError> {
        let rules = configs
            .iter()
            .cloned()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Glob-only list built from plain sources.
    pub fn globs(sources: &[String]) -> Result<Self, RuleError> {
        let rules = sources
            .iter()
            .map(|source| Rule::glob(source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Whether any rule matches `path`.
    pub fn any_match(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.test(path))
    }

    /// All rules matching `path`, in list order.
    pub fn matching(&self, path: &str) -> Vec<&Rule> {
        self.rules.iter().filter(|rule| rule.test(path)).collect()
    }

    /// Apply internal rewrites. The first rule producing a result wins;
    /// unless it is terminal the result is rewritten again, and a deeper
    /// result replaces the shallower one.
    pub fn rewrite(&self, path: &str) -> Result<Option<String>, RuleError> {
        let mut current: Option<String> = None;
        let mut subject = path.to_string();

        for _ in 0..MAX_RULE_PASSES {
            let Some((rule, rewritten)) = self.first_rewrite(&subject, RewriteMode::Internal)? else {
                return Ok(current);
            };

            tracing::trace!(from = %subject, to = %rewritten, "Rewrite applied");
            let terminal = rule.is_terminal();
            subject = rewritten.clone();
            current = Some(rewritten);
            if terminal {
                return Ok(current);
            }
        }

        Err(RuleError::RecursionLimit(MAX_RULE_PASSES))
    }

    /// Evaluate redirects for `path`; same chaining as [`RuleSet::rewrite`],
    /// with the deepest rule supplying status and preservation flags.
    pub fn redirect(&self, path: &str, method: &Method) -> Result<Option<RedirectTarget>, RuleError> {
        let mut current: Option<RedirectTarget> = None;
        let mut subject = path.to_string();

        for _ in 0..MAX_RULE_PASSES {
            let Some((rule, rewritten)) = self.first_rewrite(&subject, RewriteMode::Redirect)? else {
                return Ok(current);
            };

            let config = rule.config();
            let status = config
                .status_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or_else(|| default_redirect_status(method));

            tracing::trace!(from = %subject, to = %rewritten, status = status.as_u16(), "Redirect matched");
            subject = rewritten.clone();
            current = Some(RedirectTarget {
                target: rewritten,
                status,
                preserve_query: config.preserve_query,
                preserve_hash: config.preserve_hash,
                proxy: config.proxy,
            });

            if rule.is_terminal() {
                return Ok(current);
            }
        }

        Err(RuleError::RecursionLimit(MAX_RULE_PASSES))
    }

    fn first_rewrite(&self, subject: &str, mode: RewriteMode) -> Result<Option<(&Rule, String)>, RuleError> {
        for rule in &self.rules {
            if let Some(rewritten) = rule.rewrite(subject, mode)? {
                return Ok(Some((rule, rewritten)));
            }
        }
        Ok(None)
    }
}
