//! A compiled rule: one matcher plus the options that steer it.

use regex::{Regex, RegexBuilder};

use crate::config::{EngineKind, RuleConfig};
use crate::rules::encode::{encode_url_path, percent_decode};
use crate::rules::glob::GlobPattern;
use crate::rules::route::{RoutePath, RouteTemplate};
use crate::rules::RuleError;

/// How a rewrite result will be used.
/// Replacements a text rule may perform on one path. Rules such as
/// `ab` to `bba` otherwise grow the path exponentially.
pub const MAX_TEXT_REPLACEMENTS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Internal rewrite: always matches the decoded path, never re-encodes.
    Internal,
    /// Redirect: honours the rule's `decode` flag and re-encodes when decoding.
    Redirect,
}

#[derive(Debug, Clone)]
enum Matcher {
    Route {
        source: RouteTemplate,
        destination: Option<RoutePath>,
    },
    Glob(GlobPattern),
    Regex {
        regex: Regex,
        replacement: Option<String>,
    },
    Text,
}

#[derive(Debug, Clone)]
pub struct Rule {
    config: RuleConfig,
    matcher: Matcher,
}

impl Rule {
    pub fn compile(config: RuleConfig) -> Result<Self, RuleError> {
        let matcher = match config.engine {
            EngineKind::Route => Matcher::Route {
                source: RouteTemplate::compile(&config.source)?,
                destination: config
                    .destination
                    .as_deref()
                    .map(RoutePath::compile)
                    .transpose()?,
            },
            EngineKind::Glob => Matcher::Glob(GlobPattern::new(&config.source)?),
            EngineKind::Regex => {
                let regex = build_regex(&config.source, config.flags.as_deref())?;
                Matcher::Regex {
                    regex,
                    replacement: config.destination.as_deref().map(translate_replacement),
                }
            }
            EngineKind::Text => Matcher::Text,
        };

        Ok(Self { config, matcher })
    }

    /// A glob rule with no destination, used for path lists such as
    /// `unlisted` or toggle sources.
    pub fn glob(source: &str) -> Result<Self, RuleError> {
        Self::compile(RuleConfig {
            engine: EngineKind::Glob,
            source: source.to_string(),
            ..RuleConfig::default()
        })
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    pub fn is_terminal(&self) -> bool {
        self.config.terminal
    }

    /// Whether the rule matches `path` as given, without decoding.
    pub fn test(&self, path: &str) -> bool {
        !self.config.source.is_empty() && self.matches(path)
    }

    /// Produce the rewritten path, or `None` when the rule does not apply
    /// or the result is empty.
    pub fn rewrite(&self, path: &str, mode: RewriteMode) -> Result<Option<String>, RuleError> {
        self.try_rewrite(path, mode).transpose()
    }

    fn try_rewrite(&self, path: &str, mode: RewriteMode) -> Option<Result<String, RuleError>> {
        let destination = self.config.destination.as_deref()?;
        if self.config.source.is_empty() {
            return None;
        }

        let decode = match mode {
            RewriteMode::Internal => true,
            RewriteMode::Redirect => self.config.decode,
        };
        let reencode = decode && mode == RewriteMode::Redirect;

        let subject = if decode {
            percent_decode(path)?
        } else {
            path.to_string()
        };

        let encode = |value: String| {
            if reencode {
                encode_url_path(&value)
            } else {
                value
            }
        };

        let rewritten = match &self.matcher {
            Matcher::Route {
                source,
                destination: Some(template),
            } => {
                let values = source.captures(&subject)?;
                template.render(&values, reencode)?
            }
            Matcher::Route { destination: None, .. } => return None,
            Matcher::Glob(glob) => {
                if !glob.is_match(&subject) {
                    return None;
                }
                encode(destination.to_string())
            }
            Matcher::Regex { regex, replacement } => {
                if !regex.is_match(&subject) {
                    return None;
                }
                let replacement = replacement.as_deref().unwrap_or_default();
                encode(regex.replace_all(&subject, replacement).into_owned())
            }
            Matcher::Text => match self.text_rewrite(&subject, destination)? {
                Ok(rewritten) => encode(rewritten),
                Err(e) => return Some(Err(e)),
            },
        };

        (!rewritten.is_empty()).then_some(Ok(rewritten))
    }

    fn matches(&self, subject: &str) -> bool {
        match &self.matcher {
            Matcher::Route { source, .. } => source.is_match(subject),
            Matcher::Glob(glob) => glob.is_match(subject),
            Matcher::Regex { regex, .. } => regex.is_match(subject),
            Matcher::Text => {
                if self.config.exact {
                    subject == self.config.source
                } else {
                    subject.contains(&self.config.source)
                }
            }
        }
    }

    fn text_rewrite(&self, subject: &str, destination: &str) -> Option<Result<String, RuleError>> {
        let source = self.config.source.as_str();
        if self.config.exact {
            return (subject == source).then(|| Ok(destination.to_string()));
        }
        if !subject.contains(source) {
            return None;
        }

        // A destination containing the source would never converge.
        if destination.contains(source) {
            return None;
        }

        let mut current = subject.to_string();
        for _ in 0..MAX_TEXT_REPLACEMENTS {
            if !current.contains(source) {
                return Some(Ok(current));
            }
            current = current.replacen(source, destination, 1);
        }
        if current.contains(source) {
            return Some(Err(RuleError::RecursionLimit(MAX_TEXT_REPLACEMENTS)));
        }
        Some(Ok(current))
    }
}

/// Substitution is always global, so `g` is accepted and ignored.
fn build_regex(source: &str, flags: Option<&str>) -> Result<Regex, RuleError> {
    let mut builder = RegexBuilder::new(source);

    for flag in flags.unwrap_or_default().chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'g' | 'u' | 'y' | 'd' => {}
            other => {
                return Err(RuleError::InvalidRegex {
                    pattern: source.to_string(),
                    reason: format!("unsupported flag '{other}'"),
                })
            }
        }
    }

    builder.build().map_err(|e| RuleError::InvalidRegex {
        pattern: source.to_string(),
        reason: e.to_string(),
    })
}

/// Translate `$1`, `$&`, `$<name>` and `$$` into the regex crate's
/// replacement syntax; other `$` sequences stay literal.
fn translate_replacement(destination: &str) -> String {
    let chars: Vec<char> = destination.chars().collect();
    let mut out = String::with_capacity(destination.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some('$') => {
                out.push_str("$$");
                i += 2;
            }
            Some('&') => {
                out.push_str("${0}");
                i += 2;
            }
            Some(d) if d.is_ascii_digit() => {
                let mut j = i + 1;
                let mut digits = String::new();
                while let Some(d) = chars.get(j).filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    j += 1;
                }
                out.push_str(&format!("${{{digits}}}"));
                i = j;
            }
            Some('<') => match chars[i + 2..].iter().position(|c| *c == '>') {
                Some(end) => {
                    let name: String = chars[i + 2..i + 2 + end].iter().collect();
                    out.push_str(&format!("${{{name}}}"));
                    i += end + 3;
                }
                None => {
                    out.push_str("$$");
                    i += 1;
                }
            },
            _ => {
                out.push_str("$$");
                i += 1;
            }
        }
    }
    out
}
