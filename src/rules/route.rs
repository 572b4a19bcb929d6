//! Route templates: `/user/:id` style paths compiled into anchored patterns.
//!
//! # Syntax
//! - `:name` matches one segment (`[^/#?]+?`)
//! - `:name(\d+)` uses a custom pattern; a bare `(pattern)` is an unnamed
//!   parameter numbered from `0`
//! - `?`, `*`, `+` after a parameter make it optional / repeated
//! - a `/` or `.` directly before a parameter is its prefix and is optional
//!   together with it
//! - `\` escapes the next character; a `:` not followed by a name is literal
//!
//! Matching is case-insensitive and tolerates one trailing slash.

use std::collections::HashMap;

use regex::Regex;

use crate::rules::encode::encode_url_path;
use crate::rules::RuleError;

const DEFAULT_SEGMENT: &str = "[^/#?]+?";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Param(Param),
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    prefix: String,
    pattern: String,
    modifier: Option<char>,
}

impl Param {
    fn is_optional(&self) -> bool {
        matches!(self.modifier, Some('?') | Some('*'))
    }
}

/// A compiled source template.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    regex: Regex,
    keys: Vec<String>,
}

impl RouteTemplate {
    pub fn compile(template: &str) -> Result<Self, RuleError> {
        let tokens = tokenize(template)?;
        let mut pattern = String::from("(?i)^");
        let mut keys = Vec::new();

        for token in &tokens {
            match token {
                Token::Literal(text) => pattern.push_str(&regex::escape(text)),
                Token::Param(param) => {
                    let prefix = regex::escape(&param.prefix);
                    let body = &param.pattern;
                    let fragment = match param.modifier {
                        None => format!("{prefix}({body})"),
                        Some('?') => format!("(?:{prefix}({body}))?"),
                        Some('+') => format!("(?:{prefix}((?:{body})(?:{prefix}(?:{body}))*))"),
                        _ => format!("(?:{prefix}((?:{body})(?:{prefix}(?:{body}))*))?"),
                    };
                    pattern.push_str(&fragment);
                    keys.push(param.name.clone());
                }
            }
        }
        pattern.push_str("/?$");

        let regex = Regex::new(&pattern).map_err(|e| RuleError::InvalidRoute {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { regex, keys })
    }

    /// Match `path`, returning every parameter (unmatched ones as "").
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let values = self
            .keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let value = caps
                    .get(index + 1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (key.clone(), value)
            })
            .collect();
        Some(values)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// A compiled destination template.
#[derive(Debug, Clone)]
pub struct RoutePath {
    tokens: Vec<Token>,
}

impl RoutePath {
    pub fn compile(template: &str) -> Result<Self, RuleError> {
        Ok(Self {
            tokens: tokenize(template)?,
        })
    }

    /// Substitute captured values. A required parameter with no value
    /// aborts the rewrite.
    pub fn render(&self, values: &HashMap<String, String>, encode: bool) -> Option<String> {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Param(param) => match values.get(&param.name) {
                    Some(value) => {
                        out.push_str(&param.prefix);
                        if encode {
                            out.push_str(&encode_url_path(value));
                        } else {
                            out.push_str(value);
                        }
                    }
                    None if param.is_optional() => {}
                    None => return None,
                },
            }
        }
        Some(out)
    }
}

fn tokenize(template: &str) -> Result<Vec<Token>, RuleError> {
    let chars: Vec<char> = template.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut unnamed = 0usize;
    let mut i = 0;

    let invalid = |reason: &str| RuleError::InvalidRoute {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    literal.push(*next);
                    i += 2;
                } else {
                    literal.push(c);
                    i += 1;
                }
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let mut j = i + 1;
                let mut name = String::new();
                while let Some(n) = chars.get(j).filter(|n| n.is_ascii_alphanumeric() || **n == '_') {
                    name.push(*n);
                    j += 1;
                }

                let pattern = if chars.get(j) == Some(&'(') {
                    let (pattern, end) = read_group(&chars, j).ok_or_else(|| invalid("unbalanced pattern group"))?;
                    j = end;
                    pattern
                } else {
                    DEFAULT_SEGMENT.to_string()
                };

                let modifier = chars.get(j).copied().filter(|m| matches!(m, '?' | '*' | '+'));
                if modifier.is_some() {
                    j += 1;
                }

                let prefix = take_prefix(&mut literal);
                flush(&mut tokens, &mut literal);
                tokens.push(Token::Param(Param {
                    name,
                    prefix,
                    pattern,
                    modifier,
                }));
                i = j;
            }
            '(' => {
                let (pattern, mut j) = read_group(&chars, i).ok_or_else(|| invalid("unbalanced pattern group"))?;
                let modifier = chars.get(j).copied().filter(|m| matches!(m, '?' | '*' | '+'));
                if modifier.is_some() {
                    j += 1;
                }

                let prefix = take_prefix(&mut literal);
                flush(&mut tokens, &mut literal);
                tokens.push(Token::Param(Param {
                    name: unnamed.to_string(),
                    prefix,
                    pattern,
                    modifier,
                }));
                unnamed += 1;
                i = j;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }

    flush(&mut tokens, &mut literal);
    Ok(tokens)
}

/// Read a balanced `( ... )` group starting at `start`; returns the inner
/// pattern and the index after the closing paren. Nested capturing groups
/// are rejected so parameter indices stay aligned.
fn read_group(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut depth = 1;
    let mut pattern = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                pattern.push(c);
                pattern.push(*chars.get(i + 1)?);
                i += 2;
                continue;
            }
            '(' => {
                if chars.get(i + 1) != Some(&'?') {
                    return None;
                }
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return (!pattern.is_empty()).then_some((pattern, i + 1));
                }
            }
            _ => {}
        }
        pattern.push(c);
        i += 1;
    }
    None
}

fn take_prefix(literal: &mut String) -> String {
    match literal.chars().last() {
        Some(c @ ('/' | '.')) => {
            literal.pop();
            c.to_string()
        }
        _ => String::new(),
    }
}

fn flush(tokens: &mut Vec<Token>, literal: &mut String) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}
