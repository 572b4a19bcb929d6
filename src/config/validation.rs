//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every rule once so bad patterns surface at load time
//! - Validate value ranges (timeouts > 0, redirect status codes are 3xx)
//! - Check header names and values are representable on the wire
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::{RuleConfig, ServeConfig};
use crate::rules::Rule;

/// A single semantic problem, located by its config path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

const MIDDLEWARE_TYPES: [&str; 4] = ["html", "json", "js", "text"];

pub fn validate_config(config: &ServeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bindAddress",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.requestSecs", "must be greater than 0"));
    }
    if config.scripts.timeout_secs == 0 {
        errors.push(ValidationError::new("scripts.timeoutSecs", "must be greater than 0"));
    }
    if config.scripts.max_buffer_bytes == 0 {
        errors.push(ValidationError::new("scripts.maxBufferBytes", "must be greater than 0"));
    }

    if let Some(auth) = &config.auth {
        if auth.name.is_empty() || auth.pass.is_empty() {
            errors.push(ValidationError::new("auth", "name and pass must both be set"));
        }
    }

    for (index, rule) in config.rewrites.iter().enumerate() {
        let field = format!("rewrites[{index}]");
        check_rule(&field, rule, &mut errors);
        if rule.destination.is_none() {
            errors.push(ValidationError::new(field, "destination is required"));
        }
    }

    for (index, rule) in config.redirects.iter().enumerate() {
        let field = format!("redirects[{index}]");
        check_rule(&field, rule, &mut errors);
        match rule.destination.as_deref() {
            None => errors.push(ValidationError::new(&field, "destination is required")),
            Some(destination) if rule.proxy && !is_http_url(destination) => {
                errors.push(ValidationError::new(
                    &field,
                    "proxy destinations must be absolute http(s) URLs",
                ));
            }
            Some(_) => {}
        }
        if let Some(code) = rule.status_code {
            if !(300..=399).contains(&code) {
                errors.push(ValidationError::new(
                    format!("{field}.statusCode"),
                    format!("{code} is not a redirect status"),
                ));
            }
        }
    }

    for (index, rule) in config.cgi_bin.iter().enumerate() {
        let field = format!("cgiBin[{index}]");
        check_rule(&field, rule, &mut errors);
        if rule.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
            errors.push(ValidationError::new(field, "command is required"));
        }
    }

    for (index, rule) in config.proxy_middleware.iter().enumerate() {
        let field = format!("proxyMiddleware[{index}]");
        check_rule(&field, rule, &mut errors);
        if rule.middleware.is_none() {
            errors.push(ValidationError::new(&field, "middleware name is required"));
        }
        match rule.middleware_type.as_deref() {
            Some(kind) if MIDDLEWARE_TYPES.contains(&kind) => {}
            Some(kind) => errors.push(ValidationError::new(
                format!("{field}.type"),
                format!("'{kind}' is not one of html, json, js, text"),
            )),
            None => errors.push(ValidationError::new(format!("{field}.type"), "type is required")),
        }
    }

    for (index, header_rule) in config.headers.iter().enumerate() {
        let field = format!("headers[{index}]");
        if let Err(e) = Rule::glob(&header_rule.source) {
            errors.push(ValidationError::new(&field, e.to_string()));
        }
        for entry in &header_rule.headers {
            if HeaderName::try_from(entry.key.as_str()).is_err() {
                errors.push(ValidationError::new(
                    &field,
                    format!("'{}' is not a valid header name", entry.key),
                ));
            }
            if let Some(value) = &entry.value {
                if HeaderValue::try_from(value.as_str()).is_err() {
                    errors.push(ValidationError::new(
                        &field,
                        format!("value of '{}' is not a valid header value", entry.key),
                    ));
                }
            }
        }
    }

    for (index, source) in config.unlisted.iter().enumerate() {
        if let Err(e) = Rule::glob(source) {
            errors.push(ValidationError::new(format!("unlisted[{index}]"), e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rule(field: &str, rule: &RuleConfig, errors: &mut Vec<ValidationError>) {
    if let Err(e) = Rule::compile(rule.clone()) {
        errors.push(ValidationError::new(field, e.to_string()));
    }
}

fn is_http_url(destination: &str) -> bool {
    let lower = destination.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EngineKind, HeaderEntry, HeaderRuleConfig};

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&ServeConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServeConfig::default();
        config.timeouts.request_secs = 0;
        config.redirects.push(RuleConfig {
            source: "/a".into(),
            destination: Some("/b".into()),
            status_code: Some(200),
            ..RuleConfig::default()
        });
        config.rewrites.push(RuleConfig {
            engine: EngineKind::Regex,
            source: "(".into(),
            destination: Some("/x".into()),
            ..RuleConfig::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "redirects[0].statusCode"));
        assert!(errors.iter().any(|e| e.field == "rewrites[0]"));
    }

    #[test]
    fn test_proxy_requires_http_destination() {
        let mut config = ServeConfig::default();
        config.redirects.push(RuleConfig {
            source: "/api".into(),
            destination: Some("/local".into()),
            proxy: true,
            ..RuleConfig::default()
        });
        assert!(validate_config(&config).is_err());

        config.redirects[0].destination = Some("HTTPS://upstream.test/api".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_header_names() {
        let mut config = ServeConfig::default();
        config.headers.push(HeaderRuleConfig {
            source: "**".into(),
            headers: vec![HeaderEntry {
                key: "bad header".into(),
                value: Some("x".into()),
            }],
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "headers[0]");
    }

    #[test]
    fn test_middleware_type() {
        let mut config = ServeConfig::default();
        config.proxy_middleware.push(RuleConfig {
            engine: EngineKind::Glob,
            source: "**".into(),
            middleware: Some("inject".into()),
            middleware_type: Some("xml".into()),
            ..RuleConfig::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "proxyMiddleware[0].type");
    }

    #[test]
    fn test_auth_needs_both_fields() {
        let mut config = ServeConfig::default();
        config.auth = Some(crate::config::AuthConfig {
            name: "admin".into(),
            pass: String::new(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "auth");
    }
}
