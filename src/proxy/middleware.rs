//! Named body transforms applied to buffered upstream responses.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::proxy::html::HtmlDocument;
use crate::rules::Rule;

/// What a middleware sees, by body class.
pub enum Payload<'a> {
    /// HTML or XML markup, parsed. Serialised again after the chain.
    Html(&'a mut HtmlDocument),
    Json(&'a mut serde_json::Value),
    /// JavaScript or any other `text/*` body.
    Text(&'a mut String),
}

/// Whether the chain continues after a middleware ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct MiddlewareError(pub String);

pub trait ProxyMiddleware: Send + Sync {
    fn apply(&self, payload: Payload<'_>) -> Result<Flow, MiddlewareError>;
}

impl<F> ProxyMiddleware for F
where
    F: Fn(Payload<'_>) -> Result<Flow, MiddlewareError> + Send + Sync,
{
    fn apply(&self, payload: Payload<'_>) -> Result<Flow, MiddlewareError> {
        self(payload)
    }
}

/// Middleware registered in code and referenced from config by name.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn ProxyMiddleware>>,
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, middleware: Arc<dyn ProxyMiddleware>) {
        self.entries.insert(name.into(), middleware);
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Payload<'_>) -> Result<Flow, MiddlewareError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProxyMiddleware>> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Body classes of a response content type. `js` bodies are also text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MimeClass {
    pub html: bool,
    pub json: bool,
    pub js: bool,
    pub text: bool,
}

const HTML_TYPES: [&str; 4] = ["text/html", "text/xml", "application/xhtml", "application/xml"];
const JSON_TYPES: [&str; 3] = ["application/json", "text/json", "text/x-json"];
const JS_TYPES: [&str; 6] = [
    "text/ecmascript",
    "text/javascript",
    "text/jscript",
    "application/ecmascript",
    "application/javascript",
    "application/x-javascript",
];

impl MimeClass {
    pub fn classify(content_type: &str) -> Self {
        let mime = content_type.trim().to_ascii_lowercase();
        let any_of = |types: &[&str]| types.iter().any(|t| mime.starts_with(t));
        Self {
            html: any_of(&HTML_TYPES),
            json: any_of(&JSON_TYPES),
            js: any_of(&JS_TYPES),
            text: mime.starts_with("text/"),
        }
    }

    pub fn is_textual(&self) -> bool {
        self.html || self.json || self.js || self.text
    }

    /// Whether a rule declared for `kind` applies to this body.
    fn accepts(&self, kind: &str) -> bool {
        match kind.to_ascii_lowercase().as_str() {
            "html" => self.html,
            "json" => self.json,
            "js" => self.js,
            "text" => self.js || self.text,
            _ => false,
        }
    }
}

enum Document {
    Html(HtmlDocument),
    Json(serde_json::Value),
    Text(String),
}

impl Document {
    fn payload(&mut self) -> Payload<'_> {
        match self {
            Document::Html(doc) => Payload::Html(doc),
            Document::Json(value) => Payload::Json(value),
            Document::Text(text) => Payload::Text(text),
        }
    }

    fn into_bytes(self) -> Option<Bytes> {
        let text = match self {
            Document::Html(doc) => doc.html(),
            Document::Json(value) => serde_json::to_string_pretty(&value).ok()?,
            Document::Text(text) => text,
        };
        Some(Bytes::from(text))
    }
}

/// Run every applicable middleware over `body` in rule order. Bodies that
/// are not textual, not UTF-8, or not valid JSON come back unchanged.
pub fn transform(body: Bytes, content_type: &str, rules: &[&Rule], registry: &MiddlewareRegistry) -> Bytes {
    let class = MimeClass::classify(content_type);
    if !class.is_textual() {
        return body;
    }

    let Ok(text) = std::str::from_utf8(&body) else {
        return body;
    };
    let mut document = if class.html {
        Document::Html(HtmlDocument::parse(text))
    } else if class.json {
        match serde_json::from_str(text) {
            Ok(value) => Document::Json(value),
            Err(e) => {
                tracing::debug!(error = %e, "Upstream JSON did not parse; passing through");
                return body;
            }
        }
    } else {
        Document::Text(text.to_string())
    };

    for rule in rules {
        let config = rule.config();
        let Some(kind) = config.middleware_type.as_deref() else {
            continue;
        };
        if !class.accepts(kind) {
            continue;
        }
        let Some(name) = config.middleware.as_deref() else {
            continue;
        };
        let Some(middleware) = registry.get(name) else {
            tracing::warn!(middleware = %name, "Proxy middleware is not registered");
            continue;
        };

        match middleware.apply(document.payload()) {
            Ok(Flow::Stop) => break,
            Ok(Flow::Continue) if rule.is_terminal() => break,
            Ok(Flow::Continue) => {}
            Err(e) => {
                tracing::warn!(middleware = %name, error = %e, "Proxy middleware failed");
            }
        }
    }

    document.into_bytes().unwrap_or(body)
}
