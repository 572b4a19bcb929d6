//! Forwarding one request to an absolute upstream URL.

use axum::body::Body;
use axum::http::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, SET_COOKIE,
    TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Response};
use bytes::Bytes;
use url::Url;

use crate::config::Settings;
use crate::delivery::apply_custom_headers;
use crate::proxy::client::{UpstreamBody, UpstreamClient, UpstreamError, UpstreamRequest};
use crate::proxy::middleware::{transform, MiddlewareRegistry};

/// Upstream response headers that are never relayed.
const BLOCKED_RESPONSE_HEADERS: [HeaderName; 4] = [CONNECTION, SET_COOKIE, CONTENT_ENCODING, TRANSFER_ENCODING];

/// Request headers dropped before forwarding; the client recomputes them.
const DROPPED_REQUEST_HEADERS: [HeaderName; 5] = [HOST, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING, ACCEPT_ENCODING];

/// Only these methods carry the client's body upstream.
pub fn forwards_body(method: &Method) -> bool {
    method == Method::POST || method == Method::PUT
}

pub struct Forwarder<'a> {
    pub client: &'a dyn UpstreamClient,
    pub registry: &'a MiddlewareRegistry,
    pub settings: &'a Settings,
}

impl Forwarder<'_> {
    /// Send the request to `target` and build the client response. Custom
    /// header rules are matched against `relative_path`.
    pub async fn forward(
        &self,
        method: &Method,
        request_headers: &HeaderMap,
        body: Bytes,
        target: &str,
        relative_path: &str,
    ) -> Result<Response<Body>, UpstreamError> {
        let url = Url::parse(target).map_err(|e| UpstreamError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })?;

        let mut headers = request_headers.clone();
        for name in DROPPED_REQUEST_HEADERS {
            headers.remove(name);
        }
        if let Some(host) = host_header(&url) {
            headers.insert(HOST, host);
        }

        let middleware = self.settings.proxy_middleware.matching(target);
        let buffer = !middleware.is_empty();

        tracing::debug!(
            method = %method,
            upstream = %url,
            middleware = middleware.len(),
            "Forwarding to upstream"
        );

        let upstream = self
            .client
            .send(
                UpstreamRequest {
                    method: method.clone(),
                    url,
                    headers,
                    body: if forwards_body(method) { body } else { Bytes::new() },
                },
                buffer,
            )
            .await?;

        let mut headers = HeaderMap::new();
        for (name, value) in upstream.headers.iter() {
            if !BLOCKED_RESPONSE_HEADERS.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        apply_custom_headers(&mut headers, &self.settings.headers, relative_path);

        let body = match upstream.body {
            UpstreamBody::Buffered(bytes) => {
                let content_type = upstream
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                let bytes = if content_type.is_empty() {
                    bytes
                } else {
                    transform(bytes, content_type, &middleware, self.registry)
                };
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                Body::from(bytes)
            }
            UpstreamBody::Streaming(stream) => Body::from_stream(stream),
        };

        let mut response = Response::new(body);
        *response.status_mut() = upstream.status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn host_header(url: &Url) -> Option<HeaderValue> {
    let host = url.host_str()?;
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineKind, RuleConfig, ServeConfig};
    use crate::proxy::client::UpstreamResponse;
    use crate::proxy::middleware::{Flow, Payload};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    /// Records the last request and answers with a canned body.
    struct CannedUpstream {
        seen: Mutex<Option<UpstreamRequest>>,
        content_type: &'static str,
        body: &'static str,
    }

    #[async_trait]
    impl UpstreamClient for CannedUpstream {
        async fn send(&self, request: UpstreamRequest, buffer: bool) -> Result<UpstreamResponse, UpstreamError> {
            *self.seen.lock().unwrap() = Some(request);
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
            headers.insert(SET_COOKIE, HeaderValue::from_static("id=1"));
            headers.insert("x-upstream", HeaderValue::from_static("yes"));
            let bytes = Bytes::from_static(self.body.as_bytes());
            let body = if buffer {
                UpstreamBody::Buffered(bytes)
            } else {
                let stream = futures_util::stream::iter(vec![Ok(bytes)]);
                UpstreamBody::Streaming(Box::pin(stream))
            };
            Ok(UpstreamResponse {
                status: StatusCode::CREATED,
                headers,
                body,
            })
        }
    }

    fn upstream(content_type: &'static str, body: &'static str) -> CannedUpstream {
        CannedUpstream {
            seen: Mutex::new(None),
            content_type,
            body,
        }
    }

    #[tokio::test]
    async fn test_forward_streams_and_filters_headers() {
        let settings = Settings::from_config(&ServeConfig::default()).unwrap();
        let registry = MiddlewareRegistry::new();
        let client = upstream("text/plain", "hello");
        let forwarder = Forwarder {
            client: &client,
            registry: &registry,
            settings: &settings,
        };

        let mut request_headers = HeaderMap::new();
        request_headers.insert(HOST, HeaderValue::from_static("localhost:3000"));
        request_headers.insert("x-client", HeaderValue::from_static("1"));

        let response = forwarder
            .forward(
                &Method::GET,
                &request_headers,
                Bytes::from_static(b"ignored"),
                "http://backend.test:8080/api?q=1",
                "/api",
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(response.headers()["x-upstream"], "yes");

        let seen = client.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.headers[HOST], "backend.test:8080");
        assert_eq!(seen.headers["x-client"], "1");
        assert!(seen.body.is_empty());
        assert_eq!(seen.url.query(), Some("q=1"));
    }

    #[tokio::test]
    async fn test_forward_applies_middleware() {
        let config = ServeConfig {
            proxy_middleware: vec![RuleConfig {
                engine: EngineKind::Glob,
                source: "http://backend.test/**".into(),
                middleware: Some("rename".into()),
                middleware_type: Some("html".into()),
                ..RuleConfig::default()
            }],
            ..ServeConfig::default()
        };
        let settings = Settings::from_config(&config).unwrap();
        let mut registry = MiddlewareRegistry::new();
        registry.register_fn("rename", |payload: Payload<'_>| {
            if let Payload::Html(doc) = payload {
                doc.set_text("h1", "New title")?;
            }
            Ok(Flow::Continue)
        });
        let client = upstream("text/html; charset=utf-8", "<h1>Old title</h1>");
        let forwarder = Forwarder {
            client: &client,
            registry: &registry,
            settings: &settings,
        };

        let response = forwarder
            .forward(&Method::POST, &HeaderMap::new(), Bytes::from_static(b"payload"), "http://backend.test/page", "/page")
            .await
            .unwrap();

        assert_eq!(response.headers()[CONTENT_LENGTH], "18");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"<h1>New title</h1>"));
        let seen = client.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.body, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let settings = Settings::from_config(&ServeConfig::default()).unwrap();
        let registry = MiddlewareRegistry::new();
        let client = upstream("text/plain", "");
        let forwarder = Forwarder {
            client: &client,
            registry: &registry,
            settings: &settings,
        };
        let err = forwarder
            .forward(&Method::GET, &HeaderMap::new(), Bytes::new(), "http://", "/")
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl { .. }));
    }
}
