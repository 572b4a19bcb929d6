//! Upstream HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use thiserror::Error;
use url::Url;

use crate::proxy::cookies::CookieJar;
use crate::resolve::ByteStream;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("upstream request failed: {0}")]
    Transport(#[source] BoxError),

    #[error("upstream body failed: {0}")]
    Body(#[source] BoxError),
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub enum UpstreamBody {
    Buffered(Bytes),
    Streaming(ByteStream),
}

impl std::fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            UpstreamBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

/// Injectable upstream client. `buffer` asks for the whole body up front.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest, buffer: bool) -> Result<UpstreamResponse, UpstreamError>;
}

/// [`UpstreamClient`] over `reqwest`. Redirects are returned to the caller,
/// never followed.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        Self::build(timeout, None)
    }

    /// Client that stores upstream cookies in `jar` and sends them back on
    /// later requests that carry no `Cookie` header of their own.
    pub fn with_cookie_jar(timeout: Duration, jar: Arc<CookieJar>) -> Result<Self, UpstreamError> {
        Self::build(timeout, Some(jar))
    }

    fn build(timeout: Duration, jar: Option<Arc<CookieJar>>) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .no_proxy();
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder
            .build()
            .map_err(|e| UpstreamError::Transport(Box::new(e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstream {
    async fn send(&self, request: UpstreamRequest, buffer: bool) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(Box::new(e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = if buffer {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| UpstreamError::Body(Box::new(e)))?;
            UpstreamBody::Buffered(bytes)
        } else {
            let stream = response
                .bytes_stream()
                .map_err(std::io::Error::other)
                .boxed();
            UpstreamBody::Streaming(stream)
        };

        Ok(UpstreamResponse { status, headers, body })
    }
}
