//! The embeddable request handler.
//!
//! ```text
//! Request ─▶ Resolver ─┬─ DataPayload ─▶ decoded bytes
//!                      ├─ Redirect ────▶ 3xx + Location
//!                      ├─ Proxy ───────▶ Forwarder (upstream client + middleware)
//!                      └─ auth ─┬─ Directory ─▶ listing | single file | 404
//!                               ├─ File ──────▶ script | conditional stream
//!                               └─ NotFound ──▶ error response
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::header::{
    ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_RANGE, ETAG, LAST_MODIFIED, WWW_AUTHENTICATE,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use bytes::Bytes;
use serde::Serialize;

use crate::config::Settings;
use crate::delivery::{apply_custom_headers, evaluate, file_headers, Delivery, EtagCache, Validator};
use crate::exec::{self, ScriptRunner, ShellRunner, Tokens};
use crate::http::auth::{authorize, REALM};
use crate::http::data_uri;
use crate::http::error::ServeError;
use crate::http::render::{BasicRenderer, Renderer};
use crate::http::request::{accepts_json, request_id};
use crate::http::response::{self, HTML_UTF8, JSON_UTF8};
use crate::listing::{self, DirectoryListing, ListingOutcome};
use crate::observability::metrics;
use crate::proxy::{forwards_body, CookieJar, Forwarder, MiddlewareRegistry, ReqwestUpstream, UpstreamClient, UpstreamError};
use crate::resolve::{ByteRange, Disposition, FileStat, FileSystem, Resolver, TokioFs};
use crate::rules::RedirectTarget;

const READ_METHODS: [Method; 3] = [Method::GET, Method::HEAD, Method::OPTIONS];
const SCRIPT_METHODS: [Method; 4] = [Method::GET, Method::HEAD, Method::POST, Method::OPTIONS];

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves one directory tree per the current [`Settings`]. Cloning is
/// cheap; every clone shares the same settings, caches and collaborators.
#[derive(Clone)]
pub struct ServeHandler {
    settings: Arc<ArcSwap<Settings>>,
    fs: Arc<dyn FileSystem>,
    etags: Arc<EtagCache>,
    scripts: Arc<dyn ScriptRunner>,
    upstream: Arc<dyn UpstreamClient>,
    middleware: Arc<MiddlewareRegistry>,
    renderer: Arc<dyn Renderer>,
}

pub struct ServeHandlerBuilder {
    settings: Settings,
    fs: Option<Arc<dyn FileSystem>>,
    scripts: Option<Arc<dyn ScriptRunner>>,
    upstream: Option<Arc<dyn UpstreamClient>>,
    upstream_timeout: Duration,
    middleware: MiddlewareRegistry,
    renderer: Option<Arc<dyn Renderer>>,
}

impl ServeHandlerBuilder {
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn script_runner(mut self, scripts: Arc<dyn ScriptRunner>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn upstream(mut self, upstream: Arc<dyn UpstreamClient>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Timeout of the default reqwest-backed upstream client.
    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn middleware(mut self, registry: MiddlewareRegistry) -> Self {
        self.middleware = registry;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn build(self) -> Result<ServeHandler, UpstreamError> {
        let upstream: Arc<dyn UpstreamClient> = match (self.upstream, &self.settings.proxy_cookie_jar) {
            (Some(upstream), _) => upstream,
            (None, Some(path)) => {
                let jar = CookieJar::open(path).map_err(|e| UpstreamError::Transport(Box::new(e)))?;
                tracing::info!(path = %path.display(), "Proxy cookie jar enabled");
                Arc::new(ReqwestUpstream::with_cookie_jar(self.upstream_timeout, Arc::new(jar))?)
            }
            (None, None) => Arc::new(ReqwestUpstream::new(self.upstream_timeout)?),
        };

        Ok(ServeHandler {
            settings: Arc::new(ArcSwap::from_pointee(self.settings)),
            fs: self.fs.unwrap_or_else(|| Arc::new(TokioFs)),
            etags: Arc::new(EtagCache::new()),
            scripts: self.scripts.unwrap_or_else(|| Arc::new(ShellRunner)),
            upstream,
            middleware: Arc::new(self.middleware),
            renderer: self.renderer.unwrap_or_else(|| Arc::new(BasicRenderer)),
        })
    }
}

/// Which branch answered, for logs and metrics.
struct Route {
    label: &'static str,
    /// Path that custom header rules are matched against.
    relative: String,
}

impl ServeHandler {
    pub fn builder(settings: Settings) -> ServeHandlerBuilder {
        ServeHandlerBuilder {
            settings,
            fs: None,
            scripts: None,
            upstream: None,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            middleware: MiddlewareRegistry::new(),
            renderer: None,
        }
    }

    /// Snapshot of the settings new requests will use.
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Swap in new settings. Requests already in flight keep their snapshot.
    pub fn update_settings(&self, settings: Settings) {
        self.settings.store(Arc::new(settings));
        tracing::info!("Settings replaced");
    }

    /// Handle one request. Always produces exactly one response.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let settings = self.settings.load_full();
        let (parts, body) = request.into_parts();

        if settings.log_req {
            tracing::info!(
                method = %parts.method,
                path = %parts.uri.path(),
                headers = ?parts.headers,
                "Request received"
            );
        }

        let mut route = Route {
            label: "error",
            relative: parts.uri.path().to_string(),
        };
        let response = match self.dispatch(&settings, &parts, body, &mut route).await {
            Ok(response) => response,
            Err(error) => self.error_response(&settings, &parts, error, &route.relative).await,
        };
        let response = if parts.method == Method::HEAD {
            response::strip_body(response)
        } else {
            response
        };

        if settings.log_res {
            tracing::info!(
                status = response.status().as_u16(),
                headers = ?response.headers(),
                "Response sent"
            );
        }
        tracing::debug!(
            request_id = %request_id(&parts.headers),
            status = response.status().as_u16(),
            disposition = route.label,
            "Request served"
        );
        metrics::record_request(parts.method.as_str(), response.status().as_u16(), route.label, start);
        response
    }

    async fn dispatch(
        &self,
        settings: &Settings,
        parts: &Parts,
        body: Body,
        route: &mut Route,
    ) -> Result<Response<Body>, ServeError> {
        let resolution = Resolver::new(settings, self.fs.as_ref())
            .resolve(parts.uri.path(), &parts.method)
            .await?;
        let state = resolution.state;
        route.relative = state.virtual_path.decoded.clone();

        // Inline payloads, redirects and proxies are answered without credentials.
        if matches!(
            resolution.disposition,
            Disposition::NotFound | Disposition::Directory | Disposition::File
        ) {
            authorize(&parts.headers, settings.auth.as_ref())?;
        }

        match resolution.disposition {
            Disposition::DataPayload(uri) => {
                route.label = "data";
                if let Some(early) = check_method(&parts.method, &READ_METHODS)? {
                    return Ok(early);
                }
                let payload = data_uri::decode(&uri).map_err(|e| ServeError::Internal(e.to_string()))?;
                let mut headers = HeaderMap::new();
                apply_custom_headers(&mut headers, &settings.headers, &route.relative);
                Ok(response::bytes(StatusCode::OK, headers, &payload.media_type, payload.data))
            }
            Disposition::Redirect(target) => {
                route.label = "redirect";
                tracing::debug!(location = %target.target, status = target.status.as_u16(), "Redirecting");
                Ok(response::redirect(&target, parts.uri.query()))
            }
            Disposition::Proxy(target) => {
                route.label = "proxy";
                self.proxy(settings, parts, body, &target, &route.relative).await
            }
            Disposition::NotFound => {
                route.label = "not_found";
                if parts.method == Method::OPTIONS {
                    return Ok(response::options(&READ_METHODS));
                }
                Err(ServeError::NotFound)
            }
            Disposition::Directory => {
                route.label = "directory";

                let outcome = listing::assemble(
                    self.fs.as_ref(),
                    settings,
                    state.virtual_path.effective(),
                    &state.real.absolute,
                )
                .await?;

                match outcome {
                    ListingOutcome::Listing(listing) => {
                        if let Some(early) = check_method(&parts.method, &READ_METHODS)? {
                            return Ok(early);
                        }
                        self.listing_response(parts, &listing)
                    }
                    ListingOutcome::SingleFile(single) => {
                        route.label = "file";
                        route.relative = single.relative.clone();
                        self.serve_file(settings, parts, body, &single.absolute, &single.stat, &route.relative)
                            .await
                    }
                    ListingOutcome::Disabled => Err(ServeError::NotFound),
                }
            }
            Disposition::File => {
                route.label = "file";
                route.relative = state.relative_to_root();
                let stat = state.real.stat.ok_or(ServeError::NotFound)?;
                self.serve_file(settings, parts, body, &state.real.absolute, &stat, &route.relative)
                    .await
            }
        }
    }

    async fn proxy(
        &self,
        settings: &Settings,
        parts: &Parts,
        body: Body,
        target: &RedirectTarget,
        relative: &str,
    ) -> Result<Response<Body>, ServeError> {
        let mut url = target.target.clone();
        if target.preserve_query {
            if let Some(query) = parts.uri.query().filter(|q| !q.is_empty()) {
                url.push('?');
                url.push_str(query);
            }
        }

        let body = if forwards_body(&parts.method) {
            read_body(body, settings.max_body_bytes).await?
        } else {
            Bytes::new()
        };

        let forwarder = Forwarder {
            client: self.upstream.as_ref(),
            registry: &self.middleware,
            settings,
        };
        forwarder
            .forward(&parts.method, &parts.headers, body, &url, relative)
            .await
            .map_err(|e| {
                tracing::error!(upstream = %url, error = %e, "Proxy request failed");
                ServeError::from(e)
            })
    }

    fn listing_response(&self, parts: &Parts, listing: &DirectoryListing) -> Result<Response<Body>, ServeError> {
        if accepts_json(&parts.headers) {
            let json = pretty_json(listing).map_err(|e| ServeError::Internal(e.to_string()))?;
            return Ok(response::bytes(StatusCode::OK, HeaderMap::new(), JSON_UTF8, Bytes::from(json)));
        }
        let html = self.renderer.render_listing(listing);
        Ok(response::bytes(StatusCode::OK, HeaderMap::new(), HTML_UTF8, Bytes::from(html)))
    }

    async fn serve_file(
        &self,
        settings: &Settings,
        parts: &Parts,
        body: Body,
        absolute: &Path,
        stat: &FileStat,
        relative: &str,
    ) -> Result<Response<Body>, ServeError> {
        let script = exec::select(&settings.cgi_bin, absolute);
        let allow: &[Method] = if script.is_some() { &SCRIPT_METHODS } else { &READ_METHODS };
        if let Some(early) = check_method(&parts.method, allow)? {
            return Ok(early);
        }

        let validator = self.validator(settings, absolute, stat).await?;
        let mut headers = file_headers(absolute, stat, &validator);
        apply_custom_headers(&mut headers, &settings.headers, relative);

        if let Some(rule) = script {
            let stdin = if parts.method == Method::POST {
                read_body(body, settings.max_body_bytes).await?
            } else {
                Bytes::new()
            };
            let url = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
            let tokens = Tokens::new(absolute, &settings.root, url);

            if let Some(request) = exec::prepare(rule, absolute, &tokens, stdin, &settings.scripts) {
                let result = match self.scripts.run(request).await {
                    Ok(output) => exec::response_body(output),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(output) => {
                        for name in [ETAG, LAST_MODIFIED, ACCEPT_RANGES] {
                            headers.remove(name);
                        }
                        headers.insert(CONTENT_LENGTH, HeaderValue::from(output.len()));
                        return Ok(response::build(StatusCode::OK, headers, Body::from(output)));
                    }
                    Err(e) => {
                        tracing::warn!(path = %absolute.display(), error = %e, "Script failed; serving file");
                    }
                }
            }
        }

        match evaluate(&parts.headers, &headers, stat.len) {
            Delivery::Full => {
                let body = self.file_body(parts, absolute, None).await?;
                Ok(response::build(StatusCode::OK, headers, body))
            }
            Delivery::Partial(range) => {
                let content_range = format!("bytes {}-{}/{}", range.start, range.end, stat.len);
                if let Ok(value) = HeaderValue::from_str(&content_range) {
                    headers.insert(CONTENT_RANGE, value);
                }
                headers.insert(CONTENT_LENGTH, HeaderValue::from(range.len()));
                let body = self.file_body(parts, absolute, Some(range)).await?;
                Ok(response::build(StatusCode::PARTIAL_CONTENT, headers, body))
            }
            Delivery::NotModified => {
                headers.remove(CONTENT_LENGTH);
                Ok(response::empty(StatusCode::NOT_MODIFIED, headers))
            }
            Delivery::PreconditionFailed => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
                Ok(response::empty(StatusCode::PRECONDITION_FAILED, headers))
            }
            Delivery::RangeNotSatisfiable => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", stat.len)) {
                    headers.insert(CONTENT_RANGE, value);
                }
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
                Ok(response::empty(StatusCode::RANGE_NOT_SATISFIABLE, headers))
            }
        }
    }

    async fn validator(&self, settings: &Settings, absolute: &Path, stat: &FileStat) -> Result<Validator, ServeError> {
        if settings.etag {
            let tag = self.etags.etag(self.fs.as_ref(), absolute, stat).await?;
            Ok(Validator::ETag(tag))
        } else {
            Ok(Validator::LastModified(stat.modified))
        }
    }

    /// `HEAD` never opens the file.
    async fn file_body(&self, parts: &Parts, absolute: &Path, range: Option<ByteRange>) -> Result<Body, ServeError> {
        if parts.method == Method::HEAD {
            return Ok(Body::empty());
        }
        let stream = self.fs.open_read(absolute, range).await?;
        Ok(Body::from_stream(stream))
    }

    async fn error_response(
        &self,
        settings: &Settings,
        parts: &Parts,
        error: ServeError,
        relative: &str,
    ) -> Response<Body> {
        let status = error.status_code();

        let marker = format!("statusCode:{}", status.as_u16());
        match settings.redirects.redirect(&marker, &parts.method) {
            Ok(Some(target)) => return response::redirect(&target, parts.uri.query()),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Status redirect evaluation failed"),
        }

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %error, "Request rejected");
        }

        let mut extra = HeaderMap::new();
        match &error {
            ServeError::MethodNotAllowed { allow } => {
                extra.insert(ALLOW, response::allow_value(allow));
            }
            ServeError::AccessDenied => {
                extra.insert(WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
            }
            _ => {}
        }

        if accepts_json(&parts.headers) {
            return response::bytes(status, extra, JSON_UTF8, Bytes::from(error.to_json()));
        }

        match self.custom_error_page(settings, parts, status).await {
            Ok(Some(mut response)) => {
                response.headers_mut().extend(extra);
                return response;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(status = status.as_u16(), error = %e, "Custom error page unavailable"),
        }

        let html = self.renderer.render_error(status, error.message());
        let mut response = response::bytes(status, extra, HTML_UTF8, Bytes::from(html));
        apply_custom_headers(response.headers_mut(), &settings.headers, relative);
        response
    }

    /// `<root>/<status>.html`, served with its file headers.
    async fn custom_error_page(
        &self,
        settings: &Settings,
        parts: &Parts,
        status: StatusCode,
    ) -> Result<Option<Response<Body>>, ServeError> {
        let name = format!("{}.html", status.as_u16());
        let path = settings.root.join(&name);
        let stat = match self.fs.stat_link(&path).await {
            Ok(stat) if stat.is_file() => stat,
            Ok(_) => return Ok(None),
            Err(e) if e.is_missing() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let validator = self.validator(settings, &path, &stat).await?;
        let mut headers = file_headers(&path, &stat, &validator);
        apply_custom_headers(&mut headers, &settings.headers, &format!("/{name}"));
        let body = self.file_body(parts, &path, None).await?;
        Ok(Some(response::build(status, headers, body)))
    }
}

/// `OPTIONS` is answered here; other methods outside `allow` are rejected.
fn check_method(method: &Method, allow: &[Method]) -> Result<Option<Response<Body>>, ServeError> {
    if method == Method::OPTIONS {
        return Ok(Some(response::options(allow)));
    }
    if allow.contains(method) {
        Ok(None)
    } else {
        Err(ServeError::MethodNotAllowed { allow: allow.to_vec() })
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, ServeError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, "Request body rejected");
        ServeError::BadRequest
    })
}

/// Four-space indented JSON.
fn pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}
