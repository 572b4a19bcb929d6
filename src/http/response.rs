//! Response builders shared by the dispatcher branches.
//!
//! # Design Decisions
//! - `HEAD` responses keep every header of the `GET` response; only the
//!   body is dropped
//! - A `Location` that is not a valid header value is percent-encoded

use axum::body::Body;
use axum::http::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, CONTROLS};

use crate::rules::RedirectTarget;

pub const HTML_UTF8: &str = "text/html; charset=utf-8";
pub const JSON_UTF8: &str = "application/json; charset=utf-8";

const LOCATION_ESCAPES: &percent_encoding::AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>');

pub fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// In-memory body with `Content-Type` and `Content-Length` set.
pub fn bytes(status: StatusCode, mut headers: HeaderMap, content_type: &str, body: Bytes) -> Response<Body> {
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    build(status, headers, Body::from(body))
}

pub fn empty(status: StatusCode, headers: HeaderMap) -> Response<Body> {
    build(status, headers, Body::empty())
}

/// Redirect to `target`, carrying the request's query string when the rule
/// preserves it.
pub fn redirect(target: &RedirectTarget, query: Option<&str>) -> Response<Body> {
    let mut location = target.target.clone();
    if target.preserve_query {
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            location.push('?');
            location.push_str(query);
        }
    }

    let value = HeaderValue::from_str(&location).or_else(|_| {
        HeaderValue::from_str(&utf8_percent_encode(&location, LOCATION_ESCAPES).to_string())
    });

    let mut headers = HeaderMap::new();
    match value {
        Ok(value) => {
            headers.insert(LOCATION, value);
        }
        Err(e) => tracing::warn!(location = %location, error = %e, "Unrepresentable redirect location"),
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    empty(target.status, headers)
}

pub fn allow_value(allow: &[Method]) -> HeaderValue {
    let joined = allow.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static("GET, HEAD"))
}

/// `200` with an `Allow` header and no body.
pub fn options(allow: &[Method]) -> Response<Body> {
    let mut headers = HeaderMap::new();
    headers.insert(ALLOW, allow_value(allow));
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    empty(StatusCode::OK, headers)
}

/// Drop the body of a response to `HEAD`, keeping its headers.
pub fn strip_body(response: Response<Body>) -> Response<Body> {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Body::empty())
}
