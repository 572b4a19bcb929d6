//! Request-level error taxonomy.

use axum::http::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::proxy::UpstreamError;
use crate::resolve::{FsError, ResolveError};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("malformed request path")]
    BadRequest,

    #[error("authentication failed")]
    AccessDenied,

    #[error("no such entry")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed { allow: Vec<Method> },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upstream failure: {0}")]
    BadGateway(String),
}

/// Serializable shape of an error, as sent to JSON clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    #[serde(skip)]
    pub status_code: u16,
    pub code: &'static str,
    pub message: &'static str,
    #[serde(skip)]
    pub cause: Option<String>,
}

impl ServeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServeError::BadRequest => StatusCode::BAD_REQUEST,
            ServeError::AccessDenied => StatusCode::UNAUTHORIZED,
            ServeError::NotFound => StatusCode::NOT_FOUND,
            ServeError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ServeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServeError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServeError::BadRequest => "bad_request",
            ServeError::AccessDenied => "access_denied",
            ServeError::NotFound => "not_found",
            ServeError::MethodNotAllowed { .. } => "method_not_allowed",
            ServeError::Internal(_) => "internal_server_error",
            ServeError::BadGateway(_) => "bad_gateway",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ServeError::BadRequest => "Bad Request",
            ServeError::AccessDenied => "Access Denied",
            ServeError::NotFound => "The requested path could not be found",
            ServeError::MethodNotAllowed { .. } => "Method Not Allowed",
            ServeError::Internal(_) => "A server error has occurred",
            ServeError::BadGateway(_) => "Bad Gateway for proxy redirect",
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        let cause = match self {
            ServeError::Internal(cause) | ServeError::BadGateway(cause) => Some(cause.clone()),
            _ => None,
        };
        ErrorDescriptor {
            status_code: self.status_code().as_u16(),
            code: self.code(),
            message: self.message(),
            cause,
        }
    }

    /// `{"error":{"code":...,"message":...}}`
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.descriptor() }).to_string()
    }
}

impl From<ResolveError> for ServeError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::BadRequest => ServeError::BadRequest,
            other => ServeError::Internal(other.to_string()),
        }
    }
}

impl From<FsError> for ServeError {
    fn from(err: FsError) -> Self {
        if err.is_missing() {
            ServeError::NotFound
        } else {
            ServeError::Internal(err.to_string())
        }
    }
}

impl From<UpstreamError> for ServeError {
    fn from(err: UpstreamError) -> Self {
        ServeError::BadGateway(err.to_string())
    }
}
