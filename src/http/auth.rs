//! HTTP Basic authentication.

use axum::http::HeaderMap;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::{Authorization, HeaderMapExt};

use crate::config::AuthConfig;
use crate::http::error::ServeError;

/// Realm advertised in `WWW-Authenticate`.
pub const REALM: &str = "Basic realm=\"User Visible Realm\"";

/// Decoded `Authorization: Basic` credentials, if present and well formed.
pub fn credentials(headers: &HeaderMap) -> Option<Authorization<Basic>> {
    headers.typed_get::<Authorization<Basic>>()
}

/// Check the request against configured credentials. A configuration
/// with an empty name or password is a server error.
pub fn authorize(headers: &HeaderMap, auth: Option<&AuthConfig>) -> Result<(), ServeError> {
    let Some(auth) = auth else {
        return Ok(());
    };
    if auth.name.is_empty() || auth.pass.is_empty() {
        return Err(ServeError::Internal(
            "basic authentication is enabled but auth is not correctly configured".into(),
        ));
    }

    match credentials(headers) {
        Some(given) if given.username() == auth.name && given.password() == auth.pass => Ok(()),
        _ => Err(ServeError::AccessDenied),
    }
}
