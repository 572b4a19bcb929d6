//! Response header assembly for files.

use std::path::Path;
use std::time::SystemTime;

use axum::http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use axum::http::{HeaderMap, HeaderValue};

use crate::config::HeaderRule;
use crate::resolve::FileStat;

/// Freshness validator attached to a file response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    ETag(String),
    LastModified(SystemTime),
}

/// Defaults for a file: length, inline disposition, range support, the
/// validator and (when known) the content type.
pub fn file_headers(path: &Path, stat: &FileStat, validator: &Validator) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(stat.len));

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&name)) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    match validator {
        Validator::ETag(tag) => {
            if let Ok(value) = HeaderValue::from_str(tag) {
                headers.insert(ETAG, value);
            }
        }
        Validator::LastModified(modified) => {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(*modified)) {
                headers.insert(LAST_MODIFIED, value);
            }
        }
    }

    if let Some(content_type) = content_type_for(&name) {
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
    }

    headers
}

/// Apply every matching custom header rule, in order. A `None` value removes
/// the header.
pub fn apply_custom_headers(headers: &mut HeaderMap, rules: &[HeaderRule], relative_path: &str) {
    for rule in rules.iter().filter(|rule| rule.rule.test(relative_path)) {
        for (name, value) in &rule.headers {
            match value {
                Some(value) => {
                    headers.insert(name.clone(), value.clone());
                }
                None => {
                    headers.remove(name);
                }
            }
        }
    }
}

/// MIME type for a file name, with `charset=utf-8` on textual types.
pub fn content_type_for(name: &str) -> Option<String> {
    let mime = mime_guess::from_path(name).first_raw()?;
    let textual = mime.starts_with("text/")
        || mime == "application/javascript"
        || mime == "application/json";
    Some(if textual {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    })
}

/// `inline` disposition carrying the file name (RFC 6266). Names that are
/// not printable ASCII get an ASCII fallback plus a `filename*` parameter.
pub fn content_disposition(name: &str) -> String {
    let printable = |c: char| (' '..='~').contains(&c);
    let fallback: String = name
        .chars()
        .map(|c| if printable(c) { c } else { '?' })
        .collect();
    let has_fallback = fallback != name;
    let has_hex_escape = contains_hex_escape(name);

    let mut out = String::from("inline");
    if name.is_empty() {
        return out;
    }

    out.push_str("; filename=");
    out.push_str(&quote(&fallback));
    if has_fallback || has_hex_escape {
        out.push_str("; filename*=UTF-8''");
        out.push_str(&percent_encoding::utf8_percent_encode(name, ATTR_CHAR).to_string());
    }
    out
}

/// Everything outside RFC 5987 `attr-char` is encoded.
const ATTR_CHAR: &percent_encoding::AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn contains_hex_escape(name: &str) -> bool {
    name.as_bytes()
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}
