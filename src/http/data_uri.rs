//! RFC 2397 `data:` URI decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use thiserror::Error;

const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=US-ASCII";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("not a data URI")]
    Scheme,

    #[error("data URI has no ',' separator")]
    MissingComma,

    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub media_type: String,
    pub data: Bytes,
}

pub fn decode(uri: &str) -> Result<DataPayload, DataUriError> {
    let rest = uri
        .get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &uri[5..])
        .ok_or(DataUriError::Scheme)?;
    let (meta, payload) = rest.split_once(',').ok_or(DataUriError::MissingComma)?;

    let base64_cut = meta
        .len()
        .checked_sub(";base64".len())
        .filter(|&cut| meta.get(cut..).is_some_and(|tail| tail.eq_ignore_ascii_case(";base64")));
    let (meta, is_base64) = match base64_cut {
        Some(cut) => (&meta[..cut], true),
        None => (meta, false),
    };

    let media_type = if meta.is_empty() {
        DEFAULT_MEDIA_TYPE.to_string()
    } else if meta.starts_with(';') {
        format!("text/plain{meta}")
    } else {
        meta.to_string()
    };

    let raw: Vec<u8> = percent_encoding::percent_decode_str(payload).collect();
    let data = if is_base64 {
        let compact: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| DataUriError::Base64(e.to_string()))?
    } else {
        raw
    };

    Ok(DataPayload {
        media_type,
        data: Bytes::from(data),
    })
}
