//! Conditional request and range evaluation against computed headers.

use axum::http::header::{
    ETAG, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE, LAST_MODIFIED,
    RANGE,
};
use axum::http::HeaderMap;

use crate::delivery::range::parse_range;
use crate::resolve::ByteRange;

/// How the file body should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Full,
    Partial(ByteRange),
    NotModified,
    PreconditionFailed,
    RangeNotSatisfiable,
}

/// Decide delivery from request headers and the response's validators.
pub fn evaluate(request: &HeaderMap, response: &HeaderMap, size: u64) -> Delivery {
    let etag = header_str(response, ETAG);
    let last_modified = header_str(response, LAST_MODIFIED);
    let range = header_str(request, RANGE);

    let if_match = header_str(request, IF_MATCH);
    let if_none_match = header_str(request, IF_NONE_MATCH);

    match etag {
        Some(etag) if if_match.is_some() || if_none_match.is_some() => {
            if let Some(if_match) = if_match {
                if !if_match_satisfied(if_match, etag) {
                    return if range.is_some() {
                        Delivery::RangeNotSatisfiable
                    } else {
                        Delivery::PreconditionFailed
                    };
                }
            }
            if let Some(if_none_match) = if_none_match {
                if if_none_match_hits(if_none_match, etag) {
                    return Delivery::NotModified;
                }
            }
        }
        _ => {
            if let Some(modified) = last_modified.and_then(parse_date) {
                if let Some(since) = header_str(request, IF_UNMODIFIED_SINCE).and_then(parse_date) {
                    if modified > since {
                        return Delivery::PreconditionFailed;
                    }
                }
                if let Some(since) = header_str(request, IF_MODIFIED_SINCE).and_then(parse_date) {
                    if modified <= since {
                        return Delivery::NotModified;
                    }
                }
            }
        }
    }

    let Some(range) = range else {
        return Delivery::Full;
    };
    if size == 0 {
        return Delivery::Full;
    }
    if let Some(if_range) = header_str(request, IF_RANGE) {
        if !if_range_holds(if_range, etag, last_modified) {
            return Delivery::Full;
        }
    }

    match parse_range(range, size) {
        Ok(range) => Delivery::Partial(range),
        Err(_) => Delivery::RangeNotSatisfiable,
    }
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Compared at one-second precision, as HTTP dates carry.
fn parse_date(value: &str) -> Option<u64> {
    let time = httpdate::parse_http_date(value.trim()).ok()?;
    time.duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

fn is_weak(tag: &str) -> bool {
    tag.starts_with("W/")
}

fn opaque(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

fn tags(header: &str) -> impl Iterator<Item = &str> {
    header.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Strong comparison: a weak tag on either side never matches.
fn if_match_satisfied(header: &str, etag: &str) -> bool {
    if header.trim() == "*" {
        return true;
    }
    !is_weak(etag) && tags(header).any(|tag| !is_weak(tag) && tag == etag)
}

/// Weak comparison.
fn if_none_match_hits(header: &str, etag: &str) -> bool {
    if header.trim() == "*" {
        return true;
    }
    tags(header).any(|tag| opaque(tag) == opaque(etag))
}

fn if_range_holds(value: &str, etag: Option<&str>, last_modified: Option<&str>) -> bool {
    let value = value.trim();
    if let Some(etag) = etag {
        if !is_weak(etag) && value == etag {
            return true;
        }
    }
    match last_modified {
        Some(modified) if value == modified => true,
        Some(modified) => parse_date(value).is_some() && parse_date(value) == parse_date(modified),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const WEAK: &str = "W/\"abc\"";
    const DATE: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

    fn headers(pairs: &[(axum::http::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_if_none_match() {
        let response = headers(&[(ETAG, WEAK)]);
        let request = headers(&[(IF_NONE_MATCH, "\"abc\"")]);
        assert_eq!(evaluate(&request, &response, 10), Delivery::NotModified);

        let request = headers(&[(IF_NONE_MATCH, "W/\"other\""), (IF_MODIFIED_SINCE, DATE)]);
        assert_eq!(evaluate(&request, &response, 10), Delivery::Full);
    }

    #[test]
    fn test_if_match_never_satisfied_by_weak() {
        let response = headers(&[(ETAG, WEAK)]);
        let request = headers(&[(IF_MATCH, WEAK)]);
        assert_eq!(evaluate(&request, &response, 10), Delivery::PreconditionFailed);

        let ranged = headers(&[(IF_MATCH, WEAK), (RANGE, "bytes=0-1")]);
        assert_eq!(evaluate(&ranged, &response, 10), Delivery::RangeNotSatisfiable);

        let any = headers(&[(IF_MATCH, "*")]);
        assert_eq!(evaluate(&any, &response, 10), Delivery::Full);
    }

    #[test]
    fn test_last_modified_branch() {
        let response = headers(&[(LAST_MODIFIED, DATE)]);

        let fresh = headers(&[(IF_MODIFIED_SINCE, DATE)]);
        assert_eq!(evaluate(&fresh, &response, 10), Delivery::NotModified);

        let stale = headers(&[(IF_MODIFIED_SINCE, "Tue, 20 Oct 2015 07:28:00 GMT")]);
        assert_eq!(evaluate(&stale, &response, 10), Delivery::Full);

        let unmodified = headers(&[(IF_UNMODIFIED_SINCE, "Tue, 20 Oct 2015 07:28:00 GMT")]);
        assert_eq!(evaluate(&unmodified, &response, 10), Delivery::PreconditionFailed);
    }

    #[test]
    fn test_ranges() {
        let response = headers(&[(ETAG, WEAK), (LAST_MODIFIED, DATE)]);

        let partial = headers(&[(RANGE, "bytes=0-99")]);
        assert_eq!(
            evaluate(&partial, &response, 1000),
            Delivery::Partial(ByteRange { start: 0, end: 99 })
        );

        let beyond = headers(&[(RANGE, "bytes=2000-")]);
        assert_eq!(evaluate(&beyond, &response, 1000), Delivery::RangeNotSatisfiable);

        let empty_file = headers(&[(RANGE, "bytes=0-10")]);
        assert_eq!(evaluate(&empty_file, &response, 0), Delivery::Full);
    }

    #[test]
    fn test_if_range() {
        let response = headers(&[(ETAG, WEAK), (LAST_MODIFIED, DATE)]);

        let weak_tag = headers(&[(RANGE, "bytes=0-9"), (IF_RANGE, WEAK)]);
        assert_eq!(evaluate(&weak_tag, &response, 100), Delivery::Full);

        let by_date = headers(&[(RANGE, "bytes=0-9"), (IF_RANGE, DATE)]);
        assert_eq!(
            evaluate(&by_date, &response, 100),
            Delivery::Partial(ByteRange { start: 0, end: 9 })
        );

        let strong = headers(&[(ETAG, "\"s1\"")]);
        let matching = headers(&[(RANGE, "bytes=0-9"), (IF_RANGE, "\"s1\"")]);
        assert_eq!(
            evaluate(&matching, &strong, 100),
            Delivery::Partial(ByteRange { start: 0, end: 9 })
        );
    }
}
