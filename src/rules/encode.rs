//! Path text helpers shared by the rule engines and the resolver.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters that would break a redirect `Location` path. Non-ASCII is
/// always escaped as UTF-8.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'#')
    .add(b'?');

pub fn encode_url_path(text: &str) -> String {
    utf8_percent_encode(text, PATH_ESCAPES).to_string()
}

/// Strict percent-decoding: every `%` must introduce two hex digits and the
/// decoded bytes must be UTF-8.
pub fn percent_decode(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// POSIX-style lexical normalization of an absolute virtual path.
///
/// Collapses repeated slashes, resolves `.` and `..` (never above `/`) and
/// keeps a trailing slash when the input had one.
pub fn normalize_posix(path: &str) -> String {
    let trailing = path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::from("/");
    normalized.push_str(&segments.join("/"));
    if trailing && !segments.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Normalize a path or glob source to a leading-slash POSIX form, keeping
/// a leading `!` negation marker in place.
pub fn slasher(value: &str) -> String {
    let (negated, rest) = match value.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let normalized = normalize_posix(&rest.replace('\\', "/"));
    if negated {
        format!("!{normalized}")
    } else {
        normalized
    }
}

/// Collapse runs of `/` into a single slash.
pub fn squeeze_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                out.push(c);
            }
            previous_slash = true;
        } else {
            out.push(c);
            previous_slash = false;
        }
    }
    out
}
