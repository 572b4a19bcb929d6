//! `Range: bytes=...` parsing for a single byte range.

use thiserror::Error;

use crate::resolve::ByteRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range header")]
    Malformed,

    #[error("no satisfiable range")]
    Unsatisfiable,
}

/// Parse `header` against a representation of `size` bytes. When several
/// ranges are listed, the first satisfiable one is used.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let (unit, specs) = header.split_once('=').ok_or(RangeError::Malformed)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::Malformed);
    }
    if size == 0 {
        return Err(RangeError::Unsatisfiable);
    }

    let last = size - 1;
    let mut saw_spec = false;

    for spec in specs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((start, end)) = spec.split_once('-') else {
            continue;
        };
        saw_spec = true;

        let (start, end) = match (start.trim(), end.trim()) {
            ("", "") => continue,
            ("", suffix) => {
                let Ok(suffix) = suffix.parse::<u64>() else { continue };
                if suffix == 0 {
                    continue;
                }
                (size.saturating_sub(suffix), last)
            }
            (start, "") => {
                let Ok(start) = start.parse::<u64>() else { continue };
                (start, last)
            }
            (start, end) => {
                let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) else {
                    continue;
                };
                (start, end.min(last))
            }
        };

        if start <= end {
            return Ok(ByteRange { start, end });
        }
    }

    if saw_spec {
        Err(RangeError::Unsatisfiable)
    } else {
        Err(RangeError::Malformed)
    }
}
