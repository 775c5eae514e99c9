//! Timestamp derivation from the `Date` header.

use chrono::NaiveDateTime;

use crate::error::{Result, StashError};

/// Expected shape of the `Date` header, e.g. `Mon, 02 Jan 2023 03:04:05`.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Derive a sortable `YYYYMMDD-HHMMSS` string from a `Date` header value.
///
/// Parses the leading weekday/day/month/year/time portion and ignores any
/// trailing timezone offset instead of applying it, so filenames carry the
/// wall-clock time exactly as written in the header. A header that does not
/// match the expected shape fails with `DateParse`; there is no fallback.
pub fn derive_timestamp(date_header: &str) -> Result<String> {
    let (dt, _offset) = NaiveDateTime::parse_and_remainder(date_header.trim(), DATE_FORMAT)
        .map_err(|e| StashError::DateParse {
            reason: format!("'{}': {e}", date_header.trim()),
        })?;
    Ok(dt.format("%Y%m%d-%H%M%S").to_string())
}
