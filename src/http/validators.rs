//! HTTP validator utilities
//!
//! `ETag` scanning and comparison (RFC 7232 §2.3) and HTTP-date handling
//! (RFC 7231 §7.1.1.1). Pure functions, no state.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Preferred HTTP-date format (IMF-fixdate), always GMT
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Accepted HTTP-date layouts, tried in order
const HTTP_DATE_LAYOUTS: [&str; 3] = [
    HTTP_DATE_FORMAT,
    // RFC 850
    "%A, %d-%b-%y %H:%M:%S GMT",
    // ANSI C asctime()
    "%a %b %e %H:%M:%S %Y",
];

/// Error returned when none of the HTTP-date layouts match
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid HTTP date: {0:?}")]
pub struct DateParseError(pub String);

/// Scan one entity-tag from the front of `s`.
///
/// Returns the tag (including quotes and any `W/` prefix) and the unparsed
/// remainder. Malformed input yields two empty strings, which callers treat
/// as "stop scanning this list".
///
/// # Examples
/// ```
/// use rust_fileserver::http::validators::scan_etag;
/// assert_eq!(scan_etag(r#" W/"v1", "v2""#), (r#"W/"v1""#, r#", "v2""#));
/// assert_eq!(scan_etag("v1"), ("", ""));
/// ```
pub fn scan_etag(s: &str) -> (&str, &str) {
    let s = trim_ascii(s);
    let start = usize::from(s.starts_with("W/")) * 2;
    let bytes = s.as_bytes();
    if bytes.len() - start < 2 || bytes[start] != b'"' {
        return ("", "");
    }

    for (i, &c) in bytes.iter().enumerate().skip(start + 1) {
        match c {
            0x21 | 0x23..=0x7E | 0x80..=0xFF => {}
            b'"' => return (&s[..=i], &s[i + 1..]),
            _ => return ("", ""),
        }
    }
    ("", "")
}

/// Strong comparison: byte-identical and not weak
pub fn etag_strong_match(a: &str, b: &str) -> bool {
    a == b && a.starts_with('"')
}

/// Weak comparison: equal once any `W/` prefix is dropped
pub fn etag_weak_match(a: &str, b: &str) -> bool {
    a.strip_prefix("W/").unwrap_or(a) == b.strip_prefix("W/").unwrap_or(b)
}

/// Parse an HTTP-date in any of the three formats HTTP/1.1 recipients must accept
pub fn parse_http_date(text: &str) -> Result<DateTime<Utc>, DateParseError> {
    HTTP_DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DateParseError(text.to_string()))
}

/// Format a timestamp as `Mon, 02 Jan 2006 15:04:05 GMT`
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// A modification time is absent when unknown or pinned to the Unix epoch
pub fn is_zero_time(time: Option<DateTime<Utc>>) -> bool {
    time.map_or(true, |t| t == DateTime::UNIX_EPOCH)
}

/// Trim the whitespace set HTTP header values may be padded with
pub(crate) fn trim_ascii(s: &str) -> &str {
    s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scan_strong_and_weak() {
        assert_eq!(scan_etag(r#""abc""#), (r#""abc""#, ""));
        assert_eq!(scan_etag(r#"W/"abc", "x""#), (r#"W/"abc""#, r#", "x""#));
        assert_eq!(scan_etag("  \"a\"  "), ("\"a\"", ""));
    }

    #[test]
    fn test_scan_malformed() {
        assert_eq!(scan_etag(""), ("", ""));
        assert_eq!(scan_etag("\""), ("", ""));
        assert_eq!(scan_etag("W/"), ("", ""));
        assert_eq!(scan_etag("\"unterminated"), ("", ""));
        assert_eq!(scan_etag("\"has space\""), ("", ""));
        assert_eq!(scan_etag("*"), ("", ""));
    }

    #[test]
    fn test_scan_obs_text() {
        assert_eq!(scan_etag("\"caf\u{e9}\""), ("\"caf\u{e9}\"", ""));
    }

    #[test]
    fn test_strong_match() {
        assert!(etag_strong_match("\"a\"", "\"a\""));
        assert!(!etag_strong_match("W/\"a\"", "W/\"a\""));
        assert!(!etag_strong_match("\"a\"", "\"b\""));
        assert!(!etag_strong_match("", ""));
    }

    #[test]
    fn test_weak_match() {
        assert!(etag_weak_match("W/\"a\"", "\"a\""));
        assert!(etag_weak_match("\"a\"", "W/\"a\""));
        assert!(etag_weak_match("\"a\"", "\"a\""));
        assert!(!etag_weak_match("\"a\"", "\"b\""));
    }

    #[test]
    fn test_parse_all_layouts() {
        let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap(),
            expected
        );
        assert_eq!(
            parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap(),
            expected
        );
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994").unwrap(), expected);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_http_date("yesterday").is_err());
        assert!(parse_http_date("").is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let t = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        let text = format_http_date(t);
        assert_eq!(text, "Mon, 02 Jan 2006 15:04:05 GMT");
        assert_eq!(parse_http_date(&text).unwrap(), t);
    }

    #[test]
    fn test_zero_time() {
        assert!(is_zero_time(None));
        assert!(is_zero_time(Some(DateTime::UNIX_EPOCH)));
        assert!(!is_zero_time(Some(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        )));
    }
}
