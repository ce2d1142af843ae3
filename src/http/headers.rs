//! Typed access to the request headers the content engine consumes
//!
//! Every accessor returns the first value of a header (repeated headers are
//! not merged) and treats an empty value the same as an absent one.

use hyper::header::{self, HeaderMap, HeaderName};

/// Borrowed view over request headers with validator-specific accessors
#[derive(Debug, Clone, Copy)]
pub struct RequestHeaders<'a> {
    map: &'a HeaderMap,
}

impl<'a> RequestHeaders<'a> {
    pub const fn new(map: &'a HeaderMap) -> Self {
        Self { map }
    }

    pub fn if_match(&self) -> Option<&'a str> {
        self.first(&header::IF_MATCH)
    }

    pub fn if_none_match(&self) -> Option<&'a str> {
        self.first(&header::IF_NONE_MATCH)
    }

    pub fn if_modified_since(&self) -> Option<&'a str> {
        self.first(&header::IF_MODIFIED_SINCE)
    }

    pub fn if_unmodified_since(&self) -> Option<&'a str> {
        self.first(&header::IF_UNMODIFIED_SINCE)
    }

    pub fn if_range(&self) -> Option<&'a str> {
        self.first(&header::IF_RANGE)
    }

    pub fn range(&self) -> Option<&'a str> {
        self.first(&header::RANGE)
    }

    /// First non-empty value of `name`
    ///
    /// Values are read as UTF-8 rather than visible ASCII so that `ETags`
    /// carrying obs-text still reach the validator scanner.
    pub fn first(&self, name: &HeaderName) -> Option<&'a str> {
        self.map
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
            .filter(|v| !v.is_empty())
    }
}

/// First value of a response header, used to read back a caller-published `ETag`
pub fn response_header<'h>(headers: &'h HeaderMap, name: &HeaderName) -> &'h str {
    RequestHeaders::new(headers).first(name).unwrap_or("")
}
