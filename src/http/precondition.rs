//! Conditional request evaluation (RFC 7232)
//!
//! Decides whether a request for a resource short-circuits to 304 or 412 and
//! whether its `Range` header survives `If-Range`. The evaluator never
//! computes an `ETag`; it only compares against one the caller has already
//! placed in the response headers.

use chrono::{DateTime, TimeDelta, Utc};
use hyper::header::{self, HeaderMap};
use hyper::{Method, StatusCode};

use super::headers::{response_header, RequestHeaders};
use super::validators::{
    etag_strong_match, etag_weak_match, is_zero_time, parse_http_date, scan_etag, trim_ascii,
};

/// Outcome of a single validator check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Header absent or not applicable
    None,
    True,
    False,
}

/// Result of running every precondition in RFC 7232 §6 order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition<'a> {
    /// Answer right away with this status; response headers are already adjusted
    Respond(StatusCode),
    /// Serve the representation, honouring `range` when present
    Proceed { range: Option<&'a str> },
}

fn is_get_or_head(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Walk a comma-separated entity-tag list, returning true on the first tag
/// accepted by `matches`. `*` matches anything.
fn any_etag(list: &str, matches: impl Fn(&str) -> bool) -> bool {
    let mut rest = list;
    loop {
        rest = trim_ascii(rest);
        if rest.is_empty() {
            return false;
        }
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
            continue;
        }
        if rest.starts_with('*') {
            return true;
        }
        let (etag, remain) = scan_etag(rest);
        if etag.is_empty() {
            return false;
        }
        if matches(etag) {
            return true;
        }
        rest = remain;
    }
}

/// `If-Match`: strong comparison against the current `ETag`
pub fn check_if_match(req: RequestHeaders<'_>, etag: &str) -> Condition {
    let Some(im) = req.if_match() else {
        return Condition::None;
    };
    if any_etag(im, |candidate| etag_strong_match(candidate, etag)) {
        Condition::True
    } else {
        Condition::False
    }
}

/// `If-None-Match`: weak comparison; a match means "do not send fresh content"
pub fn check_if_none_match(req: RequestHeaders<'_>, etag: &str) -> Condition {
    let Some(inm) = req.if_none_match() else {
        return Condition::None;
    };
    if any_etag(inm, |candidate| etag_weak_match(candidate, etag)) {
        Condition::False
    } else {
        Condition::True
    }
}

/// HTTP dates only carry whole seconds, so `mtime < date + 1s` means
/// "not modified since `date`".
fn unmodified_since(modtime: DateTime<Utc>, date: DateTime<Utc>) -> bool {
    modtime < date + TimeDelta::seconds(1)
}

/// `If-Unmodified-Since`
pub fn check_if_unmodified_since(
    req: RequestHeaders<'_>,
    modtime: Option<DateTime<Utc>>,
) -> Condition {
    let Some(ius) = req.if_unmodified_since() else {
        return Condition::None;
    };
    let Some(modtime) = modtime.filter(|_| !is_zero_time(modtime)) else {
        return Condition::None;
    };
    match parse_http_date(ius) {
        Ok(date) if unmodified_since(modtime, date) => Condition::True,
        Ok(_) => Condition::False,
        Err(_) => Condition::None,
    }
}

/// `If-Modified-Since`, only meaningful for GET and HEAD
pub fn check_if_modified_since(
    method: &Method,
    req: RequestHeaders<'_>,
    modtime: Option<DateTime<Utc>>,
) -> Condition {
    if !is_get_or_head(method) {
        return Condition::None;
    }
    let Some(ims) = req.if_modified_since() else {
        return Condition::None;
    };
    let Some(modtime) = modtime.filter(|_| !is_zero_time(modtime)) else {
        return Condition::None;
    };
    match parse_http_date(ims) {
        Ok(date) if unmodified_since(modtime, date) => Condition::False,
        Ok(_) => Condition::True,
        Err(_) => Condition::None,
    }
}

/// `If-Range`: an entity-tag needs a strong match, a date must equal the
/// modification time to the second.
pub fn check_if_range(
    method: &Method,
    req: RequestHeaders<'_>,
    etag: &str,
    modtime: Option<DateTime<Utc>>,
) -> Condition {
    if !is_get_or_head(method) {
        return Condition::None;
    }
    let Some(ir) = req.if_range() else {
        return Condition::None;
    };

    let (candidate, _) = scan_etag(ir);
    if !candidate.is_empty() {
        return if etag_strong_match(candidate, etag) {
            Condition::True
        } else {
            Condition::False
        };
    }

    // The value may also be the Last-Modified date
    let Some(modtime) = modtime else {
        return Condition::False;
    };
    match parse_http_date(ir) {
        Ok(date) if date.timestamp() == modtime.timestamp() => Condition::True,
        _ => Condition::False,
    }
}

/// Strip representation headers for a 304, keeping only the primary validator
pub fn write_not_modified(headers: &mut HeaderMap) {
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);
    if !response_header(headers, &header::ETAG).is_empty() {
        headers.remove(header::LAST_MODIFIED);
    }
}

/// Evaluate all preconditions in the order mandated by RFC 7232 §6
pub fn check_preconditions<'a>(
    method: &Method,
    req: RequestHeaders<'a>,
    response_headers: &mut HeaderMap,
    modtime: Option<DateTime<Utc>>,
) -> Precondition<'a> {
    let etag = response_header(response_headers, &header::ETAG).to_owned();

    let mut cond = check_if_match(req, &etag);
    if cond == Condition::None {
        cond = check_if_unmodified_since(req, modtime);
    }
    if cond == Condition::False {
        return Precondition::Respond(StatusCode::PRECONDITION_FAILED);
    }

    match check_if_none_match(req, &etag) {
        Condition::False => {
            if is_get_or_head(method) {
                write_not_modified(response_headers);
                return Precondition::Respond(StatusCode::NOT_MODIFIED);
            }
            return Precondition::Respond(StatusCode::PRECONDITION_FAILED);
        }
        Condition::None => {
            if check_if_modified_since(method, req, modtime) == Condition::False {
                write_not_modified(response_headers);
                return Precondition::Respond(StatusCode::NOT_MODIFIED);
            }
        }
        Condition::True => {}
    }

    let range = req
        .range()
        .filter(|_| check_if_range(method, req, &etag, modtime) != Condition::False);
    Precondition::Proceed { range }
}
