//! HTTP response building module
//!
//! Builders for the fixed-form responses the handlers emit.

use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};

use super::body::ResponseBody;

/// Plain-text response carrying the status line as its body
pub fn build_status_response(status: StatusCode) -> Response<ResponseBody> {
    let text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, text.len())
        .body(ResponseBody::from(text))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            bare(status)
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_status_response(StatusCode::NOT_FOUND)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    let mut resp = build_status_response(StatusCode::METHOD_NOT_ALLOWED);
    resp.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
    resp
}

/// Build OPTIONS response for the file tree
pub fn build_options_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ALLOW, "GET, HEAD, OPTIONS")
        .header(header::ACCEPT_RANGES, "bytes")
        .body(ResponseBody::empty())
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::NO_CONTENT, &e);
            bare(StatusCode::NO_CONTENT)
        })
}

/// Build 416 Range Not Satisfiable response
///
/// `Content-Range: bytes */size` is only sent when the range was valid but
/// did not overlap the content.
pub fn build_416_response(unsatisfied_size: Option<u64>) -> Response<ResponseBody> {
    let mut resp = build_status_response(StatusCode::RANGE_NOT_SATISFIABLE);
    if let Some(size) = unsatisfied_size {
        if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
            resp.headers_mut().insert(header::CONTENT_RANGE, value);
        }
    }
    resp
}

/// Build 301 redirect response
pub fn build_redirect_response(target: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, target)
        .body(ResponseBody::empty())
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::MOVED_PERMANENTLY, &e);
            bare(StatusCode::MOVED_PERMANENTLY)
        })
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<ResponseBody> {
    let content_length = content.len();
    let body = if is_head {
        ResponseBody::empty()
    } else {
        ResponseBody::from(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CONTENT_LENGTH, content_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::OK, &e);
            bare(StatusCode::OK)
        })
}

fn bare(status: StatusCode) -> Response<ResponseBody> {
    let mut resp = Response::new(ResponseBody::empty());
    *resp.status_mut() = status;
    resp
}

/// Log response build error
fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
