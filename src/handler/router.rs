//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method checks,
//! the `Server` header and the access log line.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response};

use super::{files, upload};
use crate::config::AppState;
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Where a request path leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Files,
    Upload,
    Fallback,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let logging = &state.config.logging;
    let mut entry = logging.access_log.then(|| {
        AccessLogEntry::new(remote_addr.to_string(), req.method(), req.uri(), req.version())
            .with_request_headers(req.headers())
    });

    let mut resp = route_request(req, &state).await;

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        resp.headers_mut().insert(header::SERVER, server);
    }

    if let Some(entry) = entry.as_mut() {
        entry.set_response(resp.status().as_u16(), resp.headers());
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &logging.access_log_format);
    }
    Ok(resp)
}

async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let files_cfg = &state.config.files;
    match match_route(req.uri().path(), &files_cfg.url_prefix, &files_cfg.upload_path) {
        Route::Files => match *req.method() {
            Method::GET | Method::HEAD => {
                files::serve_files(
                    &state.provider,
                    &state.responder,
                    &files_cfg.url_prefix,
                    req.method(),
                    req.uri().path(),
                    req.headers(),
                )
                .await
            }
            Method::OPTIONS => http::build_options_response(),
            _ => {
                logger::log_warning(&format!("Method not allowed: {}", req.method()));
                http::build_405_response()
            }
        },
        Route::Upload => {
            upload::handle_upload(req, &state.provider, state.config.http.max_body_size).await
        }
        Route::Fallback => http::build_redirect_response(&format!("{}/", files_cfg.url_prefix)),
    }
}

fn match_route(path: &str, files_prefix: &str, upload_prefix: &str) -> Route {
    if has_prefix(path, files_prefix) {
        Route::Files
    } else if has_prefix(path, upload_prefix) {
        Route::Upload
    } else {
        Route::Fallback
    }
}

/// `prefix` itself or anything below it, but not `/filesX`
fn has_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;
    use hyper::StatusCode;

    fn state(root: &std::path::Path) -> Arc<AppState> {
        let mut cfg = Config::load_from("does-not-exist-anywhere").unwrap();
        cfg.files.root = root.to_string_lossy().into_owned();
        cfg.logging.access_log = false;
        Arc::new(AppState::new(&cfg))
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Response<ResponseBody> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(Full::new(body)).unwrap();
        handle_request(req, Arc::clone(state), addr()).await.unwrap()
    }

    #[test]
    fn test_match_route() {
        assert_eq!(match_route("/files", "/files", "/upload"), Route::Files);
        assert_eq!(match_route("/files/a/b", "/files", "/upload"), Route::Files);
        assert_eq!(match_route("/filesystem", "/files", "/upload"), Route::Fallback);
        assert_eq!(match_route("/upload", "/files", "/upload"), Route::Upload);
        assert_eq!(match_route("/", "/files", "/upload"), Route::Fallback);
    }

    #[tokio::test]
    async fn test_fallback_redirects_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let resp = send(&st, Method::GET, "/elsewhere", Bytes::new(), None).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::LOCATION], "/files/");
        assert_eq!(resp.headers()[header::SERVER], "rust_fileserver");
    }

    #[tokio::test]
    async fn test_method_handling_under_files() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());

        let resp = send(&st, Method::OPTIONS, "/files/", Bytes::new(), None).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[header::ALLOW], "GET, HEAD, OPTIONS");

        let resp = send(&st, Method::DELETE, "/files/x", Bytes::new(), None).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_upload_then_download_range() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());

        let body = "--B\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nnew/file.txt\r\n\
                    --B\r\nContent-Disposition: form-data; name=\"data\"; filename=\"file.txt\"\r\n\r\n\
                    abcdefghij\r\n--B--\r\n";
        let resp = send(
            &st,
            Method::POST,
            "/upload",
            Bytes::from_static(body.as_bytes()),
            Some("multipart/form-data; boundary=B"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = Request::builder()
            .uri("/files/new/file.txt")
            .header(header::RANGE, "bytes=2-4")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = handle_request(req, Arc::clone(&st), addr()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 2-4/10");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "cde");
    }

    #[tokio::test]
    async fn test_upload_requires_post() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let resp = send(&st, Method::GET, "/upload", Bytes::new(), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
