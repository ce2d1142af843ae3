//! Upload receiver
//!
//! `POST` a `multipart/form-data` body with a `name` field (target path,
//! relative to the served root) and a `data` field (file contents).

use std::io;
use std::path::{Path, PathBuf};

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderMap};
use hyper::{Method, Request, Response, StatusCode};
use tokio::fs;

use crate::error::UploadError;
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::resource::DirProvider;

/// One decoded form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub data: Bytes,
}

/// Handle an upload request against the provider's root
pub async fn handle_upload<B>(
    req: Request<B>,
    provider: &DirProvider,
    max_body_size: u64,
) -> Response<ResponseBody>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.method() != Method::POST {
        return http::build_404_response();
    }

    match receive(req, provider, max_body_size).await {
        Ok(path) => {
            logger::log_info(&format!("Saved upload to {}", path.display()));
            http::build_status_response(StatusCode::CREATED)
        }
        Err(e @ UploadError::PayloadTooLarge { .. }) => {
            logger::log_warning(&e.to_string());
            http::build_status_response(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Err(e @ (UploadError::BadRequest(_) | UploadError::Body(_))) => {
            logger::log_warning(&e.to_string());
            http::build_status_response(StatusCode::BAD_REQUEST)
        }
        Err(UploadError::Io(e)) => {
            logger::log_error(&format!("Failed to store upload: {e}"));
            http::build_status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn receive<B>(
    req: Request<B>,
    provider: &DirProvider,
    max_body_size: u64,
) -> Result<PathBuf, UploadError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    check_declared_length(req.headers(), max_body_size)?;
    let boundary = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(form_boundary)
        .ok_or_else(|| UploadError::BadRequest("expected multipart/form-data".into()))?;

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                UploadError::PayloadTooLarge {
                    limit: max_body_size,
                }
            } else {
                UploadError::Body(e.to_string())
            }
        })?
        .to_bytes();

    let parts = parse_form_data(&body, &boundary)?;
    let field = |name: &str| parts.iter().find(|p| p.name == name);
    let name = field("name")
        .map(|p| String::from_utf8_lossy(&p.data).trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| UploadError::BadRequest("missing 'name' field".into()))?;
    let data = field("data")
        .ok_or_else(|| UploadError::BadRequest("missing 'data' field".into()))?;

    let target = provider
        .resolve(&name)
        .map_err(|_| UploadError::BadRequest(format!("invalid target name {name:?}")))?;
    if target == provider.root() {
        return Err(UploadError::BadRequest(format!(
            "invalid target name {name:?}"
        )));
    }

    create_parents(provider.root(), &target).await?;
    fs::write(&target, &data.data).await?;
    Ok(target)
}

/// Reject early when `Content-Length` already exceeds the limit
fn check_declared_length(headers: &HeaderMap, max_body_size: u64) -> Result<(), UploadError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match declared {
        Some(size) if size > max_body_size => Err(UploadError::PayloadTooLarge {
            limit: max_body_size,
        }),
        _ => Ok(()),
    }
}

/// Create each missing directory between `root` and `target`, one level at
/// a time
async fn create_parents(root: &Path, target: &Path) -> io::Result<()> {
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    let Ok(relative) = parent.strip_prefix(root) else {
        return fs::create_dir_all(parent).await;
    };

    let mut dir = root.to_path_buf();
    for component in relative.components() {
        dir.push(component);
        match fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Boundary parameter of a `multipart/form-data` content type
pub fn form_boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let media = params.next()?.trim();
    if !media.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
}

/// Split a `multipart/form-data` body into its parts
pub fn parse_form_data(body: &[u8], boundary: &str) -> Result<Vec<FormPart>, UploadError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let bad = |msg: &str| UploadError::BadRequest(format!("malformed multipart body: {msg}"));

    let mut pos =
        find(body, delimiter, 0).ok_or_else(|| bad("no opening boundary"))? + delimiter.len();
    let mut parts = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(bad("boundary not followed by CRLF"));
        }
        let head_start = pos + 2;
        let head_end = find(body, b"\r\n\r\n", head_start)
            .ok_or_else(|| bad("unterminated part headers"))?;
        let head = std::str::from_utf8(&body[head_start..head_end])
            .map_err(|_| bad("non-UTF-8 part headers"))?;

        let data_start = head_end + 4;
        let mut closing = Vec::with_capacity(delimiter.len() + 2);
        closing.extend_from_slice(b"\r\n");
        closing.extend_from_slice(delimiter);
        let data_end =
            find(body, &closing, data_start).ok_or_else(|| bad("missing closing boundary"))?;

        let (name, filename) = disposition(head).ok_or_else(|| bad("part without form-data name"))?;
        parts.push(FormPart {
            name,
            filename,
            data: Bytes::copy_from_slice(&body[data_start..data_end]),
        });
        pos = data_end + closing.len();
    }
}

/// `name` and `filename` from a part's `Content-Disposition` line
fn disposition(head: &str) -> Option<(String, Option<String>)> {
    let line = head.split("\r\n").find_map(|l| {
        let (key, value) = l.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-disposition")
            .then_some(value)
    })?;

    let mut name = None;
    let mut filename = None;
    for param in line.split(';').skip(1) {
        if let Some((k, v)) = param.trim().split_once('=') {
            let v = v.trim().trim_matches('"').to_string();
            match k.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(v),
                "filename" => filename = Some(v),
                _ => {}
            }
        }
    }
    name.map(|n| (n, filename))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn form(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn request(method: Method, body: Vec<u8>) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    #[test]
    fn test_form_boundary() {
        assert_eq!(
            form_boundary("multipart/form-data; boundary=abc").as_deref(),
            Some("abc")
        );
        assert_eq!(
            form_boundary("Multipart/Form-Data; charset=utf-8; boundary=\"q r\"").as_deref(),
            Some("q r")
        );
        assert_eq!(form_boundary("application/json"), None);
        assert_eq!(form_boundary("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_form_data() {
        let body = form(&[
            ("name", None, b"dir/a.bin"),
            ("data", Some("a.bin"), b"\x00\r\n--not-a-boundary\xff"),
        ]);
        let parts = parse_form_data(&body, BOUNDARY).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "name");
        assert_eq!(parts[0].data, "dir/a.bin");
        assert_eq!(parts[1].filename.as_deref(), Some("a.bin"));
        assert_eq!(parts[1].data.as_ref(), b"\x00\r\n--not-a-boundary\xff");
    }

    #[test]
    fn test_parse_form_data_malformed() {
        assert!(parse_form_data(b"garbage", BOUNDARY).is_err());
        let truncated =
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\nabc");
        assert!(parse_form_data(truncated.as_bytes(), BOUNDARY).is_err());
    }

    #[tokio::test]
    async fn test_upload_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirProvider::new(dir.path());
        let body = form(&[("name", None, b"a/b/c.txt"), ("data", Some("c.txt"), b"payload")]);

        let resp = handle_upload(request(Method::POST, body), &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            std::fs::read(dir.path().join("a/b/c.txt")).unwrap(),
            b"payload"
        );

        // Parents that already exist are fine
        let body = form(&[("name", None, b"a/d.txt"), ("data", None, b"x")]);
        let resp = handle_upload(request(Method::POST, body), &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirProvider::new(dir.path());

        let body = form(&[("name", None, b"x.txt"), ("data", None, b"x")]);
        let resp = handle_upload(request(Method::GET, body), &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = form(&[("name", None, b"x.txt"), ("data", None, &[7u8; 64])]);
        let resp = handle_upload(request(Method::POST, body), &provider, 32).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = form(&[("data", None, b"x")]);
        let resp = handle_upload(request(Method::POST, body), &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = form(&[("name", None, b"../escape.txt"), ("data", None, b"x")]);
        let resp = handle_upload(request(Method::POST, body), &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());

        let plain = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from_static(b"hi")))
            .unwrap();
        let resp = handle_upload(plain, &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_declared_length_checked_first() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirProvider::new(dir.path());
        let mut req = request(Method::POST, Vec::new());
        req.headers_mut()
            .insert(header::CONTENT_LENGTH, "999999".parse().unwrap());
        let resp = handle_upload(req, &provider, 1024).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
