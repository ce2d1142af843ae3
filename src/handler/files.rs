//! File tree handler
//!
//! Maps a request path under the browse prefix onto the resource provider:
//! directories render a listing, files go through the content responder.

use std::io;

use hyper::header::HeaderMap;
use hyper::{Method, Response, StatusCode};

use super::content::ContentResponder;
use super::listing;
use crate::error::ServeError;
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::resource::ResourceProvider;

/// Serve `raw_path`, which starts with `prefix`
pub async fn serve_files<P: ResourceProvider>(
    provider: &P,
    responder: &ContentResponder,
    prefix: &str,
    method: &Method,
    raw_path: &str,
    request_headers: &HeaderMap,
) -> Response<ResponseBody> {
    let path = percent_decode(raw_path);
    let name = path.get(prefix.len()..).unwrap_or_default();
    if name.is_empty() {
        return http::build_redirect_response(&format!("{raw_path}/"));
    }

    let resource = match provider.open(name).await {
        Ok(resource) => resource,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            logger::log_debug(&format!("Not found: {name}"));
            return http::build_404_response();
        }
        Err(e) => {
            let err = ServeError::ResourceUnavailable(e);
            logger::log_warning(&format!("'{name}': {err}"));
            return http::build_status_response(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    let trailing_slash = name.ends_with('/');
    if resource.info.is_dir && !trailing_slash {
        return http::build_redirect_response(&format!("{raw_path}/"));
    }
    if !resource.info.is_dir && trailing_slash {
        return http::build_redirect_response(raw_path.trim_end_matches('/'));
    }

    if resource.info.is_dir {
        drop(resource);
        return match provider.list(name).await {
            Ok(entries) => http::build_html_response(
                listing::render_listing(&path, &entries),
                method == Method::HEAD,
            ),
            Err(e) => {
                logger::log_warning(&format!("Failed to list '{name}': {e}"));
                http::build_status_response(StatusCode::SERVICE_UNAVAILABLE)
            }
        };
    }

    responder
        .serve(method, request_headers, HeaderMap::new(), resource)
        .await
}

/// Decode `%XX` escapes; malformed escapes are kept as written
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push((h << 4) | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DirProvider;
    use http_body_util::BodyExt;
    use hyper::header;

    struct Fixture {
        _dir: tempfile::TempDir,
        provider: DirProvider,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();
        std::fs::write(dir.path().join("with space.txt"), b"spaced").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/readme.md"), b"# readme").unwrap();
        let provider = DirProvider::new(dir.path());
        Fixture {
            _dir: dir,
            provider,
        }
    }

    async fn get(fx: &Fixture, path: &str, headers: &HeaderMap) -> Response<ResponseBody> {
        serve_files(
            &fx.provider,
            &ContentResponder::default(),
            "/files",
            &Method::GET,
            path,
            headers,
        )
        .await
    }

    fn location(resp: &Response<ResponseBody>) -> &str {
        resp.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_serves_file() {
        let fx = fixture();
        let resp = get(&fx, "/files/hello.txt", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "11");
        assert!(resp.headers().contains_key(header::LAST_MODIFIED));
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "hello world");
    }

    #[tokio::test]
    async fn test_range_through_provider() {
        let fx = fixture();
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, "bytes=6-".parse().unwrap());
        let resp = get(&fx, "/files/hello.txt", &headers).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 6-10/11");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "world");
    }

    #[tokio::test]
    async fn test_percent_encoded_name() {
        let fx = fixture();
        let resp = get(&fx, "/files/with%20space.txt", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_is_404() {
        let fx = fixture();
        let resp = get(&fx, "/files/nope.txt", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = get(&fx, "/files/../etc/passwd", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slash_redirects() {
        let fx = fixture();
        let resp = get(&fx, "/files", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(location(&resp), "/files/");

        let resp = get(&fx, "/files/docs", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(location(&resp), "/files/docs/");

        let resp = get(&fx, "/files/hello.txt/", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(location(&resp), "/files/hello.txt");
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let fx = fixture();
        let resp = get(&fx, "/files/", &HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("href=\"/files/docs/\""));
        assert!(html.contains("href=\"/files/hello.txt\""));
        assert!(html.contains("href=\"/files/with%20space.txt\""));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("/a%20b/%E2%9C%93"), "/a b/\u{2713}");
        assert_eq!(percent_decode("/100%"), "/100%");
        assert_eq!(percent_decode("/%zz"), "/%zz");
        assert_eq!(percent_decode("/%4"), "/%4");
    }
}
