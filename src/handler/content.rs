//! Content responder
//!
//! Serves one readable, seekable resource for a GET or HEAD request:
//! validators, preconditions, content typing, byte ranges and the body.

use chrono::{DateTime, Utc};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::error::ServeError;
use crate::http::body::{ResponseBody, DEFAULT_CHUNK_SIZE};
use crate::http::headers::{response_header, RequestHeaders};
use crate::http::mime::{self, SNIFF_LEN};
use crate::http::multipart::ByteRangesEncoder;
use crate::http::precondition::{check_preconditions, Precondition};
use crate::http::range::{parse_range, sum_ranges_size, ByteRange};
use crate::http::validators::{format_http_date, is_zero_time};
use crate::http::{build_416_response, build_status_response};
use crate::logger;
use crate::resource::OpenResource;

/// Tunables for content serving, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    /// Bytes inspected when the type must be sniffed
    pub sniff_len: usize,
    /// Read size for streamed bodies
    pub chunk_size: usize,
    /// Chunks buffered between the multipart producer and the connection
    pub channel_capacity: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            sniff_len: SNIFF_LEN,
            chunk_size: DEFAULT_CHUNK_SIZE,
            channel_capacity: 8,
        }
    }
}

/// How the body will be produced
enum BodyPlan {
    Full,
    Single,
    Multi(ByteRangesEncoder, Vec<ByteRange>),
}

/// Decides between 200, 206, 304, 412 and 416 and builds the response
#[derive(Debug, Clone, Default)]
pub struct ContentResponder {
    options: ServeOptions,
}

impl ContentResponder {
    pub const fn new(options: ServeOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &ServeOptions {
        &self.options
    }

    /// Respond to `method` with `resource`
    ///
    /// `headers` holds response headers the caller already decided on; an
    /// `ETag`, `Content-Type` or `Content-Encoding` placed there is honoured.
    /// The resource is dropped on every early return, or handed to the body.
    pub async fn serve<R>(
        &self,
        method: &Method,
        request_headers: &HeaderMap,
        mut headers: HeaderMap,
        resource: OpenResource<R>,
    ) -> Response<ResponseBody>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let OpenResource { mut content, info } = resource;
        let modtime = info.modified;

        if let Some(value) = last_modified(modtime) {
            set_header(&mut headers, header::LAST_MODIFIED, &value);
        }

        let range = match check_preconditions(
            method,
            RequestHeaders::new(request_headers),
            &mut headers,
            modtime,
        ) {
            Precondition::Respond(status) => {
                logger::log_debug(&format!("{} short-circuited with {status}", info.name));
                return finish(status, headers, ResponseBody::empty());
            }
            Precondition::Proceed { range } => range,
        };

        let ctype = match self
            .resolve_content_type(&mut headers, &info.name, &mut content)
            .await
        {
            Ok(ctype) => ctype,
            Err(e) => return internal_error(&info.name, &e),
        };

        let mut status = StatusCode::OK;
        let mut send_size = info.size;
        let mut plan = BodyPlan::Full;

        if let Some(size) = info.size {
            let mut ranges = match parse_range(range, size) {
                Ok(ranges) => ranges,
                Err(e) => {
                    let err = ServeError::from_range(e, size);
                    logger::log_debug(&format!("{}: {err}", info.name));
                    let mut resp = match err {
                        ServeError::NoOverlap { size } => build_416_response(Some(size)),
                        _ => build_416_response(None),
                    };
                    keep_validators(&headers, resp.headers_mut());
                    return resp;
                }
            };

            if sum_ranges_size(&ranges) > size {
                // More bytes than the whole file: a confused client or an
                // attack. Serve the representation instead.
                ranges.clear();
            }

            match ranges.len() {
                0 => {}
                1 => {
                    let ra = ranges[0];
                    if let Err(e) = content.seek(std::io::SeekFrom::Start(ra.start)).await {
                        return internal_error(&info.name, &ServeError::Io(e));
                    }
                    send_size = Some(ra.length);
                    status = StatusCode::PARTIAL_CONTENT;
                    set_header(&mut headers, header::CONTENT_RANGE, &ra.content_range(size));
                    plan = BodyPlan::Single;
                }
                _ => {
                    let encoder = ByteRangesEncoder::new(&ctype, size);
                    send_size = Some(encoder.encoded_size(&ranges));
                    status = StatusCode::PARTIAL_CONTENT;
                    set_header(
                        &mut headers,
                        header::CONTENT_TYPE,
                        &encoder.multipart_content_type(),
                    );
                    plan = BodyPlan::Multi(encoder, ranges);
                }
            }

            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            if !headers.contains_key(header::CONTENT_ENCODING) {
                if let Some(n) = send_size {
                    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(n));
                }
            }
        }

        if method == Method::HEAD {
            return finish(status, headers, ResponseBody::empty());
        }

        let body = match plan {
            BodyPlan::Multi(encoder, ranges) => ResponseBody::channel(encoder.spawn(
                content,
                ranges,
                self.options.chunk_size,
                self.options.channel_capacity,
            )),
            BodyPlan::Single | BodyPlan::Full => {
                ResponseBody::reader(Box::new(content), send_size, self.options.chunk_size)
            }
        };
        finish(status, headers, body)
    }

    /// Keep a caller-set type, else go by extension, else sniff the content
    /// and rewind it
    async fn resolve_content_type<R>(
        &self,
        headers: &mut HeaderMap,
        name: &str,
        content: &mut R,
    ) -> Result<String, ServeError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        if headers.contains_key(header::CONTENT_TYPE) {
            return Ok(response_header(headers, &header::CONTENT_TYPE).to_string());
        }

        let ctype = match mime::content_type_by_extension(name) {
            Some(ctype) => ctype,
            None => {
                let mut buf = vec![0; self.options.sniff_len];
                let mut filled = 0;
                while filled < buf.len() {
                    let n = content.read(&mut buf[filled..]).await?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                content.seek(std::io::SeekFrom::Start(0)).await?;
                mime::sniff_content_type(&buf[..filled])
            }
        };
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ctype));
        Ok(ctype.to_string())
    }
}

/// `Last-Modified` value for a modification time, unless it is the zero time
pub fn last_modified(modified: Option<DateTime<Utc>>) -> Option<String> {
    modified
        .filter(|_| !is_zero_time(modified))
        .map(format_http_date)
}

fn set_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => logger::log_warning(&format!("Dropping invalid {name} value {value:?}: {e}")),
    }
}

/// Copy `ETag` and `Last-Modified` onto a response built from scratch
fn keep_validators(from: &HeaderMap, to: &mut HeaderMap) {
    for name in [header::ETAG, header::LAST_MODIFIED] {
        if let Some(value) = from.get(&name) {
            to.insert(name, value.clone());
        }
    }
}

fn finish(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Response<ResponseBody> {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;
    resp
}

fn internal_error(name: &str, err: &ServeError) -> Response<ResponseBody> {
    logger::log_error(&format!("Failed to serve '{name}': {err}"));
    build_status_response(StatusCode::INTERNAL_SERVER_ERROR)
}
