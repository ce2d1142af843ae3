//! HTTP protocol layer module
//!
//! Conditional requests, byte ranges, content typing and response bodies,
//! decoupled from routing and from where the bytes come from.

pub mod body;
pub mod headers;
pub mod mime;
pub mod multipart;
pub mod precondition;
pub mod range;
pub mod response;
pub mod validators;

// Re-export commonly used types
pub use body::ResponseBody;
pub use headers::RequestHeaders;
pub use range::{parse_range, ByteRange, RangeError};
pub use response::{
    build_404_response, build_405_response, build_416_response, build_html_response,
    build_options_response, build_redirect_response, build_status_response,
};
