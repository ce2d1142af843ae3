//! Request-scoped error types
//!
//! None of these ever stop the server; each maps to the response (or the
//! aborted body) of the single request that raised it.

use std::io;

use crate::http::range::RangeError;

/// Failures while negotiating or streaming file content
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Unparseable `Range` syntax
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),
    /// Valid `Range` syntax but no byte of the resource selected
    #[error("range not satisfiable for {size} bytes")]
    NoOverlap { size: u64 },
    /// The resource could not be opened or inspected
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(#[source] io::Error),
    /// The consumer stopped reading the response body
    #[error("client aborted the response")]
    ClientAbort,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServeError {
    pub const fn from_range(err: RangeError, size: u64) -> Self {
        match err {
            RangeError::Invalid => Self::MalformedHeader("Range"),
            RangeError::NoOverlap => Self::NoOverlap { size },
        }
    }

    /// Convert into an I/O error suitable for aborting a response body
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(e) | Self::ResourceUnavailable(e) => e,
            Self::ClientAbort => io::Error::new(io::ErrorKind::BrokenPipe, "client aborted"),
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Failures while receiving an upload
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("bad upload request: {0}")]
    BadRequest(String),
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
