//! Response body module
//!
//! One `hyper` body type for every response the server produces: empty,
//! in-memory, streamed straight from a reader, or fed by a producer task
//! through a bounded channel.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use hyper::body::{Body, Bytes, Frame, SizeHint};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// Default read size for streamed bodies
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Boxed source for reader-backed bodies
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Body of every server response
pub enum ResponseBody {
    Empty,
    Full(Option<Bytes>),
    Reader(ReaderBody),
    /// Receiving end of a producer task; dropping it cancels the producer
    Channel(mpsc::Receiver<io::Result<Bytes>>),
}

impl ResponseBody {
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// Stream exactly `limit` bytes from `reader`, or everything up to EOF
    /// when the length is unknown
    pub fn reader(reader: BoxReader, limit: Option<u64>, chunk_size: usize) -> Self {
        Self::Reader(ReaderBody {
            reader,
            remaining: limit,
            buf: vec![0; chunk_size.max(1)],
        })
    }

    pub const fn channel(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self::Channel(rx)
    }
}

impl From<Bytes> for ResponseBody {
    fn from(data: Bytes) -> Self {
        Self::Full(Some(data))
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        Self::Full(Some(Bytes::from(text)))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(text: &'static str) -> Self {
        Self::Full(Some(Bytes::from_static(text.as_bytes())))
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Empty => Poll::Ready(None),
            Self::Full(data) => Poll::Ready(
                data.take()
                    .filter(|d| !d.is_empty())
                    .map(|d| Ok(Frame::data(d))),
            ),
            Self::Reader(body) => body.poll_chunk(cx).map(|c| c.map(|r| r.map(Frame::data))),
            Self::Channel(rx) => rx.poll_recv(cx).map(|c| c.map(|r| r.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Full(data) => data.as_ref().map_or(true, Bytes::is_empty),
            Self::Reader(body) => body.remaining == Some(0),
            Self::Channel(_) => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Empty => SizeHint::with_exact(0),
            Self::Full(data) => {
                SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64))
            }
            // Upper bound only: hyper turns an exact hint into Content-Length,
            // which the caller may have deliberately left out
            Self::Reader(ReaderBody {
                remaining: Some(n), ..
            }) => {
                let mut hint = SizeHint::new();
                hint.set_upper(*n);
                hint
            }
            Self::Reader(_) | Self::Channel(_) => SizeHint::default(),
        }
    }
}

/// Reader-backed body bounded by an optional byte budget
pub struct ReaderBody {
    reader: BoxReader,
    remaining: Option<u64>,
    buf: Vec<u8>,
}

impl ReaderBody {
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let want = match self.remaining {
            Some(0) => return Poll::Ready(None),
            #[allow(clippy::cast_possible_truncation)]
            Some(n) => n.min(self.buf.len() as u64) as usize,
            None => self.buf.len(),
        };

        let mut read_buf = ReadBuf::new(&mut self.buf[..want]);
        if let Err(e) = ready!(Pin::new(&mut self.reader).poll_read(cx, &mut read_buf)) {
            self.remaining = Some(0);
            return Poll::Ready(Some(Err(e)));
        }

        let filled = read_buf.filled();
        if filled.is_empty() {
            return match self.remaining.replace(0) {
                // Content shrank underneath us; a short body must not look complete
                Some(n) => Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("content ended with {n} bytes left to send"),
                )))),
                None => Poll::Ready(None),
            };
        }

        let chunk = Bytes::copy_from_slice(filled);
        if let Some(n) = self.remaining.as_mut() {
            *n -= chunk.len() as u64;
        }
        Poll::Ready(Some(Ok(chunk)))
    }
}
