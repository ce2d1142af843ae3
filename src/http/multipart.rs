//! `multipart/byteranges` encoding (RFC 7233 Appendix A)
//!
//! The exact encoded size is computed up front by writing every part header
//! through a counting sink, so the response can carry a `Content-Length`.
//! The body itself is produced by a spawned task that feeds a bounded
//! channel; when the consumer goes away the next send fails and the task
//! ends, releasing the resource it owns.

use std::fmt::Write as _;
use std::io::{self, Write};

use hyper::body::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio::sync::mpsc;

use super::range::ByteRange;
use crate::error::ServeError;
use crate::logger;

/// `std::io::Write` sink that only counts what passes through it
#[derive(Debug, Default)]
pub struct CountingWriter(pub u64);

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Part framing shared by the size computation and the producer
#[derive(Debug, Clone)]
pub struct ByteRangesEncoder {
    boundary: String,
    content_type: String,
    size: u64,
}

impl ByteRangesEncoder {
    /// New encoder with a freshly generated boundary
    pub fn new(content_type: &str, size: u64) -> Self {
        Self::with_boundary(random_boundary(), content_type, size)
    }

    pub fn with_boundary(boundary: String, content_type: &str, size: u64) -> Self {
        Self {
            boundary,
            content_type: content_type.to_string(),
            size,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the response `Content-Type` header
    pub fn multipart_content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Delimiter plus header block opening part number `index`
    pub fn write_part_header(
        &self,
        w: &mut impl Write,
        index: usize,
        range: &ByteRange,
    ) -> io::Result<()> {
        if index > 0 {
            w.write_all(b"\r\n")?;
        }
        write!(
            w,
            "--{}\r\nContent-Range: {}\r\nContent-Type: {}\r\n\r\n",
            self.boundary,
            range.content_range(self.size),
            self.content_type
        )
    }

    pub fn write_closing(&self, w: &mut impl Write) -> io::Result<()> {
        write!(w, "\r\n--{}--\r\n", self.boundary)
    }

    /// Exact byte length of the encoded body for `ranges`
    pub fn encoded_size(&self, ranges: &[ByteRange]) -> u64 {
        let mut counter = CountingWriter::default();
        let mut payload = 0;
        for (index, range) in ranges.iter().enumerate() {
            // CountingWriter never fails
            let _ = self.write_part_header(&mut counter, index, range);
            payload += range.length;
        }
        let _ = self.write_closing(&mut counter);
        counter.0 + payload
    }

    /// Spawn the producer task and return the channel it writes into
    pub fn spawn<R>(
        self,
        content: R,
        ranges: Vec<ByteRange>,
        chunk_size: usize,
        capacity: usize,
    ) -> mpsc::Receiver<io::Result<Bytes>>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(async move {
            match self.produce(content, &ranges, chunk_size, &tx).await {
                Ok(()) => {}
                Err(ServeError::ClientAbort) => {
                    logger::log_debug("multipart producer stopped: client went away");
                }
                Err(e) => {
                    logger::log_warning(&format!("multipart producer failed: {e}"));
                    let _ = tx.send(Err(e.into_io())).await;
                }
            }
        });
        rx
    }

    async fn produce<R>(
        &self,
        mut content: R,
        ranges: &[ByteRange],
        chunk_size: usize,
        tx: &mpsc::Sender<io::Result<Bytes>>,
    ) -> Result<(), ServeError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let mut buf = vec![0; chunk_size.max(1)];
        for (index, range) in ranges.iter().enumerate() {
            let mut header = Vec::new();
            self.write_part_header(&mut header, index, range)?;
            send(tx, Bytes::from(header)).await?;

            content.seek(io::SeekFrom::Start(range.start)).await?;
            let mut remaining = range.length;
            while remaining > 0 {
                #[allow(clippy::cast_possible_truncation)]
                let want = remaining.min(buf.len() as u64) as usize;
                let n = content.read(&mut buf[..want]).await?;
                if n == 0 {
                    return Err(ServeError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("content ended inside range starting at {}", range.start),
                    )));
                }
                send(tx, Bytes::copy_from_slice(&buf[..n])).await?;
                remaining -= n as u64;
            }
        }

        let mut closing = Vec::new();
        self.write_closing(&mut closing)?;
        send(tx, Bytes::from(closing)).await
    }
}

async fn send(tx: &mpsc::Sender<io::Result<Bytes>>, chunk: Bytes) -> Result<(), ServeError> {
    tx.send(Ok(chunk))
        .await
        .map_err(|_| ServeError::ClientAbort)
}

/// 30 random bytes as 60 hex characters
fn random_boundary() -> String {
    let mut boundary = String::with_capacity(60);
    for _ in 0..30 {
        let _ = write!(boundary, "{:02x}", fastrand::u8(..));
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn ranges() -> Vec<ByteRange> {
        vec![
            ByteRange {
                start: 0,
                length: 1,
            },
            ByteRange {
                start: 2,
                length: 2,
            },
        ]
    }

    async fn drain(mut rx: mpsc::Receiver<io::Result<Bytes>>) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[test]
    fn test_random_boundary_shape() {
        let b = random_boundary();
        assert_eq!(b.len(), 60);
        assert!(b.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(b, random_boundary());
    }

    #[tokio::test]
    async fn test_encoded_body_layout() {
        let encoder = ByteRangesEncoder::with_boundary("XYZ".into(), "text/plain", 10);
        let rx = encoder.spawn(Cursor::new(b"0123456789".to_vec()), ranges(), 4, 1);
        let body = String::from_utf8(drain(rx).await.unwrap()).unwrap();
        assert_eq!(
            body,
            "--XYZ\r\nContent-Range: bytes 0-0/10\r\nContent-Type: text/plain\r\n\r\n0\
             \r\n--XYZ\r\nContent-Range: bytes 2-3/10\r\nContent-Type: text/plain\r\n\r\n23\
             \r\n--XYZ--\r\n"
        );
    }

    #[tokio::test]
    async fn test_encoded_size_matches_output() {
        let encoder = ByteRangesEncoder::new("application/octet-stream", 10);
        let expected = encoder.encoded_size(&ranges());
        let rx = encoder.spawn(Cursor::new(b"0123456789".to_vec()), ranges(), 1, 2);
        assert_eq!(drain(rx).await.unwrap().len() as u64, expected);
    }

    #[tokio::test]
    async fn test_short_content_surfaces_error() {
        let encoder = ByteRangesEncoder::new("text/plain", 10);
        let rx = encoder.spawn(Cursor::new(b"01".to_vec()), ranges(), 4, 1);
        assert!(drain(rx).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_producer() {
        let data = vec![7u8; 1 << 20];
        let all = vec![ByteRange {
            start: 0,
            length: data.len() as u64,
        }; 4];
        let (tx_done, rx_done) = tokio::sync::oneshot::channel::<()>();

        struct Tracked(Cursor<Vec<u8>>, Option<tokio::sync::oneshot::Sender<()>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                if let Some(tx) = self.1.take() {
                    let _ = tx.send(());
                }
            }
        }
        impl AsyncRead for Tracked {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::pin::Pin::new(&mut self.0).poll_read(cx, buf)
            }
        }
        impl AsyncSeek for Tracked {
            fn start_seek(mut self: std::pin::Pin<&mut Self>, pos: io::SeekFrom) -> io::Result<()> {
                std::pin::Pin::new(&mut self.0).start_seek(pos)
            }
            fn poll_complete(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<u64>> {
                std::pin::Pin::new(&mut self.0).poll_complete(cx)
            }
        }

        let encoder = ByteRangesEncoder::new("text/plain", data.len() as u64);
        let mut rx = encoder.spawn(Tracked(Cursor::new(data), Some(tx_done)), all, 1024, 1);
        assert!(rx.recv().await.is_some());
        drop(rx);

        // The producer must notice and release the resource
        tokio::time::timeout(Duration::from_secs(5), rx_done)
            .await
            .expect("producer did not stop")
            .unwrap();
    }
}
