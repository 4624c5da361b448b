//! In-process byte pipe connecting a producer task to a consumer task.
//!
//! Both endpoints are cheap to clone so a longer-lived owner (the connection
//! adapter) can keep handles while successive movers borrow them. A fault
//! captured at completion is surfaced to the reader once the buffered
//! segments have drained, so downstream always sees end-of-stream or the
//! original error instead of hanging.

use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Creates a pipe with room for `capacity` queued segments.
pub fn byte_pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity);
    let fault = Arc::new(Mutex::new(None));
    let writer = PipeWriter {
        tx,
        fault: Arc::clone(&fault),
    };
    let reader = PipeReader {
        inner: Arc::new(Mutex::new(ReaderInner {
            rx,
            pending: Bytes::new(),
            fault,
        })),
    };
    (writer, reader)
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "byte pipe closed")
}

#[derive(Clone)]
pub struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
    fault: Arc<Mutex<Option<io::Error>>>,
}

impl PipeWriter {
    /// Queues one segment, waiting for capacity. Fails once the reader side
    /// is gone or the pipe has been completed.
    pub async fn write(&mut self, segment: Bytes) -> io::Result<()> {
        if segment.is_empty() {
            return Ok(());
        }
        self.tx.send(segment).await.map_err(|_| closed())
    }

    /// Queues one segment only if there is room right now.
    pub fn try_write(&mut self, segment: Bytes) -> io::Result<()> {
        if segment.is_empty() {
            return Ok(());
        }
        self.tx.try_send(segment).map_err(|_| closed())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        SinkExt::flush(&mut self.tx).await.map_err(|_| closed())
    }

    /// Completes the pipe. A supplied error is handed to the reader after
    /// the remaining segments drain; completing twice keeps the first error.
    pub fn complete(&mut self, error: Option<io::Error>) {
        if let Some(err) = error {
            let mut slot = self.fault.lock().unwrap();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.tx.close_channel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        match this.tx.poll_ready_unpin(cx) {
            Poll::Ready(Ok(())) => match this.tx.start_send_unpin(Bytes::copy_from_slice(buf)) {
                Ok(()) => Poll::Ready(Ok(buf.len())),
                Err(_) => Poll::Ready(Err(closed())),
            },
            Poll::Ready(Err(_)) => Poll::Ready(Err(closed())),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.tx.poll_flush_unpin(cx).map(|r| r.map_err(|_| closed()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.tx.poll_flush_unpin(cx) {
            Poll::Ready(_) => {
                this.complete(None);
                Poll::Ready(Ok(()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

struct ReaderInner {
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
    fault: Arc<Mutex<Option<io::Error>>>,
}

impl ReaderInner {
    fn take_fault(&self) -> Option<io::Error> {
        self.fault.lock().unwrap().take()
    }
}

#[derive(Clone)]
pub struct PipeReader {
    inner: Arc<Mutex<ReaderInner>>,
}

impl PipeReader {
    /// Next queued segment, `None` once the writer has completed, or the
    /// fault the writer completed with.
    pub async fn read_segment(&self) -> io::Result<Option<Bytes>> {
        futures::future::poll_fn(|cx| {
            let mut inner = self.inner.lock().unwrap();
            if !inner.pending.is_empty() {
                return Poll::Ready(Ok(Some(mem::take(&mut inner.pending))));
            }
            match inner.rx.poll_next_unpin(cx) {
                Poll::Ready(Some(segment)) => Poll::Ready(Ok(Some(segment))),
                Poll::Ready(None) => Poll::Ready(match inner.take_fault() {
                    Some(err) => Err(err),
                    None => Ok(None),
                }),
                Poll::Pending => Poll::Pending,
            }
        })
        .await
    }

    /// Whatever is immediately available, without waiting.
    pub fn try_read_segment(&self) -> Option<Bytes> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.pending.is_empty() {
            return Some(mem::take(&mut inner.pending));
        }
        match inner.rx.try_next() {
            Ok(Some(segment)) => Some(segment),
            _ => None,
        }
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let mut inner = this.inner.lock().unwrap();
        if inner.pending.is_empty() {
            match inner.rx.poll_next_unpin(cx) {
                Poll::Ready(Some(segment)) => inner.pending = segment,
                Poll::Ready(None) => {
                    return Poll::Ready(match inner.take_fault() {
                        Some(err) => Err(err),
                        None => Ok(()),
                    });
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        let n = inner.pending.len().min(buf.remaining());
        let chunk = inner.pending.split_to(n);
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

/// Duplex byte-stream view over a pipe pair. This is what gets handed to the
/// TLS wrapper so the handshake runs over the socket pipe rather than the
/// raw socket.
pub struct PipeStream {
    reader: PipeReader,
    writer: PipeWriter,
}

impl PipeStream {
    pub fn new(reader: PipeReader, writer: PipeWriter) -> Self {
        Self { reader, writer }
    }
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn segments_round_trip_in_order() {
        let (mut writer, reader) = byte_pipe(4);
        writer.write(Bytes::from_static(b"one")).await.unwrap();
        writer.write(Bytes::from_static(b"two")).await.unwrap();
        writer.complete(None);
        assert_eq!(reader.read_segment().await.unwrap().unwrap(), "one");
        assert_eq!(reader.read_segment().await.unwrap().unwrap(), "two");
        assert!(reader.read_segment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fault_surfaces_after_buffered_data() {
        let (mut writer, reader) = byte_pipe(4);
        writer.write(Bytes::from_static(b"tail")).await.unwrap();
        writer.complete(Some(io::Error::new(io::ErrorKind::ConnectionReset, "boom")));
        assert_eq!(reader.read_segment().await.unwrap().unwrap(), "tail");
        let err = reader.read_segment().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        // the fault is consumed exactly once
        assert!(reader.read_segment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn async_read_write_views_cooperate() {
        let (writer, reader) = byte_pipe(4);
        let mut stream = PipeStream::new(reader, writer);
        stream.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn try_read_segment_does_not_block() {
        let (mut writer, reader) = byte_pipe(4);
        assert!(reader.try_read_segment().is_none());
        writer.write(Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(reader.try_read_segment().unwrap(), "x");
    }
}
