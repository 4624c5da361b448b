//! The two concrete stream movers: source -> pipe and pipe -> sink.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::constants::RECEIVE_BUFFER_SIZE;
use crate::core_pipeline::pausable::StreamMover;
use crate::core_pipeline::pipe::{PipeReader, PipeWriter};

/// Pumps bytes from a byte-oriented source into a pipe.
///
/// The closing variant owns the pipe's remaining lifetime and completes it
/// on stop; the non-closing variant leaves that to the pipe's owner so an
/// adapter swap never tears down a pipe it merely borrowed. End-of-stream
/// and faults of the source always propagate regardless, since they are
/// facts about the stream rather than about this service.
pub struct ReceiverService<R> {
    source: R,
    pipe: PipeWriter,
    closing: bool,
}

impl<R> ReceiverService<R> {
    pub fn new(source: R, pipe: PipeWriter) -> Self {
        Self {
            source,
            pipe,
            closing: true,
        }
    }

    pub fn non_closing(source: R, pipe: PipeWriter) -> Self {
        Self {
            source,
            pipe,
            closing: false,
        }
    }
}

#[async_trait]
impl<R> StreamMover for ReceiverService<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn execute(&mut self, token: CancellationToken) -> io::Result<()> {
        let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];
        loop {
            let read = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                read = self.source.read(&mut buffer) => read,
            };
            match read {
                Ok(0) => {
                    self.pipe.complete(None);
                    return Ok(());
                }
                Ok(n) => {
                    let segment = Bytes::copy_from_slice(&buffer[..n]);
                    let mut parked = false;
                    let delivered = tokio::select! {
                        _ = token.cancelled() => {
                            parked = true;
                            false
                        }
                        write = self.pipe.write(segment.clone()) => write.is_ok(),
                    };
                    if parked {
                        // parked while the pipe is full: hand the in-flight
                        // segment over without blocking, then leave
                        let _ = self.pipe.try_write(segment);
                        return Ok(());
                    }
                    if !delivered {
                        // consumer is gone; nothing left to feed
                        return Ok(());
                    }
                    let _ = self.pipe.flush().await;
                }
                Err(err) => {
                    self.pipe
                        .complete(Some(io::Error::new(err.kind(), err.to_string())));
                    return Err(err);
                }
            }
        }
    }

    async fn on_stopped(&mut self) -> io::Result<()> {
        if self.closing {
            self.pipe.complete(None);
        }
        Ok(())
    }

    async fn on_failed(&mut self, error: &io::Error) -> bool {
        // downstream must see end-of-stream, not a hang
        self.pipe
            .complete(Some(io::Error::new(error.kind(), error.to_string())));
        true
    }
}

/// Pumps pipe segments into a byte-oriented sink.
///
/// A pause or stop drains whatever the pipe already holds before resolving,
/// so bytes committed to the pipe are never silently dropped. The closing
/// variant also shuts the sink down on stop.
pub struct SenderService<W> {
    pipe: PipeReader,
    sink: W,
    closing: bool,
}

impl<W> SenderService<W> {
    pub fn new(pipe: PipeReader, sink: W) -> Self {
        Self {
            pipe,
            sink,
            closing: true,
        }
    }

    pub fn non_closing(pipe: PipeReader, sink: W) -> Self {
        Self {
            pipe,
            sink,
            closing: false,
        }
    }
}

impl<W> SenderService<W>
where
    W: AsyncWrite + Unpin,
{
    /// A sink refusing writes here is benign: draining happens during a
    /// deliberate pause or stop, when the sink may already be closed.
    async fn drain(&mut self) {
        while let Some(segment) = self.pipe.try_read_segment() {
            if self.sink.write_all(&segment).await.is_err() {
                return;
            }
        }
        let _ = self.sink.flush().await;
    }
}

#[async_trait]
impl<W> StreamMover for SenderService<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn execute(&mut self, token: CancellationToken) -> io::Result<()> {
        loop {
            let segment = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                segment = self.pipe.read_segment() => segment,
            };
            match segment {
                Ok(Some(segment)) => {
                    self.sink.write_all(&segment).await?;
                    self.sink.flush().await?;
                }
                Ok(None) => {
                    if self.closing {
                        let _ = self.sink.shutdown().await;
                    }
                    return Ok(());
                }
                Err(err) => {
                    // upstream fault: close out the sink so the peer sees EOF
                    if self.closing {
                        let _ = self.sink.shutdown().await;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn on_paused(&mut self) -> io::Result<()> {
        self.drain().await;
        Ok(())
    }

    async fn on_stopped(&mut self) -> io::Result<()> {
        self.drain().await;
        if self.closing {
            let _ = self.sink.shutdown().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_pipeline::pausable::{PausableService, ServiceStatus};
    use crate::core_pipeline::pipe::byte_pipe;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    /// Sink that records everything written to it.
    #[derive(Clone, Default)]
    struct CapturingSink {
        written: Arc<Mutex<Vec<u8>>>,
        shutdowns: Arc<Mutex<usize>>,
    }

    impl AsyncWrite for CapturingSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            *self.shutdowns.lock().unwrap() += 1;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn pause_flushes_pending_pipe_bytes() {
        let (mut writer, reader) = byte_pipe(32);
        let sink = CapturingSink::default();
        let mut service = PausableService::new(
            "sender",
            SenderService::new(reader, sink.clone()),
            CancellationToken::new(),
        );
        service.start().await.unwrap();
        service.pause().await.unwrap();
        // queue segments while the sender is parked
        let payload = vec![7u8; 4096];
        for chunk in payload.chunks(512) {
            writer.write(Bytes::copy_from_slice(chunk)).await.unwrap();
        }
        // a second pause is a no-op, so resume and pause again to exercise
        // the drain guarantee with bytes pending
        service.resume().await.unwrap();
        service.pause().await.unwrap();
        assert_eq!(sink.written.lock().unwrap().len(), payload.len());
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_flushes_and_shuts_down_sink() {
        let (mut writer, reader) = byte_pipe(32);
        let sink = CapturingSink::default();
        let mut service = PausableService::new(
            "sender",
            SenderService::new(reader, sink.clone()),
            CancellationToken::new(),
        );
        service.start().await.unwrap();
        service.pause().await.unwrap();
        writer.write(Bytes::from_static(b"last words")).await.unwrap();
        service.stop().await.unwrap();
        assert_eq!(sink.written.lock().unwrap().as_slice(), &b"last words"[..]);
        assert_eq!(*sink.shutdowns.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn receiver_completes_pipe_on_source_eof() {
        let (pipe_writer, pipe_reader) = byte_pipe(8);
        let source: &[u8] = b"abc";
        let mut service = PausableService::new(
            "receiver",
            ReceiverService::new(source, pipe_writer),
            CancellationToken::new(),
        );
        service.start().await.unwrap();
        assert_eq!(pipe_reader.read_segment().await.unwrap().unwrap(), "abc");
        assert!(pipe_reader.read_segment().await.unwrap().is_none());
        service.stop().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn non_closing_receiver_keeps_pipe_open_on_stop() {
        let (source_writer, source_reader) = byte_pipe(8);
        let (pipe_writer, pipe_reader) = byte_pipe(8);
        let mut service = PausableService::new(
            "receiver",
            ReceiverService::non_closing(source_reader, pipe_writer.clone()),
            CancellationToken::new(),
        );
        service.start().await.unwrap();
        service.stop().await.unwrap();
        assert!(!pipe_writer.is_closed());
        assert!(pipe_reader.try_read_segment().is_none());
        drop(source_writer);
    }
}
