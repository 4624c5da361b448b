//! Connection adapters between the socket pipe and the connection pipe.
//!
//! The pass-through adapter wires the two pipe pairs directly. The secure
//! adapter holds whichever pair is active and can swap the plain pair for
//! one running over a TLS stream negotiated across the socket pipe, without
//! dropping or duplicating in-flight bytes: the old pair is stopped and
//! drained before the new pair starts.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::core_pipeline::mover::{ReceiverService, SenderService};
use crate::core_pipeline::pausable::PausableService;
use crate::core_pipeline::pipe::{PipeReader, PipeStream, PipeWriter};
use crate::core_pipeline::{BoxedReader, BoxedWriter};

/// Negotiates a server-side handshake over a byte-stream view of the socket
/// pipe and returns the encrypted stream split into halves.
#[async_trait]
pub trait TlsWrapper: Send + Sync {
    async fn wrap(&self, stream: PipeStream) -> io::Result<(BoxedReader, BoxedWriter)>;
}

/// The two pipe pairs an adapter moves bytes between. All endpoints are
/// cheap clones; the adapter is the owner of their lifetime, which is why
/// its movers run in the non-closing variant.
#[derive(Clone)]
pub struct AdapterEndpoints {
    /// Bytes that arrived from the socket.
    pub socket_in: PipeReader,
    /// Bytes on their way to the socket.
    pub socket_out: PipeWriter,
    /// Feeds the connection's dispatch loop.
    pub conn_in: PipeWriter,
    /// Responses from the dispatch loop.
    pub conn_out: PipeReader,
}

/// One receiver + sender pair, plain or TLS-backed.
struct MoverPair {
    receiver: PausableService<ReceiverService<BoxedReader>>,
    sender: PausableService<SenderService<BoxedWriter>>,
}

impl MoverPair {
    fn pass_through(endpoints: &AdapterEndpoints, token: &CancellationToken) -> Self {
        Self::over_stream(
            Box::new(endpoints.socket_in.clone()),
            Box::new(endpoints.socket_out.clone()),
            endpoints,
            token,
        )
    }

    fn over_stream(
        source: BoxedReader,
        sink: BoxedWriter,
        endpoints: &AdapterEndpoints,
        token: &CancellationToken,
    ) -> Self {
        Self {
            receiver: PausableService::new(
                "adapter-receiver",
                ReceiverService::non_closing(source, endpoints.conn_in.clone()),
                token.clone(),
            ),
            sender: PausableService::new(
                "adapter-sender",
                SenderService::non_closing(endpoints.conn_out.clone(), sink),
                token.clone(),
            ),
        }
    }

    async fn start(&mut self) -> io::Result<()> {
        self.receiver.start().await?;
        self.sender.start().await
    }

    /// Outbound first, so queued responses drain before the inbound side
    /// parks.
    async fn stop(&mut self) -> io::Result<()> {
        let sender = self.sender.stop().await;
        let receiver = self.receiver.stop().await;
        sender.and(receiver)
    }
}

/// Wires socket pipe and connection pipe directly.
pub struct PassThroughConnectionAdapter {
    pair: MoverPair,
}

impl PassThroughConnectionAdapter {
    pub fn new(endpoints: &AdapterEndpoints, token: &CancellationToken) -> Self {
        Self {
            pair: MoverPair::pass_through(endpoints, token),
        }
    }

    pub async fn start(&mut self) -> io::Result<()> {
        self.pair.start().await
    }

    pub async fn stop(&mut self) -> io::Result<()> {
        self.pair.stop().await
    }
}

/// Holds the active mover pair and swaps it between plain and TLS.
pub struct SecureConnectionAdapter {
    endpoints: AdapterEndpoints,
    token: CancellationToken,
    tls: Option<Arc<dyn TlsWrapper>>,
    active: MoverPair,
    secured: bool,
}

impl SecureConnectionAdapter {
    pub fn new(
        endpoints: AdapterEndpoints,
        tls: Option<Arc<dyn TlsWrapper>>,
        token: CancellationToken,
    ) -> Self {
        let active = MoverPair::pass_through(&endpoints, &token);
        Self {
            endpoints,
            token,
            tls,
            active,
            secured: false,
        }
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    pub fn tls_available(&self) -> bool {
        self.tls.is_some()
    }

    pub async fn start(&mut self) -> io::Result<()> {
        self.active.start().await
    }

    pub async fn stop(&mut self) -> io::Result<()> {
        self.active.stop().await
    }

    /// Swaps the active pair for one running over a freshly negotiated TLS
    /// stream. On handshake failure the adapter reconstructs a pass-through
    /// pair and returns the error, leaving the connection usable in
    /// cleartext rather than wedged.
    pub async fn enable_tls(&mut self) -> io::Result<()> {
        let wrapper = match self.tls.clone() {
            Some(wrapper) => wrapper,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "no TLS provider configured",
                ))
            }
        };
        self.active.stop().await?;
        let view = PipeStream::new(
            self.endpoints.socket_in.clone(),
            self.endpoints.socket_out.clone(),
        );
        match wrapper.wrap(view).await {
            Ok((read, write)) => {
                let mut pair = MoverPair::over_stream(read, write, &self.endpoints, &self.token);
                pair.start().await?;
                self.active = pair;
                self.secured = true;
                debug!("control channel upgraded to TLS");
                Ok(())
            }
            Err(err) => {
                warn!("TLS handshake failed, falling back to cleartext: {}", err);
                let mut pair = MoverPair::pass_through(&self.endpoints, &self.token);
                pair.start().await?;
                self.active = pair;
                self.secured = false;
                Err(err)
            }
        }
    }

    /// Downgrades back to a plain pass-through pair. Rare, defensive.
    pub async fn reset(&mut self) -> io::Result<()> {
        self.active.stop().await?;
        let mut pair = MoverPair::pass_through(&self.endpoints, &self.token);
        pair.start().await?;
        self.active = pair;
        self.secured = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_pipeline::pipe::byte_pipe;
    use bytes::Bytes;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    fn endpoints() -> (AdapterEndpoints, PipeWriter, PipeReader, PipeWriter, PipeReader) {
        let (socket_in_w, socket_in_r) = byte_pipe(16);
        let (socket_out_w, socket_out_r) = byte_pipe(16);
        let (conn_in_w, conn_in_r) = byte_pipe(16);
        let (conn_out_w, conn_out_r) = byte_pipe(16);
        let endpoints = AdapterEndpoints {
            socket_in: socket_in_r,
            socket_out: socket_out_w,
            conn_in: conn_in_w,
            conn_out: conn_out_r,
        };
        (endpoints, socket_in_w, socket_out_r, conn_out_w, conn_in_r)
    }

    /// Byte-flipping stream standing in for a real TLS stream: an
    /// involution, so "encrypting" twice yields the original bytes.
    struct FlipStream {
        inner: PipeStream,
    }

    impl AsyncRead for FlipStream {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let start = buf.filled().len();
            let result = Pin::new(&mut self.get_mut().inner).poll_read(cx, buf);
            if let Poll::Ready(Ok(())) = result {
                for byte in &mut buf.filled_mut()[start..] {
                    *byte = !*byte;
                }
            }
            result
        }
    }

    impl AsyncWrite for FlipStream {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let flipped: Vec<u8> = buf.iter().map(|b| !b).collect();
            Pin::new(&mut self.get_mut().inner).poll_write(cx, &flipped)
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
        }
    }

    struct FlipWrapper;

    #[async_trait]
    impl TlsWrapper for FlipWrapper {
        async fn wrap(&self, stream: PipeStream) -> io::Result<(BoxedReader, BoxedWriter)> {
            let (read, write) = tokio::io::split(FlipStream { inner: stream });
            Ok((Box::new(read), Box::new(write)))
        }
    }

    struct RefusingWrapper;

    #[async_trait]
    impl TlsWrapper for RefusingWrapper {
        async fn wrap(&self, _stream: PipeStream) -> io::Result<(BoxedReader, BoxedWriter)> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "handshake refused"))
        }
    }

    #[tokio::test]
    async fn pass_through_moves_bytes_both_ways() {
        let (endpoints, mut socket_in_w, socket_out_r, mut conn_out_w, conn_in_r) = endpoints();
        let mut adapter =
            PassThroughConnectionAdapter::new(&endpoints, &CancellationToken::new());
        adapter.start().await.unwrap();

        socket_in_w.write(Bytes::from_static(b"inbound")).await.unwrap();
        assert_eq!(conn_in_r.read_segment().await.unwrap().unwrap(), "inbound");

        conn_out_w.write(Bytes::from_static(b"outbound")).await.unwrap();
        assert_eq!(socket_out_r.read_segment().await.unwrap().unwrap(), "outbound");

        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn tls_swap_preserves_connection_pipe_identity() {
        let (endpoints, mut socket_in_w, socket_out_r, mut conn_out_w, conn_in_r) = endpoints();
        let mut adapter = SecureConnectionAdapter::new(
            endpoints,
            Some(Arc::new(FlipWrapper)),
            CancellationToken::new(),
        );
        adapter.start().await.unwrap();
        adapter.enable_tls().await.unwrap();
        assert!(adapter.is_secured());

        // connection side -> socket side comes out "encrypted"
        conn_out_w.write(Bytes::from_static(b"reply")).await.unwrap();
        let wire = socket_out_r.read_segment().await.unwrap().unwrap();
        let decrypted: Vec<u8> = wire.iter().map(|b| !b).collect();
        assert_eq!(decrypted, b"reply");

        // socket side "ciphertext" -> connection side decrypted
        let cipher: Vec<u8> = b"command".iter().map(|b| !b).collect();
        socket_in_w.write(Bytes::from(cipher)).await.unwrap();
        assert_eq!(conn_in_r.read_segment().await.unwrap().unwrap(), "command");

        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failed_handshake_falls_back_to_pass_through() {
        let (endpoints, mut socket_in_w, _socket_out_r, _conn_out_w, conn_in_r) = endpoints();
        let mut adapter = SecureConnectionAdapter::new(
            endpoints,
            Some(Arc::new(RefusingWrapper)),
            CancellationToken::new(),
        );
        adapter.start().await.unwrap();
        assert!(adapter.enable_tls().await.is_err());
        assert!(!adapter.is_secured());

        // plain bytes still flow after the fallback
        socket_in_w.write(Bytes::from_static(b"still here")).await.unwrap();
        assert_eq!(conn_in_r.read_segment().await.unwrap().unwrap(), "still here");

        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn reset_downgrades_to_cleartext() {
        let (endpoints, mut socket_in_w, _socket_out_r, _conn_out_w, conn_in_r) = endpoints();
        let mut adapter = SecureConnectionAdapter::new(
            endpoints,
            Some(Arc::new(FlipWrapper)),
            CancellationToken::new(),
        );
        adapter.start().await.unwrap();
        adapter.enable_tls().await.unwrap();
        adapter.reset().await.unwrap();
        assert!(!adapter.is_secured());

        socket_in_w.write(Bytes::from_static(b"plain")).await.unwrap();
        assert_eq!(conn_in_r.read_segment().await.unwrap().unwrap(), "plain");

        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn enable_tls_without_provider_is_rejected() {
        let (endpoints, _socket_in_w, _socket_out_r, _conn_out_w, _conn_in_r) = endpoints();
        let mut adapter =
            SecureConnectionAdapter::new(endpoints, None, CancellationToken::new());
        adapter.start().await.unwrap();
        let err = adapter.enable_tls().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        adapter.stop().await.unwrap();
    }
}
