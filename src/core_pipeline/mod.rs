//! The connection I/O pipeline: in-process byte pipes, the pausable service
//! state machine, the two stream movers built on it, and the connection
//! adapters that can swap a plain channel for a TLS-wrapped one mid-session.

pub mod mover;
pub mod pausable;
pub mod pipe;
pub mod secure;

use tokio::io::{AsyncRead, AsyncWrite};

pub use mover::{ReceiverService, SenderService};
pub use pausable::{PausableService, ServiceStatus, StreamMover};
pub use pipe::{byte_pipe, PipeReader, PipeStream, PipeWriter};
pub use secure::{
    AdapterEndpoints, PassThroughConnectionAdapter, SecureConnectionAdapter, TlsWrapper,
};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
