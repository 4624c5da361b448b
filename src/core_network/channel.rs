//! The per-transfer data connection endpoint a session holds between a
//! PASV/EPSV/PORT/EPRT command and the transfer that consumes it.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::debug;
use tokio::net::{TcpListener, TcpStream};

pub enum DataChannel {
    /// Server-side listener waiting for the client to connect.
    Passive(TcpListener),
    /// Client endpoint the server connects out to.
    Active(SocketAddr),
}

impl DataChannel {
    /// Opens the data connection, consuming the endpoint. The accept wait
    /// for passive mode is bounded by the configured timeout.
    pub async fn open(self, timeout_secs: u64) -> io::Result<TcpStream> {
        match self {
            DataChannel::Passive(listener) => {
                let (stream, addr) =
                    tokio::time::timeout(Duration::from_secs(timeout_secs), listener.accept())
                        .await
                        .map_err(|_| {
                            io::Error::new(
                                io::ErrorKind::TimedOut,
                                "timed out waiting for data connection",
                            )
                        })??;
                debug!("Accepted data connection from: {}", addr);
                Ok(stream)
            }
            DataChannel::Active(addr) => {
                let stream = TcpStream::connect(addr).await?;
                debug!("Opened active data connection to: {}", addr);
                Ok(stream)
            }
        }
    }
}
