//! The front door: accept loop, live-connection registry and connection
//! observers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core_auth::Authenticator;
use crate::core_network::connection::{self, ConnectionDeps};
use crate::core_pipeline::TlsWrapper;
use crate::core_storage::StorageFactory;
use crate::core_transfer::TransferQueue;

/// Notifications around a connection's lifetime. `on_configured` fires
/// before the connection reads its first command; `on_closed` fires after
/// all of its resources are released.
pub trait ConnectionObserver: Send + Sync {
    fn on_configured(&self, _peer: SocketAddr) {}
    fn on_closed(&self, _peer: SocketAddr) {}
}

/// Live connections, keyed by peer address. The lock is held only for map
/// mutations, never across I/O.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<SocketAddr, CancellationToken>>>,
}

impl ConnectionRegistry {
    pub fn add(&self, peer: SocketAddr, token: CancellationToken) {
        self.inner.lock().unwrap().insert(peer, token);
    }

    pub fn remove(&self, peer: &SocketAddr) {
        self.inner.lock().unwrap().remove(peer);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Asks every live connection to shut down.
    pub fn close_all(&self) {
        for token in self.inner.lock().unwrap().values() {
            token.cancel();
        }
    }
}

/// Dependencies shared by every connection of one server instance. No
/// process-wide statics; a second server in the same process gets its own.
pub struct ServerDeps {
    pub authenticator: Arc<dyn Authenticator>,
    pub storage_factory: Arc<dyn StorageFactory>,
    pub tls: Option<Arc<dyn TlsWrapper>>,
    pub observers: Arc<Vec<Arc<dyn ConnectionObserver>>>,
}

pub async fn start_server(
    config: Arc<Config>,
    deps: ServerDeps,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.server.listen_address, config.server.listen_port
    ))
    .await?;
    info!("Server listening on port {}", config.server.listen_port);
    serve(listener, config, deps, shutdown).await
}

/// Accept loop over an already-bound listener (the tests bind their own
/// ephemeral port).
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    deps: ServerDeps,
    shutdown: CancellationToken,
) -> Result<()> {
    let transfers = TransferQueue::start(shutdown.child_token());
    let registry = ConnectionRegistry::default();

    loop {
        let (socket, addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted?,
        };
        info!("New connection from {:?}", addr);

        let token = shutdown.child_token();
        registry.add(addr, token.clone());

        let connection_deps = ConnectionDeps {
            config: Arc::clone(&config),
            authenticator: Arc::clone(&deps.authenticator),
            storage_factory: Arc::clone(&deps.storage_factory),
            transfers: transfers.clone(),
            tls: deps.tls.clone(),
            observers: Arc::clone(&deps.observers),
        };
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(err) = connection::handle_connection(socket, addr, connection_deps, token).await
            {
                error!("Connection error: {:?}", err);
            }
            registry.remove(&addr);
            info!("Connection closed for {:?}", addr);
        });
    }

    registry.close_all();
    Ok(())
}
