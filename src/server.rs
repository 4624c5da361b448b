//! Assembles the collaborators from configuration and runs the server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::core_auth::{Authenticator, PasswdAuthenticator};
use crate::core_network::network::{self, ConnectionObserver, ServerDeps};
use crate::core_pipeline::TlsWrapper;
use crate::core_storage::LocalStorageFactory;
use crate::core_tls::RustlsWrapper;
use crate::Config;

/// Runs the FTP server with the provided configuration until the shutdown
/// token fires.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<()> {
    info!("Starting server on port {}", config.server.listen_port);

    let home_root = PathBuf::from(&config.server.chroot_dir);
    let mut authenticator =
        PasswdAuthenticator::new(config.auth.allow_anonymous, home_root);
    if let Some(passwd_file) = &config.auth.passwd_file {
        authenticator = authenticator
            .with_passwd_file(passwd_file)
            .with_context(|| format!("Failed to load passwd file: {}", passwd_file))?;
    }
    let authenticator: Arc<dyn Authenticator> = Arc::new(authenticator);

    let tls: Option<Arc<dyn TlsWrapper>> = match &config.tls {
        Some(settings) => {
            let wrapper = RustlsWrapper::from_pem_files(&settings.cert_file, &settings.key_file)
                .with_context(|| "Failed to initialize TLS")?;
            info!("TLS enabled (AUTH TLS available)");
            Some(Arc::new(wrapper))
        }
        None => {
            warn!("No TLS configured; AUTH TLS will be refused");
            None
        }
    };

    let observers: Arc<Vec<Arc<dyn ConnectionObserver>>> = Arc::new(Vec::new());

    let deps = ServerDeps {
        authenticator,
        storage_factory: Arc::new(LocalStorageFactory),
        tls,
        observers,
    };

    network::start_server(Arc::new(config), deps, shutdown).await
}
