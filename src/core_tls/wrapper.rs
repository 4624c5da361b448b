//! Builds the rustls acceptor from PEM files and adapts it to the
//! pipeline's [`TlsWrapper`] seam.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_rustls::{rustls, TlsAcceptor};

use crate::core_pipeline::{BoxedReader, BoxedWriter, PipeStream, TlsWrapper};
use crate::core_tls::error::TlsError;

pub struct RustlsWrapper {
    acceptor: TlsAcceptor,
}

impl RustlsWrapper {
    /// Loads the certificate chain and PKCS#8 key from PEM files.
    pub fn from_pem_files(cert_file: &str, key_file: &str) -> Result<Self, TlsError> {
        if !std::path::Path::new(cert_file).exists() || !std::path::Path::new(key_file).exists() {
            return Err(TlsError::TlsNotConfigured);
        }

        let certs = std::fs::read(cert_file)
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
        let key = std::fs::read(key_file)
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;

        let cert_chain = rustls_pemfile::certs(&mut &certs[..])
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;

        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &key[..])
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;

        let private_key = match keys.pop() {
            Some(k) => k,
            None => {
                return Err(TlsError::PrivateKeyLoadError(
                    "No private key found".to_string(),
                ))
            }
        };

        let cert_chain: Vec<rustls::Certificate> =
            cert_chain.into_iter().map(rustls::Certificate).collect();

        let config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(cert_chain, rustls::PrivateKey(private_key))
            .map_err(|e| TlsError::TlsConfigError(e.to_string()))?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }
}

#[async_trait]
impl TlsWrapper for RustlsWrapper {
    async fn wrap(&self, stream: PipeStream) -> io::Result<(BoxedReader, BoxedWriter)> {
        let tls_stream = self.acceptor.accept(stream).await?;
        let (read, write) = tokio::io::split(tls_stream);
        Ok((Box::new(read), Box::new(write)))
    }
}
