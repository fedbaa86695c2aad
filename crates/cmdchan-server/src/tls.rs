//! Builds the rustls server configuration from the agent's TLS settings.

use std::fs;
use std::sync::Arc;

use camino::Utf8PathBuf;
use cmdchan_config::TlsConfig;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;

/// Errors raised while building a TLS server configuration.
#[derive(Debug, Error)]
pub enum TlsProviderError {
    /// TLS is enabled but no keystore file was configured.
    #[error("TLS is enabled for the command channel but no keystore file is configured")]
    MissingKeystore,
    /// The keystore file could not be read.
    #[error("failed to read keystore '{path}': {source}")]
    ReadKeystore {
        /// Keystore path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The keystore did not contain parseable certificates.
    #[error("invalid certificates in keystore '{path}': {message}")]
    Certificates {
        /// Keystore path.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },
    /// The keystore did not contain a parseable private key.
    #[error("invalid private key in keystore '{path}': {message}")]
    PrivateKey {
        /// Keystore path.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },
    /// rustls rejected the certificate and key.
    #[error("failed to build TLS server configuration: {source}")]
    ServerConfig {
        /// Underlying rustls error.
        #[source]
        source: rustls::Error,
    },
}

/// Supplies the shared server-side TLS configuration.
pub trait TlsProvider: Send + Sync {
    /// Builds a server configuration for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TlsProviderError`] when the keystore is missing or unusable.
    fn server_config(&self, config: &TlsConfig) -> Result<Arc<ServerConfig>, TlsProviderError>;
}

/// Provider reading a PEM keystore holding a certificate chain and an
/// unencrypted private key.
///
/// The keystore password is not needed to read PEM and is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct PemTlsProvider;

impl TlsProvider for PemTlsProvider {
    fn server_config(&self, config: &TlsConfig) -> Result<Arc<ServerConfig>, TlsProviderError> {
        let path = config
            .keystore_file()
            .ok_or(TlsProviderError::MissingKeystore)?
            .to_path_buf();
        let pem = fs::read(path.as_std_path()).map_err(|source| TlsProviderError::ReadKeystore {
            path: path.clone(),
            source,
        })?;

        let certificates = CertificateDer::pem_slice_iter(&pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| TlsProviderError::Certificates {
                path: path.clone(),
                message: error.to_string(),
            })?;
        if certificates.is_empty() {
            return Err(TlsProviderError::Certificates {
                path,
                message: String::from("no certificates found"),
            });
        }
        let key =
            PrivateKeyDer::from_pem_slice(&pem).map_err(|error| TlsProviderError::PrivateKey {
                path: path.clone(),
                message: error.to_string(),
            })?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let server_config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .and_then(|builder| {
                builder
                    .with_no_client_auth()
                    .with_single_cert(certificates, key)
            })
            .map_err(|source| TlsProviderError::ServerConfig { source })?;
        Ok(Arc::new(server_config))
    }
}
