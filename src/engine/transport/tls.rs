//! TLS client configuration for network engine endpoints.
//!
//! PEM material is read with `cap_std::fs_utf8` from the directory holding
//! each file, matching how configuration files are loaded.

use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, crypto};

use crate::error::TransportError;

/// TLS settings shared by every connection a client dials.
#[derive(Clone)]
pub struct TlsSettings {
    config: Arc<ClientConfig>,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings").finish_non_exhaustive()
    }
}

impl TlsSettings {
    /// Wrap an already assembled `rustls` client configuration.
    #[must_use]
    pub const fn from_client_config(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    /// Build settings from PEM files.
    ///
    /// `ca_cert` is the bundle used to verify the engine. `identity` is the
    /// optional client certificate chain and private key for mutual TLS.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Tls` when a file cannot be read or parsed, or
    /// when `rustls` rejects the assembled configuration.
    pub fn from_pem_files(
        ca_cert: &Utf8Path,
        identity: Option<(&Utf8Path, &Utf8Path)>,
    ) -> Result<Self, TransportError> {
        let mut roots = RootCertStore::empty();
        for cert in read_certificates(ca_cert)? {
            roots.add(cert).map_err(|error| {
                tls_error(format!("invalid CA certificate in {ca_cert}: {error}"))
            })?;
        }

        let provider = Arc::new(crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|error| tls_error(error.to_string()))?
            .with_root_certificates(roots);

        let config = match identity {
            Some((cert_path, key_path)) => {
                let chain = read_certificates(cert_path)?;
                let key_bytes = read_file(key_path)?;
                let key = PrivateKeyDer::from_pem_slice(&key_bytes)
                    .map_err(|error| tls_error(format!("failed to parse {key_path}: {error}")))?;
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|error| tls_error(error.to_string()))?
            }
            None => builder.with_no_client_auth(),
        };

        Ok(Self::from_client_config(Arc::new(config)))
    }

    pub(crate) fn connector(&self) -> TlsConnector {
        TlsConnector::from(Arc::clone(&self.config))
    }
}

fn read_certificates(path: &Utf8Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let bytes = read_file(path)?;
    let certs = CertificateDer::pem_slice_iter(&bytes)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| tls_error(format!("failed to parse {path}: {error}")))?;
    if certs.is_empty() {
        return Err(tls_error(format!("no certificates found in {path}")));
    }
    Ok(certs)
}

fn read_file(path: &Utf8Path) -> Result<Vec<u8>, TransportError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| tls_error(format!("{path} does not name a file")))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|error| tls_error(format!("failed to open directory {parent}: {error}")))?;
    dir.read(file_name)
        .map_err(|error| tls_error(format!("failed to read {path}: {error}")))
}

fn tls_error(message: impl Into<String>) -> TransportError {
    TransportError::Tls {
        message: message.into(),
    }
}
