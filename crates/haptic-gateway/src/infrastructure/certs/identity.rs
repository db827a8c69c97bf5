//! TLS identity loading.
//!
//! The cached identity is a PEM bundle containing the certificate chain and
//! a PKCS#8 private key in one file. Loading produces both the rustls server
//! config consumed by the control server and the leaf certificate's expiry
//! timestamp, which drives the lifecycle classification. The identity is
//! read-only after load and shared across all sessions.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use x509_parser::pem::Pem;

use super::CertificateError;

/// A loaded TLS identity: ready-to-serve rustls config plus expiry.
#[derive(Clone)]
pub struct TlsIdentity {
    pub server_config: Arc<ServerConfig>,
    pub not_after: DateTime<Utc>,
}

impl std::fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Loads and validates the PEM identity bundle at `path`.
///
/// # Errors
///
/// [`CertificateError::Io`] when the file cannot be read;
/// [`CertificateError::Identity`] when the bundle lacks a certificate or
/// key, or either fails to parse.
pub fn load_identity(path: &Path) -> Result<TlsIdentity, CertificateError> {
    let bytes = std::fs::read(path)?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut bytes.as_slice())
        .collect::<Result<_, _>>()
        .map_err(|err| CertificateError::Identity(format!("bad certificate block: {err}")))?;
    if certs.is_empty() {
        return Err(CertificateError::Identity(
            "no certificate found in identity file".to_string(),
        ));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut bytes.as_slice())
        .map_err(|err| CertificateError::Identity(format!("bad key block: {err}")))?
        .ok_or_else(|| {
            CertificateError::Identity("no private key found in identity file".to_string())
        })?;

    let not_after = leaf_not_after(&bytes)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| CertificateError::Identity(format!("unusable identity: {err}")))?;

    Ok(TlsIdentity {
        server_config: Arc::new(server_config),
        not_after,
    })
}

/// Extracts `notAfter` from the first CERTIFICATE block in the bundle.
fn leaf_not_after(pem_bytes: &[u8]) -> Result<DateTime<Utc>, CertificateError> {
    for pem in Pem::iter_from_buffer(pem_bytes) {
        let pem =
            pem.map_err(|err| CertificateError::Identity(format!("bad PEM block: {err}")))?;
        if pem.label != "CERTIFICATE" {
            continue;
        }
        let cert = pem
            .parse_x509()
            .map_err(|err| CertificateError::Identity(format!("bad certificate: {err}")))?;
        let timestamp = cert.validity().not_after.timestamp();
        return DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
            CertificateError::Identity("certificate expiry out of range".to_string())
        });
    }
    Err(CertificateError::Identity(
        "no certificate found in identity file".to_string(),
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
