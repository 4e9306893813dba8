//! Secure channel provisioner.
//!
//! Converts an environment's PKCS#12 certificate container into the PEM
//! material the broker and registry TLS layers expect. The material is
//! written to an ephemeral file that lives exactly as long as the returned
//! guard: dropping it removes the file on every exit path.

use std::io::Write;
use std::path::Path;

use kafkasift_common::{Error, Result};
use kafkasift_config::TlsSettings;
use openssl::pkcs12::Pkcs12;
use tempfile::NamedTempFile;
use tracing::debug;

/// Request-scoped key/cert material in PEM form.
///
/// Holds the decrypted private key, leaf certificate and chain in a single
/// PEM file (consumed by path by the broker client) and in memory (consumed
/// by bytes as the registry client identity).
#[derive(Debug)]
pub struct TlsMaterial {
    file: NamedTempFile,
    pem: Vec<u8>,
}

impl TlsMaterial {
    /// Decrypt the configured PKCS#12 container and materialize its
    /// contents as PEM.
    pub fn materialize(tls: &TlsSettings) -> Result<Self> {
        let der = std::fs::read(&tls.pfx_file).map_err(|e| {
            Error::Credential(format!(
                "cannot read certificate container {}: {e}",
                tls.pfx_file.display()
            ))
        })?;
        let container = Pkcs12::from_der(&der)
            .map_err(|e| Error::Credential(format!("malformed certificate container: {e}")))?;
        let parsed = container
            .parse2(&tls.pfx_password)
            .map_err(|e| Error::Credential(format!("cannot decrypt certificate container: {e}")))?;

        let key = parsed.pkey.ok_or_else(|| {
            Error::Credential("certificate container holds no private key".to_string())
        })?;
        let cert = parsed.cert.ok_or_else(|| {
            Error::Credential("certificate container holds no certificate".to_string())
        })?;

        let mut pem = Vec::new();
        pem.extend_from_slice(
            &key.private_key_to_pem_pkcs8()
                .map_err(|e| Error::Credential(format!("cannot encode private key: {e}")))?,
        );
        pem.extend_from_slice(
            &cert
                .to_pem()
                .map_err(|e| Error::Credential(format!("cannot encode certificate: {e}")))?,
        );
        if let Some(chain) = parsed.ca {
            for link in chain {
                pem.extend_from_slice(&link.to_pem().map_err(|e| {
                    Error::Credential(format!("cannot encode chain certificate: {e}"))
                })?);
            }
        }

        let mut file = tempfile::Builder::new()
            .prefix("kafkasift-")
            .suffix(".pem")
            .tempfile()
            .map_err(|e| Error::Credential(format!("cannot create ephemeral PEM file: {e}")))?;
        file.write_all(&pem)
            .map_err(|e| Error::Credential(format!("cannot write ephemeral PEM file: {e}")))?;
        file.flush()
            .map_err(|e| Error::Credential(format!("cannot write ephemeral PEM file: {e}")))?;

        debug!(path = %file.path().display(), "materialized TLS key material");
        Ok(Self { file, pem })
    }

    /// Path of the ephemeral PEM file, for TLS layers configured by
    /// location.
    pub fn key_path(&self) -> &Path {
        self.file.path()
    }

    /// The PEM bytes, for TLS layers configured with in-memory identities.
    pub fn pem_bytes(&self) -> &[u8] {
        &self.pem
    }
}
