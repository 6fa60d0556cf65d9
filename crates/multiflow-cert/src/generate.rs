//! Throwaway certificate generation with rcgen.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use rcgen::{CertificateParams, DnType, KeyPair, SanType, PKCS_ECDSA_P256_SHA256};
use thiserror::Error;

/// Certificate file written into the target directory.
pub const CERT_FILE_NAME: &str = "temp.crt";
/// Private-key file written into the target directory.
pub const KEY_FILE_NAME: &str = "temp.key";

/// Validity window for generated certificates, in days.
const VALIDITY_DAYS: i64 = 365;

/// Errors that can occur during certificate generation.
#[derive(Error, Debug)]
pub enum CertError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Certificate generation failed: {0}")]
    CertGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Paths of a freshly generated certificate/key pair.
#[derive(Debug, Clone)]
pub struct GeneratedCert {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Generate a self-signed localhost certificate into `dir`.
///
/// CN=localhost with localhost/127.0.0.1 subject alternative names, one
/// year of validity, ECDSA P-256. Existing files at the target paths are
/// overwritten.
pub fn generate_self_signed(dir: &Path) -> Result<GeneratedCert, CertError> {
    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
        .map_err(|e| CertError::KeyGeneration(e.to_string()))?;

    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, "localhost");
    params.subject_alt_names.push(SanType::DnsName(
        "localhost"
            .to_string()
            .try_into()
            .map_err(|_| CertError::CertGeneration("invalid DNS name".into()))?,
    ));
    params
        .subject_alt_names
        .push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(VALIDITY_DAYS);

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::CertGeneration(e.to_string()))?;

    let cert_path = dir.join(CERT_FILE_NAME);
    let key_path = dir.join(KEY_FILE_NAME);
    fs::write(&cert_path, cert.pem())?;
    fs::write(&key_path, key_pair.serialize_pem())?;

    Ok(GeneratedCert {
        cert_path,
        key_path,
    })
}
