//! TLS termination setup.
//!
//! The operator supplies one PEM file carrying both the certificate chain
//! and the private key; without one, a throwaway localhost pair is
//! generated on the fly and loaded instead.

use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;
use tracing::info;

use multiflow_config::TlsConfig;

use crate::error::ServerError;

/// Build the TLS acceptor from the frozen configuration.
pub fn build_tls_acceptor(cfg: &TlsConfig) -> Result<TlsAcceptor, ServerError> {
    let (cert_path, key_path) = match &cfg.cert {
        Some(path) => (path.clone(), path.clone()),
        None => {
            let generated = multiflow_cert::generate_self_signed(Path::new("."))?;
            info!(
                cert = %generated.cert_path.display(),
                key = %generated.key_path.display(),
                "no certificate supplied, generated self-signed pair"
            );
            (
                generated.cert_path.to_string_lossy().into_owned(),
                generated.key_path.to_string_lossy().into_owned(),
            )
        }
    };

    let certs = load_certs(&cert_path)?;
    if certs.is_empty() {
        return Err(ServerError::Config(multiflow_config::ConfigError::Validation(
            format!("no certificate found in {}", cert_path),
        )));
    }
    let key = load_private_key(&key_path)?;

    let provider = rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .map_err(|e| {
            ServerError::Config(multiflow_config::ConfigError::Validation(format!(
                "TLS version error: {}",
                e
            )))
        })?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Load every certificate block from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, ServerError> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .filter_map(|c| c.ok().map(|v| v.into_owned()))
        .collect();
    Ok(certs)
}

/// Load the first private key from a PEM file, whatever its encoding.
fn load_private_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>, ServerError> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    loop {
        match rustls_pemfile::read_one(&mut reader)? {
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => {
                return Ok(rustls::pki_types::PrivateKeyDer::Pkcs8(key));
            }
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => {
                return Ok(rustls::pki_types::PrivateKeyDer::Pkcs1(key));
            }
            Some(rustls_pemfile::Item::Sec1Key(key)) => {
                return Ok(rustls::pki_types::PrivateKeyDer::Sec1(key));
            }
            Some(_) => continue,
            None => break,
        }
    }
    Err(ServerError::Config(multiflow_config::ConfigError::Validation(
        format!("no private key found in {}", path),
    )))
}
