//! Self-signed certificate generation.
//!
//! Used when TLS termination is requested without an operator-supplied
//! certificate: a throwaway ECDSA P-256 pair is generated and written next
//! to the working directory as `temp.crt` / `temp.key`.

mod generate;

pub use generate::{generate_self_signed, CertError, GeneratedCert, CERT_FILE_NAME, KEY_FILE_NAME};
