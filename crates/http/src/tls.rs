//! Loading certificates and keys into a server-side TLS acceptor.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsSettings;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("can't read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("no certificate found in {path}")]
    NoCertificate { path: String },

    #[error("no private key found in {path} (encrypted keys are not supported)")]
    NoPrivateKey { path: String },

    #[error("invalid tls config: {source}")]
    Config {
        #[from]
        source: rustls::Error,
    },
}

/// Builds the acceptor described by `settings`.
pub fn load_acceptor(settings: &TlsSettings) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(&settings.cert_file)?;
    let key = load_private_key(&settings.key_file)?;
    Ok(TlsAcceptor::from(create_tls_config(certs, key)?))
}

pub fn create_tls_config(certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Result<Arc<ServerConfig>, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = certs_from_reader(&mut reader).map_err(|source| TlsError::Read { path: path.to_string(), source })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate { path: path.to_string() });
    }
    Ok(certs)
}

pub fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    key_from_reader(&mut reader)
        .map_err(|source| TlsError::Read { path: path.to_string(), source })?
        .ok_or_else(|| TlsError::NoPrivateKey { path: path.to_string() })
}

fn open(path: &str) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Read { path: path.to_string(), source })
}

pub(crate) fn certs_from_reader(rd: &mut dyn BufRead) -> io::Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(rd).collect()
}

pub(crate) fn key_from_reader(rd: &mut dyn BufRead) -> io::Result<Option<PrivateKeyDer<'static>>> {
    loop {
        match rustls_pemfile::read_one(rd)? {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(Some(key.into())),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(Some(key.into())),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(Some(key.into())),
            Some(_) => {}
            None => return Ok(None),
        }
    }
}
