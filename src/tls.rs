//! TLS layering for the transport.
//!
//! The handshake is driven to completion before the transport is handed to
//! the framing layer: each blocked wait is bounded by what is left of the
//! connect deadline, so a stalled peer surfaces as a connect timeout rather
//! than hanging the caller.
//!
//! Certificate material is PEM, loaded with `rustls-pemfile`. Without an
//! explicit CA file the bundled web-PKI roots are trusted.

use crate::config::{Config, TlsParams};
use crate::error::{Error, Result};
use crate::transport::{is_deadline, remaining};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Drive a TLS handshake over a connected socket.
///
/// Every wait honors what remains of `deadline`; expiry maps to
/// [`Error::ConnectTimeout`].
pub(crate) fn handshake(
    mut sock: TcpStream,
    config: &Config,
    deadline: Option<Instant>,
) -> Result<StreamOwned<ClientConnection, TcpStream>> {
    let tls_config = build_client_config(&config.ssl_params)?;
    let server_name = ServerName::try_from(config.tls_server_name().to_string())
        .map_err(|e| Error::Config(format!("invalid TLS server name: {e}")))?;
    let mut conn = ClientConnection::new(Arc::new(tls_config), server_name)
        .map_err(|e| Error::Connection(e.to_string()))?;

    while conn.is_handshaking() {
        let wait = remaining(deadline)?;
        sock.set_read_timeout(wait)
            .map_err(|e| Error::Connection(e.to_string()))?;
        sock.set_write_timeout(wait)
            .map_err(|e| Error::Connection(e.to_string()))?;

        match conn.complete_io(&mut sock) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_deadline(&e) => return Err(Error::ConnectTimeout),
            Err(e) => return Err(Error::Connection(format!("TLS handshake failed: {e}"))),
        }
    }

    debug!("TLS handshake complete, sni={}", config.tls_server_name());
    Ok(StreamOwned::new(conn, sock))
}

/// Build the rustls client configuration from the connection parameters.
fn build_client_config(params: &TlsParams) -> Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    if let Some(ca_file) = &params.ca_file {
        for cert in load_certs(ca_file)? {
            roots
                .add(cert)
                .map_err(|e| Error::Config(format!("invalid CA certificate: {e}")))?;
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let config = match (&params.cert_file, &params.key_file) {
        (Some(cert_file), Some(key_file)) => builder
            .with_client_auth_cert(load_certs(cert_file)?, load_private_key(key_file)?)
            .map_err(|e| Error::Config(format!("invalid client certificate: {e}")))?,
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(Error::Config(
                "cert_file and key_file must be configured together".into(),
            ))
        }
    };
    Ok(config)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    // PKCS#8, PKCS#1, and SEC1 keys are all accepted.
    for item in rustls_pemfile::read_all(&mut reader).filter_map(|item| item.ok()) {
        match item {
            rustls_pemfile::Item::Pkcs8Key(key) => return Ok(PrivateKeyDer::Pkcs8(key)),
            rustls_pemfile::Item::Pkcs1Key(key) => return Ok(PrivateKeyDer::Pkcs1(key)),
            rustls_pemfile::Item::Sec1Key(key) => return Ok(PrivateKeyDer::Sec1(key)),
            _ => continue,
        }
    }

    Err(Error::Config(format!(
        "no private key found in {}",
        path.display()
    )))
}
