//! TLS configuration and certificate loading.

use std::path::Path;
use std::sync::Arc;
use axum_server::tls_rustls::RustlsConfig;
use tokio_rustls::TlsAcceptor;

/// Protocols offered during ALPN. The connection handler speaks HTTP/1.1 only.
const ALPN_HTTP1: &[u8] = b"http/1.1";

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    // Basic validation
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Build an acceptor that terminates TLS with the given identity.
///
/// The rustls defaults advertise `h2`; clients that picked it would then be
/// unable to talk to the HTTP/1.1 handler, so ALPN is narrowed here.
pub async fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, std::io::Error> {
    let config = load_tls_config(cert_path, key_path).await?;
    let mut server_config = (*config.get_inner()).clone();
    server_config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
