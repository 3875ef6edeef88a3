use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio_rustls::{server::TlsStream, TlsAcceptor};

use complyze_certs::CertificateManager;

use crate::error::MitmError;

/// Resolves the minted leaf certificate for whatever SNI name the client
/// asked for, minting (or reusing) it from `complyze-certs` on demand. A
/// client that sends no SNI gets no certificate, which rustls turns into a
/// normal handshake failure.
struct PerHostResolver {
    manager: Arc<CertificateManager>,
}

impl ResolvesServerCert for PerHostResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let host = client_hello.server_name()?;
        self.manager
            .get_or_mint(host)
            .ok()
            .map(|leaf| leaf.certified_key.clone())
    }
}

/// Performs the server-side TLS handshake on an accepted client socket,
/// presenting a leaf certificate minted for `sni_host`.
pub async fn accept_tls(
    manager: Arc<CertificateManager>,
    tcp: TcpStream,
) -> Result<TlsStream<TcpStream>, MitmError> {
    let resolver = Arc::new(PerHostResolver { manager });
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let stream = acceptor.accept(tcp).await?;
    Ok(stream)
}
