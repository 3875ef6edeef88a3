use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::error::ForwardError;

/// Builds the client TLS config trusting the real web PKI — the proxy
/// always verifies the real upstream normally, unlike the terminator side
/// which presents a minted cert to the client.
pub fn upstream_tls_connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

pub async fn connect_tls(
    connector: &TlsConnector,
    host: &str,
    port: u16,
) -> Result<TlsStream<TcpStream>, ForwardError> {
    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true).ok();
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ForwardError::InvalidServerName(host.to_string()))?;
    let stream = connector.connect(server_name, tcp).await?;
    Ok(stream)
}
