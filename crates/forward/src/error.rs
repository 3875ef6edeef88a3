use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("upstream TLS handshake failed: {0}")]
    Tls(#[from] rustls::Error),
    #[error("upstream HTTP error: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),
}
