use thiserror::Error;

#[derive(Debug, Error)]
pub enum MitmError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS handshake failed: {0}")]
    Tls(#[from] rustls::Error),
    #[error("certificate error: {0}")]
    Cert(#[from] complyze_certs::CertError),
    #[error("malformed request line")]
    MalformedRequest,
    #[error("request headers exceeded {0} bytes without terminating")]
    HeadersTooLarge(usize),
}
