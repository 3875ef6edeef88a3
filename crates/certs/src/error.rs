use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key generation failed: {0}")]
    KeyGen(String),
    #[error("certificate generation failed: {0}")]
    Rcgen(#[from] rcgen::Error),
    #[error("invalid stored CA material: {0}")]
    InvalidCa(String),
}
