//! Root CA persistence and per-host leaf certificate minting for the TLS
//! interception terminator.

mod authority;
mod cache;
mod error;
mod leaf;

pub use authority::CertificateAuthority;
pub use cache::CertificateManager;
pub use error::CertError;
pub use leaf::{mint_leaf, CertifiedLeaf};
