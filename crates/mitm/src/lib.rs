//! TLS termination and length-delimited HTTP/1.1 parsing for deep-inspect
//! CONNECT tunnels. Multiple requests can arrive on one terminated TLS
//! connection; [`parser::RequestReader`] advances cleanly from one to the
//! next regardless of which [`parser::BodyMode`] the previous one took.

mod error;
mod parser;
mod pinning;
mod response;
mod terminator;

pub use error::MitmError;
pub use parser::{BodyLimits, BodyMode, RequestHead, RequestReader};
pub use pinning::{is_pinning_failure, is_pinning_failure_err, PinningStore};
pub use response::{write_bad_gateway, write_payload_too_large, write_response};
pub use terminator::accept_tls;
