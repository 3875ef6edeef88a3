//! Upstream forwarder: opens the real TLS connection to the destination
//! host and streams the request/response pair over HTTP/1.1.

mod error;
mod forward;
mod headers;
mod tls;

pub use error::ForwardError;
pub use forward::{forward, ForwardedResponse};
pub use headers::{is_event_stream, rewrite_content_length, strip_hop_by_hop};
pub use tls::{connect_tls, upstream_tls_connector};
