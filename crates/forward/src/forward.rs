use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::ForwardError;
use crate::headers::{is_event_stream, rewrite_content_length, strip_hop_by_hop};
use crate::tls::connect_tls;

/// Result of forwarding one request upstream: the response head plus a body
/// that is either collected (normal responses) or left as a raw stream
/// (`text/event-stream`, forwarded chunk by chunk without buffering).
pub struct ForwardedResponse {
    pub response: Response<Incoming>,
    pub is_event_stream: bool,
}

/// Opens a fresh TLS connection to `host:port`, sends `request` over an
/// HTTP/1.1 connection, and returns the upstream response headers plus a
/// streaming body. The proxy trusts the real upstream normally here — this
/// is the opposite trust direction from the MITM terminator facing the
/// client.
pub async fn forward(
    connector: &TlsConnector,
    host: &str,
    port: u16,
    mut request: Request<Full<Bytes>>,
) -> Result<ForwardedResponse, ForwardError> {
    strip_hop_by_hop(request.headers_mut());
    if let Some(body_len) = request.body().size_hint().exact() {
        rewrite_content_length(request.headers_mut(), body_len as usize);
    }

    let stream = connect_tls(connector, host, port).await?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!(%err, "upstream connection closed");
        }
    });

    let response = sender.send_request(request).await.map_err(|err| {
        warn!(%err, host, "upstream request failed before response headers");
        err
    })?;

    let event_stream = is_event_stream(response.headers());
    Ok(ForwardedResponse {
        response,
        is_event_stream: event_stream,
    })
}
