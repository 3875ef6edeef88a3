use std::time::Duration;

use complyze_control::ControlPlaneClient;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

const TUNNEL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Copies from `reader` to `writer` until EOF or until a single `read` call
/// goes unanswered for `idle`. The deadline is per-`read`, not over the
/// whole copy, so it resets on every byte of activity rather than killing
/// a long-lived but busy connection.
async fn copy_with_idle_timeout<R, W>(mut reader: R, mut writer: W, idle: Duration) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = match timeout(idle, reader.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(err)) => return Err(err),
            Err(_) => break,
        };
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.shutdown().await.ok();
    Ok(total)
}

/// Opens a raw TCP connection to `host:port`, flushes `prelude` (any bytes
/// already read past the `CONNECT` line), then copies bytes in both
/// directions until either side closes or either direction idles for 30 s
/// with no activity. Returns the `(upstream_bytes, downstream_bytes)` byte
/// counts.
pub async fn run_plain_tunnel<C>(
    client: &mut C,
    host: &str,
    port: u16,
    prelude: &[u8],
) -> std::io::Result<(u64, u64)>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut upstream = TcpStream::connect((host, port)).await?;
    upstream.set_nodelay(true).ok();
    if !prelude.is_empty() {
        upstream.write_all(prelude).await?;
    }

    let (client_read, client_write) = io::split(client);
    let (upstream_read, upstream_write) = io::split(upstream);

    let upload = copy_with_idle_timeout(client_read, upstream_write, TUNNEL_IDLE_TIMEOUT);
    let download = copy_with_idle_timeout(upstream_read, client_write, TUNNEL_IDLE_TIMEOUT);
    let (upload, download) = tokio::join!(upload, download);
    debug!(host, "tunnel closed or idled out");
    Ok((upload?, download?))
}

/// Runs the plain tunnel, then on close posts a single `metadata-only`
/// `ActivityEvent`-shaped record to the control plane. Used for
/// `proxy_enabled=false`, web-UI, desktop-bypass, and pinning-detected
/// hosts — the proxy never inspects these bytes but still accounts for
/// the fact that traffic to `host` occurred.
pub async fn run_metadata_tunnel<C>(
    client: &mut C,
    host: &str,
    port: u16,
    prelude: &[u8],
    control: &ControlPlaneClient,
    workspace_id: &str,
) -> std::io::Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let (upstream_bytes, downstream_bytes) = run_plain_tunnel(client, host, port, prelude).await?;
    debug!(host, upstream_bytes, downstream_bytes, "metadata tunnel closed");

    let event = complyze_control::InterceptEventRequest {
        target_url: format!("https://{host}"),
        method: "CONNECT".to_string(),
        headers: Default::default(),
        body: format!("[metadata-only: {host}]"),
        user_id: String::new(),
        log_only: true,
        dlp: complyze_core::ClassificationResult::empty(),
        workspace_id: workspace_id.to_string(),
        enforcement_action: None,
        blocked: None,
        risk_category: complyze_core::RiskCategory::Low,
    };
    if let Err(err) = control.post_event(event).await {
        warn!(host, %err, "failed to post metadata-only event");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_is_thirty_seconds() {
        assert_eq!(TUNNEL_IDLE_TIMEOUT, Duration::from_secs(30));
    }
}
