use bytes::BytesMut;
use complyze_core::{
    classify_destination, is_desktop_app_domain, is_passthrough_domain, DestinationClass,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::connect::{decide_route, is_loopback_or_local_host, parse_connect_line, RouteDecision, RouteInputs};
use crate::intercept::handle_deep_inspect;
use crate::pac::{render_metrics, render_pac_script, METRICS_CONTENT_TYPE, PAC_CONTENT_TYPE};
use crate::state::ProxyState;
use crate::tunnel::{run_metadata_tunnel, run_plain_tunnel};

const CONNECT_BUFFER_CAP: usize = 8 * 1024;

/// Accepts loopback TCP connections forever. Each connection's first line
/// decides the path: `CONNECT` goes through the 5-rule tunnel/MITM decision
/// chain; any other HTTP verb is treated as a plain GET against the local
/// PAC/metrics/health surface. Failures inside one connection are logged
/// and never bring down the listener.
pub async fn run(state: ProxyState) -> std::io::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", state.config.listen_port)).await?;
    info!(port = state.config.listen_port, "listener bound");

    loop {
        let (socket, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(state, socket).await {
                debug!(%peer, %err, "connection handler exited with error");
            }
        });
    }
}

async fn handle_connection(
    state: ProxyState,
    mut socket: TcpStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buf = BytesMut::with_capacity(CONNECT_BUFFER_CAP);
    let line = match read_connect_line(&mut socket, &mut buf).await? {
        Some(line) => line,
        None => return Ok(()),
    };

    if !line.to_ascii_uppercase().starts_with("CONNECT ") {
        return serve_local_http(&mut socket, &mut buf, &line, &state).await;
    }

    let target = match parse_connect_line(&line) {
        Ok(target) => target,
        Err(_) => {
            // Malformed CONNECT line: fail-open on routing by tunneling the
            // raw bytes already read, straight through, to whatever the
            // client actually asked for is unknowable, so just close.
            return Ok(());
        }
    };

    let user_agent = extract_user_agent(&buf);
    let settings = state.settings.load();
    let host = target.host.clone();

    let decision = decide_route(&RouteInputs {
        host: &host,
        is_loopback_or_local: is_loopback_or_local_host(&host),
        is_passthrough_domain: is_passthrough_domain(&host),
        is_api_domain: matches!(classify_destination(&host), DestinationClass::Api),
        is_web_ui_domain: matches!(classify_destination(&host), DestinationClass::WebUi),
        is_desktop_app_domain: is_desktop_app_domain(&host),
        proxy_enabled: settings.proxy_enabled,
        desktop_bypass: settings.desktop_bypass,
        is_browser_user_agent: looks_like_browser(user_agent.as_deref()),
        pinning_metadata_only: state.pinning.is_metadata_only(&host, state.config.strict_pin_mode),
        strict_pin_mode: state.config.strict_pin_mode,
    });

    socket.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n").await?;

    match decision {
        RouteDecision::PlainTunnel => {
            run_plain_tunnel(&mut socket, &host, target.port, &[]).await?;
        }
        RouteDecision::MetadataTunnel => {
            run_metadata_tunnel(
                &mut socket,
                &host,
                target.port,
                &[],
                &state.control,
                &state.config.workspace_id,
            )
            .await?;
        }
        RouteDecision::DeepInspect => {
            let pinning = state.pinning.clone();
            handle_deep_inspect(state, socket, host, target.port, pinning).await;
        }
    }

    Ok(())
}

/// Serves the local PAC/metrics/health surface on the same port the CONNECT
/// listener binds. `line` is the already-read request line (e.g.
/// `GET /proxy.pac HTTP/1.1`); `buf` may already hold some or all of the
/// header block read alongside it.
async fn serve_local_http(
    socket: &mut TcpStream,
    buf: &mut BytesMut,
    line: &str,
    state: &ProxyState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    drain_headers(socket, buf).await?;

    let path = line.split_whitespace().nth(1).unwrap_or("");
    let (status_line, content_type, body) = match path {
        "/proxy.pac" => (
            "200 OK",
            PAC_CONTENT_TYPE,
            render_pac_script(state.config.listen_port),
        ),
        "/proxy/metrics" => ("200 OK", METRICS_CONTENT_TYPE, render_metrics(state)),
        "/health" => ("200 OK", "text/plain; charset=utf-8", String::new()),
        _ => ("404 Not Found", "text/plain; charset=utf-8", String::new()),
    };

    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Reads off the socket until the blank line ending the header block is
/// available, so the connection can be cleanly closed afterward without
/// leaving unread request bytes on the wire.
async fn drain_headers(socket: &mut TcpStream, buf: &mut BytesMut) -> std::io::Result<()> {
    loop {
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(());
        }
        let mut chunk = [0u8; 1024];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > CONNECT_BUFFER_CAP {
            return Ok(());
        }
    }
}

/// Reads off the socket until a full request line (terminated by `\r\n`) is
/// available. Only the first line is consumed here; any `CONNECT` never
/// carries a body, so no further bytes need to be read before replying.
async fn read_connect_line(
    socket: &mut TcpStream,
    buf: &mut BytesMut,
) -> std::io::Result<Option<String>> {
    loop {
        if let Some(pos) = find_crlf(buf) {
            let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
            return Ok(Some(line));
        }
        let mut chunk = [0u8; 1024];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > CONNECT_BUFFER_CAP {
            warn!("CONNECT request line exceeded buffer cap, dropping connection");
            return Ok(None);
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Pulls `User-Agent` out of whatever headers followed the `CONNECT` line,
/// if the client sent any before the proxy replied.
fn extract_user_agent(buf: &BytesMut) -> Option<String> {
    let text = String::from_utf8_lossy(buf);
    text.lines()
        .find(|l| l.to_ascii_lowercase().starts_with("user-agent:"))
        .and_then(|l| l.splitn(2, ':').nth(1))
        .map(|v| v.trim().to_string())
}

fn looks_like_browser(user_agent: Option<&str>) -> bool {
    user_agent
        .map(|ua| {
            ["Mozilla", "Chrome", "Safari", "Firefox", "Edg/"]
                .iter()
                .any(|marker| ua.contains(marker))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_browser_user_agents() {
        assert!(looks_like_browser(Some(
            "Mozilla/5.0 (Macintosh) AppleWebKit/605.1 Chrome/120.0"
        )));
        assert!(!looks_like_browser(Some("MyDesktopApp/1.0")));
        assert!(!looks_like_browser(None));
    }

    #[test]
    fn extracts_user_agent_case_insensitively() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"CONNECT api.openai.com:443 HTTP/1.1\r\nUser-Agent: TestClient/1\r\n\r\n");
        assert_eq!(extract_user_agent(&buf).as_deref(), Some("TestClient/1"));
    }

    #[test]
    fn first_line_dispatch_distinguishes_connect_from_get() {
        assert!("CONNECT api.openai.com:443 HTTP/1.1"
            .to_ascii_uppercase()
            .starts_with("CONNECT "));
        assert!(!"GET /proxy.pac HTTP/1.1"
            .to_ascii_uppercase()
            .starts_with("CONNECT "));
    }
}
