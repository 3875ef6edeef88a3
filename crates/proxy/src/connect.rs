use thiserror::Error;

/// A parsed `CONNECT host:port` authority. Brackets around an IPv6 literal
/// are stripped; a missing port defaults to 443.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("not a CONNECT request")]
    NotConnect,
    #[error("malformed CONNECT authority")]
    MalformedAuthority,
}

/// Parses the request line of a `CONNECT host:port HTTP/1.1` line. Any
/// other malformed input is the caller's cue to fall back to a plain
/// tunnel (fail-open on routing, per the router's failure semantics).
pub fn parse_connect_line(line: &str) -> Result<ConnectTarget, ConnectError> {
    let mut parts = line.trim_end().splitn(3, ' ');
    let method = parts.next().ok_or(ConnectError::MalformedAuthority)?;
    if !method.eq_ignore_ascii_case("CONNECT") {
        return Err(ConnectError::NotConnect);
    }
    let authority = parts.next().ok_or(ConnectError::MalformedAuthority)?;
    parse_authority(authority)
}

fn parse_authority(authority: &str) -> Result<ConnectTarget, ConnectError> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or(ConnectError::MalformedAuthority)?;
        let port = match rest.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| ConnectError::MalformedAuthority)?,
            None => 443,
        };
        return Ok(ConnectTarget {
            host: host.to_string(),
            port,
        });
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port: u16 = port.parse().map_err(|_| ConnectError::MalformedAuthority)?;
            Ok(ConnectTarget {
                host: host.to_string(),
                port,
            })
        }
        _ if !authority.is_empty() => Ok(ConnectTarget {
            host: authority.to_string(),
            port: 443,
        }),
        _ => Err(ConnectError::MalformedAuthority),
    }
}

/// True for loopback literals and the `.local` mDNS suffix — these never
/// go through inspection or metadata accounting regardless of domain
/// tables.
pub fn is_loopback_or_local_host(host: &str) -> bool {
    host == "localhost"
        || host == "127.0.0.1"
        || host == "::1"
        || host.ends_with(".local")
}

/// Destination routing decision for one CONNECT tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Byte-transparent tunnel, no accounting.
    PlainTunnel,
    /// Byte-transparent tunnel with accumulated byte counts and a single
    /// `metadata-only` activity event on close.
    MetadataTunnel,
    /// TLS termination and request-level inspection.
    DeepInspect,
}

/// Inputs the 5-rule dispatch chain needs, already resolved by the caller
/// from `Settings`/`RuntimeConfig`/the destination tables/pinning state.
pub struct RouteInputs<'a> {
    pub host: &'a str,
    pub is_loopback_or_local: bool,
    pub is_passthrough_domain: bool,
    pub is_api_domain: bool,
    pub is_web_ui_domain: bool,
    pub is_desktop_app_domain: bool,
    pub proxy_enabled: bool,
    pub desktop_bypass: bool,
    pub is_browser_user_agent: bool,
    pub pinning_metadata_only: bool,
    pub strict_pin_mode: bool,
}

/// Implements the dispatch decision for host `H` exactly as enumerated:
/// loopback/local/passthrough first, then the `proxy_enabled` escape
/// hatch, then deep-inspect eligibility, then web-UI/bypass fallthrough,
/// then plain tunnel as the default.
pub fn decide_route(inputs: &RouteInputs<'_>) -> RouteDecision {
    if inputs.is_loopback_or_local || inputs.is_passthrough_domain {
        return RouteDecision::PlainTunnel;
    }

    let is_ai_domain = inputs.is_api_domain || inputs.is_web_ui_domain;
    if !inputs.proxy_enabled && is_ai_domain {
        return RouteDecision::MetadataTunnel;
    }

    let pinning_allows_inspect = !inputs.pinning_metadata_only || inputs.strict_pin_mode;
    let bypass_clause = !inputs.desktop_bypass
        || inputs.is_browser_user_agent
        || !inputs.is_desktop_app_domain;

    if inputs.is_api_domain && pinning_allows_inspect && bypass_clause {
        return RouteDecision::DeepInspect;
    }

    if inputs.is_web_ui_domain || (inputs.is_api_domain && !bypass_clause) {
        return RouteDecision::MetadataTunnel;
    }

    RouteDecision::PlainTunnel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let target = parse_connect_line("CONNECT api.openai.com:443 HTTP/1.1").unwrap();
        assert_eq!(target.host, "api.openai.com");
        assert_eq!(target.port, 443);
    }

    #[test]
    fn defaults_to_443_without_port() {
        let target = parse_connect_line("CONNECT api.openai.com HTTP/1.1").unwrap();
        assert_eq!(target.port, 443);
    }

    #[test]
    fn parses_bracketed_ipv6_authority() {
        let target = parse_connect_line("CONNECT [::1]:8443 HTTP/1.1").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.port, 8443);
    }

    #[test]
    fn rejects_non_connect_lines() {
        assert!(matches!(
            parse_connect_line("GET / HTTP/1.1"),
            Err(ConnectError::NotConnect)
        ));
    }

    fn inputs(host: &str) -> RouteInputs<'_> {
        RouteInputs {
            host,
            is_loopback_or_local: false,
            is_passthrough_domain: false,
            is_api_domain: false,
            is_web_ui_domain: false,
            is_desktop_app_domain: false,
            proxy_enabled: true,
            desktop_bypass: false,
            is_browser_user_agent: false,
            pinning_metadata_only: false,
            strict_pin_mode: false,
        }
    }

    #[test]
    fn loopback_always_tunnels_plain() {
        let mut i = inputs("localhost");
        i.is_loopback_or_local = true;
        i.is_api_domain = true;
        assert_eq!(decide_route(&i), RouteDecision::PlainTunnel);
    }

    #[test]
    fn proxy_disabled_metadata_tunnels_ai_domains() {
        let mut i = inputs("api.openai.com");
        i.is_api_domain = true;
        i.proxy_enabled = false;
        assert_eq!(decide_route(&i), RouteDecision::MetadataTunnel);
    }

    #[test]
    fn api_domain_deep_inspects_by_default() {
        let mut i = inputs("api.openai.com");
        i.is_api_domain = true;
        assert_eq!(decide_route(&i), RouteDecision::DeepInspect);
    }

    #[test]
    fn pinned_api_domain_falls_back_to_metadata_tunnel() {
        let mut i = inputs("api.openai.com");
        i.is_api_domain = true;
        i.pinning_metadata_only = true;
        assert_eq!(decide_route(&i), RouteDecision::MetadataTunnel);
    }

    #[test]
    fn strict_pin_mode_overrides_pinning_state() {
        let mut i = inputs("api.openai.com");
        i.is_api_domain = true;
        i.pinning_metadata_only = true;
        i.strict_pin_mode = true;
        assert_eq!(decide_route(&i), RouteDecision::DeepInspect);
    }

    #[test]
    fn desktop_bypass_non_browser_desktop_app_falls_to_metadata() {
        let mut i = inputs("api.openai.com");
        i.is_api_domain = true;
        i.desktop_bypass = true;
        i.is_desktop_app_domain = true;
        i.is_browser_user_agent = false;
        assert_eq!(decide_route(&i), RouteDecision::MetadataTunnel);
    }

    #[test]
    fn desktop_bypass_browser_user_agent_still_deep_inspects() {
        let mut i = inputs("api.openai.com");
        i.is_api_domain = true;
        i.desktop_bypass = true;
        i.is_desktop_app_domain = true;
        i.is_browser_user_agent = true;
        assert_eq!(decide_route(&i), RouteDecision::DeepInspect);
    }

    #[test]
    fn web_ui_domain_is_metadata_tunnel() {
        let mut i = inputs("chatgpt.com");
        i.is_web_ui_domain = true;
        assert_eq!(decide_route(&i), RouteDecision::MetadataTunnel);
    }

    #[test]
    fn unrelated_domain_is_plain_tunnel() {
        let i = inputs("example.com");
        assert_eq!(decide_route(&i), RouteDecision::PlainTunnel);
    }
}
