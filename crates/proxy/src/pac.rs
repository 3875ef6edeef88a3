use complyze_core::{API_DOMAINS, WEB_UI_DOMAINS};

use crate::state::ProxyState;

/// Renders the `dnsDomainIs` checks for one AI-domain table, one per line.
fn domain_checks(domains: &[&str]) -> String {
    domains
        .iter()
        .map(|d| format!("dnsDomainIs(host, \"{d}\")"))
        .collect::<Vec<_>>()
        .join(" ||\n        ")
}

/// Builds the PAC script body: AI API and web-UI domains route through the
/// proxy, everything else goes `DIRECT`.
pub fn render_pac_script(port: u16) -> String {
    let ai_domains = domain_checks(API_DOMAINS);
    let web_ui_domains = domain_checks(WEB_UI_DOMAINS);
    format!(
        r#"function FindProxyForURL(url, host) {{
    if ({ai_domains} ||
        {web_ui_domains}) {{
        return "PROXY 127.0.0.1:{port}; DIRECT";
    }}
    return "DIRECT";
}}"#
    )
}

pub fn render_metrics(state: &ProxyState) -> String {
    state.metrics.render()
}

/// Content type to pair with `render_pac_script`'s output.
pub const PAC_CONTENT_TYPE: &str = "application/x-ns-proxy-autoconfig";
/// Content type to pair with `render_metrics`'s output.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=1.0.0; charset=utf-8";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_ai_domains_and_falls_back_to_direct() {
        let script = render_pac_script(8080);
        assert!(script.contains("dnsDomainIs(host, \"api.openai.com\")"));
        assert!(script.contains("PROXY 127.0.0.1:8080; DIRECT"));
        assert!(script.trim_end().ends_with("return \"DIRECT\";"));
    }
}
