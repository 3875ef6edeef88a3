use complyze_core::is_api_domain;
use complyze_policy::DestinationTier;

/// Maps a destination host to the risk-exposure destination tier. The data
/// model has no separate "approved destinations" table, so every known
/// `api_domain` (the public AI provider endpoints this proxy inspects) is
/// treated as `public_ai`; anything else reaching this path is `unknown`.
pub fn tier_for_host(host: &str) -> DestinationTier {
    if is_api_domain(host) {
        DestinationTier::PublicAi
    } else {
        DestinationTier::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_domains_are_public_ai_tier() {
        assert_eq!(tier_for_host("api.openai.com"), DestinationTier::PublicAi);
    }

    #[test]
    fn unknown_hosts_default_to_unknown_tier() {
        assert_eq!(tier_for_host("example.com"), DestinationTier::Unknown);
    }
}
