//! Maps a [`ProviderId`] to its adapter.

use crate::stackexchange::StackExchange;
use socialauth_config::OAuthConfig;
use socialauth_types::{AuthProvider, ProviderId};

/// Build the adapter for `provider` with the default OAuth strategy.
#[must_use]
pub fn build_provider(provider: ProviderId, config: OAuthConfig) -> Box<dyn AuthProvider> {
    match provider {
        ProviderId::StackExchange => Box::new(StackExchange::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_every_provider() {
        for id in ProviderId::all() {
            let config = OAuthConfig {
                id: id.to_string(),
                ..OAuthConfig::new("k", "s")
            };
            let provider = build_provider(*id, config);
            assert_eq!(provider.id(), *id);
            assert_eq!(provider.provider_id(), id.to_string());
        }
    }

    #[test]
    fn test_built_provider_redirects_to_stackexchange() {
        let mut provider = build_provider(ProviderId::StackExchange, OAuthConfig::new("k", "s"));
        let url = provider.login_redirect_url("http://localhost/cb").unwrap();
        assert!(url.starts_with("https://stackexchange.com/oauth?state="));
        assert!(provider.access_grant().is_none());
    }
}
