use serde::{Deserialize, Serialize};
use socialauth_types::{ProviderId, SocialAuthError};
use std::collections::HashMap;

/// Application credentials and endpoint overrides for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Provider id stamped onto profiles; filled from the map key when empty.
    #[serde(default)]
    pub id: String,
    /// OAuth client id issued by the provider.
    #[serde(default)]
    pub consumer_key: String,
    /// OAuth client secret issued by the provider.
    #[serde(default)]
    pub consumer_secret: String,
    /// Comma-separated scopes that replace the provider defaults.
    #[serde(default)]
    pub custom_permissions: Option<String>,
    /// Overrides the provider's authorization endpoint.
    #[serde(default)]
    pub authentication_url: Option<String>,
    /// Overrides the provider's token endpoint.
    #[serde(default)]
    pub access_token_url: Option<String>,
    /// Provider-specific extras (StackExchange reads `key` and `site`).
    #[serde(default)]
    pub custom_properties: HashMap<String, String>,
    /// Keep the unparsed profile body on the returned profile.
    #[serde(default)]
    pub save_raw_response: bool,
    #[serde(default)]
    pub registered_plugins: Vec<String>,
    /// Extra scope requested on behalf of each plugin, keyed by plugin name.
    #[serde(default)]
    pub plugin_scopes: HashMap<String, String>,
}

impl OAuthConfig {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_custom_property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.custom_properties.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn custom_property(&self, name: &str) -> Option<&str> {
        self.custom_properties.get(name).map(String::as_str)
    }

    /// Scopes contributed by registered plugins, space separated.
    ///
    /// Follows the order of `registered_plugins`; plugins without a scope are skipped.
    #[must_use]
    pub fn plugins_scope(&self) -> Option<String> {
        let scopes: Vec<&str> = self
            .registered_plugins
            .iter()
            .filter_map(|p| self.plugin_scopes.get(p))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if scopes.is_empty() {
            None
        } else {
            Some(scopes.join(" "))
        }
    }
}

fn default_callback_host() -> String {
    "localhost".to_string()
}
fn default_callback_port() -> u16 {
    54546
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host the provider redirects back to (defaults to `localhost`).
    #[serde(default = "default_callback_host")]
    pub callback_host: String,
    /// Local port for the OAuth callback listener (defaults to 54546).
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// Provider configuration map.
    #[serde(default)]
    pub providers: HashMap<ProviderId, OAuthConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callback_host: default_callback_host(),
            callback_port: default_callback_port(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults, then with
    /// `SOCIALAUTH_`-prefixed environment variables (`__` separates levels).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &std::path::Path) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SOCIALAUTH_").split("__"))
            .extract()
    }

    /// Returns the configuration for `provider`, with its `id` filled in.
    ///
    /// # Errors
    ///
    /// Returns [`SocialAuthError::Config`] if the provider is not configured.
    pub fn provider(&self, provider: ProviderId) -> Result<OAuthConfig, SocialAuthError> {
        let mut config = self
            .providers
            .get(&provider)
            .cloned()
            .ok_or_else(|| SocialAuthError::Config(format!("provider {provider} is not configured")))?;
        if config.id.is_empty() {
            config.id = provider.to_string();
        }
        Ok(config)
    }

    /// The redirect URL the provider sends the browser back to.
    #[must_use]
    pub fn success_url(&self) -> String {
        format!(
            "http://{}:{}/callback",
            self.callback_host, self.callback_port
        )
    }
}
