//! Access grant representation and expiry logic.

use crate::{Permission, ProviderId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The credential obtained from a provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// The access token.
    pub key: String,
    /// Token secret (OAuth 1.0a providers only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
    /// Remaining fields of the token response, kept verbatim.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl AccessGrant {
    /// Create a grant for `provider_id` holding the given access token.
    pub fn new(key: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: None,
            expires_at: None,
            token_type: None,
            provider_id: provider_id.into(),
            permission: None,
            attributes: HashMap::new(),
        }
    }

    /// Set the expiry to `expires_in_secs` seconds from now.
    #[must_use]
    pub fn with_expiry(mut self, expires_in_secs: u64) -> Self {
        self.expires_at = Some(unix_now() + expires_in_secs);
        self
    }

    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Return `true` if the grant expires within 60 seconds.
    ///
    /// Grants without an expiry (e.g. StackExchange `no_expiry`) never expire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        unix_now() + 60 >= expires_at
    }

    /// Fail with [`SocialAuthError::AccessTokenExpired`](crate::SocialAuthError::AccessTokenExpired)
    /// if the grant can no longer be used.
    ///
    /// # Errors
    ///
    /// Returns an error when [`is_expired`](Self::is_expired) is `true`.
    pub fn ensure_valid(&self, provider: ProviderId) -> crate::error::Result<()> {
        if self.is_expired() {
            return Err(crate::SocialAuthError::AccessTokenExpired(provider));
        }
        Ok(())
    }

    /// Look up a string attribute from the original token response.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(serde_json::Value::as_str)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
