//! Provider identifiers, permission levels and HTTP method names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a supported identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "stackexchange", alias = "stackoverflow", alias = "stackapps")]
    StackExchange,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackExchange => write!(f, "stackexchange"),
        }
    }
}

impl std::str::FromStr for ProviderId {
    type Err = crate::SocialAuthError;

    /// Parse a provider name or well-known alias into a [`ProviderId`].
    ///
    /// # Errors
    ///
    /// Returns [`SocialAuthError::UnknownProvider`](crate::SocialAuthError::UnknownProvider)
    /// if the string does not match any known provider name or alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stackexchange" | "stackoverflow" | "stackapps" => Ok(Self::StackExchange),
            other => Err(crate::SocialAuthError::UnknownProvider(other.to_string())),
        }
    }
}

impl ProviderId {
    /// Returns all known provider variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::StackExchange]
    }
}

/// The level of access requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    All,
    AuthenticateOnly,
    #[default]
    Default,
    /// Scopes are taken verbatim from the provider's `custom_permissions`.
    Custom,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::AuthenticateOnly => write!(f, "authenticate_only"),
            Self::Default => write!(f, "default"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// HTTP method used for token exchange and API feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MethodType {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}
