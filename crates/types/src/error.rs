//! Unified error type for the socialauth workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across socialauth crates.
#[derive(Debug, Error)]
pub enum SocialAuthError {
    /// OAuth or credential authentication failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The `state` returned by the provider differs from the one issued.
    #[error("state parameter value does not match with expected value")]
    StateMismatch,

    /// The user declined the authorization prompt.
    #[error("user denied the requested permissions")]
    UserDenied,

    /// The provider redirected back without an authorization code.
    #[error("verification code is missing from the provider response")]
    MissingCode,

    /// The access grant has expired and cannot be used.
    #[error("access token expired for provider: {0}")]
    AccessTokenExpired(crate::ProviderId),

    /// The provider answered with data that could not be interpreted.
    #[error("{message}: {body}")]
    ServerData { message: String, body: String },

    /// The provider does not offer the requested operation.
    #[error("{operation} is not implemented for {provider}")]
    NotImplemented {
        operation: &'static str,
        provider: crate::ProviderId,
    },

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(String),

    /// The provider returned a non-success status.
    #[error("upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// No provider is registered under the given name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "rquest")]
impl From<rquest::Error> for SocialAuthError {
    fn from(e: rquest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl SocialAuthError {
    /// Returns `true` if the error is likely transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            Self::Http(_) => true,
            _ => false,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SocialAuthError>;
