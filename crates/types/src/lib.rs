//! Core types and traits for the socialauth workspace.
//!
//! This crate defines the shared abstractions used by every provider adapter:
//! the error type, provider identifiers, access grants, the normalized
//! profile shape, and the async traits that strategies and adapters implement.

pub mod error;
pub mod grant;
pub mod profile;
pub mod provider;
pub mod traits;

pub use error::SocialAuthError;
pub use grant::AccessGrant;
pub use profile::{Contact, Profile};
pub use provider::{MethodType, Permission, ProviderId};
pub use traits::{AuthProvider, FeedResponse, OAuthStrategy, Params};
