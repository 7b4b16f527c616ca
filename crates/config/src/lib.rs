//! Configuration loading for socialauth providers.
//!
//! Uses figment for YAML-based configuration with sensible defaults,
//! overridable from `SOCIALAUTH_`-prefixed environment variables.

pub mod schema;

pub use schema::{Config, OAuthConfig};
