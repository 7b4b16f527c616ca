//! OAuth authentication flows for all supported providers.
//!
//! [`oauth2::OAuth2`] carries the protocol mechanics; each provider module
//! only supplies endpoints, scopes and profile normalization on top of it.

pub mod callback;
pub mod flow;
pub mod oauth2;
pub mod registry;
pub mod stackexchange;
pub mod state;

pub use oauth2::OAuth2;
pub use registry::build_provider;
pub use stackexchange::StackExchange;
