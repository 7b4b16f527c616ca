//! Async traits shared across all socialauth crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `socialauth-types`, not on each other.

use crate::{AccessGrant, Contact, MethodType, Permission, Profile, ProviderId, SocialAuthError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

pub use crate::error::Result;

/// Query / form parameters and extra headers, keyed by name.
pub type Params = HashMap<String, String>;

/// The outcome of an authenticated HTTP call made on behalf of the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResponse {
    pub status: u16,
    pub body: String,
}

impl FeedResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SocialAuthError::Serialization`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The generic OAuth protocol engine a provider adapter delegates to.
///
/// An adapter only configures endpoints and scopes; building the authorization
/// URL, exchanging the code and signing API calls happen here.
#[async_trait]
pub trait OAuthStrategy: Send + Sync {
    /// Build the URL the browser is sent to, remembering `success_url` as the
    /// redirect target for the later code exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be encoded.
    fn login_redirect_url(&mut self, success_url: &str) -> Result<String>;

    /// Exchange the callback parameters for an access grant and keep it.
    async fn verify_response(&mut self, params: &Params, method: MethodType)
    -> Result<AccessGrant>;

    /// `GET` a protected resource with the current grant attached.
    async fn execute_feed(&self, url: &str) -> Result<FeedResponse>;

    /// Call a protected resource with an arbitrary method, parameters, headers and body.
    async fn execute_feed_with(
        &self,
        url: &str,
        method: MethodType,
        params: &Params,
        headers: &Params,
        body: Option<&str>,
    ) -> Result<FeedResponse>;

    fn set_permission(&mut self, permission: Permission);

    fn set_scope(&mut self, scope: String);

    fn set_access_grant(&mut self, grant: AccessGrant);

    fn access_grant(&self) -> Option<&AccessGrant>;

    /// Forget the current grant.
    fn logout(&mut self);
}

/// A single identity provider as seen by the application.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn id(&self) -> ProviderId;

    /// The configured provider id, stamped onto profiles and grants.
    fn provider_id(&self) -> &str;

    /// URL to redirect the user to for authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy cannot build the URL.
    fn login_redirect_url(&mut self, success_url: &str) -> Result<String>;

    /// Verify the provider's redirect back to the application and return the
    /// user's profile.
    async fn verify_response(&mut self, params: &Params) -> Result<Profile>;

    /// The cached profile, fetched on demand when a grant is present.
    async fn user_profile(&mut self) -> Result<Option<Profile>>;

    fn access_grant(&self) -> Option<&AccessGrant>;

    /// Install a previously obtained grant.
    ///
    /// # Errors
    ///
    /// Returns [`SocialAuthError::AccessTokenExpired`] if the grant has expired.
    fn set_access_grant(&mut self, grant: AccessGrant) -> Result<()>;

    async fn update_status(&self, _message: &str) -> Result<FeedResponse> {
        Err(SocialAuthError::NotImplemented {
            operation: "update status",
            provider: self.id(),
        })
    }

    async fn contact_list(&self) -> Result<Vec<Contact>> {
        Err(SocialAuthError::NotImplemented {
            operation: "get contact list",
            provider: self.id(),
        })
    }

    async fn upload_image(
        &self,
        _message: &str,
        _file_name: &str,
        _image: Vec<u8>,
    ) -> Result<FeedResponse> {
        Err(SocialAuthError::NotImplemented {
            operation: "upload image",
            provider: self.id(),
        })
    }

    fn logout(&mut self);

    fn set_permission(&mut self, permission: Permission);

    /// Make an authenticated call to an arbitrary provider URL.
    async fn api(
        &self,
        url: &str,
        method: MethodType,
        params: &Params,
        headers: &Params,
        body: Option<&str>,
    ) -> Result<FeedResponse>;

    /// Names of the plugins registered for this provider.
    fn plugins_list(&self) -> Vec<String>;
}
