//! StackExchange (StackOverflow, Super User, ...) OAuth 2.0 adapter.
//!
//! Authorization goes through `stackexchange.com/oauth`; the profile comes
//! from the `/me` endpoint of the Stack Exchange API, which additionally needs
//! the application `key` registered on stackapps.com and a target `site`.

use crate::oauth2::{Endpoints, OAuth2};
use crate::state::random_state;
use async_trait::async_trait;
use serde_json::{Map, Value};
use socialauth_config::OAuthConfig;
use socialauth_types::{
    AccessGrant, AuthProvider, Contact, FeedResponse, MethodType, OAuthStrategy, Params,
    Permission, Profile, ProviderId, SocialAuthError, traits::Result,
};

/// StackExchange OAuth authorization endpoint.
pub const AUTHORIZATION_URL: &str = "https://stackexchange.com/oauth";

/// StackExchange OAuth token endpoint.
pub const ACCESS_TOKEN_URL: &str = "https://stackexchange.com/oauth/access_token";

/// Stack Exchange API endpoint returning the authenticated user.
pub const PROFILE_URL: &str = "https://api.stackexchange.com/2.2/me";

/// Scopes requested unless custom permissions are configured.
pub const DEFAULT_SCOPES: &[&str] = &["no_expiry"];

/// Site queried for the profile when the `site` custom property is absent.
pub const DEFAULT_SITE: &str = "stackoverflow";

/// The StackExchange provider, generic over the OAuth strategy it drives.
pub struct StackExchange<S = OAuth2> {
    config: OAuthConfig,
    state: String,
    permission: Permission,
    strategy: S,
    grant: Option<AccessGrant>,
    profile: Option<Profile>,
}

impl StackExchange<OAuth2> {
    /// Configure the provider with the default [`OAuth2`] strategy.
    ///
    /// A fresh `state` is bound into the authorization URL; configured
    /// endpoint overrides replace the defaults.
    #[must_use]
    pub fn new(mut config: OAuthConfig) -> Self {
        let state = random_state();
        let endpoints = resolve_endpoints(&mut config, &state);
        let strategy = OAuth2::new(config.clone(), endpoints);
        Self::from_parts(config, state, strategy)
    }
}

impl<S: OAuthStrategy> StackExchange<S> {
    /// Configure the provider on top of an existing strategy.
    ///
    /// The `state` is appended by [`AuthProvider::login_redirect_url`] when the
    /// strategy's authorization URL does not already carry one.
    #[must_use]
    pub fn with_strategy(config: OAuthConfig, strategy: S) -> Self {
        Self::from_parts(config, random_state(), strategy)
    }

    fn from_parts(config: OAuthConfig, state: String, mut strategy: S) -> Self {
        let permission = if config.custom_permissions.is_some() {
            Permission::Custom
        } else {
            Permission::Default
        };
        strategy.set_permission(permission);
        strategy.set_scope(scope(&config, permission));
        Self {
            config,
            state,
            permission,
            strategy,
            grant: None,
            profile: None,
        }
    }

    /// The anti-CSRF value expected back in the callback.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    #[must_use]
    pub fn permission(&self) -> Permission {
        self.permission
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    async fn fetch_profile(&mut self) -> Result<Profile> {
        let url = profile_url(&self.config)?;
        let response = self.strategy.execute_feed(&url).await.map_err(|e| {
            SocialAuthError::Auth(format!("error while getting profile from {url}: {e}"))
        })?;
        tracing::debug!(body = %response.body, "user profile");

        let profile = normalize_profile(
            &response.body,
            &self.config.id,
            self.config.save_raw_response,
        )?;
        self.profile = Some(profile.clone());
        Ok(profile)
    }
}

/// Effective endpoints for `config`, with `state` bound to the authorization URL.
///
/// The chosen URLs are written back into `config`.
pub fn resolve_endpoints(config: &mut OAuthConfig, state: &str) -> Endpoints {
    let base = config
        .authentication_url
        .as_deref()
        .unwrap_or(AUTHORIZATION_URL);
    let sep = if base.contains('?') { '&' } else { '?' };
    let authorization_url = format!("{base}{sep}state={state}");
    let access_token_url = config
        .access_token_url
        .clone()
        .unwrap_or_else(|| ACCESS_TOKEN_URL.to_string());

    config.authentication_url = Some(authorization_url.clone());
    config.access_token_url = Some(access_token_url.clone());
    Endpoints {
        authorization_url,
        access_token_url,
    }
}

/// `url` with `state` appended, unless its query already has a `state`.
#[must_use]
pub fn bind_state(url: &str, state: &str) -> String {
    let query = url.split_once('?').map(|(_, q)| q);
    let bound = query.is_some_and(|q| q.split('&').any(|pair| pair.starts_with("state=")));
    if bound {
        return url.to_string();
    }
    let sep = if query.is_some() { '&' } else { '?' };
    format!("{url}{sep}state={state}")
}

/// Space-separated scope for `permission`, followed by any plugin scopes.
#[must_use]
pub fn scope(config: &OAuthConfig, permission: Permission) -> String {
    let plugins = config.plugins_scope();
    let mut scopes: Vec<&str> = match (permission, config.custom_permissions.as_deref()) {
        (Permission::Custom, Some(custom)) => custom
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => DEFAULT_SCOPES.to_vec(),
    };
    if let Some(plugins) = plugins.as_deref() {
        scopes.push(plugins);
    }
    scopes.join(" ")
}

/// The `/me` URL for the configured application key and site.
///
/// # Errors
///
/// Returns [`SocialAuthError::Config`] if the `key` custom property is missing.
pub fn profile_url(config: &OAuthConfig) -> Result<String> {
    let key = config.custom_property("key").ok_or_else(|| {
        SocialAuthError::Config(
            "set the `key` custom property of the stackexchange provider \
             (the application key from stackapps.com)"
                .into(),
        )
    })?;
    let site = config.custom_property("site").unwrap_or(DEFAULT_SITE);
    let query = serde_urlencoded::to_string([("key", key), ("site", site)])
        .map_err(|e| SocialAuthError::Config(format!("invalid profile query: {e}")))?;
    Ok(format!("{PROFILE_URL}?{query}"))
}

/// Map the first user of an API `items` wrapper onto a [`Profile`].
///
/// A response without users yields an empty profile.
///
/// # Errors
///
/// Returns [`SocialAuthError::ServerData`] if `body` is not a JSON object, if
/// `items` is not an array, or if its first entry is not an object.
pub fn normalize_profile(body: &str, provider_id: &str, save_raw: bool) -> Result<Profile> {
    let server_data = |message: String| SocialAuthError::ServerData {
        message,
        body: body.to_string(),
    };
    let json: Value = serde_json::from_str(body)
        .map_err(|e| server_data(format!("failed to parse the user profile json ({e})")))?;
    let Value::Object(root) = json else {
        return Err(server_data("the user profile json is not an object".into()));
    };

    let mut profile = Profile::default();
    let user = match root.get("items") {
        None => return Ok(profile),
        Some(Value::Array(items)) => match items.first() {
            None => return Ok(profile),
            Some(Value::Object(user)) => user,
            Some(_) => return Err(server_data("the first profile item is not an object".into())),
        },
        Some(_) => return Err(server_data("the profile `items` field is not an array".into())),
    };

    if let Some(name) = user.get("display_name").and_then(Value::as_str) {
        profile.display_name = Some(name.to_string());
        profile.full_name = Some(name.to_string());
    }
    profile.profile_image_url = text(user, "profile_image");
    profile.validated_id = text(user, "user_id");
    profile.location = text(user, "location");
    profile.provider_id = Some(provider_id.to_string());
    if save_raw {
        profile.raw_response = Some(body.to_string());
    }
    Ok(profile)
}

// Numeric ids are rendered as decimal strings.
fn text(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl<S: OAuthStrategy> AuthProvider for StackExchange<S> {
    fn id(&self) -> ProviderId {
        ProviderId::StackExchange
    }

    fn provider_id(&self) -> &str {
        &self.config.id
    }

    fn login_redirect_url(&mut self, success_url: &str) -> Result<String> {
        let url = self.strategy.login_redirect_url(success_url)?;
        Ok(bind_state(&url, &self.state))
    }

    async fn verify_response(&mut self, params: &Params) -> Result<Profile> {
        if let Some(received) = params.get("state")
            && *received != self.state
        {
            return Err(SocialAuthError::StateMismatch);
        }

        tracing::info!(provider = %self.config.id, "verifying the authentication response from provider");
        let grant = self
            .strategy
            .verify_response(params, MethodType::Post)
            .await?;
        self.grant = Some(grant);
        self.fetch_profile().await
    }

    async fn user_profile(&mut self) -> Result<Option<Profile>> {
        if self.profile.is_none() && self.grant.is_some() {
            self.fetch_profile().await?;
        }
        Ok(self.profile.clone())
    }

    fn access_grant(&self) -> Option<&AccessGrant> {
        self.grant.as_ref()
    }

    fn set_access_grant(&mut self, grant: AccessGrant) -> Result<()> {
        grant.ensure_valid(ProviderId::StackExchange)?;
        self.strategy.set_access_grant(grant.clone());
        self.grant = Some(grant);
        Ok(())
    }

    async fn update_status(&self, _message: &str) -> Result<FeedResponse> {
        tracing::warn!("update status is not implemented for StackExchange");
        Err(SocialAuthError::NotImplemented {
            operation: "update status",
            provider: ProviderId::StackExchange,
        })
    }

    async fn contact_list(&self) -> Result<Vec<Contact>> {
        tracing::warn!("get contact list is not implemented for StackExchange");
        Err(SocialAuthError::NotImplemented {
            operation: "get contact list",
            provider: ProviderId::StackExchange,
        })
    }

    async fn upload_image(
        &self,
        _message: &str,
        _file_name: &str,
        _image: Vec<u8>,
    ) -> Result<FeedResponse> {
        tracing::warn!("upload image is not implemented for StackExchange");
        Err(SocialAuthError::NotImplemented {
            operation: "upload image",
            provider: ProviderId::StackExchange,
        })
    }

    fn logout(&mut self) {
        self.grant = None;
        self.profile = None;
        self.strategy.logout();
    }

    fn set_permission(&mut self, permission: Permission) {
        tracing::debug!(%permission, "permission requested");
        self.permission = permission;
        self.strategy.set_permission(permission);
        self.strategy.set_scope(scope(&self.config, permission));
    }

    async fn api(
        &self,
        url: &str,
        method: MethodType,
        params: &Params,
        headers: &Params,
        body: Option<&str>,
    ) -> Result<FeedResponse> {
        tracing::info!(url = %url, %method, "calling api");
        self.strategy
            .execute_feed_with(url, method, params, headers, body)
            .await
            .map_err(|e| {
                SocialAuthError::Auth(format!("error while making request to URL: {url}: {e}"))
            })
    }

    fn plugins_list(&self) -> Vec<String> {
        self.config.registered_plugins.clone()
    }
}
