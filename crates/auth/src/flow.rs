//! Interactive browser login for a configured provider.

use crate::{callback, registry};
use socialauth_config::Config;
use socialauth_types::{Profile, ProviderId, traits::Result};

/// Run the full interactive login flow for the given provider.
///
/// Binds the callback port before opening the browser, then verifies the
/// redirect and returns the normalized profile.
///
/// # Errors
///
/// Returns an error if the provider is not configured, the callback cannot be
/// received, the state does not match, or the token/profile requests fail.
pub async fn login(provider: ProviderId, config: &Config) -> Result<Profile> {
    let mut adapter = registry::build_provider(provider, config.provider(provider)?);
    let success_url = config.success_url();
    let auth_url = adapter.login_redirect_url(&success_url)?;

    let listener = callback::bind_callback(config.callback_port).await?;
    open_browser(&auth_url);

    let params = callback::accept_callback(listener, callback::callback_path(&success_url)).await?;
    let profile = adapter.verify_response(&params).await?;
    tracing::info!(
        %provider,
        user = profile.validated_id.as_deref().unwrap_or("unknown"),
        "login successful"
    );
    Ok(profile)
}

/// Authorization URL for `provider`, redirecting back to `success_url`.
///
/// # Errors
///
/// Returns an error if the provider is not configured or the URL cannot be built.
pub fn authorization_url(provider: ProviderId, config: &Config, success_url: &str) -> Result<String> {
    let mut adapter = registry::build_provider(provider, config.provider(provider)?);
    adapter.login_redirect_url(success_url)
}

fn open_browser(url: &str) {
    eprintln!("Opening browser: {url}");
    if let Err(e) = open::that(url) {
        tracing::warn!(error = %e, "failed to open browser automatically");
        eprintln!("Please open the following URL manually to complete login:");
        eprintln!("{url}");
    }
}
