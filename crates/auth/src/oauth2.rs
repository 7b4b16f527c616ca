//! Generic OAuth 2.0 authorization-code strategy.
//!
//! Provider adapters hand this strategy their endpoints and scope; it builds
//! the authorization URL, exchanges the returned code at the token endpoint,
//! and attaches the resulting access token to API feeds.

use async_trait::async_trait;
use serde_json::{Map, Value};
use socialauth_config::OAuthConfig;
use socialauth_types::{
    AccessGrant, FeedResponse, MethodType, OAuthStrategy, Params, Permission, SocialAuthError,
    traits::Result,
};

/// Authorization and token endpoints of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorization_url: String,
    pub access_token_url: String,
}

/// OAuth 2.0 strategy over an [`rquest::Client`].
pub struct OAuth2 {
    config: OAuthConfig,
    endpoints: Endpoints,
    http: rquest::Client,
    permission: Permission,
    scope: Option<String>,
    success_url: Option<String>,
    grant: Option<AccessGrant>,
}

impl OAuth2 {
    #[must_use]
    pub fn new(config: OAuthConfig, endpoints: Endpoints) -> Self {
        Self::with_client(config, endpoints, rquest::Client::new())
    }

    #[must_use]
    pub fn with_client(config: OAuthConfig, endpoints: Endpoints, http: rquest::Client) -> Self {
        Self {
            config,
            endpoints,
            http,
            permission: Permission::Default,
            scope: None,
            success_url: None,
            grant: None,
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    #[must_use]
    pub fn permission(&self) -> Permission {
        self.permission
    }
}

/// Build the authorization URL for the code flow.
///
/// Parameters are appended with `&` when `authorization_url` already carries a
/// query (e.g. a pre-bound `state`).
///
/// # Errors
///
/// Returns an error if the parameters cannot be form-encoded.
pub fn build_login_url(
    authorization_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: Option<&str>,
) -> Result<String> {
    let mut params = vec![
        ("client_id", client_id),
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(scope) = scope.filter(|s| !s.is_empty()) {
        params.push(("scope", scope));
    }
    let query = serde_urlencoded::to_string(&params)
        .map_err(|e| SocialAuthError::Auth(format!("cannot encode login url: {e}")))?;
    let sep = if authorization_url.contains('?') { '&' } else { '?' };
    Ok(format!("{authorization_url}{sep}{query}"))
}

/// Fail if the callback reports that authorization did not happen.
///
/// # Errors
///
/// Returns [`SocialAuthError::UserDenied`] on `error_reason=user_denied` or
/// `error=access_denied`, and [`SocialAuthError::Auth`] carrying the provider's
/// `error` / `error_description` for any other `error`.
pub fn check_denied(params: &Params) -> Result<()> {
    let error = params.get("error").map(String::as_str);
    let denied = params.get("error_reason").map(String::as_str) == Some("user_denied")
        || error == Some("access_denied");
    if denied {
        return Err(SocialAuthError::UserDenied);
    }
    if let Some(error) = error {
        let message = match params.get("error_description") {
            Some(description) => format!("authorization failed: {error}: {description}"),
            None => format!("authorization failed: {error}"),
        };
        return Err(SocialAuthError::Auth(message));
    }
    Ok(())
}

/// Parse a token endpoint body into an [`AccessGrant`].
///
/// Accepts both JSON and form-encoded bodies; StackExchange answers with
/// `access_token=...&expires=...` unless the `/json` endpoint is used.
///
/// # Errors
///
/// Returns an error if the body cannot be decoded, carries an `error` field, or
/// lacks `access_token`.
pub fn parse_token_response(body: &str, provider_id: &str) -> Result<AccessGrant> {
    let trimmed = body.trim();
    let mut fields: Map<String, Value> = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| SocialAuthError::ServerData {
            message: format!("failed to parse token response ({e})"),
            body: body.to_string(),
        })?
    } else {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(trimmed).map_err(|e| SocialAuthError::ServerData {
                message: format!("failed to parse token response ({e})"),
                body: body.to_string(),
            })?;
        pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    };

    if let Some(error) = fields.get("error") {
        let detail = fields
            .get("error_description")
            .or_else(|| fields.get("error_message"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let code = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        return Err(SocialAuthError::Auth(format!(
            "token endpoint returned {code} {detail}"
        )));
    }

    let key = fields
        .remove("access_token")
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|k| !k.is_empty())
        .ok_or_else(|| SocialAuthError::Auth("missing access_token in response".into()))?;

    let mut grant = AccessGrant::new(key, provider_id);
    let expires = fields
        .remove("expires_in")
        .or_else(|| fields.remove("expires"));
    if let Some(secs) = expires.as_ref().and_then(seconds) {
        grant = grant.with_expiry(secs);
    }
    grant.token_type = fields
        .remove("token_type")
        .and_then(|v| v.as_str().map(str::to_string));
    grant.attributes = fields.into_iter().collect();
    Ok(grant)
}

fn seconds(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn http_method(method: MethodType) -> rquest::Method {
    match method {
        MethodType::Get => rquest::Method::GET,
        MethodType::Post => rquest::Method::POST,
        MethodType::Put => rquest::Method::PUT,
        MethodType::Delete => rquest::Method::DELETE,
    }
}

async fn into_feed(resp: rquest::Response) -> Result<FeedResponse> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    let feed = FeedResponse { status, body };
    if !feed.is_success() {
        return Err(SocialAuthError::Upstream {
            status: feed.status,
            body: feed.body,
        });
    }
    Ok(feed)
}

#[async_trait]
impl OAuthStrategy for OAuth2 {
    fn login_redirect_url(&mut self, success_url: &str) -> Result<String> {
        self.success_url = Some(success_url.to_string());
        build_login_url(
            &self.endpoints.authorization_url,
            &self.config.consumer_key,
            success_url,
            self.scope.as_deref(),
        )
    }

    async fn verify_response(
        &mut self,
        params: &Params,
        method: MethodType,
    ) -> Result<AccessGrant> {
        check_denied(params)?;
        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or(SocialAuthError::MissingCode)?;

        let form = [
            ("client_id", self.config.consumer_key.as_str()),
            ("client_secret", self.config.consumer_secret.as_str()),
            ("redirect_uri", self.success_url.as_deref().unwrap_or_default()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let url = &self.endpoints.access_token_url;
        tracing::info!(url = %url, %method, "exchanging authorization code for access token");
        let request = match method {
            MethodType::Get | MethodType::Delete => {
                self.http.request(http_method(method), url).query(&form)
            }
            MethodType::Post | MethodType::Put => {
                self.http.request(http_method(method), url).form(&form)
            }
        };
        let resp = request.header("Accept", "application/json").send().await?;
        let feed = into_feed(resp).await?;

        let grant = parse_token_response(&feed.body, &self.config.id)?
            .with_permission(self.permission);
        self.grant = Some(grant.clone());
        Ok(grant)
    }

    async fn execute_feed(&self, url: &str) -> Result<FeedResponse> {
        self.execute_feed_with(url, MethodType::Get, &Params::new(), &Params::new(), None)
            .await
    }

    async fn execute_feed_with(
        &self,
        url: &str,
        method: MethodType,
        params: &Params,
        headers: &Params,
        body: Option<&str>,
    ) -> Result<FeedResponse> {
        let grant = self.grant.as_ref().ok_or_else(|| {
            SocialAuthError::Auth("no access grant; verify the provider response first".into())
        })?;

        let mut request = self
            .http
            .request(http_method(method), url)
            .query(&[("access_token", grant.key.as_str())]);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match (method, body) {
            (MethodType::Get | MethodType::Delete, _) => request.query(params),
            (_, Some(body)) => request.query(params).body(body.to_string()),
            (_, None) => request.form(params),
        };

        tracing::debug!(url = %url, %method, "executing feed");
        into_feed(request.send().await?).await
    }

    fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
    }

    fn set_scope(&mut self, scope: String) {
        self.scope = Some(scope);
    }

    fn set_access_grant(&mut self, grant: AccessGrant) {
        self.grant = Some(grant);
    }

    fn access_grant(&self) -> Option<&AccessGrant> {
        self.grant.as_ref()
    }

    fn logout(&mut self) {
        self.grant = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Form, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config() -> OAuthConfig {
        OAuthConfig {
            id: "stackexchange".into(),
            ..OAuthConfig::new("client-1", "secret-1")
        }
    }

    fn strategy(base: &str) -> OAuth2 {
        OAuth2::new(
            config(),
            Endpoints {
                authorization_url: format!("{base}/oauth"),
                access_token_url: format!("{base}/oauth/access_token"),
            },
        )
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_build_login_url_without_query() {
        let url = build_login_url(
            "https://stackexchange.com/oauth",
            "42",
            "http://localhost:54546/callback",
            Some("no_expiry"),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://stackexchange.com/oauth?client_id=42&response_type=code&redirect_uri=http%3A%2F%2Flocalhost%3A54546%2Fcallback&scope=no_expiry"
        );
    }

    #[test]
    fn test_build_login_url_appends_to_existing_query() {
        let url =
            build_login_url("https://example.com/oauth?state=abc", "42", "http://x/cb", None)
                .unwrap();
        assert!(url.starts_with("https://example.com/oauth?state=abc&client_id=42"));
        assert!(!url.contains("scope="));
    }

    #[test]
    fn test_build_login_url_encodes_scope_spaces() {
        let url = build_login_url("https://e/o", "1", "http://x", Some("read_inbox no_expiry"))
            .unwrap();
        assert!(url.ends_with("scope=read_inbox+no_expiry"));
    }

    #[test]
    fn test_check_denied() {
        assert!(check_denied(&params(&[("code", "c")])).is_ok());
        assert!(matches!(
            check_denied(&params(&[("error_reason", "user_denied")])),
            Err(SocialAuthError::UserDenied)
        ));
        assert!(matches!(
            check_denied(&params(&[("error", "access_denied")])),
            Err(SocialAuthError::UserDenied)
        ));
    }

    #[test]
    fn test_check_denied_keeps_provider_reason() {
        let err = check_denied(&params(&[
            ("error", "invalid_request"),
            ("error_description", "redirect_uri mismatch"),
        ]))
        .unwrap_err();
        match err {
            SocialAuthError::Auth(msg) => {
                assert_eq!(msg, "authorization failed: invalid_request: redirect_uri mismatch");
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_token_response_form_encoded() {
        let grant = parse_token_response("access_token=abc(%29&expires=86399", "se").unwrap();
        assert_eq!(grant.key, "abc()");
        assert_eq!(grant.provider_id, "se");
        assert!(grant.expires_at.is_some());
        assert!(grant.attributes.is_empty());
    }

    #[test]
    fn test_parse_token_response_no_expiry() {
        let grant = parse_token_response("access_token=forever", "se").unwrap();
        assert!(grant.expires_at.is_none());
        assert!(!grant.is_expired());
    }

    #[test]
    fn test_parse_token_response_json() {
        let body = r#"{"access_token":"at","expires_in":3600,"token_type":"bearer","scope":"no_expiry"}"#;
        let grant = parse_token_response(body, "se").unwrap();
        assert_eq!(grant.key, "at");
        assert_eq!(grant.token_type.as_deref(), Some("bearer"));
        assert!(grant.expires_at.is_some());
        assert_eq!(grant.attribute("scope"), Some("no_expiry"));
    }

    #[test]
    fn test_parse_token_response_error_field() {
        let body = r#"{"error":"invalid_grant","error_description":"code expired"}"#;
        let err = parse_token_response(body, "se").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid_grant"), "{msg}");
        assert!(msg.contains("code expired"), "{msg}");
    }

    #[test]
    fn test_parse_token_response_missing_access_token() {
        let err = parse_token_response("expires=10", "se").unwrap_err();
        assert!(matches!(err, SocialAuthError::Auth(_)));
    }

    #[test]
    fn test_parse_token_response_bad_json() {
        let err = parse_token_response("{not json", "se").unwrap_err();
        assert!(matches!(err, SocialAuthError::ServerData { .. }));
    }

    #[test]
    fn test_login_redirect_url_uses_scope() {
        let mut s = strategy("https://stackexchange.com");
        s.set_scope("no_expiry".into());
        let url = s.login_redirect_url("http://localhost/cb").unwrap();
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("scope=no_expiry"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%2Fcb"));
    }

    #[tokio::test]
    async fn test_verify_response_missing_code() {
        let mut s = strategy("http://127.0.0.1:9");
        let err = s
            .verify_response(&params(&[("state", "x")]), MethodType::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialAuthError::MissingCode));
    }

    #[tokio::test]
    async fn test_verify_response_user_denied() {
        let mut s = strategy("http://127.0.0.1:9");
        let err = s
            .verify_response(&params(&[("error", "access_denied")]), MethodType::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialAuthError::UserDenied));
    }

    #[tokio::test]
    async fn test_verify_response_error_without_code() {
        let mut s = strategy("http://127.0.0.1:9");
        let err = s
            .verify_response(&params(&[("error", "invalid_scope")]), MethodType::Post)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, SocialAuthError::Auth(msg) if msg.contains("invalid_scope")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_verify_response_posts_form_and_stores_grant() {
        let router = Router::new().route(
            "/oauth/access_token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let ok = form.get("grant_type").map(String::as_str) == Some("authorization_code")
                    && form.get("code").map(String::as_str) == Some("the-code")
                    && form.get("client_id").map(String::as_str) == Some("client-1")
                    && form.get("client_secret").map(String::as_str) == Some("secret-1")
                    && form.get("redirect_uri").map(String::as_str) == Some("http://localhost/cb");
                if ok {
                    (StatusCode::OK, "access_token=tok-1&expires=86399")
                } else {
                    (StatusCode::BAD_REQUEST, "unexpected form")
                }
            }),
        );
        let base = serve(router).await;
        let mut s = strategy(&base);
        s.set_permission(Permission::Custom);
        s.login_redirect_url("http://localhost/cb").unwrap();

        let grant = s
            .verify_response(&params(&[("code", "the-code")]), MethodType::Post)
            .await
            .unwrap();
        assert_eq!(grant.key, "tok-1");
        assert_eq!(grant.provider_id, "stackexchange");
        assert_eq!(grant.permission, Some(Permission::Custom));
        assert_eq!(s.access_grant().map(|g| g.key.as_str()), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_verify_response_get_sends_query() {
        let router = Router::new().route(
            "/oauth/access_token",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                if q.get("code").map(String::as_str) == Some("c") {
                    (StatusCode::OK, r#"{"access_token":"json-tok"}"#)
                } else {
                    (StatusCode::BAD_REQUEST, "missing code")
                }
            }),
        );
        let base = serve(router).await;
        let mut s = strategy(&base);
        let grant = s
            .verify_response(&params(&[("code", "c")]), MethodType::Get)
            .await
            .unwrap();
        assert_eq!(grant.key, "json-tok");
    }

    #[tokio::test]
    async fn test_verify_response_upstream_error() {
        let router = Router::new().route(
            "/oauth/access_token",
            post(|| async { (StatusCode::BAD_REQUEST, r#"{"error_message":"bad code"}"#) }),
        );
        let base = serve(router).await;
        let mut s = strategy(&base);
        let err = s
            .verify_response(&params(&[("code", "c")]), MethodType::Post)
            .await
            .unwrap_err();
        match err {
            SocialAuthError::Upstream { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("bad code"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
        assert!(s.access_grant().is_none());
    }

    #[tokio::test]
    async fn test_execute_feed_requires_grant() {
        let s = strategy("http://127.0.0.1:9");
        let err = s.execute_feed("http://127.0.0.1:9/me").await.unwrap_err();
        assert!(matches!(err, SocialAuthError::Auth(_)));
    }

    #[tokio::test]
    async fn test_execute_feed_attaches_access_token() {
        let router = Router::new().route(
            "/2.2/me",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let ok = q.get("access_token").map(String::as_str) == Some("tok")
                    && q.get("key").map(String::as_str) == Some("k")
                    && q.get("site").map(String::as_str) == Some("stackoverflow");
                if ok {
                    (StatusCode::OK, r#"{"items":[]}"#)
                } else {
                    (StatusCode::BAD_REQUEST, "missing access_token")
                }
            }),
        );
        let base = serve(router).await;
        let mut s = strategy(&base);
        s.set_access_grant(AccessGrant::new("tok", "stackexchange"));
        let feed = s
            .execute_feed(&format!("{base}/2.2/me?key=k&site=stackoverflow"))
            .await
            .unwrap();
        assert_eq!(feed.status, 200);
        assert_eq!(feed.body, r#"{"items":[]}"#);
    }

    #[tokio::test]
    async fn test_execute_feed_with_posts_body_and_headers() {
        let router = Router::new().route(
            "/api",
            post(
                |Query(q): Query<HashMap<String, String>>, headers: HeaderMap, body: String| async move {
                    let ok = q.get("access_token").map(String::as_str) == Some("tok")
                        && headers.get("x-custom").and_then(|v| v.to_str().ok()) == Some("yes")
                        && body == "payload";
                    if ok {
                        (StatusCode::OK, "done")
                    } else {
                        (StatusCode::BAD_REQUEST, "mismatch")
                    }
                },
            ),
        );
        let base = serve(router).await;
        let mut s = strategy(&base);
        s.set_access_grant(AccessGrant::new("tok", "stackexchange"));
        let feed = s
            .execute_feed_with(
                &format!("{base}/api"),
                MethodType::Post,
                &Params::new(),
                &params(&[("x-custom", "yes")]),
                Some("payload"),
            )
            .await
            .unwrap();
        assert_eq!(feed.body, "done");
    }

    #[tokio::test]
    async fn test_logout_drops_grant() {
        let mut s = strategy("http://127.0.0.1:9");
        s.set_access_grant(AccessGrant::new("tok", "stackexchange"));
        s.logout();
        assert!(s.access_grant().is_none());
    }
}
