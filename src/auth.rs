use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use url::Url;

use crate::client::build_http_client;
use crate::errors::{AnsError, AuthError, Result};
use crate::types::ServiceKey;

const TOKEN_PATH: &str = "/oauth/token";
const TOKEN_QUERY: &str = "grant_type=client_credentials&response_type=token";
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Refresh tokens this long before the authorization server says they expire
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Upper bound on how long a token is cached, whatever the server claims
const MAX_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Supplies the `Authorization` header for ANS requests
///
/// Implementations must leave an `Authorization` header that is already
/// present untouched.
#[async_trait]
pub trait AuthHeaderProvider: Send + Sync {
    /// Insert an `Authorization` header unless `headers` already carries one
    async fn set_auth_header_if_not_present(
        &self,
        headers: &mut HeaderMap,
    ) -> std::result::Result<(), AuthError>;
}

/// Provider for a bearer token obtained out of band
#[derive(Debug, Clone)]
pub struct StaticToken {
    value: HeaderValue,
}

impl StaticToken {
    /// Create a provider sending `Authorization: Bearer <token>`
    pub fn new(token: &str) -> std::result::Result<Self, AuthError> {
        let mut value = HeaderValue::from_str(&format!("{DEFAULT_TOKEN_TYPE} {token}"))
            .map_err(AuthError::InvalidHeader)?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

#[async_trait]
impl AuthHeaderProvider for StaticToken {
    async fn set_auth_header_if_not_present(
        &self,
        headers: &mut HeaderMap,
    ) -> std::result::Result<(), AuthError> {
        headers
            .entry(AUTHORIZATION)
            .or_insert_with(|| self.value.clone());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug)]
struct CachedToken {
    header: HeaderValue,
    expires_at: DateTime<Utc>,
}

/// OAuth client-credentials provider backed by an XSUAA instance
///
/// The token is fetched on first use and cached until shortly before it
/// expires. Clones of an `AnsClient` share the provider and thus the token.
pub struct Xsuaa {
    client: ClientWithMiddleware,
    token_url: Url,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl Xsuaa {
    /// Create a provider for the given authorization server
    ///
    /// Only scheme, host and port of `oauth_url` are used; the token is
    /// requested from `/oauth/token`.
    ///
    /// # Errors
    ///
    /// Returns an error if `oauth_url` is not a usable base URL or the HTTP
    /// client cannot be built.
    pub fn new(
        oauth_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_client(
            build_http_client(timeout)?,
            oauth_url,
            client_id,
            client_secret,
        )
    }

    /// Create a provider with a custom reqwest middleware client
    pub fn with_client(
        client: ClientWithMiddleware,
        oauth_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self> {
        Ok(Self {
            client,
            token_url: token_url(oauth_url)?,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Create a provider from the OAuth part of a service key
    pub fn from_service_key(key: &ServiceKey, timeout: Duration) -> Result<Self> {
        Self::new(&key.oauth_url, &key.client_id, &key.client_secret, timeout)
    }

    /// Get the token endpoint URL
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[instrument(name = "Xsuaa::fetch_token", skip_all, fields(url = %self.token_url))]
    async fn fetch_token(&self) -> std::result::Result<CachedToken, AuthError> {
        debug!("Fetching OAuth token");

        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(AuthError::Request)?;

        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenStatus {
                url: self.token_url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(AuthError::InvalidToken)?;

        let scheme = match token.token_type.as_deref() {
            Some(t) if !t.is_empty() && !t.eq_ignore_ascii_case(DEFAULT_TOKEN_TYPE) => t,
            _ => DEFAULT_TOKEN_TYPE,
        };
        let mut header = HeaderValue::from_str(&format!("{scheme} {}", token.access_token))
            .map_err(AuthError::InvalidHeader)?;
        header.set_sensitive(true);

        let lifetime = token
            .expires_in
            .saturating_sub(EXPIRY_MARGIN_SECS)
            .clamp(0, MAX_TOKEN_LIFETIME_SECS);
        let expires_at = Utc::now() + TimeDelta::seconds(lifetime);

        debug!(%expires_at, "OAuth token fetched");
        Ok(CachedToken { header, expires_at })
    }
}

#[async_trait]
impl AuthHeaderProvider for Xsuaa {
    async fn set_auth_header_if_not_present(
        &self,
        headers: &mut HeaderMap,
    ) -> std::result::Result<(), AuthError> {
        if headers.contains_key(AUTHORIZATION) {
            return Ok(());
        }

        // Held across the fetch so concurrent callers wait for one token.
        let mut cached = self.cached.lock().await;

        let header = match cached.as_ref() {
            Some(token) if token.expires_at > Utc::now() => token.header.clone(),
            _ => {
                let token = self.fetch_token().await?;
                let header = token.header.clone();
                *cached = Some(token);
                header
            }
        };

        headers.insert(AUTHORIZATION, header);
        Ok(())
    }
}

fn token_url(oauth_url: &str) -> Result<Url> {
    let mut url = Url::parse(oauth_url).map_err(|e| AnsError::InvalidUrl {
        url: oauth_url.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(AnsError::InvalidUrl {
            url: oauth_url.to_string(),
            reason: "cannot be a base URL".to_string(),
        });
    }

    url.set_path(TOKEN_PATH);
    url.set_query(Some(TOKEN_QUERY));
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> Xsuaa {
        Xsuaa::new(&server.uri(), "client-id", "client-secret", Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_token_fetched_once_and_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(query_param("grant_type", "client_credentials"))
            .and(query_param("response_type", "token"))
            .and(basic_auth("client-id", "client-secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "abc",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        for _ in 0..2 {
            let mut headers = HeaderMap::new();
            xsuaa.set_auth_header_if_not_present(&mut headers).await.unwrap();
            assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        }
    }

    #[tokio::test]
    async fn test_expired_token_refetched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "short-lived",
                "expires_in": 0
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        for _ in 0..2 {
            let mut headers = HeaderMap::new();
            xsuaa.set_auth_header_if_not_present(&mut headers).await.unwrap();
            assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer short-lived");
        }
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_clamped() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(query_param("response_type", "token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "long-lived",
                "token_type": "bearer",
                "expires_in": i64::MAX
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        for _ in 0..2 {
            let mut headers = HeaderMap::new();
            xsuaa.set_auth_header_if_not_present(&mut headers).await.unwrap();
            assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer long-lived");
        }

        let expires_at = xsuaa.cached.lock().await.as_ref().unwrap().expires_at;
        assert!(expires_at <= Utc::now() + TimeDelta::seconds(MAX_TOKEN_LIFETIME_SECS));
    }

    #[tokio::test]
    async fn test_negative_expiry_is_not_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "already-expired",
                "expires_in": i64::MIN
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        for _ in 0..2 {
            let mut headers = HeaderMap::new();
            xsuaa.set_auth_header_if_not_present(&mut headers).await.unwrap();
            assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer already-expired");
        }
    }

    #[tokio::test]
    async fn test_existing_header_untouched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer preset"));
        xsuaa.set_auth_header_if_not_present(&mut headers).await.unwrap();

        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer preset");
    }

    #[tokio::test]
    async fn test_token_request_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        let mut headers = HeaderMap::new();
        let result = xsuaa.set_auth_header_if_not_present(&mut headers).await;

        if let Err(AuthError::TokenStatus { url, status, body }) = result {
            assert!(url.ends_with("/oauth/token?grant_type=client_credentials&response_type=token"));
            assert_eq!(status, 401);
            assert_eq!(body, "Bad credentials");
        } else {
            panic!("Expected TokenStatus error");
        }
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_malformed_token_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let xsuaa = provider(&mock_server);

        let mut headers = HeaderMap::new();
        let result = xsuaa.set_auth_header_if_not_present(&mut headers).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_token_url_ignores_path() {
        let xsuaa = Xsuaa::new(
            "https://tenant.authentication.example.com/some/path?x=1#frag",
            "id",
            "secret",
            Duration::from_secs(10),
        )
        .unwrap();

        assert_eq!(
            xsuaa.token_url().as_str(),
            "https://tenant.authentication.example.com/oauth/token?grant_type=client_credentials&response_type=token"
        );
    }

    #[test]
    fn test_invalid_oauth_url() {
        let result = Xsuaa::new("not a url", "id", "secret", Duration::from_secs(10));
        assert!(matches!(result, Err(AnsError::InvalidUrl { .. })));

        let result = Xsuaa::new("mailto:auth@example.com", "id", "secret", Duration::from_secs(10));
        assert!(matches!(result, Err(AnsError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_static_token() {
        let token = StaticToken::new("secret-token").unwrap();

        let mut headers = HeaderMap::new();
        token.set_auth_header_if_not_present(&mut headers).await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret-token");

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        token.set_auth_header_if_not_present(&mut headers).await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Basic xyz");

        assert!(matches!(
            StaticToken::new("bad\ntoken"),
            Err(AuthError::InvalidHeader(_))
        ));
    }
}
