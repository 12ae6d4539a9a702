//! Authenticated session
//!
//! The session exchanges a [`Credential`] for a bearer token at
//! `{base}/api/security/token` and caches it until [`Session::invalidate_rejected`]
//! drops it. The cache is guarded by a tokio mutex that stays locked while the
//! token request is in flight, so concurrent callers trigger exactly one
//! authentication.

use super::models::TokenResponse;
use super::transport::map_send_error;
use crate::domain::{Credential, ExtractError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::Mutex;

const TOKEN_PATH: &str = "api/security/token";

/// Bearer-token session for one ERP server
pub struct Session {
    token_url: String,
    credential: Credential,
    client: Client,
    auth_timeout: Duration,
    token: Mutex<Option<String>>,
}

impl Session {
    pub fn new(
        base_url: &str,
        credential: Credential,
        client: Client,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            token_url: format!("{}/{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            credential,
            client,
            auth_timeout,
            token: Mutex::new(None),
        }
    }

    /// Requests a new token from the identity endpoint
    ///
    /// This always performs one network call and does not touch the cache.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` with the response body when the endpoint
    /// answers with anything but 200, and `DataFetch` when it cannot be reached.
    pub async fn authenticate(&self) -> Result<String> {
        tracing::debug!(
            token_url = %self.token_url,
            username = %self.credential.username(),
            "Requesting access token"
        );

        let mut headers = base_headers();
        headers.insert("username", header_value("username", self.credential.username())?);
        headers.insert("password", header_value("password", self.credential.password())?);

        let response = self
            .client
            .post(&self.token_url)
            .headers(headers)
            .timeout(self.auth_timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Authentication(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ExtractError::Authentication(format!("Failed to parse token response: {e}"))
        })?;

        let access_token = token.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            ExtractError::Authentication("Token response has no AccessToken".to_string())
        })?;

        tracing::info!(username = %self.credential.username(), "Obtained access token");
        Ok(access_token)
    }

    /// Returns the cached token, authenticating on first use
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.authenticate().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Request headers carrying the bearer token
    ///
    /// `Content-Type` and `Accept` are `application/json`.
    pub async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token().await?;
        bearer_headers(&token)
    }

    /// Drops the cached token only if it is still `rejected`
    ///
    /// A caller whose request was refused with an older token must not throw
    /// away a token another caller has already refreshed. Returns whether the
    /// cache was cleared.
    pub async fn invalidate_rejected(&self, rejected: &str) -> bool {
        let mut cached = self.token.lock().await;
        if cached.as_deref() == Some(rejected) {
            *cached = None;
            tracing::info!("Access token invalidated");
            true
        } else {
            tracing::debug!("Rejected token already replaced; keeping the cached one");
            false
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.lock().await.is_some()
    }
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// JSON request headers carrying `token` as a bearer credential
pub fn bearer_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = base_headers();
    headers.insert(
        AUTHORIZATION,
        header_value("authorization", &format!("Bearer {token}"))?,
    );
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        ExtractError::Configuration(format!("'{name}' contains characters not allowed in a header"))
    })
}
