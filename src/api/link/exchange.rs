//! Lichess token exchange and account lookup.
//!
//! The callback flow talks to Lichess through the `LichessApi` trait so tests
//! can substitute a scripted implementation and exercise every failure
//! transition without network access.

use super::provider::LichessConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Per-call timeout for outbound requests to Lichess.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Token endpoint response.
///
/// Lichess answers a rejected code/verifier pair with a body that carries no
/// `access_token`, so the field stays optional here and the caller decides
/// whether the response is usable.
#[derive(Deserialize, Debug, Default)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// The linked account's public profile.
#[derive(Deserialize, Debug, Clone)]
pub struct LichessAccount {
    pub username: String,
}

/// Outbound Lichess API surface used by the callback flow.
#[async_trait]
pub trait LichessApi: Send + Sync {
    /// Exchange an authorization code (plus the stored PKCE verifier) for an
    /// access token. `redirect_uri` must exactly match the one sent in the
    /// authorization request.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse>;

    /// Fetch the account behind an access token. Must only be called after a
    /// successful exchange.
    async fn fetch_account(&self, access_token: &str) -> Result<LichessAccount>;
}

/// `LichessApi` over HTTP via reqwest.
pub struct HttpLichessApi {
    client: reqwest::Client,
    client_id: String,
    token_url: String,
    account_url: String,
}

impl HttpLichessApi {
    pub fn new(config: &LichessConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            token_url: config.token_endpoint(),
            account_url: config.account_endpoint(),
        })
    }
}

#[async_trait]
impl LichessApi for HttpLichessApi {
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let mut form_data = HashMap::new();
        form_data.insert("grant_type", "authorization_code");
        form_data.insert("code", code);
        form_data.insert("redirect_uri", redirect_uri);
        form_data.insert("client_id", self.client_id.as_str());
        form_data.insert("code_verifier", verifier);

        tracing::debug!("Exchanging authorization code for token at {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&form_data)
            .send()
            .await
            .context("Failed to send token exchange request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Token exchange failed with status {}: {}",
                status,
                body
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        tracing::debug!(
            "Token exchange response received, has_token={}, expires_in={:?}",
            token_response.access_token.is_some(),
            token_response.expires_in
        );

        Ok(token_response)
    }

    async fn fetch_account(&self, access_token: &str) -> Result<LichessAccount> {
        let response = self
            .client
            .get(&self.account_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send account request")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Account fetch failed with status {}",
                response.status()
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse account response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_config(base_url: String) -> LichessConfig {
        LichessConfig {
            base_url,
            client_id: "chesscord".to_string(),
            scopes: vec!["board:play".to_string()],
        }
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "lio_1234567890",
            "expires_in": 3600,
            "token_type": "Bearer"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, Some("lio_1234567890".to_string()));
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.token_type, Some("Bearer".to_string()));
    }

    #[test]
    fn test_token_response_empty_body() {
        // A rejected exchange comes back with no usable fields
        let response: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(response.access_token.is_none());
        assert!(response.expires_in.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "code123".into()),
                Matcher::UrlEncoded("code_verifier".into(), "verifier456".into()),
                Matcher::UrlEncoded("client_id".into(), "chesscord".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "https://cb.example/callback".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"lio_abc","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let api = HttpLichessApi::new(&test_config(server.url())).unwrap();
        let token = api
            .exchange_code("code123", "verifier456", "https://cb.example/callback")
            .await
            .unwrap();

        assert_eq!(token.access_token.as_deref(), Some("lio_abc"));
        assert_eq!(token.expires_in, Some(3600));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_non_success_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let api = HttpLichessApi::new(&test_config(server.url())).unwrap();
        let result = api.exchange_code("bad", "verifier", "https://cb").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_account_sends_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/account")
            .match_header("authorization", "Bearer lio_abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"username":"alice"}"#)
            .create_async()
            .await;

        let api = HttpLichessApi::new(&test_config(server.url())).unwrap();
        let account = api.fetch_account("lio_abc").await.unwrap();

        assert_eq!(account.username, "alice");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_account_non_success_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/account")
            .with_status(401)
            .create_async()
            .await;

        let api = HttpLichessApi::new(&test_config(server.url())).unwrap();
        assert!(api.fetch_account("expired").await.is_err());
    }
}
