//! Lichess OAuth endpoint configuration.

use serde::{Deserialize, Serialize};

/// Lichess OAuth configuration.
///
/// Lichess treats this service as a public client: there is no client secret,
/// the token exchange is protected by PKCE instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LichessConfig {
    /// Base URL of the Lichess instance
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth client identifier registered with Lichess
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Requested OAuth scopes
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_base_url() -> String {
    "https://lichess.org".to_string()
}

fn default_client_id() -> String {
    "chesscord".to_string()
}

fn default_scopes() -> Vec<String> {
    ["challenge:read", "challenge:write", "bot:play", "board:play"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LichessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_id: default_client_id(),
            scopes: default_scopes(),
        }
    }
}

impl LichessConfig {
    /// OAuth authorization endpoint
    pub fn auth_endpoint(&self) -> String {
        format!("{}/oauth", self.base_url)
    }

    /// OAuth token exchange endpoint
    pub fn token_endpoint(&self) -> String {
        format!("{}/api/token", self.base_url)
    }

    /// Authenticated account endpoint
    pub fn account_endpoint(&self) -> String {
        format!("{}/api/account", self.base_url)
    }

    /// Build the authorization URL with the PKCE challenge.
    pub fn build_auth_url(&self, challenge: &str, redirect_uri: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&code_challenge_method=S256&code_challenge={}",
            self.auth_endpoint(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(challenge),
        )
    }
}
