use anyhow::{bail, Context, Result};
use serde::Deserialize;

// Re-export the provider config so a TOML file configures everything in one place
pub use crate::api::link::provider::LichessConfig;

/// Complete chesslink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChesslinkConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub lichess: LichessConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the listener to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Public base URL of this service, used to build the OAuth redirect URI
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Where the notification page sends the browser after the flow finishes
    #[serde(default = "default_done_redirect_url")]
    pub done_redirect_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_base_url() -> String {
    "https://auth.chesscord.com".to_string()
}

fn default_done_redirect_url() -> String {
    "https://chesscord.com/discord".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: default_public_base_url(),
            done_redirect_url: default_done_redirect_url(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long a browser session stays resolvable (seconds)
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: i64,
    /// How often expired sessions are swept (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_session_ttl() -> i64 {
    86_400 // 24 hours
}

fn default_cleanup_interval() -> u64 {
    3_600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Link storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Maximum number of pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_db_path() -> String {
    "links.db".to_string()
}

fn default_pool_size() -> u32 {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for ChesslinkConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            lichess: LichessConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl ChesslinkConfig {
    /// Load configuration: an optional TOML file named by `CHESSLINK_CONFIG`,
    /// then environment overrides on top.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("CHESSLINK_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHESSLINK_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("CHESSLINK_PUBLIC_URL") {
            self.server.public_base_url = v;
        }
        if let Ok(v) = std::env::var("CHESSLINK_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Ok(v) = std::env::var("CHESSLINK_CLIENT_ID") {
            self.lichess.client_id = v;
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ChesslinkConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {path}"))?;
    let config: ChesslinkConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {path}"))?;
    Ok(config)
}

/// Read the token encryption key from the environment.
///
/// `ENCRYPTION_KEY` must be 64 hex characters (32 bytes); anything else is a
/// fatal startup error. `ENCRYPTION_IV` is a holdover from the static-IV
/// encryption scheme: a fresh IV is now generated per record, so the variable
/// is unused, but a malformed value still fails startup because it means the
/// deployment configuration is broken.
pub fn encryption_key_from_env() -> Result<String> {
    let key = std::env::var("ENCRYPTION_KEY").context("ENCRYPTION_KEY is not set")?;
    crate::credentials::validate_key(&key).context("ENCRYPTION_KEY is invalid")?;

    if let Ok(iv) = std::env::var("ENCRYPTION_IV") {
        let iv_bytes = hex::decode(&iv).context("ENCRYPTION_IV is set but not valid hex")?;
        if iv_bytes.len() != 16 {
            bail!("ENCRYPTION_IV must be 16 bytes, got {}", iv_bytes.len());
        }
        tracing::warn!("ENCRYPTION_IV is set but unused: a fresh IV is generated per record");
    }

    Ok(key)
}
