//! Per-browser session state for the linking flow.
//!
//! The landing request, `/login`, and `/callback` are three independent HTTP
//! requests whose only shared context is a session token held in a browser
//! cookie. Each session carries the initiating Discord id and the PKCE code
//! verifier until the callback consumes them.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// State attached to one browser session.
#[derive(Clone, Debug)]
pub struct SessionEntry {
    /// Discord id supplied on the landing request; absent when the user
    /// navigated here without going through the bot
    pub discord_id: Option<String>,
    /// PKCE verifier written by `/login`, read back by `/callback`
    pub code_verifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Session store with automatic expiration.
///
/// Entries are keyed by an opaque token, so concurrent flows only ever
/// contend on their own key.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a new session store.
    ///
    /// # Arguments
    /// * `ttl_seconds` - How long sessions remain resolvable (default: 86400 = 24 hours)
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Session lifetime in seconds, for the cookie Max-Age.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Create a new session and return its token (UUID v4).
    pub fn begin(&self, discord_id: Option<String>) -> String {
        let token = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            discord_id,
            code_verifier: None,
            created_at: Utc::now(),
        };

        self.sessions.insert(token.clone(), entry);
        token
    }

    /// Update the Discord id on an existing session.
    ///
    /// Returns false if the session is unknown or expired.
    pub fn set_discord_id(&self, token: &str, discord_id: &str) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut entry) if !self.expired(&entry) => {
                entry.discord_id = Some(discord_id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Attach a code verifier to a session, overwriting any prior one (only
    /// one login attempt is in flight per session).
    ///
    /// Returns false if the session is unknown or expired.
    pub fn set_verifier(&self, token: &str, verifier: &str) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut entry) if !self.expired(&entry) => {
                entry.code_verifier = Some(verifier.to_string());
                true
            }
            _ => false,
        }
    }

    /// Read back a session's state.
    ///
    /// Returns None for unknown or expired sessions; callers must treat that
    /// as a failed flow, never as empty credentials.
    pub fn resolve(&self, token: &str) -> Option<SessionEntry> {
        let entry = self.sessions.get(token)?;
        if self.expired(&entry) {
            return None;
        }
        Some(entry.value().clone())
    }

    /// Drop a session (called when the callback has consumed it).
    pub fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Clean up expired sessions (called periodically).
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.sessions
            .retain(|_, entry| now - entry.created_at <= self.ttl);
    }

    /// Number of live entries (for monitoring).
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    fn expired(&self, entry: &SessionEntry) -> bool {
        Utc::now() - entry.created_at > self.ttl
    }
}

/// Background task to periodically clean up expired sessions.
pub async fn run_session_cleanup(store: SessionStore, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.cleanup_expired();
        tracing::debug!("Session cleanup complete, {} sessions remaining", store.count());
    }
}
