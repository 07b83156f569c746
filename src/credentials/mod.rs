//! Encrypted storage for linked Lichess accounts.
//!
//! A `LinkedAccount` holds the plaintext access token only while in memory.
//! The store encrypts the token with AES-256-GCM before it touches SQLite and
//! decrypts it transparently on read.
//!
//! # Security
//!
//! - Tokens are encrypted at rest, one fresh nonce per record
//! - The master key comes from the environment and stays in memory only
//! - Authenticated encryption (tampering detected on read)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use storage::LinkStore;

// Re-export encryption functions for testing/utilities
pub use encryption::{decrypt, encrypt, validate_key};

/// A Discord user's linked Lichess account.
///
/// The `access_token` field is plaintext; it exists in this form only in
/// memory during the callback flow and when read back by a consumer. Never
/// log it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkedAccount {
    /// Discord user id (storage primary key)
    pub discord_id: String,

    /// Lichess username of the linked account
    pub lichess_username: String,

    /// Lichess OAuth access token (plaintext in memory only)
    pub access_token: String,

    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}
