//! Encrypted link storage using SQLite.
//!
//! Persists the Discord-to-Lichess link produced by a completed OAuth flow.
//! Access tokens are encrypted at rest using AES-256-GCM.
//!
//! # Schema
//! ```sql
//! CREATE TABLE linked_users (
//!     id TEXT PRIMARY KEY,              -- Discord user id
//!     lichess_username TEXT NOT NULL,
//!     lichess_token TEXT NOT NULL,      -- Encrypted (hex)
//!     token_nonce TEXT NOT NULL,        -- Nonce for lichess_token (hex)
//!     expires_at TEXT NOT NULL,         -- ISO 8601 timestamp
//!     created_at TEXT NOT NULL,         -- ISO 8601 timestamp
//!     updated_at TEXT NOT NULL          -- ISO 8601 timestamp
//! );
//! ```
//!
//! # Resource handling
//! Connections come from a bounded r2d2 pool. A connection is acquired only
//! when a statement is about to run, never while an outbound HTTP call is in
//! flight, and the pooled guard returns it on drop on every exit path.

use super::{encryption, LinkedAccount};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Encrypted link storage backed by a pooled SQLite database.
pub struct LinkStore {
    pool: Pool<SqliteConnectionManager>,
    encryption_key: Vec<u8>,
}

impl LinkStore {
    /// Creates or opens a link store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file
    /// * `encryption_key` - Hex-encoded 32-byte master key
    /// * `pool_size` - Maximum number of pooled connections
    ///
    /// # Returns
    /// * `Ok(LinkStore)` - Initialized store
    /// * `Err` - If database creation fails or key is invalid
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str, pool_size: u32) -> Result<Self> {
        let key_bytes =
            encryption::validate_key(encryption_key).context("Invalid encryption key")?;

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .context("Failed to create connection pool")?;

        let conn = pool.get().context("Failed to open database")?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS linked_users (
                id TEXT PRIMARY KEY,
                lichess_username TEXT NOT NULL,
                lichess_token TEXT NOT NULL,
                token_nonce TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create linked_users table")?;

        Ok(Self {
            pool,
            encryption_key: key_bytes,
        })
    }

    /// Writes or replaces the link record for a Discord user.
    ///
    /// The access token is encrypted before the connection is acquired, so the
    /// pool is only touched once there is a complete record to write.
    ///
    /// # Returns
    /// * `Ok(())` - Record stored
    /// * `Err` - If the token is empty, or encryption / the write fails
    pub fn upsert(&self, account: &LinkedAccount) -> Result<()> {
        // A record must never exist without a usable token
        if account.access_token.is_empty() {
            return Err(anyhow!("Refusing to store an empty access token"));
        }

        let (token_encrypted, token_nonce) =
            encryption::encrypt(&account.access_token, &self.encryption_key)
                .context("Failed to encrypt access token")?;

        let now = Utc::now().to_rfc3339();

        let conn = self
            .pool
            .get()
            .context("Failed to acquire storage connection")?;
        conn.execute(
            r#"
            INSERT INTO linked_users (
                id, lichess_username, lichess_token, token_nonce,
                expires_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                lichess_username = excluded.lichess_username,
                lichess_token = excluded.lichess_token,
                token_nonce = excluded.token_nonce,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
            params![
                account.discord_id,
                account.lichess_username,
                token_encrypted,
                token_nonce,
                account.expires_at.to_rfc3339(),
                now,
                now,
            ],
        )
        .context("Failed to store link record")?;

        Ok(())
    }

    /// Retrieves the link record for a Discord user, decrypting the token.
    ///
    /// # Returns
    /// * `Ok(Some(LinkedAccount))` - Record found and decrypted
    /// * `Ok(None)` - No record for this user
    /// * `Err` - If decryption or the query fails
    pub fn get(&self, discord_id: &str) -> Result<Option<LinkedAccount>> {
        let conn = self
            .pool
            .get()
            .context("Failed to acquire storage connection")?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT lichess_username, lichess_token, token_nonce, expires_at
                FROM linked_users
                WHERE id = ?1
                "#,
            )
            .context("Failed to prepare query")?;

        let mut rows = stmt
            .query(params![discord_id])
            .context("Failed to execute query")?;

        if let Some(row) = rows.next().context("Failed to read row")? {
            let lichess_username: String = row.get(0)?;
            let token_encrypted: String = row.get(1)?;
            let token_nonce: String = row.get(2)?;
            let access_token =
                encryption::decrypt(&token_encrypted, &token_nonce, &self.encryption_key)
                    .context("Failed to decrypt access token")?;

            let expires_at: String = row.get(3)?;
            let expires_at = DateTime::parse_from_rfc3339(&expires_at)
                .map(|dt| dt.with_timezone(&Utc))
                .context("Failed to parse expires_at timestamp")?;

            Ok(Some(LinkedAccount {
                discord_id: discord_id.to_string(),
                lichess_username,
                access_token,
                expires_at,
            }))
        } else {
            Ok(None)
        }
    }

    /// Deletes the link record for a Discord user.
    ///
    /// # Returns
    /// * `Ok(true)` - Record deleted
    /// * `Ok(false)` - No record found
    /// * `Err` - If the delete fails
    pub fn delete(&self, discord_id: &str) -> Result<bool> {
        let conn = self
            .pool
            .get()
            .context("Failed to acquire storage connection")?;
        let rows_affected = conn
            .execute(
                "DELETE FROM linked_users WHERE id = ?1",
                params![discord_id],
            )
            .context("Failed to delete link record")?;

        Ok(rows_affected > 0)
    }
}
