// Credential storage with per-entry expiry
//
// Entries behave like browser cookies: each one carries its own expiry and
// is dropped on read once it has lapsed.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::types::{
    Credentials, SameSite, StorageOptions, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use crate::error::{ClientError, Result};

/// A stored value together with its attributes
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl StoredEntry {
    fn new(value: &str, options: StorageOptions) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Utc::now() + options.ttl,
            secure: options.secure,
            same_site: options.same_site,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Key-value store with expiry semantics holding the session credentials
pub trait CredentialStore: Send + Sync {
    /// Live entry for `key`; expired entries are never returned
    fn entry(&self, key: &str) -> Result<Option<StoredEntry>>;

    fn set(&self, key: &str, value: &str, options: StorageOptions) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entry(key)?.map(|e| e.value))
    }
}

/// Both tokens, if both are present and unexpired
pub fn load_credentials(store: &dyn CredentialStore) -> Result<Option<Credentials>> {
    let access_token = store.get(ACCESS_TOKEN_KEY)?;
    let refresh_token = store.get(REFRESH_TOKEN_KEY)?;

    Ok(match (access_token, refresh_token) {
        (Some(access_token), Some(refresh_token)) => Some(Credentials {
            access_token,
            refresh_token,
        }),
        _ => None,
    })
}

/// In-process store, lost when the process exits
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let mut entries = self.entries();
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.is_expired(Utc::now()),
        };

        if expired {
            tracing::debug!(key = key, "Dropping expired credential");
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, options: StorageOptions) -> Result<()> {
        self.entries()
            .insert(key.to_string(), StoredEntry::new(value, options));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// SQLite-backed store so a session survives between CLI invocations
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open (or create) the credential database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ClientError::Store(format!(
                        "Failed to create credential directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        tracing::debug!("Opening credential store: {}", path.display());
        Self::init(rusqlite::Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS auth_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                secure INTEGER NOT NULL DEFAULT 0,
                same_site TEXT NOT NULL DEFAULT 'strict'
            )",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for SqliteStore {
    fn entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let conn = self.conn();

        let row: Option<(String, String, bool, String)> = conn
            .query_row(
                "SELECT value, expires_at, secure, same_site FROM auth_kv WHERE key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((value, expires_at, secure, same_site)) = row else {
            return Ok(None);
        };

        let entry = StoredEntry {
            value,
            expires_at: parse_datetime(&expires_at)?,
            secure,
            same_site: SameSite::parse(&same_site),
        };

        if entry.is_expired(Utc::now()) {
            tracing::debug!(key = key, "Dropping expired credential");
            conn.execute("DELETE FROM auth_kv WHERE key = ?1", [key])?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    fn set(&self, key: &str, value: &str, options: StorageOptions) -> Result<()> {
        let entry = StoredEntry::new(value, options);
        self.conn().execute(
            "INSERT OR REPLACE INTO auth_kv (key, value, expires_at, secure, same_site)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                key,
                entry.value,
                entry.expires_at.to_rfc3339(),
                entry.secure,
                entry.same_site.as_str()
            ],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM auth_kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// Parse datetime from ISO 8601 formats
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    // Handle Z suffix
    let normalized = if s.ends_with('Z') {
        s.replace('Z', "+00:00")
    } else {
        s.to_string()
    };

    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ClientError::Store(format!("Failed to parse datetime {}: {}", s, e)))
}
