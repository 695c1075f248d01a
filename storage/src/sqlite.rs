//! SQLCipher storage backend.

use rusqlite::{Connection, ErrorCode};
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::StorageError;

/// Length of a raw SQLCipher key.
pub const DB_KEY_LEN: usize = 32;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw key for whole-database encryption. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DbKey([u8; DB_KEY_LEN]);

impl DbKey {
    /// Returns `None` unless `bytes` is exactly [`DB_KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let key: [u8; DB_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(key))
    }

    /// SQLCipher raw-key literal: `x'<64 hex digits>'`.
    fn pragma_value(&self) -> Zeroizing<String> {
        let hex = Zeroizing::new(hex::encode(self.0));
        Zeroizing::new(format!("x'{}'", hex.as_str()))
    }
}

impl From<[u8; DB_KEY_LEN]> for DbKey {
    fn from(value: [u8; DB_KEY_LEN]) -> Self {
        Self(value)
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbKey(...Redacted...)")
    }
}

/// Configuration for SQLite storage.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Keyed in-memory database (isolated, gone when the connection closes).
    InMemory { key: DbKey },
    /// SQLCipher encrypted database file, created if absent.
    Encrypted { path: PathBuf, key: DbKey },
}

impl StorageConfig {
    /// An empty location selects an in-memory database; anything else is a
    /// file path.
    pub fn from_location(location: &str, key: DbKey) -> Self {
        if location.is_empty() {
            StorageConfig::InMemory { key }
        } else {
            StorageConfig::Encrypted {
                path: PathBuf::from(location),
                key,
            }
        }
    }

    fn key(&self) -> &DbKey {
        match self {
            StorageConfig::InMemory { key } | StorageConfig::Encrypted { key, .. } => key,
        }
    }
}

/// SQLite database wrapper.
///
/// This provides the core database connection and can be shared
/// across different domain-specific storage implementations.
pub struct SqliteDb {
    conn: Connection,
}

impl SqliteDb {
    /// Opens the database described by `config`, applies the key and checks
    /// that the key actually decrypts it.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let conn = match config {
            StorageConfig::InMemory { .. } => Connection::open_in_memory()?,
            StorageConfig::Encrypted { ref path, .. } => Connection::open(path)?,
        };

        let key = config.key().pragma_value();
        conn.pragma_update(None, "key", key.as_str())?;
        verify_key(&conn)?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if let StorageConfig::Encrypted { ref path, .. } = config {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(path = %path.display(), journal_mode = %mode, "opened encrypted database");
        } else {
            debug!("opened in-memory database");
        }

        Ok(Self { conn })
    }

    /// Creates a keyed in-memory database (useful for testing).
    pub fn in_memory(key: DbKey) -> Result<Self, StorageError> {
        Self::new(StorageConfig::InMemory { key })
    }

    /// Returns a reference to the underlying connection.
    ///
    /// Use this for domain-specific storage operations.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Schema version recorded in `PRAGMA user_version`.
    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Brings the schema up to `version` by running `schema` (which must be
    /// idempotent) inside a transaction. A database written by a newer
    /// version is refused.
    pub fn migrate(&mut self, version: i64, schema: &str) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > version {
            return Err(StorageError::Migration(format!(
                "database schema v{current} is newer than supported v{version}"
            )));
        }
        if current == version {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        tx.execute_batch(schema)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;

        info!(from = current, to = version, "migrated database schema");
        Ok(())
    }
}

/// SQLCipher only notices a wrong key on the first read.
fn verify_key(conn: &Connection) -> Result<(), StorageError> {
    match conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    }) {
        Ok(_) => Ok(()),
        Err(e) if e.sqlite_error_code() == Some(ErrorCode::NotADatabase) => {
            Err(StorageError::WrongKey)
        }
        Err(e) => Err(e.into()),
    }
}
