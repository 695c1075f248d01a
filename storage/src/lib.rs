//! Shared storage layer.
//!
//! Wraps a single SQLCipher connection: the whole database file is encrypted
//! with a raw 32-byte key, and domain crates put their own schema on top via
//! [`SqliteDb::migrate`].

mod error;
mod sqlite;

pub use error::StorageError;
pub use sqlite::{DB_KEY_LEN, DbKey, SqliteDb, StorageConfig};

// Re-export rusqlite types that domain crates will need
pub use rusqlite::{
    Connection, Error as RusqliteError, OptionalExtension, Params, Row, params,
};
