use thiserror::Error;

/// Common storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite reported a failure. `code` is the extended result code when
    /// the failure came from the engine itself.
    #[error("database error (code {code:?}): {message}")]
    Database { code: Option<i32>, message: String },

    /// The key did not decrypt an existing database file.
    #[error("database key rejected: file is not a database or the key is wrong")]
    WrongKey,

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Extended SQLite result code, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            StorageError::Database { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database {
            code: e.sqlite_error().map(|err| err.extended_code),
            message: e.to_string(),
        }
    }
}
