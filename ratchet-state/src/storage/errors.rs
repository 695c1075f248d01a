use crypto::DecodeError;
use storage::{DB_KEY_LEN, StorageError};
use thiserror::Error;

use crate::types::ConversationId;

/// Errors returned by [`ConversationStore`](super::ConversationStore).
///
/// Messages carry the operation and conversation identity, never key bytes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store is not ready: set a master key and open it first")]
    NotReady,

    #[error("conversation store is already open")]
    AlreadyOpen,

    #[error("master key must be {DB_KEY_LEN} bytes, got {0}")]
    InvalidMasterKey(usize),

    #[error("a different master key is already set")]
    MasterKeyMismatch,

    #[error("cannot open conversation store at {location:?}: {source}")]
    Open {
        location: String,
        source: StorageError,
    },

    #[error("cannot decode conversation {id}: {source}")]
    Decode {
        id: ConversationId,
        source: DecodeError,
    },

    #[error("{op} failed for {target}: {source}")]
    Storage {
        op: &'static str,
        target: String,
        source: StorageError,
    },

    #[error("conversation not found: {0}")]
    NotFound(ConversationId),
}

impl StoreError {
    /// Extended SQLite result code behind an open or storage failure.
    pub fn code(&self) -> Option<i32> {
        match self {
            StoreError::Open { source, .. } | StoreError::Storage { source, .. } => source.code(),
            _ => None,
        }
    }
}
