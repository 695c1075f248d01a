//! Encrypted persistence for ratchet state.
//!
//! Built on the shared `storage` crate: one SQLCipher database holds every
//! conversation row, its staged message keys and the local pre-keys.

mod db;
mod errors;
mod types;

pub use db::ConversationStore;
pub use errors::StoreError;
pub use storage::{DB_KEY_LEN, StorageError};
pub use types::ConversationRecord;
