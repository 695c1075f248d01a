//! Per-conversation Double Ratchet state and its encrypted store.
//!
//! [`RatchetState`] is the value a ratchet engine reads and mutates while
//! sending and receiving; [`ConversationStore`] persists it keyed by
//! `(local user, remote user, remote device)`.

pub mod state;
pub mod storage;
mod types;

pub use crate::state::RatchetState;
pub use crate::storage::{ConversationRecord, ConversationStore, StoreError};
pub use crate::types::{ConversationId, SecretBytes};
pub use crypto::{CurveType, DecodeError, DhKeyPair, DhPublicKey, generate_key_pair};
