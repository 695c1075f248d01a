//! Encrypted conversation store.

use std::fmt::Display;

use parking_lot::Mutex;
use storage::{
    Connection, DbKey, OptionalExtension, Params, SqliteDb, StorageConfig, StorageError, params,
};
use tracing::{debug, info, warn};

use super::{errors::StoreError, types::ConversationRecord};
use crate::{
    state::RatchetState,
    types::{ConversationId, SecretBytes},
};

const SCHEMA_VERSION: i64 = 1;

/// Schema for conversation state, staged message keys and pre-keys.
const CONVERSATION_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        local_user TEXT NOT NULL,
        remote_user TEXT NOT NULL,
        remote_device TEXT NOT NULL,
        root_key BLOB,
        chain_key_send BLOB,
        chain_key_recv BLOB,
        ns INTEGER NOT NULL,
        nr INTEGER NOT NULL,
        pns INTEGER NOT NULL,
        ratchet_flag INTEGER NOT NULL CHECK (ratchet_flag IN (0, 1)),
        dhrs_pub BLOB,
        dhrs_priv BLOB,
        dhrr_pub BLOB,
        dhis_pub BLOB,
        dhis_priv BLOB,
        dhir_pub BLOB,
        a0_pub BLOB,
        a0_priv BLOB,
        prekey_id INTEGER NOT NULL,
        device_name TEXT,
        PRIMARY KEY (local_user, remote_user, remote_device)
    );

    CREATE TABLE IF NOT EXISTS staged_message_keys (
        local_user TEXT NOT NULL,
        remote_user TEXT NOT NULL,
        remote_device TEXT NOT NULL,
        mk_iv BLOB NOT NULL,
        created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
        PRIMARY KEY (local_user, remote_user, remote_device, mk_iv),
        FOREIGN KEY (local_user, remote_user, remote_device)
            REFERENCES conversations(local_user, remote_user, remote_device) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_staged_message_keys_created
        ON staged_message_keys(created_at);

    CREATE TABLE IF NOT EXISTS pre_keys (
        pre_key_id INTEGER PRIMARY KEY NOT NULL,
        pre_key_data BLOB NOT NULL
    );
";

// ON CONFLICT .. DO UPDATE rewrites the row in place. INSERT OR REPLACE would
// delete it first and cascade away the staged message keys.
const UPSERT_CONVERSATION: &str = "
    INSERT INTO conversations (
        local_user, remote_user, remote_device,
        root_key, chain_key_send, chain_key_recv,
        ns, nr, pns, ratchet_flag,
        dhrs_pub, dhrs_priv, dhrr_pub,
        dhis_pub, dhis_priv, dhir_pub,
        a0_pub, a0_priv, prekey_id, device_name
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
    ON CONFLICT(local_user, remote_user, remote_device) DO UPDATE SET
        root_key = excluded.root_key,
        chain_key_send = excluded.chain_key_send,
        chain_key_recv = excluded.chain_key_recv,
        ns = excluded.ns,
        nr = excluded.nr,
        pns = excluded.pns,
        ratchet_flag = excluded.ratchet_flag,
        dhrs_pub = excluded.dhrs_pub,
        dhrs_priv = excluded.dhrs_priv,
        dhrr_pub = excluded.dhrr_pub,
        dhis_pub = excluded.dhis_pub,
        dhis_priv = excluded.dhis_priv,
        dhir_pub = excluded.dhir_pub,
        a0_pub = excluded.a0_pub,
        a0_priv = excluded.a0_priv,
        prekey_id = excluded.prekey_id,
        device_name = excluded.device_name
";

const SELECT_CONVERSATION: &str = "
    SELECT root_key, chain_key_send, chain_key_recv,
           ns, nr, pns, ratchet_flag,
           dhrs_pub, dhrs_priv, dhrr_pub,
           dhis_pub, dhis_priv, dhir_pub,
           a0_pub, a0_priv, prekey_id, device_name
    FROM conversations
    WHERE local_user = ?1 AND remote_user = ?2 AND remote_device = ?3
";

enum Lifecycle {
    Uninitialized,
    Keyed(DbKey),
    Ready { key: DbKey, db: SqliteDb },
}

/// Durable home of every conversation's ratchet state.
///
/// Lifecycle is `Uninitialized -> Keyed` ([`set_key`](Self::set_key)) `->
/// Ready` ([`open`](Self::open)); data operations before `Ready` fail with
/// [`StoreError::NotReady`]. The store is `Send + Sync`: share it behind an
/// `Arc`. All statements run on one connection under one lock, so writes to
/// the same conversation are serialized (last one wins) and a reader never
/// sees half a row.
pub struct ConversationStore {
    lifecycle: Mutex<Lifecycle>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    /// Sets the 32-byte master key that encrypts the whole database.
    ///
    /// Repeating the call with the same key is a no-op. A different key is
    /// rejected with [`StoreError::MasterKeyMismatch`] until [`close`](Self::close).
    pub fn set_key(&self, master_key: &[u8]) -> Result<(), StoreError> {
        let key =
            DbKey::from_slice(master_key).ok_or(StoreError::InvalidMasterKey(master_key.len()))?;

        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Uninitialized => {
                *lifecycle = Lifecycle::Keyed(key);
                Ok(())
            }
            Lifecycle::Keyed(current) | Lifecycle::Ready { key: current, .. } => {
                if *current == key {
                    Ok(())
                } else {
                    warn!("rejected attempt to replace the master key");
                    Err(StoreError::MasterKeyMismatch)
                }
            }
        }
    }

    /// Opens (creating if absent) the encrypted database at `location`. An
    /// empty location opens an in-memory database.
    ///
    /// On failure the store stays keyed with the same master key, so a retry
    /// with a different key needs [`close`](Self::close) first.
    pub fn open(&self, location: &str) -> Result<(), StoreError> {
        let mut lifecycle = self.lifecycle.lock();
        let key = match &*lifecycle {
            Lifecycle::Uninitialized => return Err(StoreError::NotReady),
            Lifecycle::Ready { .. } => return Err(StoreError::AlreadyOpen),
            Lifecycle::Keyed(key) => key.clone(),
        };

        let open_failed = |source: StorageError| {
            warn!(location = %display_location(location), error = %source, "failed to open conversation store");
            StoreError::Open {
                location: location.to_string(),
                source,
            }
        };

        let mut db = SqliteDb::new(StorageConfig::from_location(location, key.clone()))
            .map_err(open_failed)?;
        db.migrate(SCHEMA_VERSION, CONVERSATION_SCHEMA)
            .map_err(open_failed)?;

        *lifecycle = Lifecycle::Ready { key, db };
        info!(location = %display_location(location), "conversation store ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Ready { .. })
    }

    /// Closes the database and wipes the master key. The store can be keyed
    /// and opened again afterwards.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Uninitialized) {
            *lifecycle = Lifecycle::Uninitialized;
            info!("conversation store closed");
        }
    }

    fn ready<T>(
        &self,
        f: impl FnOnce(&mut SqliteDb) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &mut *self.lifecycle.lock() {
            Lifecycle::Ready { db, .. } => f(db),
            _ => Err(StoreError::NotReady),
        }
    }

    // === Conversations ===

    /// Inserts or fully overwrites the row for the state's identity.
    pub fn store(&self, state: &RatchetState) -> Result<(), StoreError> {
        let record = state.serialize();
        self.ready(|db| {
            db.connection()
                .execute(
                    UPSERT_CONVERSATION,
                    params![
                        record.id.local_user,
                        record.id.remote_user,
                        record.id.remote_device,
                        record.root_key.as_ref().map(SecretBytes::as_bytes),
                        record.chain_key_send.as_ref().map(SecretBytes::as_bytes),
                        record.chain_key_recv.as_ref().map(SecretBytes::as_bytes),
                        record.ns,
                        record.nr,
                        record.pns,
                        record.ratchet_flag,
                        record.dhrs_pub,
                        record.dhrs_priv.as_ref().map(SecretBytes::as_bytes),
                        record.dhrr_pub,
                        record.dhis_pub,
                        record.dhis_priv.as_ref().map(SecretBytes::as_bytes),
                        record.dhir_pub,
                        record.a0_pub,
                        record.a0_priv.as_ref().map(SecretBytes::as_bytes),
                        record.prekey_id,
                        record.device_name,
                    ],
                )
                .map_err(failed("store", &record.id))?;

            debug!(conversation = %record.id, "stored conversation");
            Ok(())
        })
    }

    /// Loads the last stored state for the identity, or
    /// [`StoreError::NotFound`] if it was never stored.
    pub fn load(
        &self,
        local_user: &str,
        remote_user: &str,
        remote_device: &str,
    ) -> Result<RatchetState, StoreError> {
        let id = ConversationId::new(local_user, remote_user, remote_device);
        let record = self.ready(|db| {
            db.connection()
                .query_row(
                    SELECT_CONVERSATION,
                    params![local_user, remote_user, remote_device],
                    |row| ConversationRecord::from_row(id.clone(), row),
                )
                .optional()
                .map_err(failed("load", &id))
        })?;

        let record = record.ok_or_else(|| StoreError::NotFound(id.clone()))?;
        RatchetState::deserialize(record).map_err(|source| StoreError::Decode { id, source })
    }

    pub fn has_conversation(
        &self,
        local_user: &str,
        remote_user: &str,
        remote_device: &str,
    ) -> Result<bool, StoreError> {
        self.ready(|db| {
            db.connection()
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM conversations
                     WHERE local_user = ?1 AND remote_user = ?2 AND remote_device = ?3)",
                    params![local_user, remote_user, remote_device],
                    |row| row.get(0),
                )
                .map_err(failed(
                    "has_conversation",
                    ConversationId::new(local_user, remote_user, remote_device),
                ))
        })
    }

    /// Removes the conversation and its staged message keys. Returns whether
    /// a row existed; deleting an unknown identity is not an error.
    pub fn delete(
        &self,
        local_user: &str,
        remote_user: &str,
        remote_device: &str,
    ) -> Result<bool, StoreError> {
        let id = ConversationId::new(local_user, remote_user, remote_device);
        self.ready(|db| {
            // Staged keys are deleted via CASCADE
            let changes = db
                .connection()
                .execute(
                    "DELETE FROM conversations
                     WHERE local_user = ?1 AND remote_user = ?2 AND remote_device = ?3",
                    params![local_user, remote_user, remote_device],
                )
                .map_err(failed("delete", &id))?;

            debug!(conversation = %id, existed = changes > 0, "deleted conversation");
            Ok(changes > 0)
        })
    }

    /// Remote users `local_user` has at least one conversation with, sorted.
    pub fn known_conversations(&self, local_user: &str) -> Result<Vec<String>, StoreError> {
        self.ready(|db| {
            query_strings(
                db.connection(),
                "SELECT DISTINCT remote_user FROM conversations
                 WHERE local_user = ?1 ORDER BY remote_user",
                params![local_user],
            )
            .map_err(failed("known_conversations", local_user))
        })
    }

    /// Devices of `remote_user` that `local_user` holds a conversation with, sorted.
    pub fn device_ids(
        &self,
        local_user: &str,
        remote_user: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.ready(|db| {
            query_strings(
                db.connection(),
                "SELECT remote_device FROM conversations
                 WHERE local_user = ?1 AND remote_user = ?2 ORDER BY remote_device",
                params![local_user, remote_user],
            )
            .map_err(failed("device_ids", format!("{local_user} -> {remote_user}")))
        })
    }

    /// Deletes the conversations with every device of `remote_user`.
    pub fn delete_conversations_for(
        &self,
        local_user: &str,
        remote_user: &str,
    ) -> Result<usize, StoreError> {
        self.ready(|db| {
            let deleted = db
                .connection()
                .execute(
                    "DELETE FROM conversations WHERE local_user = ?1 AND remote_user = ?2",
                    params![local_user, remote_user],
                )
                .map_err(failed(
                    "delete_conversations_for",
                    format!("{local_user} -> {remote_user}"),
                ))?;

            debug!(local_user, remote_user, deleted, "deleted conversations for remote user");
            Ok(deleted)
        })
    }

    // === Staged message keys ===

    /// Stages an opaque message key blob for a stored conversation.
    pub fn insert_staged_message_key(
        &self,
        id: &ConversationId,
        mk_iv: &[u8],
    ) -> Result<(), StoreError> {
        self.ready(|db| {
            db.connection()
                .execute(
                    "INSERT OR REPLACE INTO staged_message_keys
                         (local_user, remote_user, remote_device, mk_iv)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id.local_user, id.remote_user, id.remote_device, mk_iv],
                )
                .map_err(failed("insert_staged_message_key", id))?;
            Ok(())
        })
    }

    /// Staged keys of a conversation, oldest first.
    pub fn load_staged_message_keys(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<SecretBytes>, StoreError> {
        self.ready(|db| {
            let conn = db.connection();
            let load = || -> Result<Vec<SecretBytes>, storage::RusqliteError> {
                let mut stmt = conn.prepare(
                    "SELECT mk_iv FROM staged_message_keys
                     WHERE local_user = ?1 AND remote_user = ?2 AND remote_device = ?3
                     ORDER BY created_at, rowid",
                )?;
                let rows = stmt.query_map(
                    params![id.local_user, id.remote_user, id.remote_device],
                    |row| row.get::<_, Vec<u8>>(0).map(SecretBytes::from),
                )?;
                rows.collect()
            };
            load().map_err(failed("load_staged_message_keys", id))
        })
    }

    pub fn delete_staged_message_key(
        &self,
        id: &ConversationId,
        mk_iv: &[u8],
    ) -> Result<bool, StoreError> {
        self.ready(|db| {
            let changes = db
                .connection()
                .execute(
                    "DELETE FROM staged_message_keys
                     WHERE local_user = ?1 AND remote_user = ?2 AND remote_device = ?3
                       AND mk_iv = ?4",
                    params![id.local_user, id.remote_user, id.remote_device, mk_iv],
                )
                .map_err(failed("delete_staged_message_key", id))?;
            Ok(changes > 0)
        })
    }

    /// Deletes staged keys created before `timestamp` (unix seconds) across
    /// all conversations.
    pub fn delete_staged_message_keys_before(&self, timestamp: i64) -> Result<usize, StoreError> {
        self.ready(|db| {
            let deleted = db
                .connection()
                .execute(
                    "DELETE FROM staged_message_keys WHERE created_at < ?1",
                    params![timestamp],
                )
                .map_err(failed(
                    "delete_staged_message_keys_before",
                    format!("timestamp {timestamp}"),
                ))?;

            debug!(timestamp, deleted, "expired staged message keys");
            Ok(deleted)
        })
    }

    // === Pre-keys ===

    /// Inserts or replaces the encoded pre-key stored under `pre_key_id`.
    pub fn store_pre_key(&self, pre_key_id: u32, data: &[u8]) -> Result<(), StoreError> {
        self.ready(|db| {
            db.connection()
                .execute(
                    "INSERT INTO pre_keys (pre_key_id, pre_key_data) VALUES (?1, ?2)
                     ON CONFLICT(pre_key_id) DO UPDATE SET pre_key_data = excluded.pre_key_data",
                    params![pre_key_id, data],
                )
                .map_err(failed("store_pre_key", pre_key_target(pre_key_id)))?;
            Ok(())
        })
    }

    pub fn load_pre_key(&self, pre_key_id: u32) -> Result<Option<SecretBytes>, StoreError> {
        self.ready(|db| {
            db.connection()
                .query_row(
                    "SELECT pre_key_data FROM pre_keys WHERE pre_key_id = ?1",
                    params![pre_key_id],
                    |row| row.get::<_, Vec<u8>>(0).map(SecretBytes::from),
                )
                .optional()
                .map_err(failed("load_pre_key", pre_key_target(pre_key_id)))
        })
    }

    pub fn contains_pre_key(&self, pre_key_id: u32) -> Result<bool, StoreError> {
        self.ready(|db| {
            db.connection()
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM pre_keys WHERE pre_key_id = ?1)",
                    params![pre_key_id],
                    |row| row.get(0),
                )
                .map_err(failed("contains_pre_key", pre_key_target(pre_key_id)))
        })
    }

    pub fn remove_pre_key(&self, pre_key_id: u32) -> Result<bool, StoreError> {
        self.ready(|db| {
            let changes = db
                .connection()
                .execute(
                    "DELETE FROM pre_keys WHERE pre_key_id = ?1",
                    params![pre_key_id],
                )
                .map_err(failed("remove_pre_key", pre_key_target(pre_key_id)))?;
            Ok(changes > 0)
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps an engine failure with the operation and what it was acting on.
fn failed<E: Into<StorageError>>(
    op: &'static str,
    target: impl Display,
) -> impl FnOnce(E) -> StoreError {
    let target = target.to_string();
    move |e| StoreError::Storage {
        op,
        target,
        source: e.into(),
    }
}

fn query_strings(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> Result<Vec<String>, storage::RusqliteError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get(0))?;
    rows.collect()
}

fn pre_key_target(pre_key_id: u32) -> String {
    format!("pre-key {pre_key_id}")
}

fn display_location(location: &str) -> &str {
    if location.is_empty() {
        ":memory:"
    } else {
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_KEY: [u8; 32] = [0x42; 32];

    fn ready_store() -> ConversationStore {
        let store = ConversationStore::new();
        store.set_key(&MASTER_KEY).unwrap();
        store.open("").unwrap();
        store
    }

    #[test]
    fn test_lifecycle() {
        let store = ConversationStore::new();
        assert!(!store.is_ready());

        store.set_key(&MASTER_KEY).unwrap();
        assert!(!store.is_ready());

        store.open("").unwrap();
        assert!(store.is_ready());

        store.close();
        assert!(!store.is_ready());
    }

    #[test]
    fn test_data_operations_require_ready() {
        let store = ConversationStore::new();
        let state = RatchetState::new("alice", "bob", "dev1");

        assert!(matches!(store.store(&state), Err(StoreError::NotReady)));
        assert!(matches!(
            store.load("alice", "bob", "dev1"),
            Err(StoreError::NotReady)
        ));

        store.set_key(&MASTER_KEY).unwrap();
        assert!(matches!(
            store.delete("alice", "bob", "dev1"),
            Err(StoreError::NotReady)
        ));
        assert!(matches!(
            store.contains_pre_key(1),
            Err(StoreError::NotReady)
        ));
    }

    #[test]
    fn test_open_requires_key() {
        let store = ConversationStore::new();
        assert!(matches!(store.open(""), Err(StoreError::NotReady)));
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let store = ready_store();
        assert!(matches!(store.open(""), Err(StoreError::AlreadyOpen)));
        assert!(store.is_ready());
    }

    #[test]
    fn test_set_key_rules() {
        let store = ConversationStore::new();

        assert!(matches!(
            store.set_key(&[0u8; 16]),
            Err(StoreError::InvalidMasterKey(16))
        ));

        store.set_key(&MASTER_KEY).unwrap();
        // Same key again is a no-op
        store.set_key(&MASTER_KEY).unwrap();
        assert!(matches!(
            store.set_key(&[0x43; 32]),
            Err(StoreError::MasterKeyMismatch)
        ));

        store.open("").unwrap();
        store.set_key(&MASTER_KEY).unwrap();
        assert!(matches!(
            store.set_key(&[0x43; 32]),
            Err(StoreError::MasterKeyMismatch)
        ));
        assert!(store.is_ready());
    }

    #[test]
    fn test_close_forgets_key() {
        let store = ready_store();
        store.close();

        // A new key is accepted after teardown
        store.set_key(&[0x43; 32]).unwrap();
        store.open("").unwrap();
        assert!(store.is_ready());
    }

    #[test]
    fn test_store_and_load() {
        let store = ready_store();
        let mut state = RatchetState::new("alice", "bob", "dev1");
        state.set_root_key("RootKey");
        state.set_msg_send(4);

        store.store(&state).unwrap();
        let loaded = store.load("alice", "bob", "dev1").unwrap();

        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let store = ready_store();
        match store.load("alice", "bob", "dev1") {
            Err(StoreError::NotFound(id)) => {
                assert_eq!(id, ConversationId::new("alice", "bob", "dev1"))
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_corrupt_row_is_decode_error() {
        let store = ready_store();
        let mut state = RatchetState::new("alice", "bob", "dev1");
        state.set_dh_remote(crypto::DhPublicKey::from([0x42; 32]));
        store.store(&state).unwrap();

        store
            .ready(|db| {
                db.connection()
                    .execute("UPDATE conversations SET dhrr_pub = x'0542'", [])
                    .map_err(failed("corrupt", "test"))
            })
            .unwrap();

        assert!(matches!(
            store.load("alice", "bob", "dev1"),
            Err(StoreError::Decode {
                source: crypto::DecodeError::InvalidLength { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_load_out_of_range_counter_is_decode_error() {
        let store = ready_store();

        for (column, value) in [("ns", -1i64), ("pns", 1 << 32), ("prekey_id", i64::MAX)] {
            store
                .store(&RatchetState::new("alice", "bob", "dev1"))
                .unwrap();
            store
                .ready(|db| {
                    db.connection()
                        .execute(
                            &format!("UPDATE conversations SET {column} = ?1"),
                            params![value],
                        )
                        .map_err(failed("corrupt", column))
                })
                .unwrap();

            match store.load("alice", "bob", "dev1") {
                Err(StoreError::Decode {
                    source: crypto::DecodeError::CounterOutOfRange(name),
                    ..
                }) => assert_eq!(name, column),
                other => panic!("expected out of range {column}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_delete() {
        let store = ready_store();
        let state = RatchetState::new("alice", "bob", "dev1");
        store.store(&state).unwrap();
        assert!(store.has_conversation("alice", "bob", "dev1").unwrap());

        assert!(store.delete("alice", "bob", "dev1").unwrap());
        assert!(!store.has_conversation("alice", "bob", "dev1").unwrap());

        // Deleting again should return false
        assert!(!store.delete("alice", "bob", "dev1").unwrap());
    }

    #[test]
    fn test_known_conversations_and_devices() {
        let store = ready_store();
        for (remote, device) in [("carol", "c1"), ("bob", "b2"), ("bob", "b1")] {
            store
                .store(&RatchetState::new("alice", remote, device))
                .unwrap();
        }
        store
            .store(&RatchetState::new("mallory", "dave", "d1"))
            .unwrap();

        assert_eq!(
            store.known_conversations("alice").unwrap(),
            vec!["bob".to_string(), "carol".to_string()]
        );
        assert_eq!(
            store.device_ids("alice", "bob").unwrap(),
            vec!["b1".to_string(), "b2".to_string()]
        );
        assert!(store.device_ids("alice", "dave").unwrap().is_empty());

        assert_eq!(store.delete_conversations_for("alice", "bob").unwrap(), 2);
        assert_eq!(
            store.known_conversations("alice").unwrap(),
            vec!["carol".to_string()]
        );
        assert!(store.has_conversation("mallory", "dave", "d1").unwrap());
    }

    #[test]
    fn test_staged_message_keys() {
        let store = ready_store();
        let state = RatchetState::new("alice", "bob", "dev1");
        store.store(&state).unwrap();

        store
            .insert_staged_message_key(state.id(), b"mk-iv-1")
            .unwrap();
        store
            .insert_staged_message_key(state.id(), b"mk-iv-2")
            .unwrap();

        let staged = store.load_staged_message_keys(state.id()).unwrap();
        assert_eq!(staged.len(), 2);

        assert!(store
            .delete_staged_message_key(state.id(), b"mk-iv-1")
            .unwrap());
        let staged = store.load_staged_message_keys(state.id()).unwrap();
        assert_eq!(staged, vec![SecretBytes::from("mk-iv-2")]);
    }

    #[test]
    fn test_staged_keys_survive_upsert_and_cascade_on_delete() {
        let store = ready_store();
        let mut state = RatchetState::new("alice", "bob", "dev1");
        store.store(&state).unwrap();
        store.insert_staged_message_key(state.id(), b"mk").unwrap();

        state.set_msg_recv(9);
        store.store(&state).unwrap();
        assert_eq!(store.load_staged_message_keys(state.id()).unwrap().len(), 1);

        store.delete("alice", "bob", "dev1").unwrap();
        assert!(store.load_staged_message_keys(state.id()).unwrap().is_empty());
    }

    #[test]
    fn test_staged_key_requires_conversation() {
        let store = ready_store();
        let id = ConversationId::new("alice", "bob", "nobody");

        let err = store.insert_staged_message_key(&id, b"mk").unwrap_err();
        assert!(matches!(err, StoreError::Storage { op: "insert_staged_message_key", .. }));
        assert!(err.code().is_some());
    }

    #[test]
    fn test_delete_staged_message_keys_before() {
        let store = ready_store();
        let state = RatchetState::new("alice", "bob", "dev1");
        store.store(&state).unwrap();
        store.insert_staged_message_key(state.id(), b"mk").unwrap();

        assert_eq!(store.delete_staged_message_keys_before(0).unwrap(), 0);
        assert_eq!(store.delete_staged_message_keys_before(i64::MAX).unwrap(), 1);
        assert!(store.load_staged_message_keys(state.id()).unwrap().is_empty());
    }

    #[test]
    fn test_pre_keys() {
        let store = ready_store();

        assert!(!store.contains_pre_key(13).unwrap());
        assert!(store.load_pre_key(13).unwrap().is_none());

        store.store_pre_key(13, b"{\"pre\":1}").unwrap();
        store.store_pre_key(13, b"{\"pre\":2}").unwrap();
        assert!(store.contains_pre_key(13).unwrap());
        assert_eq!(
            store.load_pre_key(13).unwrap(),
            Some(SecretBytes::from("{\"pre\":2}"))
        );

        assert!(store.remove_pre_key(13).unwrap());
        assert!(!store.remove_pre_key(13).unwrap());
        assert!(!store.contains_pre_key(13).unwrap());
    }
}
