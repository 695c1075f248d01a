//! Persists a conversation to an encrypted file, reopens it and reads it back.
//!
//! Run with: RUST_LOG=debug cargo run --example conversation_store_demo

use ratchet_state::{ConversationStore, CurveType, RatchetState, generate_key_pair};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== Conversation Store Demo ===\n");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("conversations.db");
    let path = path.to_str().expect("Temp path is not UTF-8");
    let master_key = [0x5A; 32];

    let mut state = RatchetState::new("alice@wonderland.org", "bob@milkyway.com", "BobDevId");
    state.set_root_key("RootKey");
    state.set_sending_chain("ChainKeyS 1");
    state.set_msg_send(7);
    state.set_ratchet_flag(true);
    state.set_dh_self(generate_key_pair(CurveType::Curve25519));
    state.set_dh_remote(*generate_key_pair(CurveType::Curve25519).public());

    // First session
    {
        let store = ConversationStore::new();
        store.set_key(&master_key).expect("Failed to set key");
        store.open(path).expect("Failed to open store");
        store.store(&state).expect("Failed to store state");
        store
            .insert_staged_message_key(state.id(), b"skipped message key")
            .expect("Failed to stage key");
        println!("  Stored {}", state.id());
    }

    // Restart with the same key
    let store = ConversationStore::new();
    store.set_key(&master_key).expect("Failed to set key");
    store.open(path).expect("Failed to reopen store");

    let loaded = store
        .load(state.local_user(), state.remote_user(), state.remote_device())
        .expect("Failed to load state");
    println!("  Loaded {}", loaded.id());
    println!("  Ns={} ratchet_flag={}", loaded.msg_send(), loaded.ratchet_flag());
    println!("  Identical after restart: {}", loaded == state);
    println!(
        "  Staged keys: {}",
        store
            .load_staged_message_keys(loaded.id())
            .expect("Failed to load staged keys")
            .len()
    );
    println!(
        "  Known conversations: {:?}",
        store
            .known_conversations(loaded.local_user())
            .expect("Failed to list conversations")
    );

    // A different master key cannot open the file
    let intruder = ConversationStore::new();
    intruder.set_key(&[0xA5; 32]).expect("Failed to set key");
    match intruder.open(path) {
        Ok(()) => println!("  Unexpectedly opened with the wrong key"),
        Err(e) => println!("  Wrong key rejected: {e}"),
    }
}
