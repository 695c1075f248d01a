use crypto::{
    DecodeError, DhKeyPair, DhPublicKey, decode_key_pair, decode_public_key, encode_key_pair,
    encode_public_key,
};

use crate::{
    storage::ConversationRecord,
    types::{ConversationId, SecretBytes},
};

/// Cryptographic state of one conversation with one remote device.
///
/// The entity only holds values; deriving new root and chain keys is the
/// ratchet engine's job. Byte-string fields distinguish "unset" (`None`)
/// from "set to zero length" (`Some` of an empty value), and both survive a
/// store/load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatchetState {
    id: ConversationId,

    root_key: Option<SecretBytes>,
    sending_chain: Option<SecretBytes>,
    receiving_chain: Option<SecretBytes>,

    msg_send: u32,
    msg_recv: u32,
    prev_chain_len: u32,

    ratchet_flag: bool,

    dh_self: Option<DhKeyPair>,
    dh_remote: Option<DhPublicKey>,

    identity_self: Option<DhKeyPair>,
    identity_remote: Option<DhPublicKey>,

    initial_key_pair: Option<DhKeyPair>,
    pre_key_id: u32,

    device_name: Option<String>,
}

impl RatchetState {
    /// Fresh state: no keys, zero counters, ratchet flag cleared.
    pub fn new(
        local_user: impl Into<String>,
        remote_user: impl Into<String>,
        remote_device: impl Into<String>,
    ) -> Self {
        Self::with_id(ConversationId::new(local_user, remote_user, remote_device))
    }

    pub fn with_id(id: ConversationId) -> Self {
        Self {
            id,
            root_key: None,
            sending_chain: None,
            receiving_chain: None,
            msg_send: 0,
            msg_recv: 0,
            prev_chain_len: 0,
            ratchet_flag: false,
            dh_self: None,
            dh_remote: None,
            identity_self: None,
            identity_remote: None,
            initial_key_pair: None,
            pre_key_id: 0,
            device_name: None,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn local_user(&self) -> &str {
        &self.id.local_user
    }

    pub fn remote_user(&self) -> &str {
        &self.id.remote_user
    }

    pub fn remote_device(&self) -> &str {
        &self.id.remote_device
    }

    // === Root and chain keys ===

    pub fn root_key(&self) -> Option<&[u8]> {
        self.root_key.as_ref().map(SecretBytes::as_bytes)
    }

    pub fn set_root_key(&mut self, key: impl Into<SecretBytes>) {
        self.root_key = Some(key.into());
    }

    pub fn clear_root_key(&mut self) {
        self.root_key = None;
    }

    /// Sending chain key (CKs).
    pub fn sending_chain(&self) -> Option<&[u8]> {
        self.sending_chain.as_ref().map(SecretBytes::as_bytes)
    }

    pub fn set_sending_chain(&mut self, key: impl Into<SecretBytes>) {
        self.sending_chain = Some(key.into());
    }

    pub fn clear_sending_chain(&mut self) {
        self.sending_chain = None;
    }

    /// Receiving chain key (CKr).
    pub fn receiving_chain(&self) -> Option<&[u8]> {
        self.receiving_chain.as_ref().map(SecretBytes::as_bytes)
    }

    pub fn set_receiving_chain(&mut self, key: impl Into<SecretBytes>) {
        self.receiving_chain = Some(key.into());
    }

    pub fn clear_receiving_chain(&mut self) {
        self.receiving_chain = None;
    }

    // === Counters ===

    /// Messages sent on the current sending chain (Ns).
    pub fn msg_send(&self) -> u32 {
        self.msg_send
    }

    pub fn set_msg_send(&mut self, n: u32) {
        self.msg_send = n;
    }

    /// Messages received on the current receiving chain (Nr).
    pub fn msg_recv(&self) -> u32 {
        self.msg_recv
    }

    pub fn set_msg_recv(&mut self, n: u32) {
        self.msg_recv = n;
    }

    /// Length of the previous sending chain (PNs).
    pub fn prev_chain_len(&self) -> u32 {
        self.prev_chain_len
    }

    pub fn set_prev_chain_len(&mut self, n: u32) {
        self.prev_chain_len = n;
    }

    /// Set when the next send has to start a new DH ratchet step.
    pub fn ratchet_flag(&self) -> bool {
        self.ratchet_flag
    }

    pub fn set_ratchet_flag(&mut self, flag: bool) {
        self.ratchet_flag = flag;
    }

    // === DH material ===

    /// Our current ratchet key pair (DHRs).
    pub fn dh_self(&self) -> Option<&DhKeyPair> {
        self.dh_self.as_ref()
    }

    pub fn set_dh_self(&mut self, pair: DhKeyPair) {
        self.dh_self = Some(pair);
    }

    pub fn clear_dh_self(&mut self) {
        self.dh_self = None;
    }

    /// The peer's current ratchet public key (DHRr).
    pub fn dh_remote(&self) -> Option<&DhPublicKey> {
        self.dh_remote.as_ref()
    }

    pub fn set_dh_remote(&mut self, key: DhPublicKey) {
        self.dh_remote = Some(key);
    }

    pub fn clear_dh_remote(&mut self) {
        self.dh_remote = None;
    }

    /// Our long-term identity key pair (DHIs).
    pub fn identity_self(&self) -> Option<&DhKeyPair> {
        self.identity_self.as_ref()
    }

    pub fn set_identity_self(&mut self, pair: DhKeyPair) {
        self.identity_self = Some(pair);
    }

    pub fn clear_identity_self(&mut self) {
        self.identity_self = None;
    }

    /// The peer's long-term identity public key (DHIr).
    pub fn identity_remote(&self) -> Option<&DhPublicKey> {
        self.identity_remote.as_ref()
    }

    pub fn set_identity_remote(&mut self, key: DhPublicKey) {
        self.identity_remote = Some(key);
    }

    pub fn clear_identity_remote(&mut self) {
        self.identity_remote = None;
    }

    /// One-time pre-key pair used when the session was set up (A0).
    pub fn initial_key_pair(&self) -> Option<&DhKeyPair> {
        self.initial_key_pair.as_ref()
    }

    pub fn set_initial_key_pair(&mut self, pair: DhKeyPair) {
        self.initial_key_pair = Some(pair);
    }

    pub fn clear_initial_key_pair(&mut self) {
        self.initial_key_pair = None;
    }

    pub fn pre_key_id(&self) -> u32 {
        self.pre_key_id
    }

    pub fn set_pre_key_id(&mut self, id: u32) {
        self.pre_key_id = id;
    }

    // === Metadata ===

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = Some(name.into());
    }

    pub fn clear_device_name(&mut self) {
        self.device_name = None;
    }

    // === Record form ===

    /// Flattens the state into one encoded value per stored column.
    pub fn serialize(&self) -> ConversationRecord {
        ConversationRecord::from(self)
    }

    /// Rebuilds a state from its record. Corrupt key material is an error,
    /// never a default value.
    pub fn deserialize(record: ConversationRecord) -> Result<Self, DecodeError> {
        Self::try_from(record)
    }
}

impl From<&RatchetState> for ConversationRecord {
    fn from(state: &RatchetState) -> Self {
        let (dhrs_pub, dhrs_priv) = split_pair(state.dh_self.as_ref());
        let (dhis_pub, dhis_priv) = split_pair(state.identity_self.as_ref());
        let (a0_pub, a0_priv) = split_pair(state.initial_key_pair.as_ref());

        Self {
            id: state.id.clone(),
            root_key: state.root_key.clone(),
            chain_key_send: state.sending_chain.clone(),
            chain_key_recv: state.receiving_chain.clone(),
            ns: state.msg_send.into(),
            nr: state.msg_recv.into(),
            pns: state.prev_chain_len.into(),
            ratchet_flag: state.ratchet_flag,
            dhrs_pub,
            dhrs_priv,
            dhrr_pub: state.dh_remote.as_ref().map(encode_public_key),
            dhis_pub,
            dhis_priv,
            dhir_pub: state.identity_remote.as_ref().map(encode_public_key),
            a0_pub,
            a0_priv,
            prekey_id: state.pre_key_id.into(),
            device_name: state.device_name.clone(),
        }
    }
}

impl TryFrom<ConversationRecord> for RatchetState {
    type Error = DecodeError;

    fn try_from(record: ConversationRecord) -> Result<Self, Self::Error> {
        let dh_self = join_pair("dhrs", record.dhrs_pub, record.dhrs_priv)?;
        let identity_self = join_pair("dhis", record.dhis_pub, record.dhis_priv)?;
        let initial_key_pair = join_pair("a0", record.a0_pub, record.a0_priv)?;

        let dh_remote = record.dhrr_pub.as_deref().map(decode_public_key).transpose()?;
        let identity_remote = record.dhir_pub.as_deref().map(decode_public_key).transpose()?;

        Ok(Self {
            id: record.id,
            root_key: record.root_key,
            sending_chain: record.chain_key_send,
            receiving_chain: record.chain_key_recv,
            msg_send: counter("ns", record.ns)?,
            msg_recv: counter("nr", record.nr)?,
            prev_chain_len: counter("pns", record.pns)?,
            ratchet_flag: record.ratchet_flag,
            dh_self,
            dh_remote,
            identity_self,
            identity_remote,
            initial_key_pair,
            pre_key_id: counter("prekey_id", record.prekey_id)?,
            device_name: record.device_name,
        })
    }
}

fn split_pair(pair: Option<&DhKeyPair>) -> (Option<Vec<u8>>, Option<SecretBytes>) {
    match pair.map(encode_key_pair) {
        Some((public, private)) => (Some(public), Some(SecretBytes::from(private.as_slice()))),
        None => (None, None),
    }
}

fn counter(name: &'static str, value: i64) -> Result<u32, DecodeError> {
    u32::try_from(value).map_err(|_| DecodeError::CounterOutOfRange(name))
}

fn join_pair(
    name: &'static str,
    public: Option<Vec<u8>>,
    private: Option<SecretBytes>,
) -> Result<Option<DhKeyPair>, DecodeError> {
    match (public, private) {
        (None, None) => Ok(None),
        (Some(public), Some(private)) => decode_key_pair(&public, private.as_bytes()).map(Some),
        _ => Err(DecodeError::IncompleteKeyPair(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::{CurveType, generate_key_pair};

    fn test_state() -> RatchetState {
        RatchetState::new("alice@wonderland.org", "bob@milkyway.com", "BobDevId")
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = test_state();

        assert_eq!(state.local_user(), "alice@wonderland.org");
        assert_eq!(state.remote_user(), "bob@milkyway.com");
        assert_eq!(state.remote_device(), "BobDevId");
        assert!(state.root_key().is_none());
        assert!(state.sending_chain().is_none());
        assert!(state.receiving_chain().is_none());
        assert_eq!(state.msg_send(), 0);
        assert_eq!(state.msg_recv(), 0);
        assert_eq!(state.prev_chain_len(), 0);
        assert!(!state.ratchet_flag());
        assert!(state.dh_self().is_none());
        assert!(state.dh_remote().is_none());
        assert!(state.identity_self().is_none());
        assert!(state.identity_remote().is_none());
        assert!(state.initial_key_pair().is_none());
        assert_eq!(state.pre_key_id(), 0);
        assert!(state.device_name().is_none());
    }

    #[test]
    fn test_record_roundtrip_with_keys() {
        let mut state = test_state();
        state.set_root_key("RootKey");
        state.set_sending_chain("ChainKeyS 1");
        state.set_ratchet_flag(true);
        state.set_dh_self(generate_key_pair(CurveType::Curve25519));
        state.set_dh_remote(DhPublicKey::from([0x42; 32]));
        state.set_identity_self(generate_key_pair(CurveType::Curve25519));
        state.set_initial_key_pair(generate_key_pair(CurveType::Curve25519));

        let record = state.serialize();
        assert!(record.dhir_pub.is_none());
        assert_eq!(record.dhrr_pub.as_ref().map(Vec::len), Some(33));

        let restored = RatchetState::deserialize(record).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_record_keeps_empty_and_unset_apart() {
        let mut state = test_state();
        state.set_root_key(Vec::<u8>::new());
        state.set_device_name("");

        let restored = RatchetState::try_from(ConversationRecord::from(&state)).unwrap();
        assert_eq!(restored.root_key(), Some(&[][..]));
        assert!(restored.sending_chain().is_none());
        assert_eq!(restored.device_name(), Some(""));
    }

    #[test]
    fn test_half_stored_pair_is_rejected() {
        let mut state = test_state();
        state.set_dh_self(generate_key_pair(CurveType::Curve25519));

        let mut record = ConversationRecord::from(&state);
        record.dhrs_priv = None;

        assert_eq!(
            RatchetState::try_from(record).err(),
            Some(DecodeError::IncompleteKeyPair("dhrs"))
        );
    }

    #[test]
    fn test_counter_outside_u32_is_rejected() {
        let mut record = test_state().serialize();
        record.nr = -1;
        assert_eq!(
            RatchetState::deserialize(record).err(),
            Some(DecodeError::CounterOutOfRange("nr"))
        );

        let mut record = test_state().serialize();
        record.prekey_id = i64::from(u32::MAX) + 1;
        assert_eq!(
            RatchetState::deserialize(record).err(),
            Some(DecodeError::CounterOutOfRange("prekey_id"))
        );

        let mut record = test_state().serialize();
        record.pns = i64::from(u32::MAX);
        assert_eq!(RatchetState::deserialize(record).unwrap().prev_chain_len(), u32::MAX);
    }

    #[test]
    fn test_corrupt_public_key_is_rejected() {
        let mut state = test_state();
        state.set_identity_remote(DhPublicKey::from([0x11; 32]));

        let mut record = ConversationRecord::from(&state);
        if let Some(bytes) = record.dhir_pub.as_mut() {
            bytes.pop();
        }

        assert!(matches!(
            RatchetState::try_from(record),
            Err(DecodeError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_clear_resets_to_unset() {
        let mut state = test_state();
        state.set_receiving_chain("ChainKeyR 1");
        state.set_dh_remote(DhPublicKey::from([0x42; 32]));
        state.clear_receiving_chain();
        state.clear_dh_remote();

        assert_eq!(state, test_state());
    }
}
