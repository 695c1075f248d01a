//! Flat record form of a conversation, one field per table column.

use storage::Row;

use crate::types::{ConversationId, SecretBytes};

/// Encoded `RatchetState`, shaped like a row of the `conversations` table.
///
/// `None` maps to SQL `NULL` (unset); an empty value maps to a zero-length
/// blob or string. Public keys use the curve-tagged codec encoding, private
/// keys their raw bytes. Counters are kept as the stored `INTEGER` and only
/// narrowed to `u32` when the state is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub root_key: Option<SecretBytes>,
    pub chain_key_send: Option<SecretBytes>,
    pub chain_key_recv: Option<SecretBytes>,
    pub ns: i64,
    pub nr: i64,
    pub pns: i64,
    pub ratchet_flag: bool,
    pub dhrs_pub: Option<Vec<u8>>,
    pub dhrs_priv: Option<SecretBytes>,
    pub dhrr_pub: Option<Vec<u8>>,
    pub dhis_pub: Option<Vec<u8>>,
    pub dhis_priv: Option<SecretBytes>,
    pub dhir_pub: Option<Vec<u8>>,
    pub a0_pub: Option<Vec<u8>>,
    pub a0_priv: Option<SecretBytes>,
    pub prekey_id: i64,
    pub device_name: Option<String>,
}

impl ConversationRecord {
    /// Reads the columns selected by `SELECT_CONVERSATION`, in order.
    pub(crate) fn from_row(
        id: ConversationId,
        row: &Row<'_>,
    ) -> Result<Self, storage::RusqliteError> {
        Ok(Self {
            id,
            root_key: secret(row, 0)?,
            chain_key_send: secret(row, 1)?,
            chain_key_recv: secret(row, 2)?,
            ns: row.get(3)?,
            nr: row.get(4)?,
            pns: row.get(5)?,
            ratchet_flag: row.get(6)?,
            dhrs_pub: row.get(7)?,
            dhrs_priv: secret(row, 8)?,
            dhrr_pub: row.get(9)?,
            dhis_pub: row.get(10)?,
            dhis_priv: secret(row, 11)?,
            dhir_pub: row.get(12)?,
            a0_pub: row.get(13)?,
            a0_priv: secret(row, 14)?,
            prekey_id: row.get(15)?,
            device_name: row.get(16)?,
        })
    }
}

fn secret(row: &Row<'_>, idx: usize) -> Result<Option<SecretBytes>, storage::RusqliteError> {
    Ok(row.get::<_, Option<Vec<u8>>>(idx)?.map(SecretBytes::from))
}
