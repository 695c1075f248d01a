use std::fmt::{self, Debug, Display};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identity of one conversation: the local user talking to one device of a
/// remote user. At most one ratchet state is stored per identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId {
    pub local_user: String,
    pub remote_user: String,
    pub remote_device: String,
}

impl ConversationId {
    pub fn new(
        local_user: impl Into<String>,
        remote_user: impl Into<String>,
        remote_device: impl Into<String>,
    ) -> Self {
        Self {
            local_user: local_user.into(),
            remote_user: remote_user.into(),
            remote_device: remote_device.into(),
        }
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}/{}",
            self.local_user, self.remote_user, self.remote_device
        )
    }
}

/// Opaque variable-length key material (root key, chain keys, staged keys).
/// Wiped on drop; `Debug` never prints the bytes.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for SecretBytes {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for SecretBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(...{} Bytes Redacted...)", self.0.len())
    }
}
