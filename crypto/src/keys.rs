use rand_core::{CryptoRng, OsRng, RngCore};
use std::fmt::Debug;
use x25519_dalek::{PublicKey as x25519_Pub, SharedSecret, StaticSecret as x25519_Priv};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Elliptic curves a key can live on.
///
/// The wire tag is the first byte of every encoded public key and selects the
/// length of the key material that follows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CurveType {
    Curve25519,
}

impl CurveType {
    pub const fn tag(self) -> u8 {
        match self {
            CurveType::Curve25519 => 0x05,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x05 => Some(CurveType::Curve25519),
            _ => None,
        }
    }

    pub const fn public_key_len(self) -> usize {
        match self {
            CurveType::Curve25519 => 32,
        }
    }

    pub const fn private_key_len(self) -> usize {
        match self {
            CurveType::Curve25519 => 32,
        }
    }
}

/// Public half of a Diffie-Hellman key. Equality is on the key bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DhPublicKey {
    curve: CurveType,
    key: x25519_Pub,
}

impl DhPublicKey {
    pub fn curve(&self) -> CurveType {
        self.curve
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }
}

impl From<[u8; 32]> for DhPublicKey {
    fn from(value: [u8; 32]) -> Self {
        Self {
            curve: CurveType::Curve25519,
            key: x25519_Pub::from(value),
        }
    }
}

impl From<&DhPrivateKey> for DhPublicKey {
    fn from(value: &DhPrivateKey) -> Self {
        Self {
            curve: CurveType::Curve25519,
            key: x25519_Pub::from(&value.0),
        }
    }
}

impl AsRef<[u8]> for DhPublicKey {
    fn as_ref(&self) -> &[u8] {
        self.key.as_ref()
    }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DhPrivateKey(x25519_Priv);

impl DhPrivateKey {
    pub fn random_from_rng<T: RngCore + CryptoRng>(csprng: T) -> Self {
        Self(x25519_Priv::random_from_rng(csprng))
    }

    #[allow(non_snake_case)] // All caps makes this standout more in reviews.
    pub fn DANGER_to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }
}

impl From<[u8; 32]> for DhPrivateKey {
    fn from(value: [u8; 32]) -> Self {
        Self(x25519_Priv::from(value))
    }
}

impl PartialEq for DhPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.DANGER_to_bytes() == other.DANGER_to_bytes()
    }
}

impl Eq for DhPrivateKey {}

impl Debug for DhPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DhPrivateKey(...Redacted...)")
    }
}

/// A Diffie-Hellman key pair. The private half is wiped when the pair drops.
#[derive(Clone, PartialEq, Eq)]
pub struct DhKeyPair {
    public: DhPublicKey,
    private: DhPrivateKey,
}

impl DhKeyPair {
    pub fn from_private(private: DhPrivateKey) -> Self {
        let public = DhPublicKey::from(&private);
        Self { public, private }
    }

    pub fn public(&self) -> &DhPublicKey {
        &self.public
    }

    pub fn private(&self) -> &DhPrivateKey {
        &self.private
    }

    /// Diffie-Hellman agreement between our private key and `their_public`.
    pub fn agree(&self, their_public: &DhPublicKey) -> SymmetricKey32 {
        (&self.private.0.diffie_hellman(&their_public.key)).into()
    }
}

impl Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Generates a fresh key pair on `curve` from the OS random source.
pub fn generate_key_pair(curve: CurveType) -> DhKeyPair {
    match curve {
        CurveType::Curve25519 => DhKeyPair::from_private(DhPrivateKey::random_from_rng(OsRng)),
    }
}

/// A Generic secret key container for symmetric keys.
/// SymmetricKey retains ownership of bytes to ensure they are Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq)]
pub struct SymmetricKey<const N: usize>([u8; N]);

impl<const N: usize> SymmetricKey<N> {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl<const N: usize> From<[u8; N]> for SymmetricKey<N> {
    fn from(value: [u8; N]) -> Self {
        SymmetricKey(value)
    }
}

impl<const N: usize> Debug for SymmetricKey<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey(...{N} Bytes Redacted...)")
    }
}

pub type SymmetricKey32 = SymmetricKey<32>;

impl From<&SharedSecret> for SymmetricKey32 {
    // This relies on the feature 'zeroize' being set for x25519-dalek.
    // If not the SharedSecret will need to manually zeroized
    fn from(value: &SharedSecret) -> Self {
        value.to_bytes().into()
    }
}
