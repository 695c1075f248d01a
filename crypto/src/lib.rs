//! Curve25519 key material for ratchet sessions and the fixed-width codec
//! used to persist it.

pub mod codec;
mod errors;
mod keys;
mod reader;

pub use codec::{
    decode_key_pair, decode_private_key, decode_public_key, encode_key_pair, encode_private_key,
    encode_public_key,
};
pub use errors::DecodeError;
pub use keys::{
    CurveType, DhKeyPair, DhPrivateKey, DhPublicKey, SymmetricKey, SymmetricKey32,
    generate_key_pair,
};
