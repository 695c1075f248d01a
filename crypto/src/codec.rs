//! Fixed-width binary encoding for keys.
//!
//! ```text
//! public key  | curve tag (1) | key bytes (curve.public_key_len()) |
//! private key | key bytes (curve.private_key_len())                |
//! ```
//!
//! Private keys carry no tag; the curve comes from the public half they are
//! stored next to. Decoders never pad, truncate or substitute key bytes.

use zeroize::Zeroizing;

use crate::errors::DecodeError;
use crate::keys::{CurveType, DhKeyPair, DhPrivateKey, DhPublicKey};
use crate::reader::Reader;

pub fn encode_public_key(key: &DhPublicKey) -> Vec<u8> {
    let curve = key.curve();
    let mut buf = Vec::with_capacity(1 + curve.public_key_len());
    buf.push(curve.tag());
    buf.extend_from_slice(key.as_bytes());
    buf
}

pub fn decode_public_key(data: &[u8]) -> Result<DhPublicKey, DecodeError> {
    let mut reader = Reader::new(data);
    let tag = reader.read_u8()?;
    let curve = CurveType::from_tag(tag).ok_or(DecodeError::UnknownCurve(tag))?;

    let key = match curve {
        CurveType::Curve25519 => DhPublicKey::from(reader.read_array::<32>()?),
    };
    reader.finish()?;
    Ok(key)
}

pub fn encode_private_key(key: &DhPrivateKey) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(key.DANGER_to_bytes().to_vec())
}

pub fn decode_private_key(curve: CurveType, data: &[u8]) -> Result<DhPrivateKey, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    if data.len() != curve.private_key_len() {
        return Err(DecodeError::InvalidLength {
            expected: curve.private_key_len(),
            actual: data.len(),
        });
    }

    let mut reader = Reader::new(data);
    let key = match curve {
        CurveType::Curve25519 => {
            let bytes = Zeroizing::new(reader.read_array::<32>()?);
            DhPrivateKey::from(*bytes)
        }
    };
    reader.finish()?;
    Ok(key)
}

/// Encodes a pair as `(public, private)`.
pub fn encode_key_pair(pair: &DhKeyPair) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
    (
        encode_public_key(pair.public()),
        encode_private_key(pair.private()),
    )
}

/// Inverse of [`encode_key_pair`]. The public half is re-derived from the
/// private half and must match what was stored.
pub fn decode_key_pair(public: &[u8], private: &[u8]) -> Result<DhKeyPair, DecodeError> {
    let public = decode_public_key(public)?;
    let private = decode_private_key(public.curve(), private)?;

    let pair = DhKeyPair::from_private(private);
    if *pair.public() != public {
        return Err(DecodeError::KeyPairMismatch);
    }
    Ok(pair)
}
