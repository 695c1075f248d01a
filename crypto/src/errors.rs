use thiserror::Error;

/// Failure to turn stored bytes back into key material or state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("encoded key is empty")]
    Empty,
    #[error("unknown curve type tag: {0:#04x}")]
    UnknownCurve(u8),
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("public key does not match the private key")]
    KeyPairMismatch,
    #[error("key pair {0} has only one half stored")]
    IncompleteKeyPair(&'static str),
    #[error("counter {0} does not fit in 32 bits")]
    CounterOutOfRange(&'static str),
}
