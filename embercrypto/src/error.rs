use thiserror::Error;

/// Failures from the crypto primitives layer.
///
/// Per the primitive's contract, `encrypt_to` and `sign` only fail on RNG
/// exhaustion, which is treated as fatal everywhere above this crate.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("secure random number generator failed")]
    RandomnessFailure,
    #[error("ciphertext authentication tag did not verify")]
    AuthFailure,
    #[error("signature did not verify")]
    BadSignature,
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}
