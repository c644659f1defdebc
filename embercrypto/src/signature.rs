//! Detached Ed25519 signatures.
//!
//! The primitive encrypts-then-signs at the envelope layer (see
//! `embercore`): the signature here is computed over whatever byte slice
//! the caller passes in, which in the delivery pipeline is always the
//! ciphertext, never the plaintext. That ordering lives above this crate;
//! this module only provides `sign`/`verify` over arbitrary bytes.

use ed25519_dalek::{Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::identity::{SignPublicKey, SignSecretKey};

pub const SIGNATURE_LEN: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Signature(#[serde(with = "serde_sig")] pub [u8; SIGNATURE_LEN]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

/// `sign(sender_sign_sk, data) -> signature`
pub fn sign(sender_sk: &SignSecretKey, data: &[u8]) -> Signature {
    let signing_key = sender_sk.signing_key();
    let sig = signing_key.sign(data);
    Signature(sig.to_bytes())
}

/// `verify(sender_sign_pk, data, signature) -> Ok | BadSignature`
///
/// `ed25519-dalek`'s `Verifier::verify` runs the constant-time check
/// internally on the success path.
pub fn verify(
    sender_pk: &SignPublicKey,
    data: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verifying_key =
    VerifyingKey::from_bytes(sender_pk.as_bytes()).map_err(|_| CryptoError::BadSignature)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key
    .verify(data, &sig)
    .map_err(|_| CryptoError::BadSignature)
}

mod serde_sig {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8; super::SIGNATURE_LEN],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serde_bytes::serialize(bytes.as_slice(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; super::SIGNATURE_LEN], D::Error> {
        let bytes: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        bytes
        .try_into()
        .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"64 bytes"))
    }
}
