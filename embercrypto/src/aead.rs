//! Authenticated public-key encryption.
//!
//! Backed by `crypto_box` (XSalsa20-Poly1305, the same construction as
//! libsodium's `crypto_box`): 32-byte public/secret keys, a 24-byte nonce
//! drawn fresh for every call, and a 16-byte Poly1305 tag appended to the
//! ciphertext. Callers cannot supply their own nonce — it is always
//! generated inside `encrypt_to` — which is the only way to make nonce
//! reuse structurally impossible.

use crypto_box::aead::{Aead, AeadCore};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::identity::{EncPublicKey, EncSecretKey};

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Nonce(#[serde(with = "serde_nonce")] pub [u8; NONCE_LEN]);

impl Nonce {
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

fn salsa_box(their_pk: &EncPublicKey, our_sk: &EncSecretKey) -> SalsaBox {
    let pk = PublicKey::from(*their_pk.as_bytes());
    let sk = SecretKey::from(*our_sk.0.bytes());
    SalsaBox::new(&pk, &sk)
}

/// `encrypt_to(recipient_enc_pk, sender_enc_sk, plaintext) -> (ciphertext, nonce)`
///
/// Ciphertext length is always `plaintext.len() + TAG_LEN`.
pub fn encrypt_to(
    recipient_pk: &EncPublicKey,
    sender_sk: &EncSecretKey,
    plaintext: &[u8],
) -> Result<(Vec<u8>, Nonce), CryptoError> {
    let cipher = salsa_box(recipient_pk, sender_sk);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = cipher
    .encrypt(&nonce, plaintext)
    .map_err(|_| CryptoError::RandomnessFailure)?;
    debug_assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);
    let nonce_bytes: [u8; NONCE_LEN] = nonce.as_slice().try_into().expect("nonce is 24 bytes");
    Ok((ciphertext, Nonce(nonce_bytes)))
}

/// `decrypt_from(sender_enc_pk, recipient_enc_sk, ciphertext, nonce) -> plaintext`
///
/// Returns `CryptoError::AuthFailure` if the embedded tag does not verify.
/// Never returns partial plaintext on failure.
pub fn decrypt_from(
    sender_pk: &EncPublicKey,
    recipient_sk: &EncSecretKey,
    ciphertext: &[u8],
    nonce: &Nonce,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = salsa_box(sender_pk, recipient_sk);
    let nonce = crypto_box::Nonce::clone_from_slice(&nonce.0);
    cipher
    .decrypt(&nonce, ciphertext)
    .map_err(|_| CryptoError::AuthFailure)
}

mod serde_nonce {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8; super::NONCE_LEN],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serde_bytes::serialize(bytes.as_slice(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; super::NONCE_LEN], D::Error> {
        let bytes: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        bytes
        .try_into()
        .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"24 bytes"))
    }
}
