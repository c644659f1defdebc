//! Key pair types for the node's identity.
//!
//! Encryption keys are X25519 points used with the `crypto_box`
//! (XSalsa20-Poly1305) authenticated public-key encryption construction:
//! 32-byte public, 32-byte secret. Signing keys are Ed25519: 32-byte public,
//! and a 64-byte secret representation (32-byte seed followed by the
//! 32-byte public key, the same convention libsodium uses for its
//! `crypto_sign` secret key) so that its "secret 64 bytes" field matches
//! exactly what gets persisted to the keys file.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::secret::Secret;

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct EncPublicKey(#[serde(with = "serde_fixed")] pub [u8; 32]);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncSecretKey(pub(crate) Secret<32>);

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SignPublicKey(#[serde(with = "serde_fixed")] pub [u8; 32]);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignSecretKey(pub(crate) Secret<64>);

#[derive(Clone)]
pub struct EncryptionKeyPair {
    pub public: EncPublicKey,
    pub secret: EncSecretKey,
}

#[derive(Clone)]
pub struct SigningKeyPair {
    pub public: SignPublicKey,
    pub secret: SignSecretKey,
}

impl EncPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl SignPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl SignSecretKey {
    /// The embedded Ed25519 seed (first 32 of the 64 stored bytes).
    pub(crate) fn signing_key(&self) -> SigningKey {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&self.0.bytes()[..32]);
        SigningKey::from_bytes(&seed)
    }
}

/// Generates a fresh, independent encryption key pair and signing key pair
/// from the operating system's cryptographically secure RNG.
///
/// This is infallible in practice: OS RNG failure is treated as a process
/// abort everywhere else in the node, so we don't thread a `Result`
/// through every caller for it.
pub fn generate_identity() -> (EncryptionKeyPair, SigningKeyPair) {
    let enc_secret = crypto_box::SecretKey::generate(&mut OsRng);
    let enc_public = enc_secret.public_key();
    let enc_kp = EncryptionKeyPair {
        public: EncPublicKey(*enc_public.as_bytes()),
        secret: EncSecretKey(Secret::from(enc_secret.to_bytes())),
    };

    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    let mut sign_secret_bytes = [0u8; 64];
    sign_secret_bytes[..32].copy_from_slice(&signing_key.to_bytes());
    sign_secret_bytes[32..].copy_from_slice(verifying_key.as_bytes());
    let sign_kp = SigningKeyPair {
        public: SignPublicKey(*verifying_key.as_bytes()),
        secret: SignSecretKey(Secret::from(sign_secret_bytes)),
    };

    (enc_kp, sign_kp)
}

/// An identity's full persisted secret material: both key pairs. Mirrors the
/// "four fields" encoded-keys-file format exactly, so this flattens straight
/// into `PersistedIdentity` via serde.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityKeys {
    pub encryption_public_key: EncPublicKey,
    pub encryption_secret_key: EncSecretKey,
    pub signing_public_key: SignPublicKey,
    pub signing_secret_key: SignSecretKey,
}

impl IdentityKeys {
    pub fn generate() -> Self {
        let (enc_kp, sign_kp) = generate_identity();
        Self {
            encryption_public_key: enc_kp.public,
            encryption_secret_key: enc_kp.secret,
            signing_public_key: sign_kp.public,
            signing_secret_key: sign_kp.secret,
        }
    }

    pub fn encryption_keypair(&self) -> EncryptionKeyPair {
        EncryptionKeyPair {
            public: self.encryption_public_key,
            secret: self.encryption_secret_key.clone(),
        }
    }

    pub fn signing_keypair(&self) -> SigningKeyPair {
        SigningKeyPair {
            public: self.signing_public_key,
            secret: self.signing_secret_key.clone(),
        }
    }
}

impl TryFrom<&[u8]> for EncPublicKey {
    type Error = CryptoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(<[u8; 32]>::try_from(value).map_err(|_| {
                        CryptoError::WrongLength {
                            expected: 32,
                            actual: value.len(),
                        }
                })?))
    }
}

impl TryFrom<&[u8]> for SignPublicKey {
    type Error = CryptoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(<[u8; 32]>::try_from(value).map_err(|_| {
                        CryptoError::WrongLength {
                            expected: 32,
                            actual: value.len(),
                        }
                })?))
    }
}

mod serde_fixed {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::encoding::{decode_b64, encode_b64};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_b64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_b64(&s).map_err(serde::de::Error::custom)?;
        bytes
        .try_into()
        .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"32 bytes"))
    }
}
