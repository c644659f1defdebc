//! Crypto Primitives Layer.
//!
//! A minimal, misuse-resistant surface over authenticated public-key
//! encryption and detached signatures. Nothing above this crate is allowed
//! to pick its own nonce, and nothing below it knows about envelopes,
//! friends, or the directory.

pub mod aead;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod secret;
pub mod signature;

pub use aead::{Nonce, decrypt_from, encrypt_to};
pub use encoding::{decode_b64, encode_b64};
pub use error::CryptoError;
pub use identity::{
    EncPublicKey, EncSecretKey, EncryptionKeyPair, IdentityKeys, SignPublicKey, SignSecretKey,
    SigningKeyPair, generate_identity,
};
pub use secret::Secret;
pub use signature::{Signature, sign, verify};
