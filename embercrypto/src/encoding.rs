//! Standard-alphabet, strictly-padded base64, used for every wire and
//! on-disk representation of key and ciphertext bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::CryptoError;

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_b64(s: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(s)?)
}
