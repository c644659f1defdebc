//! A fixed-length byte buffer that zeroes itself on drop and never prints
//! its contents in `Debug`/`Display` output. Used for every secret-key
//! buffer in this crate.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sqlx::{Database, Decode, Encode, Type, encode::IsNull, error::BoxDynError};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret<const LENGTH: usize> {
    #[serde(with = "serde_bytes_array")]
    bytes: [u8; LENGTH],
}

impl<const LENGTH: usize> From<[u8; LENGTH]> for Secret<LENGTH> {
    fn from(bytes: [u8; LENGTH]) -> Self {
        Self { bytes }
    }
}

impl<const LENGTH: usize> Secret<LENGTH> {
    pub fn bytes(&self) -> &[u8; LENGTH] {
        &self.bytes
    }

    pub fn into_bytes(self) -> [u8; LENGTH] {
        self.bytes
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, crate::error::CryptoError> {
        let bytes: [u8; LENGTH] =
        slice
        .try_into()
        .map_err(|_| crate::error::CryptoError::WrongLength {
                expected: LENGTH,
                actual: slice.len(),
        })?;
        Ok(Self { bytes })
    }
}

impl<const LENGTH: usize> Zeroize for Secret<LENGTH> {
    fn zeroize(&mut self) {
        self.bytes.zeroize()
    }
}

impl<const LENGTH: usize> ZeroizeOnDrop for Secret<LENGTH> {}

impl<const LENGTH: usize> std::fmt::Debug for Secret<LENGTH> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret").field("bytes", &"[[REDACTED]]").finish()
    }
}

impl<const LENGTH: usize> Display for Secret<LENGTH> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[[REDACTED]]")
    }
}

impl<const LENGTH: usize, DB: Database> Type<DB> for Secret<LENGTH>
where
Vec<u8>: Type<DB>,
{
    fn type_info() -> <DB as Database>::TypeInfo {
        <Vec<u8> as Type<DB>>::type_info()
    }
}

impl<'q, const LENGTH: usize, DB: Database> Encode<'q, DB> for Secret<LENGTH>
where
Vec<u8>: Encode<'q, DB>,
{
    fn encode_by_ref(
        &self,
        buf: &mut <DB as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        Encode::<DB>::encode(self.bytes.to_vec(), buf)
    }
}

impl<'r, const LENGTH: usize, DB: Database> Decode<'r, DB> for Secret<LENGTH>
where
Vec<u8>: Decode<'r, DB>,
{
    fn decode(value: <DB as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let bytes = <Vec<u8> as Decode<DB>>::decode(value)?;
        Self::from_slice(&bytes).map_err(|_| -> BoxDynError { "secret buffer had the wrong length".into() })
    }
}

mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::encoding::{decode_b64, encode_b64};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_b64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_b64(&s).map_err(serde::de::Error::custom)?;
        bytes
        .try_into()
        .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"fixed-length array"))
    }
}
