use thiserror::Error;

/// Aggregated node-level errors. Mirrors the way a single error enum
/// collects component-specific failures behind `#[from]` so callers can use
/// `?` across component boundaries without hand-written conversions.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("'{0}' is not in your friend list")]
    UnknownFriend(String),
    #[error("message text exceeds the 10000 byte limit")]
    TooLarge,
    #[error("'{0}' is not registered in the directory")]
    UnknownInDirectory(String),
    #[error("'{0}' has already been added as a friend")]
    AlreadyFriends(String),
    #[error("'{0}' has a pending key change; re-pin before sending or before re-pinning again")]
    KeyConflict(String),
    #[error("'{0}' does not currently have an unresolved key change")]
    NoKeyConflict(String),
    #[error("message was accepted but could not be reliably delivered or relayed")]
    Unreliable,
    #[error(transparent)]
    Store(#[from] emberstore::StoreError),
    #[error(transparent)]
    Directory(#[from] emberdirectory::DirectoryError),
    #[error(transparent)]
    Crypto(#[from] embercrypto::CryptoError),
}
