//! Friend key status state machine.
//!
//! `Friend` as persisted by `emberstore` has no state column — the three
//! states are a derived, runtime-only classification of "pinned keys vs.
//! what the directory currently publishes", recomputed on every presence
//! refresh rather than stored. `KeyChanged` friends are additionally tracked
//! in `Node`'s in-memory conflict set so sends can be rejected immediately
//! without a directory round trip.

use embercrypto::encode_b64;
use emberdirectory::DirectoryRecord;
use emberstore::Friend;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FriendKeyState {
    PinnedCurrent,
    PinnedStalePresence,
    KeyChanged,
}

/// Classifies a friend against a freshly fetched directory record.
///
/// `Pinned-current` is both the initial state (right after Add-Friend, since
/// the keys were just pinned from this same directory record) and the
/// terminal state after an explicit re-pin resolves a `Key-changed` friend.
pub fn classify(friend: &Friend, directory: &DirectoryRecord) -> FriendKeyState {
    let enc_matches = encode_b64(friend.encryption_public_key.as_bytes()) == directory.encryption_public_key;
    let sign_matches = encode_b64(friend.signing_public_key.as_bytes()) == directory.signing_public_key;

    if !enc_matches || !sign_matches {
        return FriendKeyState::KeyChanged;
    }

    match (friend.last_seen, directory.last_seen) {
        (Some(local), Some(remote)) if remote > local => FriendKeyState::PinnedStalePresence,
        (None, Some(_)) => FriendKeyState::PinnedStalePresence,
        _ => FriendKeyState::PinnedCurrent,
    }
}
