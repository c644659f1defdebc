//! Persistence of the node's own identity keys.
//!
//! `load_or_create_identity` is the one place in the node that decides
//! whether this is the first run. It is written so that a crash between
//! "generate" and "durably written" can never be mistaken for "no identity
//! yet": a half-written file fails closed with `IdentityCorrupt` rather
//! than silently regenerating a second identity.

use std::path::Path;

use embercrypto::IdentityKeys;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

/// The full on-disk identity record: the stable `node_id` plus the four
/// base64-encoded key fields of the keys file, serialized as JSON.
#[derive(Clone, Serialize, Deserialize)]
pub struct PersistedIdentity {
    pub node_id: Uuid,
    pub username: String,
    #[serde(flatten)]
    pub keys: IdentityKeys,
}

/// `load_or_create_identity(path) -> Identity`
///
/// If the file exists, parses and returns it; a parse failure is reported
/// as `IdentityCorrupt` rather than triggering silent regeneration (that
/// would fork the identity the directory and every friend already has
/// pinned). If the file does not exist, a fresh identity is generated and
/// persisted atomically (write to a sibling temp file, then rename) before
/// being returned, so a crash mid-write leaves no half-written keys file
/// behind for the next start to misinterpret.
pub async fn load_or_create_identity(
    path: &Path,
    username: &str,
) -> Result<PersistedIdentity, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice::<PersistedIdentity>(&bytes)
        .map_err(|e| StoreError::IdentityCorrupt(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no identity keys file found, generating a new identity");
            let identity = PersistedIdentity {
                node_id: Uuid::new_v4(),
                username: username.to_string(),
                keys: IdentityKeys::generate(),
            };
            persist_atomically(path, &identity).await?;
            Ok(identity)
        }
        Err(e) => Err(StoreError::Io(e)),
    }
}

async fn persist_atomically(path: &Path, identity: &PersistedIdentity) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(identity)?;
    let tmp_path = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&tmp_path, &bytes).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_then_reloads_the_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let created = load_or_create_identity(&path, "alice").await.unwrap();
        let reloaded = load_or_create_identity(&path, "alice").await.unwrap();

        assert_eq!(created.node_id, reloaded.node_id);
        assert_eq!(
            created.keys.encryption_public_key.as_bytes(),
            reloaded.keys.encryption_public_key.as_bytes()
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_not_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        tokio::fs::write(&path, b"{not valid json").await.unwrap();

        let result = load_or_create_identity(&path, "alice").await;
        assert!(matches!(result, Err(StoreError::IdentityCorrupt(_))));
    }

    /// Every key field on disk must be a base64 string, not a JSON array of
    /// byte values.
    #[tokio::test]
    async fn key_fields_are_written_as_base64_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        load_or_create_identity(&path, "alice").await.unwrap();
        let bytes = tokio::fs::read(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        for field in [
            "encryption_public_key",
            "encryption_secret_key",
            "signing_public_key",
            "signing_secret_key",
        ] {
            assert!(value[field].is_string(), "{field} should be a base64 string, got {:?}", value[field]);
        }
    }
}
