use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use embercrypto::IdentityKeys;
use emberdirectory::DirectoryClient;
use emberstore::{Friend, Message, Store};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::NodeError;
use crate::event::EventSink;

pub const MAX_TEXT_BYTES: usize = 10_000;

/// Everything the Delivery Pipeline, Local Control Plane, and Scheduler act
/// on: identity, store, directory client, peer port, and the event sink.
/// Owned once and shared behind an `Arc` by every task, threaded explicitly
/// into whatever needs it rather than reached for as a static.
pub struct Node {
    pub(crate) identity: IdentityKeys,
    pub node_id: Uuid,
    pub username: String,
    pub peer_port: u16,
    pub(crate) store: Arc<Store>,
    pub(crate) directory: Arc<DirectoryClient>,
    pub(crate) events: Arc<dyn EventSink>,
    /// Friends currently in `Key-changed`. Runtime-only; recomputed
    /// by the presence-refresh task and cleared by an explicit re-pin.
    pub(crate) key_conflicts: Mutex<HashSet<String>>,
    pub(crate) directory_connected: AtomicBool,
    started_at: Instant,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct StatusSnapshot {
    pub status: &'static str,
    pub username: String,
    pub node_id: Uuid,
    pub uptime_seconds: u64,
    pub friends_count: usize,
    pub peer_port: u16,
    pub directory_connected: bool,
    pub version: &'static str,
}

impl Node {
    pub fn new(
        node_id: Uuid,
        username: String,
        identity: IdentityKeys,
        peer_port: u16,
        store: Arc<Store>,
        directory: Arc<DirectoryClient>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            identity,
            node_id,
            username,
            peer_port,
            store,
            directory,
            events,
            key_conflicts: Mutex::new(HashSet::new()),
            directory_connected: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub async fn status(&self) -> Result<StatusSnapshot, NodeError> {
        let friends = self.store.list_friends().await?;
        Ok(StatusSnapshot {
                status: "running",
                username: self.username.clone(),
                node_id: self.node_id,
                uptime_seconds: self.started_at.elapsed().as_secs(),
                friends_count: friends.len(),
                peer_port: self.peer_port,
                directory_connected: self.directory_connected.load(Ordering::Relaxed),
                version: env!("CARGO_PKG_VERSION"),
        })
    }

    pub async fn list_friends(&self) -> Result<Vec<Friend>, NodeError> {
        Ok(self.store.list_friends().await?)
    }

    /// `POST /friends`: looks the username up in the directory first (404 if
    /// absent there), then pins it locally (409 if already a friend).
    pub async fn add_friend(&self, username: &str) -> Result<Friend, NodeError> {
        let record = self
        .directory
        .lookup(username)
        .await
        .map_err(|_| NodeError::UnknownInDirectory(username.to_string()))?;

        if self.store.lookup_friend(username).await.is_ok() {
            return Err(NodeError::AlreadyFriends(username.to_string()));
        }

        let enc_pk = embercrypto::EncPublicKey::try_from(
            embercrypto::decode_b64(&record.encryption_public_key)?.as_slice(),
        )?;
        let sign_pk = embercrypto::SignPublicKey::try_from(
            embercrypto::decode_b64(&record.signing_public_key)?.as_slice(),
        )?;

        let friend = self
        .store
        .add_friend(username, &enc_pk, &sign_pk, record.last_ip.as_deref(), record.last_seen)
        .await?;
        Ok(friend)
    }

    pub async fn remove_friend(&self, username: &str) -> Result<(), NodeError> {
        self.store.remove_friend(username).await?;
        self.key_conflicts.lock().await.remove(username);
        Ok(())
    }

    pub async fn list_messages(
        &self,
        peer: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64, bool), NodeError> {
        Ok(self.store.list_messages(peer, offset, limit).await?)
    }

    pub async fn delete_message(&self, msg_id: Uuid) -> Result<(), NodeError> {
        Ok(self.store.delete_message(msg_id).await?)
    }

    /// Re-pins a friend's keys after a user-confirmed trust decision,
    /// clearing the `Key-changed` condition with an explicit re-pin.
    pub async fn repin_friend(&self, username: &str) -> Result<(), NodeError> {
        {
            let conflicts = self.key_conflicts.lock().await;
            if !conflicts.contains(username) {
                return Err(NodeError::NoKeyConflict(username.to_string()));
            }
        }
        let record = self
        .directory
        .lookup(username)
        .await
        .map_err(|_| NodeError::UnknownInDirectory(username.to_string()))?;
        let enc_pk = embercrypto::EncPublicKey::try_from(
            embercrypto::decode_b64(&record.encryption_public_key)?.as_slice(),
        )?;
        let sign_pk = embercrypto::SignPublicKey::try_from(
            embercrypto::decode_b64(&record.signing_public_key)?.as_slice(),
        )?;
        self.store.repin_friend(username, &enc_pk, &sign_pk).await?;
        self.key_conflicts.lock().await.remove(username);
        Ok(())
    }

    pub(crate) async fn is_key_conflicted(&self, username: &str) -> bool {
        self.key_conflicts.lock().await.contains(username)
    }
}
