//! Single-iteration logic for the Scheduler's periodic tasks. The
//! interval loops themselves, and the shutdown signal that stops them, are
//! wired up one layer above in the binary crate, which owns the runtime's
//! notion of "every 60 seconds".

use std::sync::atomic::Ordering;
use std::time::Duration;

use embercrypto::{encode_b64, encrypt_to, sign};
use emberproto::{Envelope, EnvelopeKind};
use emberstore::DeliveryMethod;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::NodeError;
use crate::node::Node;

#[derive(Serialize)]
struct InnerPayload<'a> {
    text: &'a str,
    msg_id: Uuid,
}

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
pub const PRESENCE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const OFFLINE_DRAIN_INTERVAL: Duration = Duration::from_secs(60);
pub const PENDING_RETRY_INTERVAL: Duration = Duration::from_secs(60);
pub const SEEN_ID_GC_INTERVAL: Duration = Duration::from_secs(3600);

impl Node {
    /// Every 60 s. Transient failures are logged, never fatal.
    pub async fn run_heartbeat(&self, current_ip: &str) {
        match self.directory.heartbeat(&self.username, current_ip).await {
            Ok(()) => self.directory_connected.store(true, Ordering::Relaxed),
            Err(e) => {
                warn!(error = %e, "heartbeat failed");
                self.directory_connected.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Every hour: delete seen-id entries older than the retention window.
    pub async fn run_seen_id_gc(&self) -> Result<(), NodeError> {
        let pruned = self.store.gc_seen_ids().await?;
        if pruned > 0 {
            info!(pruned, "seen-id gc");
        }
        Ok(())
    }

    /// Every 60 s: re-attempt messages persisted as `offline_pending`,
    /// re-encrypting with a fresh nonce since nonces can never be reused.
    pub async fn run_pending_retry(&self) -> Result<(), NodeError> {
        let pending = self.store.list_offline_pending().await?;
        for msg in pending {
            let friend = match self.store.lookup_friend(&msg.peer).await {
                Ok(f) => f,
                Err(_) => continue,
            };
            if self.is_key_conflicted(&msg.peer).await {
                continue;
            }

            let payload = InnerPayload {
                text: &msg.plaintext,
                msg_id: msg.msg_id,
            };
            let payload_bytes = serde_json::to_vec(&payload).expect("payload always serializes");
            let (ciphertext, nonce) = encrypt_to(
                &friend.encryption_public_key,
                &self.identity.encryption_secret_key,
                &payload_bytes,
            )?;
            let signature = sign(&self.identity.signing_secret_key, &ciphertext);
            let envelope = Envelope {
                kind: EnvelopeKind::Message,
                from: self.username.clone(),
                to: msg.peer.clone(),
                timestamp: chrono::Utc::now(),
                nonce: encode_b64(nonce.as_bytes()),
                ciphertext: encode_b64(&ciphertext),
                signature: encode_b64(signature.as_bytes()),
            };
            let envelope_bytes = serde_json::to_vec(&envelope).expect("envelope always serializes");

            match self
            .directory
            .push_offline(&msg.peer, &self.username, encode_b64(&envelope_bytes))
            .await
            {
                Ok(()) => {
                    self.store
                    .update_delivery_method(msg.msg_id, DeliveryMethod::Offline)
                    .await?;
                }
                Err(e) => {
                    warn!(peer = %msg.peer, error = %e, "pending retry failed again, will retry next cycle");
                }
            }
        }
        Ok(())
    }
}
