//! Send path: resolve → construct → encrypt+sign → try-direct →
//! fallback-relay → persist.
//!
//! Persistence happens *after* the delivery attempt, deliberately, so
//! `delivery_method` reflects what actually happened rather than what was
//! merely intended.

use chrono::Utc;
use embercrypto::{encode_b64, encrypt_to, sign};
use emberproto::{Envelope, EnvelopeKind};
use emberstore::{DeliveryMethod, Direction, NewMessage};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::NodeError;
use crate::node::{MAX_TEXT_BYTES, Node};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Direct { msg_id: Uuid },
    Offline { msg_id: Uuid },
    Unreliable { msg_id: Uuid },
}

#[derive(Serialize, Deserialize)]
struct InnerPayload {
    text: String,
    msg_id: Uuid,
}

impl Node {
    pub async fn send_message(&self, to: &str, text: &str) -> Result<SendOutcome, NodeError> {
        if text.len() > MAX_TEXT_BYTES {
            return Err(NodeError::TooLarge);
        }

        let friend = self
        .store
        .lookup_friend(to)
        .await
        .map_err(|_| NodeError::UnknownFriend(to.to_string()))?;

        if self.is_key_conflicted(to).await {
            return Err(NodeError::KeyConflict(to.to_string()));
        }

        let msg_id = Uuid::new_v4();
        let payload = InnerPayload {
            text: text.to_string(),
            msg_id,
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
            to: to.to_string(),
            timestamp: Utc::now(),
            nonce: encode_b64(nonce.as_bytes()),
            ciphertext: encode_b64(&ciphertext),
            signature: encode_b64(signature.as_bytes()),
        };

        if let Some(ip) = friend.last_ip.as_deref() {
            match emberproto::send(ip, self.peer_port, &envelope).await {
                Ok(()) => {
                    self.persist_sent(msg_id, to, text, true, DeliveryMethod::Direct)
                    .await?;
                    return Ok(SendOutcome::Direct { msg_id });
                }
                Err(e) => {
                    warn!(peer = %to, error = %e, "direct delivery failed, falling back to relay");
                }
            }
        }

        let envelope_bytes = serde_json::to_vec(&envelope).expect("envelope always serializes");
        match self
        .directory
        .push_offline(to, &self.username, encode_b64(&envelope_bytes))
        .await
        {
            Ok(()) => {
                self.persist_sent(msg_id, to, text, false, DeliveryMethod::Offline)
                .await?;
                Ok(SendOutcome::Offline { msg_id })
            }
            Err(e) => {
                warn!(peer = %to, error = %e, "relay push failed, message held as offline_pending");
                self.persist_sent(msg_id, to, text, false, DeliveryMethod::OfflinePending)
                .await?;
                Ok(SendOutcome::Unreliable { msg_id })
            }
        }
    }

    async fn persist_sent(
        &self,
        msg_id: Uuid,
        peer: &str,
        text: &str,
        delivered: bool,
        delivery_method: DeliveryMethod,
    ) -> Result<(), NodeError> {
        let msg = NewMessage {
            msg_id,
            peer: peer.to_string(),
            direction: Direction::Sent,
            plaintext: text.to_string(),
            timestamp: Utc::now(),
            delivered,
            delivery_method: Some(delivery_method),
        };
        self.store.record_message(&msg).await?;
        Ok(())
    }
}
