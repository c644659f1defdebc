//! Receive path: structural-check → resolve-sender → verify →
//! decrypt → dedup → persist → notify → (offline-source only) relay-delete.
//!
//! Every failure below a store error is recovered locally here: the traffic
//! is dropped and logged, and no caller ever observes it. Only a genuine
//! `StoreError` propagates; every other failure kind is retryable or
//! surfaced elsewhere, never from this path.

use std::net::SocketAddr;

use async_trait::async_trait;
use embercrypto::{Nonce, Signature, decode_b64, decrypt_from, verify};
use emberproto::{Envelope, EnvelopeHandler, EnvelopeKind};
use emberstore::{DeliveryMethod, Direction, Message, NewMessage};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::NodeError;
use crate::event::Event;
use crate::node::Node;

/// Where an inbound envelope came from, so the receive path knows whether
/// there is a relay entry to clean up once persistence commits.
pub enum DeliverySource {
    Direct,
    Offline { relay_id: String },
}

#[derive(Serialize, Deserialize)]
struct InnerPayload {
    text: String,
    msg_id: Uuid,
}

impl Node {
    pub async fn receive_envelope(
        &self,
        envelope: Envelope,
        source: DeliverySource,
    ) -> Result<(), NodeError> {
        if envelope.kind != EnvelopeKind::Message || envelope.to != self.username {
            warn!(from = %envelope.from, "dropping envelope failing the structural check");
            return Ok(());
        }

        let (nonce_bytes, ciphertext, signature_bytes) = match (
            decode_b64(&envelope.nonce),
            decode_b64(&envelope.ciphertext),
            decode_b64(&envelope.signature),
        ) {
            (Ok(n), Ok(c), Ok(s)) => (n, c, s),
            _ => {
                warn!(from = %envelope.from, "dropping envelope with unparsable base64 fields");
                return Ok(());
            }
        };

        let friend = match self.store_friend(&envelope.from).await {
            Some(f) => f,
            None => {
                warn!(from = %envelope.from, "dropping envelope from a non-friend sender");
                return Ok(());
            }
        };

        let Ok(nonce_arr): Result<[u8; embercrypto::aead::NONCE_LEN], _> = nonce_bytes.as_slice().try_into() else {
            warn!(from = %envelope.from, "dropping envelope with malformed nonce length");
            return Ok(());
        };
        let Ok(sig_arr): Result<[u8; embercrypto::signature::SIGNATURE_LEN], _> =
        signature_bytes.as_slice().try_into()
        else {
            warn!(from = %envelope.from, "dropping envelope with malformed signature length");
            return Ok(());
        };
        let nonce = Nonce(nonce_arr);
        let signature = Signature(sig_arr);

        if verify(&friend.signing_public_key, &ciphertext, &signature).is_err() {
            warn!(from = %envelope.from, "dropping envelope with an invalid signature");
            return Ok(());
        }

        let plaintext = match decrypt_from(&friend.encryption_public_key, &self.identity.encryption_secret_key, &ciphertext, &nonce) {
            Ok(p) => p,
            Err(_) => {
                warn!(from = %envelope.from, "dropping envelope that failed to decrypt");
                return Ok(());
            }
        };

        let payload: InnerPayload = match serde_json::from_slice(&plaintext) {
            Ok(p) => p,
            Err(_) => {
                warn!(from = %envelope.from, "dropping envelope with a malformed inner payload");
                return Ok(());
            }
        };

        if !self.store.check_and_mark_seen(payload.msg_id).await? {
            warn!(from = %envelope.from, msg_id = %payload.msg_id, "dropping replayed message");
            return Ok(());
        }

        let delivery_method = match &source {
            DeliverySource::Direct => DeliveryMethod::Direct,
            DeliverySource::Offline { .. } => DeliveryMethod::Offline,
        };
        let msg = NewMessage {
            msg_id: payload.msg_id,
            peer: envelope.from.clone(),
            direction: Direction::Received,
            plaintext: payload.text,
            timestamp: envelope.timestamp,
            delivered: true,
            delivery_method: Some(delivery_method),
        };
        self.store.record_message(&msg).await?;

        let message = Message {
            msg_id: msg.msg_id,
            peer: msg.peer,
            direction: msg.direction,
            plaintext: msg.plaintext,
            timestamp: msg.timestamp,
            delivered: msg.delivered,
            delivery_method: msg.delivery_method,
        };
        self.events.publish(Event::NewMessage(message)).await;

        if let DeliverySource::Offline { relay_id } = source {
            if let Err(e) = self.directory.delete_offline(vec![relay_id]).await {
                warn!(error = %e, "relay entry persisted locally but could not be deleted yet");
            }
        }

        Ok(())
    }

    async fn store_friend(&self, username: &str) -> Option<emberstore::Friend> {
        self.store.lookup_friend(username).await.ok()
    }
}

/// Adapts the pipeline's receive path to the Peer Transport's inbound
/// connection handler signature, `handler(envelope, remote_addr)`.
#[async_trait]
impl EnvelopeHandler for Node {
    async fn handle(&self, envelope: Envelope, remote_addr: SocketAddr) {
        let from = envelope.from.clone();
        if let Err(e) = self.receive_envelope(envelope, DeliverySource::Direct).await {
            warn!(%remote_addr, from = %from, error = %e, "receive path failed with a store error");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use embercrypto::{IdentityKeys, encrypt_to, sign};
    use emberdirectory::DirectoryClient;
    use emberstore::Store;
    use tokio::sync::Mutex;

    use super::*;
    use crate::event::{Event, EventSink};

    #[derive(Default)]
    struct CapturingEventSink {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventSink for CapturingEventSink {
        async fn publish(&self, event: Event) {
            self.events.lock().await.push(event);
        }
    }

    struct Fixture {
        node: Node,
        events: Arc<CapturingEventSink>,
        sender: IdentityKeys,
        sender_name: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let sender = IdentityKeys::generate();
        let sender_name = "alice".to_string();
        store
        .add_friend(
            &sender_name,
            &sender.encryption_public_key,
            &sender.signing_public_key,
            None,
            None,
        )
        .await
        .unwrap();

        let events = Arc::new(CapturingEventSink::default());
        let directory = Arc::new(DirectoryClient::new("http://127.0.0.1:0", "test-key").unwrap());
        let node = Node::new(
            Uuid::new_v4(),
            "bob".to_string(),
            IdentityKeys::generate(),
            0,
            store,
            directory,
            events.clone(),
        );
        Fixture { node, events, sender, sender_name }
    }

    /// Builds a valid envelope from `sender` to the fixture's node, carrying
    /// `msg_id`/`text`, encrypted and signed exactly the way the send path
    /// does it.
    fn envelope_from(fx: &Fixture, msg_id: Uuid, text: &str) -> Envelope {
        let payload = InnerPayload { text: text.to_string(), msg_id };
        let payload_bytes = serde_json::to_vec(&payload).unwrap();
        let (ciphertext, nonce) = encrypt_to(
            &fx.node.identity.encryption_public_key,
            &fx.sender.encryption_secret_key,
            &payload_bytes,
        )
        .unwrap();
        let signature = sign(&fx.sender.signing_secret_key, &ciphertext);
        Envelope {
            kind: EnvelopeKind::Message,
            from: fx.sender_name.clone(),
            to: fx.node.username.clone(),
            timestamp: chrono::Utc::now(),
            nonce: embercrypto::encode_b64(nonce.as_bytes()),
            ciphertext: embercrypto::encode_b64(&ciphertext),
            signature: embercrypto::encode_b64(signature.as_bytes()),
        }
    }

    #[tokio::test]
    async fn fresh_message_is_persisted_and_raises_new_message_event() {
        let fx = fixture().await;
        let msg_id = Uuid::new_v4();
        let envelope = envelope_from(&fx, msg_id, "hello bob");

        fx.node.receive_envelope(envelope, DeliverySource::Direct).await.unwrap();

        let (messages, total, _) = fx.node.store.list_messages(&fx.sender_name, 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(messages[0].msg_id, msg_id);
        assert_eq!(messages[0].plaintext, "hello bob");

        let events = fx.events.events.lock().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::NewMessage(m) => {
                assert_eq!(m.msg_id, msg_id);
                assert_eq!(m.plaintext, "hello bob");
            }
            other => panic!("expected NewMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn replayed_message_is_dropped_and_raises_no_event() {
        let fx = fixture().await;
        let msg_id = Uuid::new_v4();

        fx.node
        .receive_envelope(envelope_from(&fx, msg_id, "first"), DeliverySource::Direct)
        .await
        .unwrap();
        fx.node
        .receive_envelope(envelope_from(&fx, msg_id, "first"), DeliverySource::Direct)
        .await
        .unwrap();

        let (_, total, _) = fx.node.store.list_messages(&fx.sender_name, 0, 10).await.unwrap();
        assert_eq!(total, 1, "replay must not create a second row");
        assert_eq!(fx.events.events.lock().await.len(), 1, "replay must not raise a second event");
    }

    /// A second fresh message (not a replay of the first) from the same
    /// peer must still raise its own event carrying its own content —
    /// this is the regression the event used to get wrong by re-querying
    /// the store for "the" message by position instead of using the one
    /// just received.
    #[tokio::test]
    async fn second_distinct_message_from_same_peer_raises_its_own_event() {
        let fx = fixture().await;
        let first_id = Uuid::new_v4();
        let second_id = Uuid::new_v4();

        fx.node
        .receive_envelope(envelope_from(&fx, first_id, "first"), DeliverySource::Direct)
        .await
        .unwrap();
        fx.node
        .receive_envelope(envelope_from(&fx, second_id, "second"), DeliverySource::Direct)
        .await
        .unwrap();

        let events = fx.events.events.lock().await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            Event::NewMessage(m) => {
                assert_eq!(m.msg_id, second_id);
                assert_eq!(m.plaintext, "second");
            }
            other => panic!("expected NewMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tampered_ciphertext_is_dropped_without_error() {
        let fx = fixture().await;
        let mut envelope = envelope_from(&fx, Uuid::new_v4(), "hello bob");
        let mut ciphertext = embercrypto::decode_b64(&envelope.ciphertext).unwrap();
        ciphertext[0] ^= 0xFF;
        envelope.ciphertext = embercrypto::encode_b64(&ciphertext);

        fx.node.receive_envelope(envelope, DeliverySource::Direct).await.unwrap();

        let (_, total, _) = fx.node.store.list_messages(&fx.sender_name, 0, 10).await.unwrap();
        assert_eq!(total, 0);
        assert!(fx.events.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn tampered_signature_is_dropped_without_error() {
        let fx = fixture().await;
        let mut envelope = envelope_from(&fx, Uuid::new_v4(), "hello bob");
        let mut signature = embercrypto::decode_b64(&envelope.signature).unwrap();
        signature[0] ^= 0xFF;
        envelope.signature = embercrypto::encode_b64(&signature);

        fx.node.receive_envelope(envelope, DeliverySource::Direct).await.unwrap();

        let (_, total, _) = fx.node.store.list_messages(&fx.sender_name, 0, 10).await.unwrap();
        assert_eq!(total, 0);
        assert!(fx.events.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn envelope_from_a_non_friend_is_dropped() {
        let fx = fixture().await;
        let stranger = IdentityKeys::generate();
        let payload = InnerPayload { text: "hi".into(), msg_id: Uuid::new_v4() };
        let payload_bytes = serde_json::to_vec(&payload).unwrap();
        let (ciphertext, nonce) = encrypt_to(
            &fx.node.identity.encryption_public_key,
            &stranger.encryption_secret_key,
            &payload_bytes,
        )
        .unwrap();
        let signature = sign(&stranger.signing_secret_key, &ciphertext);
        let envelope = Envelope {
            kind: EnvelopeKind::Message,
            from: "mallory".to_string(),
            to: fx.node.username.clone(),
            timestamp: chrono::Utc::now(),
            nonce: embercrypto::encode_b64(nonce.as_bytes()),
            ciphertext: embercrypto::encode_b64(&ciphertext),
            signature: embercrypto::encode_b64(signature.as_bytes()),
        };

        fx.node.receive_envelope(envelope, DeliverySource::Direct).await.unwrap();

        assert!(fx.events.events.lock().await.is_empty());
    }
}
