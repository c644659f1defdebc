//! Offline drain: run at startup and on a slow cadence, applying
//! the receive path to every envelope the relay is holding for us.
//!
//! A transient failure on any one envelope leaves every remaining,
//! un-deleted envelope in place for the next drain — nothing here is an
//! all-or-nothing batch.

use embercrypto::decode_b64;
use emberproto::Envelope;
use tracing::warn;

use crate::error::NodeError;
use crate::node::Node;
use crate::receive::DeliverySource;

impl Node {
    pub async fn drain_offline(&self) -> Result<(), NodeError> {
        let envelopes = self.directory.fetch_offline(&self.username).await?;
        for item in envelopes {
            let bytes = match decode_b64(&item.ciphertext) {
                Ok(b) => b,
                Err(_) => {
                    warn!(relay_id = %item.id, "dropping undecodable offline entry");
                    continue;
                }
            };
            let envelope: Envelope = match serde_json::from_slice(&bytes) {
                Ok(e) => e,
                Err(_) => {
                    warn!(relay_id = %item.id, "dropping unparsable offline entry");
                    continue;
                }
            };
            if let Err(e) = self
            .receive_envelope(envelope, DeliverySource::Offline { relay_id: item.id.clone() })
            .await
            {
                warn!(relay_id = %item.id, error = %e, "offline drain hit a store error, leaving entry for next drain");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use embercrypto::{IdentityKeys, encode_b64, encrypt_to, sign};
    use emberdirectory::DirectoryClient;
    use emberproto::EnvelopeKind;
    use emberstore::Store;
    use serde::Serialize;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::event::NullEventSink;

    #[derive(Serialize)]
    struct InnerPayload<'a> {
        text: &'a str,
        msg_id: Uuid,
    }

    fn make_envelope(sender: &IdentityKeys, recipient: &IdentityKeys, from: &str, to: &str, msg_id: Uuid, text: &str) -> Envelope {
        let payload = InnerPayload { text, msg_id };
        let payload_bytes = serde_json::to_vec(&payload).unwrap();
        let (ciphertext, nonce) =
        encrypt_to(&recipient.encryption_public_key, &sender.encryption_secret_key, &payload_bytes).unwrap();
        let signature = sign(&sender.signing_secret_key, &ciphertext);
        Envelope {
            kind: EnvelopeKind::Message,
            from: from.to_string(),
            to: to.to_string(),
            timestamp: chrono::Utc::now(),
            nonce: encode_b64(nonce.as_bytes()),
            ciphertext: encode_b64(&ciphertext),
            signature: encode_b64(signature.as_bytes()),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn drain_persists_each_envelope_and_deletes_it_from_the_relay() {
        let server = MockServer::start().await;
        let sender = IdentityKeys::generate();
        let recipient = IdentityKeys::generate();
        let msg_id = Uuid::new_v4();
        let envelope = make_envelope(&sender, &recipient, "alice", "bob", msg_id, "hi from the relay");
        let envelope_bytes = serde_json::to_vec(&envelope).unwrap();

        Mock::given(method("GET"))
        .and(path("/offline_messages"))
        .and(query_param("to_user", "bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                    "id": "relay-1",
                    "ciphertext": encode_b64(&envelope_bytes),
        }])))
        .mount(&server)
        .await;
        Mock::given(method("DELETE"))
        .and(path("/offline_messages"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store
        .add_friend("alice", &sender.encryption_public_key, &sender.signing_public_key, None, None)
        .await
        .unwrap();
        let directory = Arc::new(DirectoryClient::new(server.uri(), "test-key").unwrap());
        let node = Node::new(
            Uuid::new_v4(),
            "bob".to_string(),
            recipient,
            0,
            store.clone(),
            directory,
            Arc::new(NullEventSink),
        );

        node.drain_offline().await.unwrap();

        let (messages, total, _) = store.list_messages("alice", 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(messages[0].msg_id, msg_id);
        assert_eq!(messages[0].plaintext, "hi from the relay");
        assert_eq!(messages[0].delivery_method, Some(emberstore::DeliveryMethod::Offline));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn undecodable_entry_is_skipped_without_failing_the_drain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
        .and(path("/offline_messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                    "id": "relay-1",
                    "ciphertext": "not valid base64!!",
        }])))
        .mount(&server)
        .await;

        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let directory = Arc::new(DirectoryClient::new(server.uri(), "test-key").unwrap());
        let node = Node::new(
            Uuid::new_v4(),
            "bob".to_string(),
            IdentityKeys::generate(),
            0,
            store,
            directory,
            Arc::new(NullEventSink),
        );

        node.drain_offline().await.unwrap();
    }
}
