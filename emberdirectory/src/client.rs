//! HTTP client for the cloud directory.
//!
//! The directory is semi-trusted: it sees usernames, public keys, presence,
//! and opaque relayed ciphertext, but never a secret key and never a
//! plaintext message. All requests carry a static API key header; all
//! transport is HTTPS.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::warn;

use crate::error::DirectoryError;
use crate::model::{
    DeleteOfflineRequest, DirectoryRecord, HeartbeatRequest, OfflineEnvelope, PushOfflineRequest,
    RegisterRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_HEADER: &str = "X-Api-Key";

pub struct DirectoryClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DirectoryError> {
        let client = ClientBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .user_agent("embernode/0.1")
        .build()?;
        Ok(Self {
                client,
                base_url: base_url.into(),
                api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `register(identity) -> Ok | Conflict | NetErr`
    ///
    /// Upsert semantics: idempotent up to `last_seen`.
    #[allow(clippy::too_many_arguments)]
    pub async fn register(
        &self,
        username: &str,
        node_id: &str,
        encryption_public_key: &str,
        signing_public_key: &str,
        last_ip: Option<&str>,
    ) -> Result<(), DirectoryError> {
        let body = RegisterRequest {
            username: username.to_string(),
            node_id: node_id.to_string(),
            encryption_public_key: encryption_public_key.to_string(),
            signing_public_key: signing_public_key.to_string(),
            last_ip: last_ip.map(str::to_string),
            last_seen: Utc::now(),
        };
        let response = self
        .client
        .put(self.url("/users"))
        .header(API_KEY_HEADER, &self.api_key)
        .json(&body)
        .send()
        .await?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::CONFLICT => Err(DirectoryError::Conflict),
            status => Err(DirectoryError::NetErr(format!("unexpected status {status}"))),
        }
    }

    /// `heartbeat(username, current_ip) -> Ok | NetErr`
    ///
    /// Failures here are transient warnings at the call site, never fatal.
    pub async fn heartbeat(&self, username: &str, current_ip: &str) -> Result<(), DirectoryError> {
        let body = HeartbeatRequest {
            username: username.to_string(),
            last_ip: current_ip.to_string(),
        };
        let response = self
        .client
        .post(self.url(&format!("/users/{username}/heartbeat")))
        .header(API_KEY_HEADER, &self.api_key)
        .json(&body)
        .send()
        .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DirectoryError::NetErr(format!(
                        "unexpected status {}",
                        response.status()
            )))
        }
    }

    /// `lookup(username) -> DirectoryRecord | NotFound | NetErr`
    pub async fn lookup(&self, username: &str) -> Result<DirectoryRecord, DirectoryError> {
        let response = self
        .client
        .get(self.url(&format!("/users/{username}")))
        .header(API_KEY_HEADER, &self.api_key)
        .send()
        .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json::<DirectoryRecord>().await?),
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound),
            status => Err(DirectoryError::NetErr(format!("unexpected status {status}"))),
        }
    }

    /// `push_offline(recipient, sender, envelope_bytes) -> Ok | NetErr`
    pub async fn push_offline(
        &self,
        recipient: &str,
        sender: &str,
        envelope_ciphertext_b64: String,
    ) -> Result<(), DirectoryError> {
        let body = PushOfflineRequest {
            to_user: recipient,
            from_user: sender,
            ciphertext: envelope_ciphertext_b64,
        };
        let response = self
        .client
        .post(self.url("/offline_messages"))
        .header(API_KEY_HEADER, &self.api_key)
        .json(&body)
        .send()
        .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DirectoryError::NetErr(format!(
                        "unexpected status {}",
                        response.status()
            )))
        }
    }

    /// `fetch_offline(recipient) -> Vec<(id, envelope_bytes)> | NetErr`, ordered oldest-first.
    pub async fn fetch_offline(&self, recipient: &str) -> Result<Vec<OfflineEnvelope>, DirectoryError> {
        let response = self
        .client
        .get(self.url("/offline_messages"))
        .header(API_KEY_HEADER, &self.api_key)
        .query(&[("to_user", recipient)])
        .send()
        .await?;
        if response.status().is_success() {
            Ok(response.json::<Vec<OfflineEnvelope>>().await?)
        } else {
            Err(DirectoryError::NetErr(format!(
                        "unexpected status {}",
                        response.status()
            )))
        }
    }

    /// `delete_offline(ids) -> Ok | NetErr`
    ///
    /// Must only be called after the local store has durably recorded each
    /// corresponding message, since a partial failure here just means the
    /// relay entry is deleted again on the next retry.
    pub async fn delete_offline(&self, ids: Vec<String>) -> Result<(), DirectoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let response = self
        .client
        .delete(self.url("/offline_messages"))
        .header(API_KEY_HEADER, &self.api_key)
        .json(&DeleteOfflineRequest { ids })
        .send()
        .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            warn!(status = %response.status(), "delete_offline returned a non-success status");
            Err(DirectoryError::NetErr(format!(
                        "unexpected status {}",
                        response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn register_success_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
        .and(path("/users"))
        .and(header(API_KEY_HEADER, "secret"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        client
        .register("alice", "node-1", "enc-pk", "sign-pk", None)
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn register_conflict_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        let err = client
        .register("alice", "node-1", "enc-pk", "sign-pk", None)
        .await
        .unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn lookup_not_found_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
        .and(path("/users/bob"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        let err = client.lookup("bob").await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn lookup_success_parses_record() {
        let server = MockServer::start().await;
        let record = DirectoryRecord {
            username: "bob".to_string(),
            node_id: "node-2".to_string(),
            encryption_public_key: "enc-pk".to_string(),
            signing_public_key: "sign-pk".to_string(),
            last_ip: Some("127.0.0.1".to_string()),
            last_seen: Some(Utc::now()),
        };
        Mock::given(method("GET"))
        .and(path("/users/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&record))
        .mount(&server)
        .await;

        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        let got = client.lookup("bob").await.unwrap();
        assert_eq!(got.username, "bob");
        assert_eq!(got.encryption_public_key, "enc-pk");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn fetch_offline_returns_ordered_envelopes() {
        let server = MockServer::start().await;
        let envelopes = vec![
        OfflineEnvelope { id: "1".to_string(), ciphertext: "aaa".to_string() },
        OfflineEnvelope { id: "2".to_string(), ciphertext: "bbb".to_string() },
        ];
        Mock::given(method("GET"))
        .and(path("/offline_messages"))
        .and(query_param("to_user", "carol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&envelopes))
        .mount(&server)
        .await;

        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        let got = client.fetch_offline("carol").await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, "1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn delete_offline_with_no_ids_skips_the_request() {
        let server = MockServer::start().await;
        // No mock registered: a request here would fail the test.
        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        client.delete_offline(vec![]).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn heartbeat_non_success_is_net_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
        .and(path("/users/alice/heartbeat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

        let client = DirectoryClient::new(server.uri(), "secret").unwrap();
        let err = client.heartbeat("alice", "127.0.0.1").await.unwrap_err();
        assert!(matches!(err, DirectoryError::NetErr(_)));
    }
}
