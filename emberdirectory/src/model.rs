use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `users` row as published by the directory.
///
/// Pinning a friend needs both their encryption and signing public keys,
/// so the directory publishes both under distinct field names rather than
/// a single combined key column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub username: String,
    pub node_id: String,
    pub encryption_public_key: String,
    pub signing_public_key: String,
    pub last_ip: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub node_id: String,
    pub encryption_public_key: String,
    pub signing_public_key: String,
    pub last_ip: Option<String>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HeartbeatRequest {
    pub username: String,
    pub last_ip: String,
}

/// A single `offline_messages` row, base64-decoded ciphertext left opaque
/// (it is a whole envelope's JSON bytes).
#[derive(Clone, Debug, Deserialize)]
pub struct OfflineEnvelope {
    pub id: String,
    pub ciphertext: String,
}

#[derive(Serialize)]
pub(crate) struct PushOfflineRequest<'a> {
    pub to_user: &'a str,
    pub from_user: &'a str,
    pub ciphertext: String,
}

#[derive(Serialize)]
pub(crate) struct DeleteOfflineRequest {
    pub ids: Vec<String>,
}
