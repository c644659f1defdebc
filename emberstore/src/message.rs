use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }

    fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "sent" => Ok(Direction::Sent),
            "received" => Ok(Direction::Received),
            other => Err(StoreError::IdentityCorrupt(format!(
                        "unknown message direction: {other}"
            ))),
        }
    }
}

/// its three outcomes for a sent message, plus the receive path's two
/// provenances. `null` is represented by `None` in `Message::delivery_method`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Direct,
    Offline,
    OfflinePending,
}

impl DeliveryMethod {
    fn as_str(self) -> &'static str {
        match self {
            DeliveryMethod::Direct => "direct",
            DeliveryMethod::Offline => "offline",
            DeliveryMethod::OfflinePending => "offline_pending",
        }
    }

    fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "direct" => Ok(DeliveryMethod::Direct),
            "offline" => Ok(DeliveryMethod::Offline),
            "offline_pending" => Ok(DeliveryMethod::OfflinePending),
            other => Err(StoreError::IdentityCorrupt(format!(
                        "unknown delivery method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: Uuid,
    pub peer: String,
    pub direction: Direction,
    pub plaintext: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
    pub delivery_method: Option<DeliveryMethod>,
}

#[derive(Clone)]
pub struct NewMessage {
    pub msg_id: Uuid,
    pub peer: String,
    pub direction: Direction,
    pub plaintext: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
    pub delivery_method: Option<DeliveryMethod>,
}

struct SqlMessage {
    msg_id: String,
    peer: String,
    direction: String,
    plaintext: String,
    timestamp: String,
    delivered: i64,
    delivery_method: Option<String>,
}

impl TryFrom<SqlMessage> for Message {
    type Error = StoreError;

    fn try_from(row: SqlMessage) -> Result<Self, Self::Error> {
        Ok(Message {
                msg_id: Uuid::parse_str(&row.msg_id)
                .map_err(|e| StoreError::IdentityCorrupt(e.to_string()))?,
                peer: row.peer,
                direction: Direction::parse(&row.direction)?,
                plaintext: row.plaintext,
                timestamp: DateTime::parse_from_rfc3339(&row.timestamp)
                .map_err(|e| StoreError::IdentityCorrupt(e.to_string()))?
                .with_timezone(&Utc),
                delivered: row.delivered != 0,
                delivery_method: row.delivery_method.as_deref().map(DeliveryMethod::parse).transpose()?,
        })
    }
}

/// `record_message(msg) -> Ok | Duplicate`
///
/// Insert-or-ignore by `msg_id`, so applying the receive path twice to the
/// same message yields identical store contents.
pub(crate) async fn record_message(
    pool: &SqlitePool,
    msg: &NewMessage,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO message (msg_id, peer, direction, plaintext, timestamp, delivered, delivery_method) \
        VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(msg.msg_id.to_string())
    .bind(&msg.peer)
    .bind(msg.direction.as_str())
    .bind(&msg.plaintext)
    .bind(msg.timestamp.to_rfc3339())
    .bind(msg.delivered as i64)
    .bind(msg.delivery_method.map(DeliveryMethod::as_str))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Duplicate(msg.msg_id.to_string()));
    }
    Ok(())
}

/// `mark_delivered(msg_id) -> Ok | NotFound`
pub(crate) async fn mark_delivered(pool: &SqlitePool, msg_id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE message SET delivered = 1 WHERE msg_id = ?")
    .bind(msg_id.to_string())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(msg_id.to_string()));
    }
    Ok(())
}

/// `list_messages(peer, offset, limit) -> (messages, total, has_more)`
///
/// Chronological order, oldest first; `total` is the absolute count for
/// that peer regardless of `offset`/`limit`.
pub(crate) async fn list_messages(
    pool: &SqlitePool,
    peer: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Message>, i64, bool), StoreError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message WHERE peer = ?")
    .bind(peer)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as!(
        SqlMessage,
        r#"SELECT msg_id, peer, direction, plaintext, timestamp, delivered, delivery_method
        FROM message WHERE peer = ? ORDER BY timestamp ASC, msg_id ASC LIMIT ? OFFSET ?"#,
        peer,
        limit,
        offset
    )
    .fetch_all(pool)
    .await?;

    let messages = rows
    .into_iter()
    .map(Message::try_from)
    .collect::<Result<Vec<_>, _>>()?;
    let has_more = offset + messages.len() as i64 < total;
    Ok((messages, total, has_more))
}

/// `DELETE /messages/{msg_id}` backing operation: local-only removal of a
/// single message record.
pub(crate) async fn delete_message(pool: &SqlitePool, msg_id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM message WHERE msg_id = ?")
    .bind(msg_id.to_string())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(msg_id.to_string()));
    }
    Ok(())
}

/// Sent messages still sitting at `offline_pending` — the scheduler's
/// pending-retry task works this list every 60 s.
pub(crate) async fn list_offline_pending(pool: &SqlitePool) -> Result<Vec<Message>, StoreError> {
    let rows = sqlx::query_as!(
        SqlMessage,
        r#"SELECT msg_id, peer, direction, plaintext, timestamp, delivered, delivery_method
        FROM message WHERE direction = 'sent' AND delivery_method = 'offline_pending'
        ORDER BY timestamp ASC"#
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Message::try_from).collect()
}

/// Updates a sent message's `delivery_method` after a retry changes its
/// outcome (e.g. `offline_pending` -> `offline` once the relay accepts it).
pub(crate) async fn update_delivery_method(
    pool: &SqlitePool,
    msg_id: Uuid,
    delivery_method: DeliveryMethod,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE message SET delivery_method = ? WHERE msg_id = ?")
    .bind(delivery_method.as_str())
    .bind(msg_id.to_string())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(msg_id.to_string()));
    }
    Ok(())
}
