use chrono::{DateTime, Utc};
use embercrypto::{EncPublicKey, SignPublicKey};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::StoreError;

/// A pinned friend record.
///
/// The `(encryption_public_key, signing_public_key)` pair is pinned at
/// creation by `add_friend` and is never overwritten by `update_presence` —
/// only an explicit re-pin (outside this module; see `embercore`'s friend
/// key-state machine) can change it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Friend {
    pub username: String,
    pub encryption_public_key: EncPublicKey,
    pub signing_public_key: SignPublicKey,
    pub last_ip: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
}

struct SqlFriend {
    username: String,
    encryption_public_key: Vec<u8>,
    signing_public_key: Vec<u8>,
    last_ip: Option<String>,
    last_seen: Option<String>,
    added_at: String,
}

impl TryFrom<SqlFriend> for Friend {
    type Error = StoreError;

    fn try_from(row: SqlFriend) -> Result<Self, Self::Error> {
        Ok(Friend {
                username: row.username,
                encryption_public_key: EncPublicKey::try_from(row.encryption_public_key.as_slice())
                .map_err(|e| StoreError::IdentityCorrupt(e.to_string()))?,
                signing_public_key: SignPublicKey::try_from(row.signing_public_key.as_slice())
                .map_err(|e| StoreError::IdentityCorrupt(e.to_string()))?,
                last_ip: row.last_ip,
                last_seen: row
                .last_seen
                .map(|s| parse_timestamp(&s))
                .transpose()?,
                added_at: parse_timestamp(&row.added_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| StoreError::IdentityCorrupt(e.to_string()))
}

/// `add_friend(username, enc_pk, sign_pk, last_ip, last_seen) -> Ok | AlreadyExists`
pub(crate) async fn add_friend(
    pool: &SqlitePool,
    username: &str,
    encryption_public_key: &EncPublicKey,
    signing_public_key: &SignPublicKey,
    last_ip: Option<&str>,
    last_seen: Option<DateTime<Utc>>,
) -> Result<Friend, StoreError> {
    if lookup_friend(pool, username).await.is_ok() {
        return Err(StoreError::AlreadyExists(username.to_string()));
    }
    let added_at = Utc::now();
    let enc_pk = encryption_public_key.as_bytes().to_vec();
    let sign_pk = signing_public_key.as_bytes().to_vec();
    let last_seen_str = last_seen.map(|t| t.to_rfc3339());
    sqlx::query(
        "INSERT INTO friend (username, encryption_public_key, signing_public_key, last_ip, last_seen, added_at) \
        VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(&enc_pk)
    .bind(&sign_pk)
    .bind(last_ip)
    .bind(&last_seen_str)
    .bind(added_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Friend {
            username: username.to_string(),
            encryption_public_key: *encryption_public_key,
            signing_public_key: *signing_public_key,
            last_ip: last_ip.map(str::to_string),
            last_seen,
            added_at,
    })
}

/// `lookup_friend(username) -> Friend | NotFound`
pub(crate) async fn lookup_friend(pool: &SqlitePool, username: &str) -> Result<Friend, StoreError> {
    let row = sqlx::query_as!(
        SqlFriend,
        r#"SELECT username, encryption_public_key, signing_public_key, last_ip, last_seen, added_at
        FROM friend WHERE username = ?"#,
        username
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::NotFound(username.to_string()))?;
    row.try_into()
}

pub(crate) async fn list_friends(pool: &SqlitePool) -> Result<Vec<Friend>, StoreError> {
    let rows = sqlx::query_as!(
        SqlFriend,
        r#"SELECT username, encryption_public_key, signing_public_key, last_ip, last_seen, added_at
        FROM friend ORDER BY username"#
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Friend::try_from).collect()
}

/// `update_presence(username, last_ip, last_seen) -> Ok | NotFound`
///
/// Never touches either public key column.
pub(crate) async fn update_presence(
    pool: &SqlitePool,
    username: &str,
    last_ip: &str,
    last_seen: DateTime<Utc>,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE friend SET last_ip = ?, last_seen = ? WHERE username = ?")
    .bind(last_ip)
    .bind(last_seen.to_rfc3339())
    .bind(username)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(username.to_string()));
    }
    Ok(())
}

/// `remove_friend(username) -> Ok | NotFound`
///
/// Messages with that peer are retained — only the `friend` row is
/// deleted.
pub(crate) async fn remove_friend(pool: &SqlitePool, username: &str) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM friend WHERE username = ?")
    .bind(username)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(username.to_string()));
    }
    Ok(())
}

/// Re-pins a friend's keys after an explicit, user-confirmed key-change
/// acknowledgement. This is a deliberate escape hatch alongside the
/// ordinary friend operations, which otherwise forbid silent key
/// replacement.
pub(crate) async fn repin_friend(
    pool: &SqlitePool,
    username: &str,
    encryption_public_key: &EncPublicKey,
    signing_public_key: &SignPublicKey,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE friend SET encryption_public_key = ?, signing_public_key = ? WHERE username = ?",
    )
    .bind(encryption_public_key.as_bytes().to_vec())
    .bind(signing_public_key.as_bytes().to_vec())
    .bind(username)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(username.to_string()));
    }
    Ok(())
}
