//! Identity & Friend Store.
//!
//! Two persistence media: a JSON-encoded keys file for the node's own
//! identity (`keys_file`), and a sqlite-backed relational store for
//! friends, messages and the seen-id dedup table (`friend`, `message`,
//! `seen`). `Store` is the single entry point mutating operations go
//! through; it serializes writes with an internal lock so the dedup
//! check-then-mark in `check_and_mark_seen` is atomic.

pub mod db;
pub mod error;
pub mod friend;
pub mod keys_file;
pub mod message;
pub mod seen;

use std::path::Path;

use chrono::{DateTime, Utc};
use embercrypto::{EncPublicKey, SignPublicKey};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use error::StoreError;
pub use friend::Friend;
pub use keys_file::PersistedIdentity;
pub use message::{DeliveryMethod, Direction, Message, NewMessage};

pub struct Store {
    pool: SqlitePool,
    /// Serializes every mutating operation. Reads go straight to
    /// the pool; sqlite's own MVCC handles concurrent readers fine, but a
    /// stray interleaving of two writers could otherwise race the
    /// check-then-mark in `check_and_mark_seen`.
    write_lock: Mutex<()>,
}

impl Store {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = db::open(path).await?;
        Ok(Self {
                pool,
                write_lock: Mutex::new(()),
        })
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = db::open_in_memory().await?;
        Ok(Self {
                pool,
                write_lock: Mutex::new(()),
        })
    }

    pub async fn add_friend(
        &self,
        username: &str,
        encryption_public_key: &EncPublicKey,
        signing_public_key: &SignPublicKey,
        last_ip: Option<&str>,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<Friend, StoreError> {
        let _guard = self.write_lock.lock().await;
        friend::add_friend(
            &self.pool,
            username,
            encryption_public_key,
            signing_public_key,
            last_ip,
            last_seen,
        )
        .await
    }

    pub async fn lookup_friend(&self, username: &str) -> Result<Friend, StoreError> {
        friend::lookup_friend(&self.pool, username).await
    }

    pub async fn list_friends(&self) -> Result<Vec<Friend>, StoreError> {
        friend::list_friends(&self.pool).await
    }

    pub async fn update_presence(
        &self,
        username: &str,
        last_ip: &str,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        friend::update_presence(&self.pool, username, last_ip, last_seen).await
    }

    pub async fn remove_friend(&self, username: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        friend::remove_friend(&self.pool, username).await
    }

    /// Re-pins a friend's keys. Only meant to be called after an explicit
    /// user confirmation of a `Key-changed` condition; this crate
    /// does not itself gate on that state, `embercore` does.
    pub async fn repin_friend(
        &self,
        username: &str,
        encryption_public_key: &EncPublicKey,
        signing_public_key: &SignPublicKey,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        friend::repin_friend(&self.pool, username, encryption_public_key, signing_public_key).await
    }

    pub async fn record_message(&self, msg: &NewMessage) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        message::record_message(&self.pool, msg).await
    }

    pub async fn mark_delivered(&self, msg_id: Uuid) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        message::mark_delivered(&self.pool, msg_id).await
    }

    pub async fn list_messages(
        &self,
        peer: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64, bool), StoreError> {
        message::list_messages(&self.pool, peer, offset, limit).await
    }

    pub async fn delete_message(&self, msg_id: Uuid) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        message::delete_message(&self.pool, msg_id).await
    }

    pub async fn list_offline_pending(&self) -> Result<Vec<Message>, StoreError> {
        message::list_offline_pending(&self.pool).await
    }

    pub async fn update_delivery_method(
        &self,
        msg_id: Uuid,
        delivery_method: DeliveryMethod,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        message::update_delivery_method(&self.pool, msg_id, delivery_method).await
    }

    pub async fn has_seen(&self, msg_id: Uuid) -> Result<bool, StoreError> {
        seen::has_seen(&self.pool, msg_id).await
    }

    /// Atomically checks whether `msg_id` has already been seen and, if
    /// not, marks it seen. Returns `true` if this call is the one that
    /// marked it (i.e. it was novel), `false` if it was already present
    /// (i.e. this is a replay). The check and the mark must happen
    /// atomically together, or two concurrent deliveries of the same
    /// message could both observe "not seen yet".
    pub async fn check_and_mark_seen(&self, msg_id: Uuid) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        if seen::has_seen(&self.pool, msg_id).await? {
            return Ok(false);
        }
        seen::mark_seen(&self.pool, msg_id).await?;
        Ok(true)
    }

    /// Prunes seen-id entries older than the retention window. Returns the
    /// number of rows removed.
    pub async fn gc_seen_ids(&self) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        seen::gc_older_than(&self.pool, Utc::now()).await
    }
}
