//! Asynchronous state changes the Delivery Pipeline raises.
//!
//! This crate defines the events and the trait that receives them; the
//! actual WebSocket fan-out subscriber set lives in the binary crate, one
//! layer up, since only it owns the loopback listener.

use async_trait::async_trait;
use emberstore::Message;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    NewMessage(Message),
    FriendOnline { username: String },
    FriendOffline { username: String },
    FriendKeyConflict { username: String },
}

#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn publish(&self, event: Event);
}

/// An `EventSink` that discards every event. Useful for tests and for
/// running the pipeline headless.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, _event: Event) {}
}
