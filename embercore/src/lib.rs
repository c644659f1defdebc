//! Delivery Pipeline, friend key state machine, event
//! taxonomy, and scheduler task bodies.
//!
//! This is the component every other layer in the node funnels through:
//! the Local Control Plane and inbound Peer Transport are the two request
//! sources, both of which end up calling into a `Node`.

pub mod error;
pub mod event;
pub mod keystate;
pub mod node;
pub mod offline;
pub mod presence;
pub mod receive;
pub mod scheduler;
pub mod send;

pub use error::NodeError;
pub use event::{Event, EventSink, NullEventSink};
pub use keystate::{FriendKeyState, classify};
pub use node::{MAX_TEXT_BYTES, Node, StatusSnapshot};
pub use receive::DeliverySource;
pub use send::SendOutcome;
