//! Peer Transport: length-framed TCP between nodes.
//!
//! One envelope per connection, in both directions. This crate owns the
//! wire type (`Envelope`) and the framing rules; it knows nothing about
//! encryption, friends, or the directory.

pub mod dialer;
pub mod envelope;
pub mod error;
pub mod framing;
pub mod listener;

pub use dialer::send;
pub use envelope::{Envelope, EnvelopeKind};
pub use error::TransportError;
pub use listener::{EnvelopeHandler, listen};
