//! Logging init, simplified from the hosted server's bunyan-formatted
//! subscriber: a single-process peer node logs to its own stderr, so there
//! is no need for the `JsonStorageLayer`/`BunyanFormattingLayer` pair that
//! exists to feed a centralized log aggregator.

use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Build a subscriber for the node's tracing events.
pub fn get_subscriber(default_level: &str) -> impl Subscriber + Send + Sync {
    let env_filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    Registry::default().with(env_filter).with(fmt::layer())
}

/// Register a subscriber as global default to process span data.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");
}
