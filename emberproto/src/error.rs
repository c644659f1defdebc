use thiserror::Error;

/// Outcomes of a peer-to-peer send. `Delivered` is folded into `Ok(())`
/// at the call site; every variant below is a failure the delivery pipeline
/// above this crate must decide how to react to.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection refused by peer")]
    ConnectRefused,
    #[error("operation timed out")]
    Timeout,
    #[error("frame malformed or oversized: {0}")]
    FramingError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
