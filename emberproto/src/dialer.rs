//! Outbound side of the peer transport: dial, write one frame, close.
//!
//! No retries here — retry policy belongs to the delivery pipeline, which
//! decides what to do with a `ConnectRefused`/`Timeout`/`FramingError`.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::framing::write_frame;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// `send(remote_ip, remote_port, envelope) -> Delivered | ConnectRefused | Timeout | FramingError`
///
/// `Delivered` is represented as `Ok(())`.
pub async fn send(remote_ip: &str, remote_port: u16, envelope: &Envelope) -> Result<(), TransportError> {
    let payload =
    serde_json::to_vec(envelope).map_err(|e| TransportError::FramingError(e.to_string()))?;

    let mut stream = dial(remote_ip, remote_port).await?;

    match tokio::time::timeout(WRITE_TIMEOUT, write_frame(&mut stream, &payload)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

async fn dial(remote_ip: &str, remote_port: u16) -> Result<TcpStream, TransportError> {
    let addr = format!("{remote_ip}:{remote_port}");
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            Err(TransportError::ConnectRefused)
        }
        Ok(Err(e)) => Err(TransportError::Io(e)),
        Err(_) => Err(TransportError::Timeout),
    }
}
