//! Inbound side of the peer transport.
//!
//! One envelope per connection: accept, read exactly one frame, hand it to
//! the handler, close. No connection is kept open waiting for a second
//! frame.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::framing::read_frame;

#[async_trait]
pub trait EnvelopeHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: Envelope, remote_addr: SocketAddr);
}

/// Binds `port` and accepts connections until `shutdown` is notified.
pub async fn listen(
    port: u16,
    handler: Arc<dyn EnvelopeHandler>,
    shutdown: Arc<Notify>,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "peer transport listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = accepted?;
                let handler = handler.clone();
                tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, remote_addr, handler).await {
                            warn!(error = %e, %remote_addr, "dropping malformed inbound connection");
                        }
                });
            }
            _ = shutdown.notified() => {
                info!("peer transport listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    handler: Arc<dyn EnvelopeHandler>,
) -> Result<(), TransportError> {
    let payload = read_frame(&mut stream).await?;
    let envelope: Envelope = serde_json::from_slice(&payload)
    .map_err(|e| TransportError::FramingError(e.to_string()))?;
    handler.handle(envelope, remote_addr).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::send;
    use crate::envelope::EnvelopeKind;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    struct RecordingHandler {
        tx: Mutex<Option<oneshot::Sender<Envelope>>>,
    }

    #[async_trait]
    impl EnvelopeHandler for RecordingHandler {
        async fn handle(&self, envelope: Envelope, _remote_addr: SocketAddr) {
            if let Some(tx) = self.tx.lock().unwrap().take() {
                let _ = tx.send(envelope);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_then_listen_delivers_one_envelope() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, rx) = oneshot::channel();
        let handler = Arc::new(RecordingHandler {
                tx: Mutex::new(Some(tx)),
        });
        let shutdown = Arc::new(Notify::new());

        let shutdown_clone = shutdown.clone();
        let listen_task = tokio::spawn(listen(port, handler, shutdown_clone));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let envelope = Envelope {
            kind: EnvelopeKind::Message,
            from: "alice".into(),
            to: "bob".into(),
            timestamp: chrono::Utc::now(),
            nonce: "bm9uY2U=".into(),
            ciphertext: "Y2lwaGVy".into(),
            signature: "c2ln".into(),
        };
        send("127.0.0.1", port, &envelope).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), rx)
        .await
        .unwrap()
        .unwrap();
        assert_eq!(received.from, "alice");

        shutdown.notify_one();
        let _ = listen_task.await;
    }
}
