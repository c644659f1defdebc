//! Owns the runtime's notion of "every N seconds" for the periodic tasks
//! whose single-iteration bodies live in `embercore::scheduler`. Each
//! task is its own cooperative loop, torn down by the same shutdown
//! `Notify` the listeners use.

use std::net::UdpSocket;
use std::sync::Arc;

use embercore::Node;
use embercore::scheduler::{
    HEARTBEAT_INTERVAL, OFFLINE_DRAIN_INTERVAL, PENDING_RETRY_INTERVAL, PRESENCE_REFRESH_INTERVAL,
    SEEN_ID_GC_INTERVAL,
};
use tokio::sync::Notify;
use tracing::warn;

/// Best-effort discovery of the address this node is reachable at, for the
/// heartbeat's `current_ip`. Falls back to `0.0.0.0` (directory-visible but
/// unreachable for direct delivery) rather than failing the heartbeat.
fn local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
    .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
    })
    .map(|addr| addr.ip().to_string())
    .unwrap_or_else(|_| "0.0.0.0".to_string())
}

/// Spawns every periodic task and returns once `shutdown` has been
/// notified and each task has observed it.
pub async fn run(node: Arc<Node>, shutdown: Arc<Notify>) {
    // Offline drain also runs once immediately, e.g. right after
    // registration.
    if let Err(e) = node.drain_offline().await {
        warn!(error = %e, "initial offline drain failed");
    }

    let heartbeat = spawn_loop(HEARTBEAT_INTERVAL, shutdown.clone(), {
            let node = node.clone();
            move || {
                let node = node.clone();
                async move { node.run_heartbeat(&local_ip()).await }
            }
    });

    let presence = spawn_loop(PRESENCE_REFRESH_INTERVAL, shutdown.clone(), {
            let node = node.clone();
            move || {
                let node = node.clone();
                async move {
                    if let Err(e) = node.refresh_presence().await {
                        warn!(error = %e, "presence refresh failed");
                    }
                }
            }
    });

    let offline_drain = spawn_loop(OFFLINE_DRAIN_INTERVAL, shutdown.clone(), {
            let node = node.clone();
            move || {
                let node = node.clone();
                async move {
                    if let Err(e) = node.drain_offline().await {
                        warn!(error = %e, "offline drain failed");
                    }
                }
            }
    });

    let pending_retry = spawn_loop(PENDING_RETRY_INTERVAL, shutdown.clone(), {
            let node = node.clone();
            move || {
                let node = node.clone();
                async move {
                    if let Err(e) = node.run_pending_retry().await {
                        warn!(error = %e, "pending retry failed");
                    }
                }
            }
    });

    let seen_id_gc = spawn_loop(SEEN_ID_GC_INTERVAL, shutdown.clone(), {
            let node = node.clone();
            move || {
                let node = node.clone();
                async move {
                    if let Err(e) = node.run_seen_id_gc().await {
                        warn!(error = %e, "seen-id gc failed");
                    }
                }
            }
    });

    let _ = tokio::join!(
        heartbeat,
        presence,
        offline_drain,
        pending_retry,
        seen_id_gc
    );
}

fn spawn_loop<F, Fut>(
    interval: std::time::Duration,
    shutdown: Arc<Notify>,
    mut tick: F,
) -> tokio::task::JoinHandle<()>
where
F: FnMut() -> Fut + Send + 'static,
Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick().await,
                    _ = shutdown.notified() => return,
                }
            }
    })
}
