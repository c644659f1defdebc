//! Process entry point: wires the Identity & Friend Store, Directory
//! Client, Delivery Pipeline, Peer Transport listener, Local Control Plane,
//! Event Bus, and Scheduler into one running node.

mod api;
mod config;
mod run;
mod scheduler;
mod telemetry;
mod ws;

use std::net::TcpListener as StdTcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use embercore::Node;
use emberdirectory::DirectoryClient;
use emberproto::EnvelopeHandler;
use emberstore::{Store, keys_file::load_or_create_identity};
use tokio::sync::Notify;
use tracing::{info, warn};

use config::Config;
use ws::EventBus;

/// Bounded wait for in-flight handlers to finish once shutdown begins.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config_path = std::env::args()
    .nth(1)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("embernode.json"));
    let config = Config::load(&config_path)
    .unwrap_or_else(|e| panic!("invalid configuration at {}: {e}", config_path.display()));

    let subscriber = telemetry::get_subscriber(&config.log_level);
    telemetry::init_subscriber(subscriber);

    info!(username = %config.username, peer_port = config.peer_port, "starting embernode");

    let identity = load_or_create_identity(&config.keys_path, &config.username)
    .await
    .expect("identity keys file is unreadable or corrupt");

    let store = Arc::new(
        Store::open(&config.store_path)
        .await
        .expect("local store could not be opened"),
    );

    let directory = Arc::new(
        DirectoryClient::new(config.directory_url.clone(), config.directory_api_key.clone())
        .expect("directory client could not be constructed"),
    );

    if let Err(e) = directory
    .register(
        &identity.username,
        &identity.node_id.to_string(),
        &embercrypto::encode_b64(identity.keys.encryption_public_key.as_bytes()),
        &embercrypto::encode_b64(identity.keys.signing_public_key.as_bytes()),
        None,
    )
    .await
    {
        warn!(error = %e, "initial directory registration failed, will retry via heartbeat");
    }

    let event_bus = EventBus::new();

    let node = Arc::new(Node::new(
            identity.node_id,
            identity.username.clone(),
            identity.keys,
            config.peer_port,
            store,
            directory,
            Arc::new(event_bus.clone()),
    ));

    let control_listener = StdTcpListener::bind(("127.0.0.1", config.api_port))?;
    let events_listener = StdTcpListener::bind(("127.0.0.1", config.events_port))?;

    let control_server = run::run_control_plane(control_listener, node.clone())?;
    let events_server = run::run_event_stream(events_listener, event_bus)?;
    let control_handle = control_server.handle();
    let events_handle = events_server.handle();

    let shutdown = Arc::new(Notify::new());

    let control_task = tokio::spawn(control_server);
    let events_task = tokio::spawn(events_server);
    let peer_task = tokio::spawn(emberproto::listen(
            config.peer_port,
            node.clone() as Arc<dyn EnvelopeHandler>,
            shutdown.clone(),
    ));
    let scheduler_task = tokio::spawn(scheduler::run(node, shutdown.clone()));

    tokio::signal::ctrl_c()
    .await
    .expect("failed to install ctrl-c handler");
    info!("shutdown signal received, stopping new connections");

    shutdown.notify_waiters();
    control_handle.stop(true).await;
    events_handle.stop(true).await;

    let drain = async {
        let _ = tokio::join!(peer_task, scheduler_task, control_task, events_task);
    };
    if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, drain).await.is_err() {
        warn!("shutdown grace period elapsed with tasks still in flight");
    }

    info!("embernode shut down");
    Ok(())
}
