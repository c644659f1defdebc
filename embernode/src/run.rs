//! Wires `embercore::Node` into two loopback-bound actix-web servers: the
//! Local Control Plane and the Event Bus's WebSocket upgrade.
//! Kept as two listeners, rather than one app with two route groups, so a
//! front-end can be handed the REST port without also being handed the
//! event stream.

use std::net::TcpListener;
use std::sync::Arc;

use actix::Addr;
use actix_web::{App, HttpServer, dev::Server, web::{Data, JsonConfig}};
use embercore::Node;
use tracing_actix_web::TracingLogger;

use crate::api;
use crate::ws::{self, EventBus};

/// Bodies over this size are rejected before parsing (its 1 MiB limit).
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn run_control_plane(listener: TcpListener, node: Arc<Node>) -> Result<Server, std::io::Error> {
    let node_data = Data::new(node);
    let server = HttpServer::new(move || {
            App::new()
            .wrap(TracingLogger::default())
            .app_data(node_data.clone())
            .app_data(JsonConfig::default().limit(MAX_BODY_BYTES))
            .configure(api::configure)
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub fn run_event_stream(
    listener: TcpListener,
    event_bus: EventBus,
) -> Result<Server, std::io::Error> {
    let dispatch_data: Data<Addr<_>> = Data::new(event_bus.dispatch_addr());
    let server = HttpServer::new(move || {
            App::new()
            .wrap(TracingLogger::default())
            .app_data(dispatch_data.clone())
            .route("/events", actix_web::web::get().to(ws::upgrade_connection))
    })
    .listen(listener)?
    .run();
    Ok(server)
}
