//! Event Bus: a WebSocket endpoint on the loopback events port at
//! `/events`, best-effort fan-out to every connected front-end.

mod connection;
mod dispatch;
mod messages;

use actix::{Actor, Addr};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use async_trait::async_trait;
use embercore::{Event, EventSink};
use tracing::error;

use connection::EventStreamConnection;
use dispatch::Dispatch;
use messages::Broadcast;

/// `EventSink` that fans events out over the event-stream WebSocket. This
/// is the one piece of the event bus the core crate can't own, since only
/// the binary owns the loopback listener.
#[derive(Clone)]
pub struct EventBus {
    dispatch: Addr<Dispatch>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            dispatch: Dispatch::default().start(),
        }
    }

    pub fn dispatch_addr(&self) -> Addr<Dispatch> {
        self.dispatch.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: Event) {
        self.dispatch.do_send(Broadcast(event));
    }
}

/// Upgrade an HTTP connection on the loopback events port to the
/// event-stream WebSocket.
pub async fn upgrade_connection(
    req: HttpRequest,
    stream: web::Payload,
    dispatch: web::Data<Addr<Dispatch>>,
) -> impl Responder {
    let connection = EventStreamConnection::new(dispatch.get_ref().clone());
    match actix_web_actors::ws::start(connection, &req, stream) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to upgrade connection to the event-stream websocket");
            HttpResponse::InternalServerError().finish()
        }
    }
}
