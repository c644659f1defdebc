//! Per-subscriber actor for the event-stream WebSocket: a heartbeat
//! ping/pong loop that disconnects a dead peer, and registration with the
//! `Dispatch` actor on start/stop.

use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, ContextFutureSpawner, Handler,
    Running, StreamHandler, WrapFuture, fut,
};
use actix_web_actors::ws;
use embercore::Event;
use serde::Deserialize;
use tracing::{trace, warn};

use super::dispatch::Dispatch;
use super::messages::{Broadcast, Connect, Disconnect};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-to-server events accepted over the stream. Neither has a
/// pipeline operation behind it yet; both are logged and otherwise ignored.
#[derive(Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientEvent {
    Typing { to: String, typing: bool },
    MarkRead { peer: String, msg_id: Option<String> },
}

pub struct EventStreamConnection {
    id: usize,
    heartbeat: Instant,
    dispatch: Addr<Dispatch>,
}

impl EventStreamConnection {
    pub fn new(dispatch: Addr<Dispatch>) -> Self {
        Self {
            id: 0,
            heartbeat: Instant::now(),
            dispatch,
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
                if Instant::now().duration_since(act.heartbeat) > CLIENT_TIMEOUT {
                    trace!(subscriber = act.id, "event-stream subscriber heartbeat timed out");
                    act.dispatch.do_send(Disconnect { id: act.id });
                    ctx.stop();
                    return;
                }
                ctx.ping(b"embernode");
        });
    }
}

impl Actor for EventStreamConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);

        self.dispatch
        .send(Connect {
                addr: ctx.address().recipient(),
        })
        .into_actor(self)
        .then(|res, act, ctx| {
                match res {
                    Ok(id) => act.id = id,
                    Err(_) => {
                        warn!("failed to register event-stream subscriber with dispatch");
                        ctx.stop();
                    }
                }
                fut::ready(())
        })
        .wait(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.dispatch.do_send(Disconnect { id: self.id });
        Running::Stop
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for EventStreamConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let Ok(msg) = msg else {
            return;
        };
        match msg {
            ws::Message::Ping(bytes) => {
                self.heartbeat = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(_) => {
                self.heartbeat = Instant::now();
            }
            ws::Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::Typing { to, typing }) => {
                    trace!(to, typing, "client-originated typing event");
                }
                Ok(ClientEvent::MarkRead { peer, msg_id }) => {
                    trace!(peer, msg_id = ?msg_id, "client-originated mark_read event");
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed client-originated event");
                }
            },
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<Broadcast> for EventStreamConnection {
    type Result = ();

    fn handle(&mut self, msg: Broadcast, ctx: &mut Self::Context) {
        send_event(ctx, &msg.0);
    }
}

fn send_event(ctx: &mut ws::WebsocketContext<EventStreamConnection>, event: &Event) {
    match serde_json::to_string(event) {
        Ok(text) => ctx.text(text),
        Err(e) => warn!(error = %e, "failed to serialize event for the event stream"),
    }
}
