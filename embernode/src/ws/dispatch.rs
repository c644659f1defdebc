use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use actix::{Actor, Context, Handler};

use super::messages::{Broadcast, Connect, Disconnect};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Dispatch for all event-stream subscribers. Keeps the subscriber
/// set and fans a single event out to every one of them; a send failure
/// drops only the offending subscriber.
#[derive(Default)]
pub struct Dispatch {
    sessions: HashMap<usize, actix::Recipient<Broadcast>>,
}

impl Actor for Dispatch {
    type Context = Context<Self>;
}

impl Handler<Connect> for Dispatch {
    type Result = usize;

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) -> Self::Result {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(id, msg.addr);
        id
    }
}

impl Handler<Disconnect> for Dispatch {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        self.sessions.remove(&msg.id);
    }
}

impl Handler<Broadcast> for Dispatch {
    type Result = ();

    fn handle(&mut self, msg: Broadcast, _: &mut Context<Self>) {
        // `do_send` is fire-and-forget; a subscriber whose mailbox is gone
        // is cleaned up via its own `Disconnect` on actor stop, not detected
        // here. A dead actor simply never delivers the event.
        for recipient in self.sessions.values() {
            recipient.do_send(msg.clone());
        }
    }
}
