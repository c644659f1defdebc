use actix::prelude::{Message, Recipient};
use embercore::Event;

/// Connect message for the [`Dispatch`](super::dispatch::Dispatch) actor.
/// The actor replies with the subscriber id the session should remember for
/// its own `Disconnect`.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct Connect {
    pub addr: Recipient<Broadcast>,
}

/// Disconnect message for the [`Dispatch`](super::dispatch::Dispatch) actor.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: usize,
}

/// A single event fanned out to every currently-open subscriber.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct Broadcast(pub Event);
