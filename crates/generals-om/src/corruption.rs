//! How traitors lie.
//!
//! Traitors are predictable on purpose: the value they claim depends only on
//! an id's parity, never on the value they actually hold.
//!
//! - A treacherous **commander** keys on the *receiver*: even lieutenants are
//!   told Retreat, odd lieutenants Attack.
//! - A treacherous **relayer** keys on *itself*: an even traitor always
//!   relays Retreat, an odd traitor always relays Attack.

use std::collections::BTreeSet;

use crate::general::{GeneralId, Order};
use crate::message::Message;

/// Pure pass-through/corrupt decisions for one session's traitor set.
#[derive(Debug, Clone, Default)]
pub struct CorruptionPolicy {
    traitors: BTreeSet<GeneralId>,
}

impl CorruptionPolicy {
    pub fn new(traitors: impl IntoIterator<Item = GeneralId>) -> Self {
        Self {
            traitors: traitors.into_iter().collect(),
        }
    }

    pub fn is_traitor(&self, id: GeneralId) -> bool {
        self.traitors.contains(&id)
    }

    /// The order `commander` seeds into `destination` when it meant `intended`.
    pub fn commander_order(
        &self,
        commander: GeneralId,
        destination: GeneralId,
        intended: Order,
    ) -> Order {
        if self.is_traitor(commander) {
            Order::keyed_on(destination)
        } else {
            intended
        }
    }

    /// The order `relayer` passes on when it holds `carried`.
    pub fn relay(&self, relayer: GeneralId, carried: Order) -> Order {
        if self.is_traitor(relayer) {
            Order::keyed_on(relayer)
        } else {
            carried
        }
    }

    /// Apply [`relay`](Self::relay) to a message's value in place.
    pub fn apply(&self, relayer: GeneralId, message: &mut Message) {
        let order = self.relay(relayer, message.order());
        message.set_order(order);
    }
}
