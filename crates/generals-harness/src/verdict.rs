//! Majority evaluation of a reporter's output.
//!
//! The reporter's vote is the order it heard directly from the commander plus
//! every copy it collected at the terminal depth. With no strict majority
//! the reporter falls back to Retreat.

use generals_om::{Message, Order};
use serde::{Deserialize, Serialize};

/// Votes for each order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub attack: usize,
    pub retreat: usize,
}

impl Tally {
    pub fn add(&mut self, order: Order) {
        match order {
            Order::Attack => self.attack += 1,
            Order::Retreat => self.retreat += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.attack + self.retreat
    }

    /// Strict majority, Retreat on a tie.
    pub fn majority(&self) -> Order {
        if self.attack > self.retreat {
            Order::Attack
        } else {
            Order::Retreat
        }
    }
}

/// Tally the direct order and the collected messages.
pub fn tally<'a>(direct: Option<Order>, messages: impl IntoIterator<Item = &'a Message>) -> Tally {
    let mut tally = Tally::default();
    if let Some(order) = direct {
        tally.add(order);
    }
    for message in messages {
        tally.add(message.order());
    }
    tally
}

/// The reporter's decision.
pub fn decide<'a>(direct: Option<Order>, messages: impl IntoIterator<Item = &'a Message>) -> Order {
    tally(direct, messages).majority()
}
