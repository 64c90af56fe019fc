//! Relayed messages: a path of generals terminated by an order.
//!
//! The path grows at the front. A message `2:1:0:A` was seeded by the
//! commander `0`, then relayed by `1`, then by `2`, and carries `Attack`.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::general::{GeneralId, Order};

/// An order plus the generals it passed through, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    path: Vec<GeneralId>,
    order: Order,
}

impl Message {
    /// The commander's initial message to one lieutenant.
    pub fn seed(commander: GeneralId, order: Order) -> Self {
        Self {
            path: vec![commander],
            order,
        }
    }

    /// A copy of this message with `relayer` prepended to the path.
    #[must_use]
    pub fn relayed_by(&self, relayer: GeneralId) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.push(relayer);
        path.extend_from_slice(&self.path);
        Self {
            path,
            order: self.order,
        }
    }

    pub fn path(&self) -> &[GeneralId] {
        &self.path
    }

    /// Leftmost id: the general that relayed this copy last.
    pub fn head(&self) -> GeneralId {
        self.path[0]
    }

    /// Rightmost id: the general that seeded the message.
    pub fn origin(&self) -> GeneralId {
        self.path[self.path.len() - 1]
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Overwrite the decision value. The path never changes.
    pub fn set_order(&mut self, order: Order) {
        self.order = order;
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in &self.path {
            write!(f, "{id}:")?;
        }
        write!(f, "{}", self.order)
    }
}

impl FromStr for Message {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMessage(s.to_string());

        let (path, letter) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let mut chars = letter.chars();
        let order = match (chars.next(), chars.next()) {
            (Some(c), None) => Order::try_from(c)?,
            _ => return Err(invalid()),
        };

        let path = path
            .split(':')
            .map(|part| part.parse::<usize>().map(GeneralId).map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { path, order })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_and_relay_render_like_the_wire_form() {
        let seed = Message::seed(GeneralId(0), Order::Attack);
        assert_eq!(seed.to_string(), "0:A");

        let relayed = seed.relayed_by(GeneralId(1)).relayed_by(GeneralId(2));
        assert_eq!(relayed.to_string(), "2:1:0:A");
        assert_eq!(relayed.head(), GeneralId(2));
        assert_eq!(relayed.origin(), GeneralId(0));
        assert_eq!(relayed.path().len(), 3);
    }

    #[test]
    fn relaying_leaves_the_original_untouched() {
        let seed = Message::seed(GeneralId(3), Order::Retreat);
        let mut copy = seed.relayed_by(GeneralId(1));
        copy.set_order(Order::Attack);

        assert_eq!(seed.to_string(), "3:R");
        assert_eq!(copy.to_string(), "1:3:A");
    }

    #[test]
    fn parse_accepts_rendered_messages() {
        let msg: Message = "2:1:0:R".parse().unwrap();
        assert_eq!(msg.path(), &[GeneralId(2), GeneralId(1), GeneralId(0)]);
        assert_eq!(msg.order(), Order::Retreat);
    }

    #[test]
    fn parse_rejects_malformed_messages() {
        assert!("A".parse::<Message>().is_err());
        assert!(":A".parse::<Message>().is_err());
        assert!("1:2:AR".parse::<Message>().is_err());
        assert!("1:x:A".parse::<Message>().is_err());
        assert_eq!("1:0:Q".parse::<Message>(), Err(Error::InvalidOrder("Q".into())));
    }
}
