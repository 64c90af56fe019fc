//! General identities and the one-bit order they agree on.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Largest session supported. Keeps `m <= 2` and the fan-out small.
pub const MAX_GENERALS: usize = 7;

/// Identity of one participant, in `[0, participants)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneralId(pub usize);

impl GeneralId {
    /// Position of this general in per-participant tables.
    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn is_even(self) -> bool {
        self.0 % 2 == 0
    }
}

impl fmt::Display for GeneralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The decision value carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Order {
    Attack,
    Retreat,
}

impl Order {
    /// Single-letter wire form: `A` or `R`.
    pub const fn letter(self) -> char {
        match self {
            Self::Attack => 'A',
            Self::Retreat => 'R',
        }
    }

    /// The value a traitor keyed on `id` always claims:
    /// even ids say Retreat, odd ids say Attack.
    pub const fn keyed_on(id: GeneralId) -> Self {
        if id.is_even() {
            Self::Retreat
        } else {
            Self::Attack
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl TryFrom<char> for Order {
    type Error = Error;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        match letter {
            'A' => Ok(Self::Attack),
            'R' => Ok(Self::Retreat),
            other => Err(Error::InvalidOrder(other.to_string())),
        }
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "attack" | "Attack" => Ok(Self::Attack),
            "R" | "retreat" | "Retreat" => Ok(Self::Retreat),
            other => Err(Error::InvalidOrder(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_keys_the_forced_order() {
        assert_eq!(Order::keyed_on(GeneralId(0)), Order::Retreat);
        assert_eq!(Order::keyed_on(GeneralId(1)), Order::Attack);
        assert_eq!(Order::keyed_on(GeneralId(4)), Order::Retreat);
        assert_eq!(Order::keyed_on(GeneralId(5)), Order::Attack);
    }

    #[test]
    fn order_letters() {
        assert_eq!(Order::Attack.to_string(), "A");
        assert_eq!(Order::try_from('R').unwrap(), Order::Retreat);
        assert_eq!(Order::try_from('x'), Err(Error::InvalidOrder("x".into())));
        assert_eq!("attack".parse::<Order>().unwrap(), Order::Attack);
        assert!("".parse::<Order>().is_err());
    }

    #[test]
    fn rejected_orders_keep_the_whole_input() {
        assert_eq!("attackx".parse::<Order>(), Err(Error::InvalidOrder("attackx".into())));
        assert_eq!("Rx".parse::<Order>(), Err(Error::InvalidOrder("Rx".into())));
        assert_eq!(
            "attackx".parse::<Order>().unwrap_err().to_string(),
            "invalid order \"attackx\""
        );
    }
}
