//! Error types for generals-om.

use std::time::Duration;

use thiserror::Error;

/// Result type for generals-om operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// OM(m) needs strictly more than three participants per traitor.
    #[error("{participants} generals cannot tolerate {traitors} traitors (need n > 3m)")]
    NotEnoughLoyal { participants: usize, traitors: usize },

    /// The loyalty vector does not cover every participant.
    #[error("loyalty vector has {actual} entries, expected {expected}")]
    LoyaltyLength { expected: usize, actual: usize },

    /// More participants than a session supports.
    #[error("{requested} generals requested, at most {max} supported")]
    TooManyGenerals { requested: usize, max: usize },

    /// A session needs a commander and at least one lieutenant.
    #[error("{requested} generals requested, at least 2 required")]
    TooFewGenerals { requested: usize },

    /// A general id outside `[0, participants)`.
    #[error("general {id} is not part of a {participants}-general session")]
    UnknownGeneral { id: usize, participants: usize },

    /// The session has already carried an order.
    #[error("session has already broadcast an order")]
    AlreadyBroadcast,

    /// The session was cleaned up before an order was broadcast.
    #[error("session has been cleaned up")]
    Closed,

    /// Not every lieutenant reached the completion barrier in time.
    #[error("lieutenants did not finish within {0:?}")]
    Timeout(Duration),

    /// An order other than `A`/`attack` or `R`/`retreat`.
    #[error("invalid order {0:?}")]
    InvalidOrder(String),

    /// A message that does not read as `id:...:id:letter`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
