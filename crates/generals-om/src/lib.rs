//! Oral Messages OM(m) for the Byzantine Generals Problem
//!
//! A commander broadcasts a one-bit order (Attack/Retreat) to `n - 1`
//! lieutenants. Up to `m` participants are traitors; as long as `n > 3m`,
//! every loyal lieutenant reaches the same decision, and that decision is the
//! commander's order whenever the commander is loyal.
//!
//! # What this crate does
//!
//! This is the dissemination core only:
//!
//! - **[`SessionConfig`]**: validated participant count, traitors, reporter
//! - **[`CorruptionPolicy`]**: the deterministic way traitors lie
//! - **[`ChannelMatrix`]**: bounded channels per (recursion depth, destination)
//! - **[`Disseminator`]**: the recursive forwarding step of OM(m)
//! - **[`CompletionBarrier`]**: a chain of one-shot gates releasing the initiator
//! - **[`Session`]**: setup, broadcast, per-lieutenant task body, cleanup
//!
//! The final majority vote is not computed here. The designated reporter's
//! terminal-depth messages are collected, in arrival order, into a
//! [`Report`] for an external evaluator.
//!
//! # Message form
//!
//! ```text
//! 2:1:0:A    seeded by 0, relayed by 1, then by 2, carrying Attack
//! ```

mod barrier;
mod channels;
mod config;
mod corruption;
mod engine;
mod error;
mod general;
mod message;
mod session;

pub use barrier::CompletionBarrier;
pub use channels::ChannelMatrix;
pub use config::{expected_report_len, SessionConfig, SessionOptions};
pub use corruption::CorruptionPolicy;
pub use engine::{Disseminator, ForwardStats, Report, ReporterLog, RunStats};
pub use error::{Error, Result};
pub use general::{GeneralId, Order, MAX_GENERALS};
pub use message::Message;
pub use session::{LieutenantPhase, Session};
