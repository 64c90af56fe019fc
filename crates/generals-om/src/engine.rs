//! The dissemination engine: OM(m)'s recursive relay step.
//!
//! `forward(depth, message, destination)` hands `message` to `destination`
//! at `depth` rounds before the end:
//!
//! 1. The copy is recorded in the channel matrix at `(depth, destination)`.
//! 2. At the terminal depth (`1`, the OM(0) step) nothing is relayed. If
//!    `destination` is the reporter, the copy is re-checked against its path
//!    head (a treacherous last relayer forces its parity value) and appended
//!    to the reporter log.
//! 3. Otherwise `destination` relays to every lieutenant except itself,
//!    prepending its own id and passing on the value it holds, which a
//!    treacherous `destination` replaces with its parity value.
//!
//! The whole descent runs synchronously inside the calling task.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::trace;

use crate::channels::ChannelMatrix;
use crate::config::SessionConfig;
use crate::corruption::CorruptionPolicy;
use crate::general::GeneralId;
use crate::message::Message;

/// Messages the reporter received at the terminal depth, in arrival order.
#[derive(Debug, Default)]
pub struct ReporterLog {
    entries: Mutex<Vec<Message>>,
}

impl ReporterLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append under the log's lock so concurrent deliveries never interleave.
    pub fn append(&self, message: Message) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(message);
        entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// The reporter's collected output, handed to whoever evaluates the run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    pub reporter: GeneralId,
    pub messages: Vec<Message>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Space-separated, in arrival order: `1:0:A 3:0:A`.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}

/// Counters shared by every engine of one session.
#[derive(Debug, Default)]
pub struct ForwardStats {
    forwards: AtomicUsize,
    deliveries: AtomicUsize,
}

impl ForwardStats {
    pub fn snapshot(&self) -> RunStats {
        RunStats {
            forwards: self.forwards.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStats {
    /// `forward` calls at every depth.
    pub forwards: usize,
    /// Copies appended to the reporter log.
    pub deliveries: usize,
}

/// One lieutenant's view of the shared session state while it disseminates.
pub struct Disseminator<'a> {
    config: &'a SessionConfig,
    policy: &'a CorruptionPolicy,
    matrix: &'a ChannelMatrix,
    log: &'a ReporterLog,
    stats: &'a ForwardStats,
    commander: GeneralId,
}

impl<'a> Disseminator<'a> {
    pub fn new(
        config: &'a SessionConfig,
        policy: &'a CorruptionPolicy,
        matrix: &'a ChannelMatrix,
        log: &'a ReporterLog,
        stats: &'a ForwardStats,
        commander: GeneralId,
    ) -> Self {
        Self {
            config,
            policy,
            matrix,
            log,
            stats,
            commander,
        }
    }

    /// Hand `message` to `destination` with `depth` rounds remaining.
    pub fn forward(&self, depth: usize, message: Message, destination: GeneralId) {
        trace!(depth, %message, %destination, "forward");
        self.stats.forwards.fetch_add(1, Ordering::Relaxed);

        self.matrix.post(depth, destination, message.clone());

        if depth <= 1 {
            if destination == self.config.reporter() {
                let mut message = message;
                self.policy.apply(message.head(), &mut message);
                self.log.append(message);
                self.stats.deliveries.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }

        let relayed = self.policy.relay(destination, message.order());
        for next in self.config.lieutenants(self.commander) {
            if next == destination {
                continue;
            }
            let mut copy = message.relayed_by(destination);
            copy.set_order(relayed);
            self.forward(depth - 1, copy, next);
        }
    }
}
