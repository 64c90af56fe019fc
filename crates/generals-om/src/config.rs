//! Session parameters, validated before anything is allocated.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::general::{GeneralId, MAX_GENERALS};

/// Validated run parameters. Immutable for the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    participants: usize,
    traitors: BTreeSet<GeneralId>,
    reporter: GeneralId,
}

impl SessionConfig {
    /// Validate `participants` generals with the given loyalty and reporter.
    ///
    /// The traitor count `m` is the number of `false` entries in `loyal`.
    /// Rejects the session unless `participants > 3m`.
    pub fn new(participants: usize, loyal: &[bool], reporter: GeneralId) -> Result<Self> {
        if loyal.len() != participants {
            return Err(Error::LoyaltyLength {
                expected: participants,
                actual: loyal.len(),
            });
        }
        Self::from_loyalty(loyal, reporter)
    }

    /// Same as [`new`](Self::new), taking the participant count from `loyal`.
    pub fn from_loyalty(loyal: &[bool], reporter: GeneralId) -> Result<Self> {
        let participants = loyal.len();
        if participants > MAX_GENERALS {
            return Err(Error::TooManyGenerals {
                requested: participants,
                max: MAX_GENERALS,
            });
        }
        if participants < 2 {
            return Err(Error::TooFewGenerals {
                requested: participants,
            });
        }

        let traitors: BTreeSet<GeneralId> = loyal
            .iter()
            .enumerate()
            .filter(|(_, is_loyal)| !**is_loyal)
            .map(|(id, _)| GeneralId(id))
            .collect();

        if participants <= 3 * traitors.len() {
            return Err(Error::NotEnoughLoyal {
                participants,
                traitors: traitors.len(),
            });
        }

        let config = Self {
            participants,
            traitors,
            reporter,
        };
        config.check(reporter)?;
        Ok(config)
    }

    pub fn participants(&self) -> usize {
        self.participants
    }

    /// `m`: the number of traitors, and the top recursion depth.
    pub fn traitor_count(&self) -> usize {
        self.traitors.len()
    }

    pub fn traitors(&self) -> &BTreeSet<GeneralId> {
        &self.traitors
    }

    pub fn is_traitor(&self, id: GeneralId) -> bool {
        self.traitors.contains(&id)
    }

    pub fn reporter(&self) -> GeneralId {
        self.reporter
    }

    pub fn contains(&self, id: GeneralId) -> bool {
        id.index() < self.participants
    }

    /// Ensure `id` names a participant of this session.
    pub fn check(&self, id: GeneralId) -> Result<GeneralId> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(Error::UnknownGeneral {
                id: id.index(),
                participants: self.participants,
            })
        }
    }

    /// Every general except `commander`, in id order.
    pub fn lieutenants(&self, commander: GeneralId) -> impl Iterator<Item = GeneralId> {
        (0..self.participants)
            .map(GeneralId)
            .filter(move |&id| id != commander)
    }
}

/// Number of messages a lieutenant reporter collects at the terminal depth.
///
/// Every hop fans out to the `n - 2` lieutenants other than the holder,
/// so `m` hops deliver `(n - 2)^m` copies. OM(0) delivers none.
pub fn expected_report_len(participants: usize, traitors: usize) -> usize {
    if traitors == 0 || participants < 2 {
        return 0;
    }
    (participants - 2).pow(traitors as u32)
}

/// Runtime knobs that do not change protocol semantics.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long `broadcast` waits for every lieutenant to finish.
    /// `None` waits forever.
    pub completion_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            completion_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SessionOptions {
    /// Set the completion timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = Some(timeout);
        self
    }

    /// Disable the completion timeout.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.completion_timeout = None;
        self
    }
}
