//! One complete run: setup, one task per general, broadcast, teardown.

use std::fmt;
use std::sync::Arc;

use generals_om::{
    GeneralId, Order, Report, RunStats, Session, SessionConfig, SessionOptions,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::verdict::{tally, Tally};

/// Parse a loyalty string, one letter per general: `L` loyal, `T` traitor.
pub fn parse_loyalty(s: &str) -> Result<Vec<bool>> {
    s.chars()
        .map(|c| match c.to_ascii_uppercase() {
            'L' => Ok(true),
            'T' => Ok(false),
            other => Err(Error::InvalidInput(format!(
                "loyalty letter {other:?} (expected L or T)"
            ))),
        })
        .collect()
}

/// Spawn `run_lieutenant` for every general of the session, commander included.
pub fn spawn_generals(session: &Arc<Session>) -> Vec<JoinHandle<()>> {
    (0..session.config().participants())
        .map(|id| {
            let session = Arc::clone(session);
            tokio::spawn(async move { session.run_lieutenant(GeneralId(id)).await })
        })
        .collect()
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub loyalty: Vec<bool>,
    pub reporter: GeneralId,
    pub commander: GeneralId,
    pub order: Order,
    pub options: SessionOptions,
}

impl Scenario {
    pub fn new(loyalty: Vec<bool>, reporter: GeneralId, commander: GeneralId, order: Order) -> Self {
        Self {
            loyalty,
            reporter,
            commander,
            order,
            options: SessionOptions::default(),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: GeneralId) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the scenario to completion and evaluate the reporter's output.
    ///
    /// The generals run on a dedicated current-thread runtime, whatever
    /// runtime the caller is on, so repeated runs report in the same order.
    pub async fn run(&self) -> Result<Outcome> {
        let scenario = self.clone();
        tokio::task::spawn_blocking(move || scenario.run_blocking()).await?
    }

    /// Same as [`run`](Self::run), for callers outside any runtime.
    pub fn run_blocking(&self) -> Result<Outcome> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(self.drive())
    }

    async fn drive(&self) -> Result<Outcome> {
        let config = SessionConfig::from_loyalty(&self.loyalty, self.reporter)?;
        let session = Session::with_config(config, self.options.clone());
        let tasks = spawn_generals(&session);

        if let Err(err) = session.broadcast(self.order, self.commander).await {
            warn!(error = %err, "Broadcast failed, tearing down generals");
            session.cleanup();
            for task in &tasks {
                task.abort();
            }
            return Err(err.into());
        }

        for task in tasks {
            task.await?;
        }
        let report = session.cleanup();

        let direct = if self.reporter == self.commander {
            self.order
        } else {
            session
                .policy()
                .commander_order(self.commander, self.reporter, self.order)
        };
        let tally = tally(Some(direct), &report.messages);
        debug!(reporter = %self.reporter, ?tally, "Evaluated report");

        Ok(Outcome {
            commander: self.commander,
            order: self.order,
            direct,
            decision: tally.majority(),
            tally,
            stats: session.stats(),
            report,
        })
    }
}

/// What one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub commander: GeneralId,
    pub order: Order,
    /// The order the reporter received from the commander.
    pub direct: Order,
    pub report: Report,
    pub tally: Tally,
    pub decision: Order,
    pub stats: RunStats,
}

impl Outcome {
    /// Report messages as text, sorted, for order-insensitive comparison.
    pub fn sorted_messages(&self) -> Vec<String> {
        let mut messages: Vec<String> =
            self.report.messages.iter().map(ToString::to_string).collect();
        messages.sort();
        messages
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "reporter {}: {}", self.report.reporter, self.report)?;
        write!(
            f,
            "decision {} (A {} / R {})",
            self.decision, self.tally.attack, self.tally.retreat
        )
    }
}
