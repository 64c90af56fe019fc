//! One run of OM(m): setup, broadcast, lieutenant tasks, cleanup.
//!
//! A [`Session`] owns every piece of shared state for a run. Tasks hold it
//! through an `Arc`; nothing is process-global.
//!
//! ```rust,ignore
//! let session = Session::setup(4, &[true, true, true, false], GeneralId(1))?;
//! for id in 0..4 {
//!     let session = Arc::clone(&session);
//!     tokio::spawn(async move { session.run_lieutenant(GeneralId(id)).await });
//! }
//! session.broadcast(Order::Attack, GeneralId(0)).await?;
//! let report = session.cleanup();
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::barrier::CompletionBarrier;
use crate::channels::ChannelMatrix;
use crate::config::{SessionConfig, SessionOptions};
use crate::corruption::CorruptionPolicy;
use crate::engine::{Disseminator, ForwardStats, Report, ReporterLog, RunStats};
use crate::error::{Error, Result};
use crate::general::{GeneralId, Order};
use crate::message::Message;

/// Where a lieutenant task is in its run. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LieutenantPhase {
    WaitingForSeed,
    Disseminating,
    AwaitingBarrier,
    Done,
}

impl fmt::Display for LieutenantPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForSeed => write!(f, "WaitingForSeed"),
            Self::Disseminating => write!(f, "Disseminating"),
            Self::AwaitingBarrier => write!(f, "AwaitingBarrier"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Shared state of one OM(m) run.
pub struct Session {
    config: SessionConfig,
    options: SessionOptions,
    policy: CorruptionPolicy,
    matrix: ChannelMatrix,
    barrier: CompletionBarrier,
    log: ReporterLog,
    stats: ForwardStats,
    phases: Mutex<Vec<LieutenantPhase>>,
    /// Announces the commander. Dropped by `cleanup`, which wakes every
    /// task still waiting for a broadcast.
    announce: Mutex<Option<watch::Sender<Option<GeneralId>>>>,
    briefing: watch::Receiver<Option<GeneralId>>,
}

impl Session {
    /// Validate the parameters and allocate the session.
    ///
    /// Nothing is allocated when validation fails.
    pub fn setup(participants: usize, loyal: &[bool], reporter: GeneralId) -> Result<Arc<Self>> {
        let config = SessionConfig::new(participants, loyal, reporter)?;
        Ok(Self::with_config(config, SessionOptions::default()))
    }

    pub fn with_config(config: SessionConfig, options: SessionOptions) -> Arc<Self> {
        let participants = config.participants();
        let (announce, briefing) = watch::channel(None);

        debug!(
            participants,
            traitors = config.traitor_count(),
            reporter = %config.reporter(),
            timeout = ?options.completion_timeout,
            "Session setup"
        );

        Arc::new(Self {
            policy: CorruptionPolicy::new(config.traitors().iter().copied()),
            matrix: ChannelMatrix::new(&config),
            barrier: CompletionBarrier::new(participants - 1),
            log: ReporterLog::new(),
            stats: ForwardStats::default(),
            phases: Mutex::new(vec![LieutenantPhase::WaitingForSeed; participants]),
            announce: Mutex::new(Some(announce)),
            briefing,
            config,
            options,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn policy(&self) -> &CorruptionPolicy {
        &self.policy
    }

    /// The commander named by `broadcast`, once it has been called.
    pub fn commander(&self) -> Option<GeneralId> {
        *self.briefing.borrow()
    }

    /// Seed every lieutenant with `order` and wait for all of them to finish.
    ///
    /// A treacherous commander seeds even lieutenants with Retreat and odd
    /// ones with Attack, whatever `order` says.
    pub async fn broadcast(&self, order: Order, commander: GeneralId) -> Result<()> {
        let commander = self.config.check(commander)?;

        let mut first = false;
        {
            let announce = self.announce.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(announce) = announce.as_ref() else {
                return Err(Error::Closed);
            };
            announce.send_if_modified(|current| {
                if current.is_none() {
                    *current = Some(commander);
                    first = true;
                }
                first
            });
        }
        if !first {
            return Err(Error::AlreadyBroadcast);
        }

        debug!(%commander, %order, treacherous = self.policy.is_traitor(commander), "Broadcasting order");
        for lieutenant in self.config.lieutenants(commander) {
            let seeded = self.policy.commander_order(commander, lieutenant, order);
            self.matrix.post(0, lieutenant, Message::seed(commander, seeded));
        }

        match self.options.completion_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, self.barrier.wait()).await.is_err() {
                    warn!(
                        timeout = ?limit,
                        expected = self.barrier.expected(),
                        pending = ?self.pending(),
                        "Lieutenants did not finish"
                    );
                    return Err(Error::Timeout(limit));
                }
            }
            None => {
                self.barrier.wait().await;
            }
        }

        info!(
            %commander,
            %order,
            reported = self.log.len(),
            "Broadcast complete"
        );
        Ok(())
    }

    /// Body of the task for general `id`.
    ///
    /// Waits until the commander is known (the commander's own task ends
    /// there), then for its seed, relays it to every other lieutenant and
    /// registers at the completion barrier. Returns early if the session is
    /// cleaned up at any of those waits.
    pub async fn run_lieutenant(&self, id: GeneralId) {
        if !self.config.contains(id) {
            warn!(%id, participants = self.config.participants(), "No such general");
            return;
        }

        let mut briefing = self.briefing.clone();
        let commander = match briefing.wait_for(Option::is_some).await {
            Ok(commander) => *commander,
            Err(_) => None,
        };
        let Some(commander) = commander else {
            return;
        };
        if id == commander {
            self.set_phase(id, LieutenantPhase::Done);
            return;
        }

        let Some(seed) = self.matrix.take_seed(id).await else {
            warn!(%id, "Seed channel closed before an order arrived");
            return;
        };
        if seed.origin() != commander {
            warn!(%id, %seed, %commander, "Seed did not come from the commander");
            return;
        }
        self.set_phase(id, LieutenantPhase::Disseminating);

        let own = seed.relayed_by(id);
        let top = self.config.traitor_count();
        debug!(%id, seed = %seed, depth = top, "Disseminating");
        if top > 0 {
            let engine = self.disseminator(commander);
            for next in self.config.lieutenants(commander) {
                if next != id {
                    engine.forward(top, own.clone(), next);
                }
            }
        }

        self.set_phase(id, LieutenantPhase::AwaitingBarrier);
        if self.barrier.arrive().await.is_some() {
            self.set_phase(id, LieutenantPhase::Done);
        }
    }

    /// Snapshot of the reporter's output so far.
    pub fn report(&self) -> Report {
        Report {
            reporter: self.config.reporter(),
            messages: self.log.snapshot(),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats.snapshot()
    }

    pub fn phase(&self, id: GeneralId) -> Option<LieutenantPhase> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.index())
            .copied()
    }

    /// Lieutenants that have not finished.
    pub fn pending(&self) -> Vec<GeneralId> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .enumerate()
            .filter(|(_, phase)| **phase != LieutenantPhase::Done)
            .map(|(id, _)| GeneralId(id))
            .collect()
    }

    /// Drain the audit trail of one channel cell.
    pub fn audit(&self, depth: usize, destination: GeneralId) -> Vec<Message> {
        self.matrix.drain(depth, destination)
    }

    /// Release channels and gates and hand back the reporter's output.
    ///
    /// Every task still inside `run_lieutenant` returns promptly, whether it
    /// waits for the broadcast, its seed or the barrier. Later broadcasts
    /// fail with [`Error::Closed`].
    pub fn cleanup(&self) -> Report {
        *self.announce.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.barrier.close();
        self.matrix.close();
        let report = self.report();
        debug!(reporter = %report.reporter, messages = report.len(), "Session cleanup");
        report
    }

    fn disseminator(&self, commander: GeneralId) -> Disseminator<'_> {
        Disseminator::new(
            &self.config,
            &self.policy,
            &self.matrix,
            &self.log,
            &self.stats,
            commander,
        )
    }

    fn set_phase(&self, id: GeneralId, phase: LieutenantPhase) {
        let mut phases = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = phases.get_mut(id.index()) {
            *current = (*current).max(phase);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("commander", &self.commander())
            .field("matrix", &self.matrix)
            .field("reported", &self.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinHandle;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn spawn_all(session: &Arc<Session>) -> Vec<JoinHandle<()>> {
        (0..session.config().participants())
            .map(|id| {
                let session = Arc::clone(session);
                tokio::spawn(async move { session.run_lieutenant(GeneralId(id)).await })
            })
            .collect()
    }

    fn rendered(report: &Report) -> Vec<String> {
        let mut messages: Vec<String> = report.messages.iter().map(ToString::to_string).collect();
        messages.sort();
        messages
    }

    #[tokio::test]
    async fn loyal_run_reports_every_relay() {
        let session = Session::setup(4, &[true, true, true, false], GeneralId(2)).unwrap();
        let tasks = spawn_all(&session);

        assert_ok!(session.broadcast(Order::Attack, GeneralId(0)).await);
        for task in tasks {
            task.await.unwrap();
        }

        let report = session.cleanup();
        assert_eq!(rendered(&report), vec!["1:0:A", "3:0:A"]);
        assert_eq!(session.stats(), RunStats { forwards: 6, deliveries: 2 });
        assert!(session.pending().is_empty());
        assert_eq!(session.phase(GeneralId(3)), Some(LieutenantPhase::Done));
    }

    #[tokio::test]
    async fn traitor_relay_is_visible_to_the_reporter() {
        let session = Session::setup(4, &[true, true, true, false], GeneralId(1)).unwrap();
        let tasks = spawn_all(&session);

        assert_ok!(session.broadcast(Order::Retreat, GeneralId(0)).await);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(rendered(&session.cleanup()), vec!["2:0:R", "3:0:A"]);
    }

    #[tokio::test]
    async fn no_traitors_means_no_relays() {
        let session = Session::setup(3, &[true; 3], GeneralId(1)).unwrap();
        let tasks = spawn_all(&session);

        assert_ok!(session.broadcast(Order::Attack, GeneralId(0)).await);
        for task in tasks {
            task.await.unwrap();
        }

        assert!(session.cleanup().is_empty());
        assert_eq!(session.stats().forwards, 0);
    }

    #[tokio::test]
    async fn audit_trail_keeps_every_hop() {
        let loyal = [true, true, false, true, true, true, false];
        let session = Session::setup(7, &loyal, GeneralId(1)).unwrap();
        let tasks = spawn_all(&session);

        assert_ok!(session.broadcast(Order::Retreat, GeneralId(0)).await);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(session.report().len(), 25);
        assert_eq!(session.audit(2, GeneralId(4)).len(), 5);
        assert_eq!(session.audit(1, GeneralId(4)).len(), 25);
        assert_eq!(session.stats(), RunStats { forwards: 180, deliveries: 25 });
    }

    #[test]
    fn rejected_setup_allocates_nothing() {
        assert_eq!(
            Session::setup(4, &[true, false, true, false], GeneralId(1)).unwrap_err(),
            Error::NotEnoughLoyal {
                participants: 4,
                traitors: 2
            }
        );
    }

    #[tokio::test]
    async fn second_broadcast_is_refused() {
        let session = Session::setup(4, &[true; 4], GeneralId(1)).unwrap();
        let tasks = spawn_all(&session);

        assert_ok!(session.broadcast(Order::Attack, GeneralId(0)).await);
        assert_eq!(
            session.broadcast(Order::Attack, GeneralId(0)).await,
            Err(Error::AlreadyBroadcast)
        );
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn unknown_commander_is_refused() {
        let session = Session::setup(4, &[true; 4], GeneralId(1)).unwrap();
        assert_err!(session.broadcast(Order::Attack, GeneralId(9)).await);
        assert_eq!(session.commander(), None);
    }

    #[tokio::test]
    async fn cleanup_without_broadcast_releases_every_task() {
        let session = Session::setup(4, &[true; 4], GeneralId(1)).unwrap();
        let tasks = spawn_all(&session);
        tokio::task::yield_now().await;

        assert_err!(session.broadcast(Order::Attack, GeneralId(9)).await);
        session.cleanup();

        for task in tasks {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .expect("task still waiting after cleanup")
                .unwrap();
        }
        assert_eq!(session.pending().len(), 4);
        assert_eq!(
            session.broadcast(Order::Attack, GeneralId(0)).await,
            Err(Error::Closed)
        );
    }

    #[tokio::test]
    async fn cleanup_releases_lieutenants_parked_on_their_seed() {
        let session = Session::setup(4, &[true; 4], GeneralId(1)).unwrap();
        let tasks = spawn_all(&session);

        // Announce a commander without seeding anyone.
        session
            .announce
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .send_replace(Some(GeneralId(0)));
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.phase(GeneralId(0)), Some(LieutenantPhase::Done));

        session.cleanup();
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .expect("lieutenant still parked on its seed")
                .unwrap();
        }
        assert_eq!(session.pending(), vec![GeneralId(1), GeneralId(2), GeneralId(3)]);
    }

    #[tokio::test]
    async fn seed_from_another_general_is_ignored() {
        let session = Session::setup(4, &[true, true, true, false], GeneralId(1)).unwrap();
        session
            .matrix
            .post(0, GeneralId(2), Message::seed(GeneralId(3), Order::Attack));
        session
            .announce
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .send_replace(Some(GeneralId(0)));

        session.run_lieutenant(GeneralId(2)).await;
        assert_eq!(session.phase(GeneralId(2)), Some(LieutenantPhase::WaitingForSeed));
        assert_eq!(session.stats().forwards, 0);
    }

    #[tokio::test]
    async fn missing_lieutenant_times_out() {
        let config = SessionConfig::from_loyalty(&[true; 4], GeneralId(1)).unwrap();
        let session = Session::with_config(
            config,
            SessionOptions::default().with_timeout(Duration::from_millis(50)),
        );

        // General 3 never runs.
        let tasks: Vec<_> = (0..3)
            .map(|id| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.run_lieutenant(GeneralId(id)).await })
            })
            .collect();

        assert_eq!(
            session.broadcast(Order::Attack, GeneralId(0)).await,
            Err(Error::Timeout(Duration::from_millis(50)))
        );
        assert_eq!(session.pending(), vec![GeneralId(1), GeneralId(2), GeneralId(3)]);

        // Closing the gates lets the stuck lieutenants finish.
        session.cleanup();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(session.phase(GeneralId(1)), Some(LieutenantPhase::AwaitingBarrier));
        assert_eq!(session.phase(GeneralId(3)), Some(LieutenantPhase::WaitingForSeed));
    }
}
