//! The periodic status poll.

use super::events::EventDispatcher;
use super::MonitorState;
use crate::cancel::CancellationToken;
use crate::matching::MatchingEngine;
use crate::models::GameStatusChange;
use crate::snapshot::ProcessSnapshotProvider;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another cycle was already running; this one was dropped.
    Skipped,
    /// Nothing is tracked.
    Idle,
    /// The cycle ran; these transitions were dispatched.
    Completed(Vec<GameStatusChange>),
    /// The cycle panicked and was abandoned.
    Failed,
}

impl PollOutcome {
    /// Transitions detected by this cycle, if it ran.
    pub fn changes(&self) -> &[GameStatusChange] {
        match self {
            PollOutcome::Completed(changes) => changes,
            _ => &[],
        }
    }
}

/// Clears the in-progress flag however the cycle ends.
struct PollGuard<'a>(&'a AtomicBool);

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Snapshot, match, diff, dispatch. At most one cycle runs at a time.
pub struct StatusPoller {
    state: Arc<MonitorState>,
    engine: MatchingEngine,
    provider: Arc<dyn ProcessSnapshotProvider>,
    dispatcher: Arc<dyn EventDispatcher>,
    polling: AtomicBool,
}

impl StatusPoller {
    pub(crate) fn new(
        state: Arc<MonitorState>,
        engine: MatchingEngine,
        provider: Arc<dyn ProcessSnapshotProvider>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            state,
            engine,
            provider,
            dispatcher,
            polling: AtomicBool::new(false),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }

    /// Run one cycle on the calling thread.
    ///
    /// Overlapping calls are dropped, never queued.
    pub fn poll_once(&self) -> PollOutcome {
        if self.polling.swap(true, Ordering::AcqRel) {
            trace!("Poll cycle already in progress, skipping");
            return PollOutcome::Skipped;
        }
        let _guard = PollGuard(&self.polling);

        match catch_unwind(AssertUnwindSafe(|| self.cycle())) {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Poll cycle panicked; continuing with the next tick");
                PollOutcome::Failed
            }
        }
    }

    fn cycle(&self) -> PollOutcome {
        let targets = self.state.registry.snapshot();
        if targets.is_empty() {
            return PollOutcome::Idle;
        }

        let processes = self.provider.snapshot();
        let observed: Vec<(i64, bool)> = targets
            .iter()
            .map(|target| (target.id, self.engine.is_running(target, &processes)))
            .collect();

        let changes: Vec<GameStatusChange> = {
            let mut status = self.state.lock_status();
            observed
                .into_iter()
                // Targets replaced while we were matching get no say.
                .filter(|(id, _)| self.state.registry.contains(*id))
                .filter_map(|(id, running)| status.observe(id, running))
                .collect()
        };

        debug!(
            "Poll cycle: {} targets, {} processes, {} transitions",
            targets.len(),
            processes.len(),
            changes.len()
        );

        if !changes.is_empty() {
            for change in &changes {
                debug!(
                    "Game {} is now {}",
                    change.game_id,
                    if change.is_running { "running" } else { "stopped" }
                );
            }
            let subscribers = Arc::clone(&self.state.subscribers);
            let batch = changes.clone();
            self.dispatcher
                .dispatch(Box::new(move || subscribers.notify(&batch)));
        }

        PollOutcome::Completed(changes)
    }

    /// Poll every `interval` until `token` is cancelled.
    ///
    /// The first cycle runs one interval after start. Cycles run on the
    /// blocking pool; a tick that arrives while one is still running is
    /// skipped.
    pub(crate) async fn run(self: Arc<Self>, interval: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let poller = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || poller.poll_once()).await {
                Ok(outcome) => trace!("Poll tick finished: {:?}", outcome),
                Err(e) => warn!("Poll task failed: {}", e),
            }
        }

        debug!("Status poller stopped");
    }
}
