//! Background game status monitor.
//!
//! [`GameStatusMonitor`] owns the tracked set, the last observed status of
//! every tracked game and the subscriber list. A periodic task runs
//! [`StatusPoller`] cycles; [`Terminator`] and [`ExitWaiter`] serve on-demand
//! requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use gamepulse_core::{GameStatusMonitor, GameTarget, MonitorConfig};
//!
//! # async fn demo() -> gamepulse_core::Result<()> {
//! let monitor = GameStatusMonitor::new(MonitorConfig::default())?;
//! monitor.subscribe(|change| println!("{} running: {}", change.game_id, change.is_running));
//! monitor.update_tracked_games(vec![
//!     GameTarget::new(1, "Portal 2").with_executable("/games/portal2/portal2.bin"),
//! ]);
//! monitor.start()?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod exit;
pub mod poller;
pub mod registry;
pub mod status;
pub mod terminator;

pub use events::{
    ChannelDispatcher, DispatchQueue, EventDispatcher, InlineDispatcher, StatusHandler,
    StatusSubscribers, SubscriptionId,
};
pub use exit::ExitWaiter;
pub use poller::{PollOutcome, StatusPoller};
pub use registry::TargetRegistry;
pub use status::StatusTable;
pub use terminator::{PlatformKiller, ProcessKiller, Terminator};

use crate::cancel::CancellationToken;
use crate::config::MonitorConfig;
use crate::error::{GamePulseError, Result};
use crate::matching::MatchingEngine;
use crate::models::{GameStatusChange, GameTarget};
use crate::snapshot::{self, ProcessCache, ProcessSnapshotProvider};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// State shared between the facade, the poller and exit waiters.
///
/// Lock order: status before registry.
#[derive(Debug, Default)]
pub(crate) struct MonitorState {
    pub(crate) registry: TargetRegistry,
    status: Mutex<StatusTable>,
    pub(crate) subscribers: Arc<StatusSubscribers>,
}

impl MonitorState {
    pub(crate) fn lock_status(&self) -> MutexGuard<'_, StatusTable> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the tracked set and forget statuses of dropped ids.
    fn replace_targets(&self, targets: Vec<GameTarget>) -> (usize, usize) {
        let mut status = self.lock_status();
        let tracked = targets.len();
        let removed = self.registry.replace(targets);
        for id in &removed {
            status.remove(*id);
        }
        (tracked, removed.len())
    }
}

struct PollerTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Watches a set of games and reports when they start and stop.
pub struct GameStatusMonitor {
    config: MonitorConfig,
    state: Arc<MonitorState>,
    poller: Arc<StatusPoller>,
    terminator: Terminator,
    task: Mutex<Option<PollerTask>>,
}

impl GameStatusMonitor {
    /// Monitor using the platform's process table and inline dispatch.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let cache = Arc::new(ProcessCache::from_config(&config));
        let provider = snapshot::system_provider(&config, cache);
        Self::with_parts(
            config,
            MatchingEngine::for_current_platform(),
            provider,
            Arc::new(InlineDispatcher),
        )
    }

    /// Monitor assembled from explicit parts.
    pub fn with_parts(
        config: MonitorConfig,
        engine: MatchingEngine,
        provider: Arc<dyn ProcessSnapshotProvider>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(MonitorState::default());
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&state),
            engine,
            Arc::clone(&provider),
            dispatcher,
        ));

        Ok(Self {
            config,
            state,
            poller,
            terminator: Terminator::new(engine, provider),
            task: Mutex::new(None),
        })
    }

    /// Replace how [`stop_game`](Self::stop_game) kills processes.
    pub fn with_killer(mut self, killer: Arc<dyn ProcessKiller>) -> Self {
        self.terminator.set_killer(killer);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Replace the tracked set.
    ///
    /// Ids missing from `targets` stop being polled and lose their last
    /// status; if they come back they start out unknown.
    pub fn update_tracked_games<I>(&self, targets: I)
    where
        I: IntoIterator<Item = GameTarget>,
    {
        let (tracked, removed) = self.state.replace_targets(targets.into_iter().collect());
        info!("Tracking {} games ({} removed)", tracked, removed);
    }

    /// Currently tracked targets, ordered by id.
    pub fn tracked_games(&self) -> Vec<GameTarget> {
        self.state.registry.snapshot()
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<PollerTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start periodic polling on the current tokio runtime.
    ///
    /// Calling it again while polling is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| GamePulseError::Runtime {
                message: format!("game status monitor needs a tokio runtime: {}", e),
            })?;

        let token = CancellationToken::new();
        let handle = runtime.spawn(
            Arc::clone(&self.poller).run(self.config.poll_interval, token.clone()),
        );
        *task = Some(PollerTask { token, handle });

        info!(
            "Game status monitor started (interval {:?})",
            self.config.poll_interval
        );
        Ok(())
    }

    /// Stop periodic polling. A cycle already running finishes on its own.
    pub fn stop(&self) {
        if let Some(task) = self.lock_task().take() {
            task.token.cancel();
            info!("Game status monitor stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Run one poll cycle on the calling thread.
    ///
    /// This performs blocking OS reads; from async code prefer
    /// `spawn_blocking`. Returns [`PollOutcome::Skipped`] if a cycle is
    /// already running.
    pub fn poll_now(&self) -> PollOutcome {
        self.poller.poll_once()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(GameStatusChange) + Send + Sync + 'static,
    {
        self.state.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.subscribers.unsubscribe(id)
    }

    /// Last observed running flag, `None` when unknown or not tracked.
    pub fn last_status(&self, game_id: i64) -> Option<bool> {
        self.state.lock_status().get(game_id)
    }

    /// Kill every process matching `target`; returns how many were killed.
    pub async fn stop_game(&self, target: &GameTarget, token: &CancellationToken) -> Result<usize> {
        self.terminator.stop(target, token).await
    }

    /// Resolve once `game_id` goes from running to stopped.
    ///
    /// The wait is registered immediately, before the returned future is
    /// first polled. A game that is never tracked never resolves; see
    /// [`wait_for_exit_timeout`](Self::wait_for_exit_timeout).
    pub fn wait_for_exit(
        &self,
        game_id: i64,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        ExitWaiter::register(&self.state, game_id, token).wait()
    }

    /// [`wait_for_exit`](Self::wait_for_exit) bounded by `timeout`.
    pub fn wait_for_exit_timeout(
        &self,
        game_id: i64,
        timeout: Duration,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let waiter = ExitWaiter::register(&self.state, game_id, token);
        async move {
            match tokio::time::timeout(timeout, waiter.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Exit wait for game {} timed out after {:?}", game_id, timeout);
                    Err(GamePulseError::Timeout(timeout))
                }
            }
        }
    }

    /// [`wait_for_exit_timeout`](Self::wait_for_exit_timeout) with the
    /// configured safety-net timeout.
    pub fn wait_for_exit_bounded(
        &self,
        game_id: i64,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        self.wait_for_exit_timeout(game_id, self.config.exit_wait_timeout, token)
    }
}

impl Drop for GameStatusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for GameStatusMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStatusMonitor")
            .field("config", &self.config)
            .field("tracked", &self.state.registry.len())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcessInfo;

    fn monitor(processes: Vec<ProcessInfo>) -> GameStatusMonitor {
        GameStatusMonitor::with_parts(
            MonitorConfig::default(),
            MatchingEngine::linux(),
            Arc::new(move || processes.clone()),
            Arc::new(InlineDispatcher),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig::default().with_poll_interval(Duration::ZERO);
        let result = GameStatusMonitor::with_parts(
            config,
            MatchingEngine::linux(),
            Arc::new(Vec::<ProcessInfo>::new),
            Arc::new(InlineDispatcher),
        );
        assert!(matches!(result, Err(GamePulseError::Config { .. })));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let monitor = monitor(Vec::new());
        assert!(matches!(
            monitor.start(),
            Err(GamePulseError::Runtime { .. })
        ));
        assert!(!monitor.is_started());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let monitor = monitor(Vec::new());
        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(monitor.is_started());

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_started());
    }

    #[tokio::test]
    async fn test_with_killer_replaces_platform_kill() {
        let killed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&killed);
        let monitor = monitor(vec![
            ProcessInfo::new(41, "game").with_exe("/games/a/game")
        ])
        .with_killer(Arc::new(move |pid: u32| -> Result<bool> {
            sink.lock().unwrap().push(pid);
            Ok(true)
        }));

        let target = GameTarget::new(1, "A").with_executable("/games/a/game");
        let stopped = monitor
            .stop_game(&target, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stopped, 1);
        assert_eq!(*killed.lock().unwrap(), vec![41]);
    }

    #[test]
    fn test_removed_game_forgets_status() {
        let monitor = monitor(vec![
            ProcessInfo::new(1, "game").with_exe("/games/a/game")
        ]);
        monitor.update_tracked_games(vec![
            GameTarget::new(1, "A").with_executable("/games/a/game")
        ]);
        monitor.poll_now();
        assert_eq!(monitor.last_status(1), Some(true));

        monitor.update_tracked_games(Vec::new());
        assert_eq!(monitor.last_status(1), None);
        assert!(monitor.tracked_games().is_empty());
    }
}
