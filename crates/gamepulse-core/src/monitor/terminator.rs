//! Force-stopping every process that belongs to a game.

use crate::cancel::CancellationToken;
use crate::error::{GamePulseError, Result};
use crate::matching::MatchingEngine;
use crate::models::GameTarget;
use crate::platform;
use crate::snapshot::ProcessSnapshotProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something that can forcefully end a process.
///
/// `Ok(true)` means the process was signalled, `Ok(false)` that it was
/// already gone.
pub trait ProcessKiller: Send + Sync {
    fn kill(&self, pid: u32) -> Result<bool>;
}

impl<F> ProcessKiller for F
where
    F: Fn(u32) -> Result<bool> + Send + Sync,
{
    fn kill(&self, pid: u32) -> Result<bool> {
        self(pid)
    }
}

/// Kills through the OS (`SIGKILL` / `TerminateProcess`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformKiller;

impl ProcessKiller for PlatformKiller {
    fn kill(&self, pid: u32) -> Result<bool> {
        platform::kill_process(pid)
    }
}

#[derive(Clone)]
pub struct Terminator {
    engine: MatchingEngine,
    provider: Arc<dyn ProcessSnapshotProvider>,
    killer: Arc<dyn ProcessKiller>,
}

impl Terminator {
    pub fn new(engine: MatchingEngine, provider: Arc<dyn ProcessSnapshotProvider>) -> Self {
        Self {
            engine,
            provider,
            killer: Arc::new(PlatformKiller),
        }
    }

    pub fn with_killer(mut self, killer: Arc<dyn ProcessKiller>) -> Self {
        self.set_killer(killer);
        self
    }

    pub fn set_killer(&mut self, killer: Arc<dyn ProcessKiller>) {
        self.killer = killer;
    }

    /// Kill every process matching `target` and return how many were killed.
    ///
    /// Takes its own snapshot of the process table. Failing to kill one pid
    /// does not stop attempts on the rest. Cancellation before the snapshot
    /// completes is an error; cancellation while killing stops early and
    /// returns the count so far.
    pub async fn stop(&self, target: &GameTarget, token: &CancellationToken) -> Result<usize> {
        token.check()?;

        let engine = self.engine;
        let provider = Arc::clone(&self.provider);
        let owned = target.clone();
        let lookup = tokio::task::spawn_blocking(move || {
            let processes = provider.snapshot();
            engine.find_matching_pids(&owned, &processes)
        });

        let pids = tokio::select! {
            _ = token.cancelled() => return Err(GamePulseError::Cancelled),
            joined = lookup => joined.map_err(|e| GamePulseError::Runtime {
                message: format!("process lookup task failed: {}", e),
            })?,
        };

        if pids.is_empty() {
            debug!("No processes found for game {} ({})", target.id, target.title);
            return Ok(0);
        }

        let mut stopped = 0;
        for pid in &pids {
            if token.is_cancelled() {
                debug!("Stopping game {} cancelled after {} kills", target.id, stopped);
                break;
            }
            match self.killer.kill(*pid) {
                Ok(true) => stopped += 1,
                Ok(false) => debug!("Process {} exited before it could be killed", pid),
                Err(e) => warn!("Failed to kill process {} of game {}: {}", pid, target.id, e),
            }
        }

        info!(
            "Stopped {} of {} processes for game {} ({})",
            stopped,
            pids.len(),
            target.id,
            target.title
        );
        Ok(stopped)
    }
}

impl std::fmt::Debug for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
