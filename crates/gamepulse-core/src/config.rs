//! Centralized configuration for GamePulse.
//!
//! Constant groups hold the defaults; `MonitorConfig` is the value handed to a
//! monitor at construction time.

use crate::error::{GamePulseError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default timings for the status monitor.
pub struct MonitorDefaults;

impl MonitorDefaults {
    pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
    /// Upper bound (exclusive) of the randomized cache lifetime, in ticks.
    pub const CACHE_TTL_TICKS: u32 = 64;
    /// Lifetime of cache entries for processes we could not read at all.
    pub const UNRESOLVED_TTL_TICKS: u32 = 999;
    /// Safety net for exit waits on games that never get tracked.
    pub const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
}

/// Default timings for launching games.
pub struct LaunchDefaults;

impl LaunchDefaults {
    pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
}

/// Well-known platform paths.
pub struct PathsConfig;

impl PathsConfig {
    pub const PROCFS_ROOT: &'static str = "/proc";
}

/// Runtime configuration for a `GameStatusMonitor`.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Minimum cadence of the background poll.
    pub poll_interval: Duration,
    /// Cached process data lives for a random number of ticks in `1..cache_ttl_ticks`.
    pub cache_ttl_ticks: u32,
    /// Lifetime for processes whose executable and command line were both unreadable.
    pub unresolved_ttl_ticks: u32,
    /// Default timeout used by `wait_for_exit_timeout` callers.
    pub exit_wait_timeout: Duration,
    /// How long a freshly launched child gets before we look for an early failure.
    pub launch_settle_delay: Duration,
    /// Root of the procfs mount (Linux only).
    pub procfs_root: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: MonitorDefaults::POLL_INTERVAL,
            cache_ttl_ticks: MonitorDefaults::CACHE_TTL_TICKS,
            unresolved_ttl_ticks: MonitorDefaults::UNRESOLVED_TTL_TICKS,
            exit_wait_timeout: MonitorDefaults::EXIT_WAIT_TIMEOUT,
            launch_settle_delay: LaunchDefaults::SETTLE_DELAY,
            procfs_root: PathBuf::from(PathsConfig::PROCFS_ROOT),
        }
    }
}

impl MonitorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the upper bound of the randomized cache lifetime.
    pub fn with_cache_ttl_ticks(mut self, ticks: u32) -> Self {
        self.cache_ttl_ticks = ticks;
        self
    }

    /// Set how many ticks a process without a readable executable stays cached.
    pub fn with_unresolved_ttl_ticks(mut self, ticks: u32) -> Self {
        self.unresolved_ttl_ticks = ticks;
        self
    }

    /// Set the exit-wait safety timeout.
    pub fn with_exit_wait_timeout(mut self, timeout: Duration) -> Self {
        self.exit_wait_timeout = timeout;
        self
    }

    /// Set the launch settle delay.
    pub fn with_launch_settle_delay(mut self, delay: Duration) -> Self {
        self.launch_settle_delay = delay;
        self
    }

    /// Point the Linux snapshot provider at a different procfs root.
    pub fn with_procfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.procfs_root = root.into();
        self
    }

    /// Reject values the poller and cache cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(GamePulseError::Config {
                message: "poll_interval must be greater than zero".to_string(),
            });
        }
        // rand's `1..n` range is empty below 2
        if self.cache_ttl_ticks < 2 {
            return Err(GamePulseError::Config {
                message: format!(
                    "cache_ttl_ticks must be at least 2, got {}",
                    self.cache_ttl_ticks
                ),
            });
        }
        if self.unresolved_ttl_ticks == 0 {
            return Err(GamePulseError::Config {
                message: "unresolved_ttl_ticks must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
