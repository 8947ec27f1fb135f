//! Cache of expensive per-process reads (executable path, command line).
//!
//! Entries count down in snapshot ticks rather than wall-clock time. New
//! entries get a random lifetime so that re-reads are spread over many ticks
//! instead of all expiring on the same one.

use crate::config::MonitorConfig;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identity of a process for caching purposes.
///
/// The pid alone is not enough: a recycled pid belongs to a different process
/// with a different name (or at least a different start time).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessKey {
    pub pid: u32,
    pub name: String,
    /// Platform start-time stamp, 0 when unknown.
    pub started: u64,
}

impl ProcessKey {
    pub fn new(pid: u32, name: impl Into<String>, started: u64) -> Self {
        Self {
            pid,
            name: name.into(),
            started,
        }
    }
}

/// Cached data for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProcess {
    pub exe: Option<String>,
    pub cmdline: Option<String>,
    pub remaining_ticks: u32,
}

impl CachedProcess {
    /// Neither the executable nor the command line could be read.
    pub fn is_unresolved(&self) -> bool {
        self.exe.is_none() && self.cmdline.is_none()
    }
}

/// Process-wide cache shared by every snapshot provider that is handed it.
#[derive(Debug)]
pub struct ProcessCache {
    entries: Mutex<HashMap<ProcessKey, CachedProcess>>,
    ttl_ticks: u32,
    unresolved_ttl_ticks: u32,
}

impl ProcessCache {
    /// Create a cache whose entries live `1..ttl_ticks` ticks.
    pub fn new(ttl_ticks: u32, unresolved_ttl_ticks: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ticks: ttl_ticks.max(2),
            unresolved_ttl_ticks: unresolved_ttl_ticks.max(1),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.cache_ttl_ticks, config.unresolved_ttl_ticks)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessKey, CachedProcess>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance one tick: every entry loses a tick, expired entries are evicted.
    pub fn tick(&self) {
        let mut entries = self.lock();
        entries.retain(|_, entry| {
            entry.remaining_ticks = entry.remaining_ticks.saturating_sub(1);
            entry.remaining_ticks > 0
        });
    }

    pub fn get(&self, key: &ProcessKey) -> Option<CachedProcess> {
        self.lock().get(key).cloned()
    }

    /// Store freshly read data and return the lifetime it was given.
    pub fn insert(&self, key: ProcessKey, exe: Option<String>, cmdline: Option<String>) -> u32 {
        let ttl = if exe.is_none() && cmdline.is_none() {
            self.unresolved_ttl_ticks
        } else {
            rand::rng().random_range(1..self.ttl_ticks)
        };
        self.insert_with_ttl(key, exe, cmdline, ttl);
        ttl
    }

    /// Store data with an explicit lifetime.
    pub fn insert_with_ttl(
        &self,
        key: ProcessKey,
        exe: Option<String>,
        cmdline: Option<String>,
        ttl: u32,
    ) {
        self.lock().insert(
            key,
            CachedProcess {
                exe,
                cmdline,
                remaining_ticks: ttl.max(1),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for ProcessCache {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}
