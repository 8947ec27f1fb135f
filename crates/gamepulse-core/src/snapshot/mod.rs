//! Point-in-time views of the OS process table.
//!
//! A provider never fails: anything it cannot read is left out, and a
//! provider that cannot enumerate processes at all returns an empty list.

pub mod cache;
#[cfg(target_os = "linux")]
mod procfs;
mod system;

pub use cache::{CachedProcess, ProcessCache, ProcessKey};
#[cfg(target_os = "linux")]
pub use procfs::ProcfsSnapshotProvider;
pub use system::SysinfoSnapshotProvider;

use crate::config::MonitorConfig;
use crate::models::ProcessInfo;
use std::sync::Arc;

/// Source of process snapshots.
///
/// Implemented for plain closures so tests can script the process table.
pub trait ProcessSnapshotProvider: Send + Sync {
    fn snapshot(&self) -> Vec<ProcessInfo>;
}

impl<F> ProcessSnapshotProvider for F
where
    F: Fn() -> Vec<ProcessInfo> + Send + Sync,
{
    fn snapshot(&self) -> Vec<ProcessInfo> {
        self()
    }
}

/// The provider for the current platform.
#[cfg(target_os = "linux")]
pub type SystemSnapshotProvider = ProcfsSnapshotProvider;

/// The provider for the current platform.
#[cfg(not(target_os = "linux"))]
pub type SystemSnapshotProvider = SysinfoSnapshotProvider;

/// Build the platform provider around a shared cache.
pub fn system_provider(
    config: &MonitorConfig,
    cache: Arc<ProcessCache>,
) -> Arc<dyn ProcessSnapshotProvider> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(ProcfsSnapshotProvider::from_config(config, cache))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        Arc::new(SysinfoSnapshotProvider::new(cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_provider() {
        let provider: Arc<dyn ProcessSnapshotProvider> =
            Arc::new(|| vec![ProcessInfo::new(1, "game").with_exe("/games/game")]);
        assert_eq!(provider.snapshot().len(), 1);
    }

    #[test]
    fn test_system_provider_sees_this_process() {
        let config = MonitorConfig::default();
        let provider = system_provider(&config, Arc::new(ProcessCache::from_config(&config)));
        let own_pid = std::process::id();
        assert!(provider.snapshot().iter().any(|p| p.pid == own_pid));
    }
}
