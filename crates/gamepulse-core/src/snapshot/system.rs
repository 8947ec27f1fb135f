//! Process snapshots through `sysinfo`, used where procfs is not available.

use super::cache::{ProcessCache, ProcessKey};
use super::ProcessSnapshotProvider;
use crate::matching::PathStyle;
use crate::models::ProcessInfo;
use std::sync::{Arc, Mutex, PoisonError};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::trace;

/// Snapshot provider backed by a persistent `sysinfo::System`.
///
/// Every snapshot refreshes the process list cheaply; executable paths and
/// command lines are only requested for processes missing from the cache.
pub struct SysinfoSnapshotProvider {
    system: Mutex<System>,
    cache: Arc<ProcessCache>,
}

impl SysinfoSnapshotProvider {
    pub fn new(cache: Arc<ProcessCache>) -> Self {
        Self {
            system: Mutex::new(System::new()),
            cache,
        }
    }
}

impl ProcessSnapshotProvider for SysinfoSnapshotProvider {
    fn snapshot(&self) -> Vec<ProcessInfo> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::new());

        self.cache.tick();

        let listed: Vec<ProcessKey> = system
            .processes()
            .iter()
            .map(|(pid, process)| {
                ProcessKey::new(
                    pid.as_u32(),
                    process.name().to_string_lossy(),
                    process.start_time(),
                )
            })
            .collect();

        let misses: Vec<Pid> = listed
            .iter()
            .filter(|key| self.cache.get(key).is_none())
            .map(|key| Pid::from_u32(key.pid))
            .collect();

        if !misses.is_empty() {
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&misses),
                false,
                ProcessRefreshKind::new()
                    .with_exe(UpdateKind::Always)
                    .with_cmd(UpdateKind::Always),
            );
        }

        listed
            .into_iter()
            .filter_map(|key| {
                let cached = match self.cache.get(&key) {
                    Some(cached) => (cached.exe, cached.cmdline),
                    None => {
                        let process = system.process(Pid::from_u32(key.pid))?;
                        let exe = process
                            .exe()
                            .map(|p| PathStyle::current().normalize(&p.to_string_lossy()))
                            .filter(|p| !p.is_empty());
                        let cmd: Vec<String> = process
                            .cmd()
                            .iter()
                            .map(|arg| arg.to_string_lossy().into_owned())
                            .collect();
                        let cmdline = if cmd.is_empty() {
                            None
                        } else {
                            Some(cmd.join(" "))
                        };
                        self.cache.insert(key.clone(), exe.clone(), cmdline.clone());
                        (exe, cmdline)
                    }
                };

                let (Some(exe), cmdline) = cached else {
                    trace!("Skipping pid {} ({}): executable not readable", key.pid, key.name);
                    return None;
                };

                Some(ProcessInfo {
                    pid: key.pid,
                    exe: Some(exe),
                    name: key.name,
                    cmdline,
                })
            })
            .collect()
    }
}
