//! Linux process snapshots read straight from procfs.
//!
//! Per process we read `stat` (name and start time) every tick; the `exe`
//! link and `cmdline` only on a cache miss. Processes we are not allowed to
//! inspect are left out of the snapshot.

use super::cache::{ProcessCache, ProcessKey};
use super::ProcessSnapshotProvider;
use crate::config::MonitorConfig;
use crate::matching::PathStyle;
use crate::models::ProcessInfo;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Suffix the kernel appends to `exe` links of replaced binaries.
const DELETED_SUFFIX: &str = " (deleted)";
/// Position of `starttime` among the fields after the `(comm)` of `stat`.
const STAT_STARTTIME_INDEX: usize = 19;

/// Snapshot provider backed by `/proc` (or any procfs-shaped directory).
pub struct ProcfsSnapshotProvider {
    root: PathBuf,
    cache: Arc<ProcessCache>,
}

impl ProcfsSnapshotProvider {
    pub fn new(root: impl AsRef<Path>, cache: Arc<ProcessCache>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache,
        }
    }

    pub fn from_config(config: &MonitorConfig, cache: Arc<ProcessCache>) -> Self {
        Self::new(&config.procfs_root, cache)
    }

    fn read_process(&self, pid: u32) -> Option<ProcessInfo> {
        let dir = self.root.join(pid.to_string());
        let stat = fs::read_to_string(dir.join("stat")).ok()?;
        let (name, started) = parse_stat(&stat)?;
        let key = ProcessKey::new(pid, name.clone(), started);

        let (exe, cmdline) = match self.cache.get(&key) {
            Some(cached) => (cached.exe, cached.cmdline),
            None => {
                let exe = read_exe(&dir.join("exe"));
                let cmdline = read_cmdline(&dir.join("cmdline"));
                self.cache.insert(key, exe.clone(), cmdline.clone());
                (exe, cmdline)
            }
        };

        let Some(exe) = exe else {
            trace!("Skipping pid {} ({}): executable not readable", pid, name);
            return None;
        };

        Some(ProcessInfo {
            pid,
            exe: Some(exe),
            name,
            cmdline,
        })
    }
}

impl ProcessSnapshotProvider for ProcfsSnapshotProvider {
    fn snapshot(&self) -> Vec<ProcessInfo> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Failed to read procfs root {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        self.cache.tick();

        entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter_map(|pid| self.read_process(pid))
            .collect()
    }
}

/// Extract `(comm, starttime)` from the contents of `/proc/<pid>/stat`.
///
/// The name is delimited by the first `(` and the last `)` since it may itself
/// contain spaces and parentheses.
fn parse_stat(stat: &str) -> Option<(String, u64)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close <= open {
        return None;
    }
    let name = stat[open + 1..close].to_string();
    let started = stat[close + 1..]
        .split_whitespace()
        .nth(STAT_STARTTIME_INDEX)
        .and_then(|field| field.parse().ok())
        .unwrap_or(0);
    Some((name, started))
}

fn read_exe(link: &Path) -> Option<String> {
    let target = fs::read_link(link).ok()?;
    let target = target.to_string_lossy();
    let target = target.strip_suffix(DELETED_SUFFIX).unwrap_or(&target);
    let target = PathStyle::Unix.normalize(target);
    if target.is_empty() {
        None
    } else {
        Some(target)
    }
}

/// NUL-separated arguments joined with spaces; `None` for kernel threads.
fn read_cmdline(path: &Path) -> Option<String> {
    let data = fs::read(path).ok()?;
    let args: Vec<String> = data
        .split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();
    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}
