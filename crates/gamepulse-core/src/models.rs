//! Value types shared by the matcher, the snapshot providers and the monitor.

use serde::{Deserialize, Serialize};

/// The monitor's view of a game: identity plus launch and location hints.
///
/// Targets are immutable snapshots handed over by the caller; the monitor
/// never holds on to UI objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameTarget {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    /// Absolute executable path or a protocol URL such as `steam://run/620`.
    #[serde(default)]
    pub executable_path: Option<String>,
    #[serde(default)]
    pub install_path: Option<String>,
    /// Launcher-specific id (Steam app id, ...).
    #[serde(default)]
    pub platform_id: Option<String>,
}

impl GameTarget {
    /// Create a target with no location hints.
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            executable_path: None,
            install_path: None,
            platform_id: None,
        }
    }

    /// Set the executable path or launch URL.
    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Set the install directory.
    pub fn with_install_path(mut self, path: impl Into<String>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    /// Set the launcher id.
    pub fn with_platform_id(mut self, id: impl Into<String>) -> Self {
        self.platform_id = Some(id.into());
        self
    }
}

/// One process from a snapshot of the OS process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Executable path with separators normalized for the platform.
    pub exe: Option<String>,
    pub name: String,
    pub cmdline: Option<String>,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            exe: None,
            name: name.into(),
            cmdline: None,
        }
    }

    pub fn with_exe(mut self, exe: impl Into<String>) -> Self {
        self.exe = Some(exe.into());
        self
    }

    pub fn with_cmdline(mut self, cmdline: impl Into<String>) -> Self {
        self.cmdline = Some(cmdline.into());
        self
    }
}

/// A running-state transition for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusChange {
    pub game_id: i64,
    pub is_running: bool,
}
