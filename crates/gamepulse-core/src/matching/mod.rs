//! Deciding whether an OS process "is" a given game.
//!
//! # Rules
//!
//! For every process, the first rule that fires wins:
//! 1. **Denylist** - launcher clients, shells and desktop daemons never match.
//! 2. **Executable** - exact path equality or command-line containment. Games
//!    started through the `flatpak` wrapper match on their sandbox app-id instead.
//! 3. **Install path** - process path prefix, command-line containment, or the
//!    Wine `Z:` translation of the path (Linux). Shared system roots are ignored.
//! 4. **Launcher app** - Proton `compatdata/<id>` prefix, or both the app id and
//!    `steamapps` on the command line. During termination the launcher client
//!    itself is excluded even when it matches.
//!
//! The engine is pure: it only looks at the values it is given.

mod denylist;
mod paths;
mod signals;

pub use denylist::{is_non_game_process, NON_GAME_PROCESS_NAMES};
pub use paths::{is_protocol_url, PathStyle};
pub use signals::{steam_app_id, ExecutableSignal, TargetSignals};

use crate::models::{GameTarget, ProcessInfo};
use paths::wine_drive_path;
use signals::{
    FLATPAK_APP_MARKER, FLATPAK_SANDBOX_ROOT, STEAM_APPS_MARKER, STEAM_COMPAT_DIR,
};

/// Why a match is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPurpose {
    /// Status polling: any matching process means "running".
    Polling,
    /// Picking processes to kill: never include the launcher client.
    Termination,
}

/// The rule that made a process match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    ExecutablePath,
    ExecutableCommandLine,
    SandboxApp,
    InstallPath,
    WinePath,
    LauncherApp,
}

/// Heuristic matcher configured for one platform's path conventions.
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine {
    style: PathStyle,
    wine_paths: bool,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::for_current_platform()
    }
}

impl MatchingEngine {
    /// Case-sensitive `/` paths with Wine drive translation.
    pub fn linux() -> Self {
        Self {
            style: PathStyle::Unix,
            wine_paths: true,
        }
    }

    /// Case-insensitive `\` paths.
    pub fn windows() -> Self {
        Self {
            style: PathStyle::Windows,
            wine_paths: false,
        }
    }

    /// Case-sensitive `/` paths without Wine translation (macOS, BSD).
    pub fn unix() -> Self {
        Self {
            style: PathStyle::Unix,
            wine_paths: false,
        }
    }

    pub fn for_current_platform() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else if cfg!(target_os = "linux") {
            Self::linux()
        } else {
            Self::unix()
        }
    }

    pub fn path_style(&self) -> PathStyle {
        self.style
    }

    /// Derive the matching signals for a target.
    pub fn signals(&self, target: &GameTarget) -> TargetSignals {
        TargetSignals::from_target(target, self.style)
    }

    /// Whether any process in the snapshot belongs to the target.
    pub fn is_running(&self, target: &GameTarget, processes: &[ProcessInfo]) -> bool {
        let signals = self.signals(target);
        self.is_running_with(&signals, processes)
    }

    /// Like [`MatchingEngine::is_running`] with precomputed signals.
    pub fn is_running_with(&self, signals: &TargetSignals, processes: &[ProcessInfo]) -> bool {
        if signals.is_empty() {
            return false;
        }
        processes
            .iter()
            .any(|p| self.match_process(signals, p, MatchPurpose::Polling).is_some())
    }

    /// Pids of every process that should be stopped to stop the target.
    pub fn find_matching_pids(&self, target: &GameTarget, processes: &[ProcessInfo]) -> Vec<u32> {
        self.find_matches(target, processes)
            .into_iter()
            .map(|(pid, _)| pid)
            .collect()
    }

    /// Termination matches together with the rule that selected each pid.
    pub fn find_matches(
        &self,
        target: &GameTarget,
        processes: &[ProcessInfo],
    ) -> Vec<(u32, MatchRule)> {
        let signals = self.signals(target);
        if signals.is_empty() {
            return Vec::new();
        }
        processes
            .iter()
            .filter_map(|p| {
                self.match_process(&signals, p, MatchPurpose::Termination)
                    .map(|rule| (p.pid, rule))
            })
            .collect()
    }

    /// Evaluate the rules against one process.
    pub fn match_process(
        &self,
        signals: &TargetSignals,
        process: &ProcessInfo,
        purpose: MatchPurpose,
    ) -> Option<MatchRule> {
        if is_non_game_process(process) {
            return None;
        }

        match &signals.executable {
            ExecutableSignal::Sandboxed {
                app_id,
                process_names,
            } => {
                if self.is_sandboxed_app_process(process, app_id.as_deref(), process_names) {
                    return Some(MatchRule::SandboxApp);
                }
            }
            ExecutableSignal::Path(exe) => {
                if let Some(rule) = self.match_executable(process, exe) {
                    return Some(rule);
                }
            }
            ExecutableSignal::None => {}
        }

        if let Some(install_path) = signals.install_path.as_deref() {
            if let Some(rule) = self.match_install_path(process, install_path) {
                return Some(rule);
            }
        }

        if let Some(app_id) = signals.launcher_app_id.as_deref() {
            if self.is_launcher_app_process(process, app_id) {
                if purpose == MatchPurpose::Termination && self.is_launcher_client(process) {
                    return None;
                }
                return Some(MatchRule::LauncherApp);
            }
        }

        None
    }

    fn match_executable(&self, process: &ProcessInfo, exe: &str) -> Option<MatchRule> {
        if let Some(path) = process.exe.as_deref() {
            if self.style.paths_equal(path, exe) {
                return Some(MatchRule::ExecutablePath);
            }
        }
        if let Some(cmdline) = process.cmdline.as_deref() {
            if self.style.contains(cmdline, exe) {
                return Some(MatchRule::ExecutableCommandLine);
            }
        }
        None
    }

    fn match_install_path(&self, process: &ProcessInfo, install_path: &str) -> Option<MatchRule> {
        if let Some(path) = process.exe.as_deref() {
            if self.style.starts_with(path, install_path) {
                return Some(MatchRule::InstallPath);
            }
        }

        let cmdline = process.cmdline.as_deref()?;
        if self.style.contains(cmdline, install_path) {
            return Some(MatchRule::InstallPath);
        }

        if self.wine_paths {
            let wine_path = wine_drive_path(install_path);
            if PathStyle::Windows.contains(cmdline, &wine_path) {
                return Some(MatchRule::WinePath);
            }
        }

        None
    }

    fn is_sandboxed_app_process(
        &self,
        process: &ProcessInfo,
        app_id: Option<&str>,
        process_names: &[String],
    ) -> bool {
        if app_id.is_none() && process_names.is_empty() {
            return false;
        }

        if let Some(app_id) = app_id {
            if let Some(cmdline) = process.cmdline.as_deref() {
                if self.style.contains(cmdline, app_id) {
                    return true;
                }
            }
            if let Some(path) = process.exe.as_deref() {
                let app_root = format!("{FLATPAK_APP_MARKER}{app_id}/");
                if self.style.contains(path, &app_root) {
                    return true;
                }
            }
        }

        // Name-only matches are exact and must come from inside the sandbox.
        let name = process.name.trim();
        if name.is_empty() {
            return false;
        }
        let name = name.to_lowercase();
        let in_sandbox = process
            .exe
            .as_deref()
            .is_some_and(|p| p.starts_with(FLATPAK_SANDBOX_ROOT));
        in_sandbox && process_names.iter().any(|candidate| *candidate == name)
    }

    fn is_launcher_app_process(&self, process: &ProcessInfo, app_id: &str) -> bool {
        let compat_prefix = format!("{STEAM_COMPAT_DIR}{}{app_id}", self.style.separator());

        if let Some(path) = process.exe.as_deref() {
            if self.style.contains(path, &compat_prefix) {
                return true;
            }
        }

        if let Some(cmdline) = process.cmdline.as_deref() {
            if self.style.contains(cmdline, app_id) && self.style.contains(cmdline, STEAM_APPS_MARKER)
            {
                return true;
            }
            if self.style.contains(cmdline, &compat_prefix) {
                return true;
            }
        }

        false
    }

    /// The Steam client and its web helper, whatever the process is named.
    fn is_launcher_client(&self, process: &ProcessInfo) -> bool {
        const CLIENT_MARKERS: &[&str] = &["steam.exe", "steamwebhelper"];

        let path = process.exe.as_deref().unwrap_or_default();
        let cmdline = process.cmdline.as_deref().unwrap_or_default();
        if path.is_empty() && cmdline.is_empty() {
            return false;
        }

        CLIENT_MARKERS
            .iter()
            .any(|marker| self.style.contains(path, marker) || self.style.contains(cmdline, marker))
    }
}
