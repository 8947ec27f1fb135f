//! Processes that are never a game.
//!
//! Launcher clients keep game ids and install paths on their command line; if
//! they were allowed to match, every owned game would look like it is running.

use super::paths::{file_name, file_stem, is_blank};
use crate::models::ProcessInfo;

/// Lowercased names of launcher, shell and desktop-session processes.
pub const NON_GAME_PROCESS_NAMES: &[&str] = &[
    "steam",
    "steamwebhelper",
    "steamservice",
    "steamcmd",
    "steam.exe",
    "steamwebhelper.exe",
    "steamservice.exe",
    "steamcmd.exe",
    "explorer",
    "explorer.exe",
    "systemd",
    "dbus-daemon",
    "dbus-daemon-launch-helper",
    "pipewire",
    "pipewire-pulse",
    "pulseaudio",
    "wireplumber",
    "gnome-shell",
    "plasmashell",
    "kwin_x11",
    "kwin_wayland",
    "xorg",
    "xwayland",
    "xdg-open",
];

fn is_non_game_name(name: &str) -> bool {
    if is_blank(name) {
        return false;
    }
    let lower = name.to_lowercase();
    NON_GAME_PROCESS_NAMES.contains(&lower.as_str())
}

/// Check the process name, the executable's file name and its stem.
pub fn is_non_game_process(process: &ProcessInfo) -> bool {
    if is_non_game_name(&process.name) {
        return true;
    }

    match process.exe.as_deref() {
        Some(exe) if !exe.is_empty() => {
            is_non_game_name(file_name(exe)) || is_non_game_name(file_stem(exe))
        }
        _ => false,
    }
}
