//! Per-target matching signals, derived once per poll instead of per process.

use super::paths::{file_name, is_blank, is_protocol_url, PathStyle};
use crate::models::GameTarget;

/// Scheme of Steam launch URLs.
pub const STEAM_URL_SCHEME: &str = "steam://";
/// Directory holding per-app Proton prefixes.
pub const STEAM_COMPAT_DIR: &str = "compatdata";
/// Steam's library storage directory.
pub const STEAM_APPS_MARKER: &str = "steamapps";

/// Where Flatpak installs applications.
pub const FLATPAK_APP_MARKER: &str = "/flatpak/app/";
/// Mount point of an application inside its Flatpak sandbox.
pub const FLATPAK_SANDBOX_ROOT: &str = "/app/";
const FLATPAK_WRAPPER: &str = "flatpak";

/// How the executable hint should be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableSignal {
    /// No usable executable: absent, blank, or a launch URL.
    None,
    /// Launched through the `flatpak` wrapper; match on the sandboxed app instead.
    Sandboxed {
        app_id: Option<String>,
        /// Lowercased candidate process names.
        process_names: Vec<String>,
    },
    /// A normalized filesystem path.
    Path(String),
}

/// Everything the matcher needs from a target.
#[derive(Debug, Clone)]
pub struct TargetSignals {
    pub executable: ExecutableSignal,
    /// Normalized install path, `None` when blank or too broad.
    pub install_path: Option<String>,
    pub launcher_app_id: Option<String>,
}

impl TargetSignals {
    pub fn from_target(target: &GameTarget, style: PathStyle) -> Self {
        let normalized_install = target
            .install_path
            .as_deref()
            .map(|p| style.normalize(p))
            .filter(|p| !p.is_empty());

        let executable = match target.executable_path.as_deref() {
            Some(exe) if !is_blank(exe) && !is_protocol_url(exe) => {
                if file_name(exe).eq_ignore_ascii_case(FLATPAK_WRAPPER) {
                    let app_id = normalized_install
                        .as_deref()
                        .and_then(|p| flatpak_app_id(p, style));
                    let process_names = flatpak_process_names(app_id.as_deref(), &target.title);
                    ExecutableSignal::Sandboxed {
                        app_id,
                        process_names,
                    }
                } else {
                    ExecutableSignal::Path(style.normalize(exe))
                }
            }
            _ => ExecutableSignal::None,
        };

        let install_path =
            normalized_install.filter(|p| !style.is_install_path_too_broad(p));

        Self {
            executable,
            install_path,
            launcher_app_id: steam_app_id(target),
        }
    }

    /// True when no rule can ever fire for this target.
    pub fn is_empty(&self) -> bool {
        self.executable == ExecutableSignal::None
            && self.install_path.is_none()
            && self.launcher_app_id.is_none()
    }
}

/// The explicit launcher id, or the numeric tail of a `steam://` URL.
pub fn steam_app_id(target: &GameTarget) -> Option<String> {
    if let Some(id) = target.platform_id.as_deref() {
        if !is_blank(id) {
            return Some(id.trim().to_string());
        }
    }

    let url = target.executable_path.as_deref()?;
    if is_blank(url) {
        return None;
    }
    let scheme = url.get(..STEAM_URL_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(STEAM_URL_SCHEME) {
        return None;
    }

    let last = url.rsplit('/').find(|s| !s.is_empty())?;
    last.parse::<i64>().ok().map(|_| last.to_string())
}

/// `.../flatpak/app/org.example.Game/current/...` -> `org.example.Game`.
pub fn flatpak_app_id(install_path: &str, style: PathStyle) -> Option<String> {
    let idx = install_path.find(FLATPAK_APP_MARKER)?;
    let remaining = &install_path[idx + FLATPAK_APP_MARKER.len()..];
    remaining
        .split(style.separator())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn flatpak_process_names(app_id: Option<&str>, title: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(last) = app_id.and_then(|id| id.rsplit('.').find(|s| !s.is_empty())) {
        names.push(last.to_lowercase());
    }
    let title = title.trim();
    if !title.is_empty() {
        names.push(title.to_lowercase());
    }
    names
}
