//! Starting games by executable path or launcher URL.
//!
//! Launching is independent of the monitor: callers launch, then use
//! `GameStatusMonitor::wait_for_exit_timeout` to follow the game.

use crate::cancel::CancellationToken;
use crate::config::MonitorConfig;
use crate::error::{GamePulseError, Result};
use crate::matching::is_protocol_url;
use crate::models::GameTarget;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// What to launch and how.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    /// Executable path or protocol URL (`steam://run/620`).
    pub target: String,
    /// Arguments for an executable; ignored for URLs.
    pub arguments: Vec<String>,
    /// Extra environment, e.g. `WINEPREFIX` for Wine/Proton games.
    pub env_vars: HashMap<String, String>,
    /// Defaults to the executable's directory.
    pub working_dir: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Request for a target's executable path or launch URL.
    pub fn for_target(target: &GameTarget) -> Self {
        Self::new(target.executable_path.clone().unwrap_or_default())
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// How a launch was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    /// Handed to the desktop's URL handler.
    Protocol,
    /// Spawned directly.
    Executable,
}

/// Result of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub kind: LaunchKind,
    /// Pid of the spawned process (the URL handler for protocol launches).
    pub pid: Option<u32>,
    /// Whether the spawned process was still alive after the settle delay.
    pub still_running: bool,
}

/// Program that opens launcher URLs; the URL is appended to `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UrlHandler {
    program: PathBuf,
    args: Vec<String>,
}

/// Launches games detached from the calling process.
#[derive(Debug, Clone)]
pub struct GameLauncher {
    settle_delay: Duration,
    url_handler: Option<UrlHandler>,
}

impl Default for GameLauncher {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl GameLauncher {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            settle_delay: config.launch_settle_delay,
            url_handler: None,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Open URLs with `program args... <url>` instead of the desktop default.
    pub fn with_url_handler<I, S>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_handler = Some(UrlHandler {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Launch `request.target`.
    ///
    /// After spawning, waits the settle delay and reports an early non-zero
    /// exit as [`GamePulseError::LaunchFailed`]. Cancelling during that wait
    /// returns [`GamePulseError::Cancelled`]; the process is left running.
    pub async fn launch(
        &self,
        request: &LaunchRequest,
        token: &CancellationToken,
    ) -> Result<LaunchOutcome> {
        let target = request.target.trim();
        if target.is_empty() {
            return Err(GamePulseError::LaunchFailed {
                target: request.target.clone(),
                message: "target path or URL is empty".to_string(),
            });
        }
        token.check()?;

        if is_protocol_url(target) {
            self.launch_protocol_url(target, token).await
        } else {
            self.launch_executable(target, request, token).await
        }
    }

    async fn launch_protocol_url(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<LaunchOutcome> {
        // The launcher the handler starts inherits these descriptors and
        // outlives us, so none of them may be a pipe we close.
        let mut cmd = match &self.url_handler {
            Some(handler) => {
                let mut cmd = Command::new(&handler.program);
                cmd.args(&handler.args).arg(url);
                cmd
            }
            None => default_url_handler(url),
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut cmd);

        info!("Opening launcher URL {}", url);
        let child = cmd.spawn().map_err(|e| GamePulseError::LaunchFailed {
            target: url.to_string(),
            message: format!("failed to start URL handler: {}", e),
        })?;

        self.settle(child, url, LaunchKind::Protocol, token).await
    }

    async fn launch_executable(
        &self,
        path: &str,
        request: &LaunchRequest,
        token: &CancellationToken,
    ) -> Result<LaunchOutcome> {
        let exe = Path::new(path);
        if !exe.is_file() {
            return Err(GamePulseError::ExecutableNotFound(exe.to_path_buf()));
        }

        let working_dir = request
            .working_dir
            .clone()
            .or_else(|| exe.parent().map(Path::to_path_buf))
            .filter(|dir| !dir.as_os_str().is_empty());

        let mut cmd = Command::new(exe);
        cmd.args(&request.arguments)
            .envs(&request.env_vars)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }
        detach(&mut cmd);

        info!(
            "Launching {} ({} args, {} env vars)",
            exe.display(),
            request.arguments.len(),
            request.env_vars.len()
        );
        let child = cmd.spawn().map_err(|e| GamePulseError::LaunchFailed {
            target: path.to_string(),
            message: format!("failed to spawn process: {}", e),
        })?;

        self.settle(child, path, LaunchKind::Executable, token).await
    }

    async fn settle(
        &self,
        mut child: Child,
        target: &str,
        kind: LaunchKind,
        token: &CancellationToken,
    ) -> Result<LaunchOutcome> {
        let pid = child.id();
        debug!("Spawned {} as pid {:?}", target, pid);

        tokio::select! {
            _ = token.cancelled() => return Err(GamePulseError::Cancelled),
            _ = tokio::time::sleep(self.settle_delay) => {}
        }

        let status = child.try_wait().map_err(|e| GamePulseError::LaunchFailed {
            target: target.to_string(),
            message: format!("failed to query process status: {}", e),
        })?;

        match status {
            Some(status) if !status.success() => {
                let message = match status.code() {
                    Some(code) => format!("process exited with code {}", code),
                    None => "process was terminated by a signal".to_string(),
                };
                warn!("Launch of {} failed: {}", target, message);
                Err(GamePulseError::LaunchFailed {
                    target: target.to_string(),
                    message,
                })
            }
            status => Ok(LaunchOutcome {
                kind,
                pid,
                still_running: status.is_none(),
            }),
        }
    }
}

/// The desktop's handler for launcher URLs.
fn default_url_handler(url: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(url);
        cmd
    }

    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

/// Run the child in its own session / process group so it outlives us and
/// does not receive our terminal's signals.
#[allow(unsafe_code)]
fn detach(cmd: &mut Command) {
    #[cfg(unix)]
    {
        // SAFETY: setsid() is async-signal-safe and touches no memory of the
        // parent; it only makes the child a session leader.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
    }

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}
