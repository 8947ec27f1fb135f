//! Forceful process termination.

#[cfg_attr(windows, allow(unused_imports))]
use crate::error::{GamePulseError, Result};

/// Kill a process immediately, without a graceful phase.
///
/// Returns `Ok(true)` when the process was killed and `Ok(false)` when it
/// had already exited.
///
/// # Platform Behavior
/// - **Unix**: `SIGKILL`
/// - **Windows**: `TerminateProcess`
pub fn kill_process(pid: u32) -> Result<bool> {
    #[cfg(unix)]
    {
        kill_process_unix(pid)
    }

    #[cfg(windows)]
    {
        windows::kill_process(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(GamePulseError::TerminationFailed {
            pid,
            message: "process termination not implemented for this platform".into(),
        })
    }
}

#[cfg(unix)]
fn kill_process_unix(pid: u32) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tracing::{debug, warn};

    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => {
            return Err(GamePulseError::TerminationFailed {
                pid,
                message: "not a valid process id".into(),
            })
        }
    };
    let nix_pid = Pid::from_raw(raw);

    debug!("Sending SIGKILL to process {}", pid);
    match kill(nix_pid, Signal::SIGKILL) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => {
            debug!("Process {} already exited", pid);
            Ok(false)
        }
        Err(e) => {
            warn!("Failed to kill process {}: {}", pid, e);
            Err(GamePulseError::TerminationFailed {
                pid,
                message: e.to_string(),
            })
        }
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
mod windows {
    use crate::error::{GamePulseError, Result};
    use tracing::{debug, warn};
    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, ERROR_INVALID_PARAMETER};
    use windows_sys::Win32::System::Threading::{
        OpenProcess, TerminateProcess, PROCESS_TERMINATE,
    };

    /// Exit code reported for processes we kill.
    const KILLED_EXIT_CODE: u32 = 1;

    pub(super) fn kill_process(pid: u32) -> Result<bool> {
        debug!("Terminating process {}", pid);

        // SAFETY: the handle returned by OpenProcess is checked for null, used
        // only for this call sequence and closed before returning.
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                let code = GetLastError();
                if code == ERROR_INVALID_PARAMETER {
                    debug!("Process {} already exited", pid);
                    return Ok(false);
                }
                warn!("OpenProcess failed for {}: error {}", pid, code);
                return Err(GamePulseError::TerminationFailed {
                    pid,
                    message: format!("OpenProcess failed with error {}", code),
                });
            }

            let ok = TerminateProcess(handle, KILLED_EXIT_CODE) != 0;
            let code = if ok { 0 } else { GetLastError() };
            CloseHandle(handle);

            if ok {
                Ok(true)
            } else {
                warn!("TerminateProcess failed for {}: error {}", pid, code);
                Err(GamePulseError::TerminationFailed {
                    pid,
                    message: format!("TerminateProcess failed with error {}", code),
                })
            }
        }
    }
}
