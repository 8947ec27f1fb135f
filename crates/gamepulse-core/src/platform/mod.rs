//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific process control live here rather than
//! being scattered through the monitor.
//!
//! - **Linux / other Unix**: signals via `nix`
//! - **Windows**: `TerminateProcess` via `windows-sys`

pub mod process;

pub use process::kill_process;
