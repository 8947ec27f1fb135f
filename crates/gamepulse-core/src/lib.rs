//! GamePulse Core - running-game detection for multi-launcher game libraries.
//!
//! Given descriptions of installed games (title, executable path, install
//! directory, launcher id) this crate works out which of them currently have a
//! process running, reports start/stop transitions, can force-stop a game and
//! can wait for one to exit.
//!
//! # Example
//!
//! ```rust,ignore
//! use gamepulse_core::{CancellationToken, GameStatusMonitor, GameTarget, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() -> gamepulse_core::Result<()> {
//!     let monitor = GameStatusMonitor::new(MonitorConfig::default())?;
//!     monitor.subscribe(|change| {
//!         println!("game {} running: {}", change.game_id, change.is_running);
//!     });
//!
//!     let portal = GameTarget::new(620, "Portal 2")
//!         .with_executable("steam://rungameid/620")
//!         .with_install_path("/home/me/.steam/steam/steamapps/common/Portal 2");
//!     monitor.update_tracked_games(vec![portal]);
//!     monitor.start()?;
//!
//!     monitor
//!         .wait_for_exit_bounded(620, &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod launcher;
pub mod matching;
pub mod models;
pub mod monitor;
pub mod platform;
pub mod snapshot;

pub use cancel::{CancellationToken, CancelledError};
pub use config::MonitorConfig;
pub use error::{GamePulseError, Result};
pub use launcher::{GameLauncher, LaunchKind, LaunchOutcome, LaunchRequest};
pub use matching::{MatchPurpose, MatchRule, MatchingEngine};
pub use models::{GameStatusChange, GameTarget, ProcessInfo};
pub use monitor::{
    ChannelDispatcher, DispatchQueue, EventDispatcher, GameStatusMonitor, InlineDispatcher,
    PollOutcome, ProcessKiller, SubscriptionId,
};
pub use snapshot::{ProcessCache, ProcessSnapshotProvider, SystemSnapshotProvider};
