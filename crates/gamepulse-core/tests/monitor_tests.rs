//! Integration tests for the GameStatusMonitor public interface.
//!
//! The process table is scripted so that every poll sees exactly the
//! snapshot the test wants.

use gamepulse_core::{
    CancellationToken, ChannelDispatcher, GamePulseError, GameStatusChange, GameStatusMonitor,
    GameTarget, InlineDispatcher, MatchingEngine, MonitorConfig, PollOutcome, ProcessInfo,
    ProcessSnapshotProvider,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hands out queued snapshots in order, repeating the last one when the
/// queue runs dry.
#[derive(Default)]
struct ScriptedProvider {
    queue: Mutex<VecDeque<Vec<ProcessInfo>>>,
    last: Mutex<Vec<ProcessInfo>>,
}

impl ScriptedProvider {
    fn new(snapshots: Vec<Vec<ProcessInfo>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(snapshots.into()),
            last: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, snapshot: Vec<ProcessInfo>) {
        self.queue.lock().unwrap().push_back(snapshot);
    }
}

impl ProcessSnapshotProvider for ScriptedProvider {
    fn snapshot(&self) -> Vec<ProcessInfo> {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

fn portal() -> GameTarget {
    GameTarget::new(5, "Portal 2")
        .with_executable("/games/portal2/portal2.bin")
        .with_install_path("/games/portal2")
}

fn portal_process() -> ProcessInfo {
    ProcessInfo::new(4100, "portal2.bin")
        .with_exe("/games/portal2/portal2.bin")
        .with_cmdline("/games/portal2/portal2.bin -game portal2")
}

fn monitor_with(provider: Arc<ScriptedProvider>) -> GameStatusMonitor {
    GameStatusMonitor::with_parts(
        MonitorConfig::default(),
        MatchingEngine::linux(),
        provider,
        Arc::new(InlineDispatcher),
    )
    .expect("default config is valid")
}

fn record(monitor: &GameStatusMonitor) -> Arc<Mutex<Vec<GameStatusChange>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    monitor.subscribe(move |change| sink.lock().unwrap().push(change));
    seen
}

fn change(game_id: i64, is_running: bool) -> GameStatusChange {
    GameStatusChange {
        game_id,
        is_running,
    }
}

#[tokio::test]
async fn test_wait_for_exit_resolves_after_start_then_stop() {
    let provider = ScriptedProvider::new(vec![vec![portal_process()], Vec::new()]);
    let monitor = monitor_with(provider);
    monitor.update_tracked_games(vec![portal()]);
    assert_eq!(monitor.last_status(5), None);

    let token = CancellationToken::new();
    let wait = tokio::spawn(monitor.wait_for_exit(5, &token));

    assert_eq!(monitor.poll_now().changes(), &[change(5, true)]);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!wait.is_finished(), "must not resolve on the start event");

    assert_eq!(monitor.poll_now().changes(), &[change(5, false)]);
    tokio::time::timeout(Duration::from_secs(1), wait)
        .await
        .expect("wait should resolve")
        .expect("task should not panic")
        .expect("wait should succeed");
}

#[tokio::test]
async fn test_wait_for_exit_seeded_from_running_status() {
    let provider = ScriptedProvider::new(vec![vec![portal_process()], Vec::new()]);
    let monitor = monitor_with(provider);
    monitor.update_tracked_games(vec![portal()]);
    monitor.poll_now();
    assert_eq!(monitor.last_status(5), Some(true));

    let wait = monitor.wait_for_exit(5, &CancellationToken::new());
    monitor.poll_now();

    tokio::time::timeout(Duration::from_secs(1), wait)
        .await
        .expect("wait should resolve")
        .unwrap();
}

#[tokio::test]
async fn test_wait_for_exit_cancelled() {
    let monitor = monitor_with(ScriptedProvider::new(Vec::new()));
    let token = CancellationToken::new();
    let wait = monitor.wait_for_exit(42, &token);

    token.cancel();
    let err = wait.await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_untracked_game_times_out() {
    let monitor = monitor_with(ScriptedProvider::new(Vec::new()));
    let timeout = monitor.config().exit_wait_timeout;

    let err = monitor
        .wait_for_exit_bounded(77, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GamePulseError::Timeout(t) if t == timeout));
}

#[tokio::test]
async fn test_identical_snapshots_fire_once() {
    let provider = ScriptedProvider::new(vec![vec![portal_process()]]);
    let monitor = monitor_with(provider);
    monitor.update_tracked_games(vec![portal(), GameTarget::new(6, "Other").with_executable("/games/other/other")]);
    let seen = record(&monitor);

    for _ in 0..3 {
        monitor.poll_now();
    }

    assert_eq!(*seen.lock().unwrap(), vec![change(5, true), change(6, false)]);
}

#[tokio::test]
async fn test_tracked_set_is_replaced_wholesale() {
    let provider = ScriptedProvider::new(vec![vec![portal_process()]]);
    let monitor = monitor_with(Arc::clone(&provider));
    let seen = record(&monitor);

    monitor.update_tracked_games(vec![portal(), GameTarget::new(2, "B").with_executable("/games/b/b")]);
    monitor.poll_now();

    monitor.update_tracked_games(vec![GameTarget::new(3, "C").with_executable("/games/c/c")]);
    provider.push(Vec::new());
    seen.lock().unwrap().clear();
    monitor.poll_now();

    assert_eq!(*seen.lock().unwrap(), vec![change(3, false)]);
    assert_eq!(monitor.last_status(5), None);
    assert_eq!(monitor.last_status(2), None);
    assert_eq!(monitor.last_status(3), Some(false));
    let tracked: Vec<i64> = monitor.tracked_games().iter().map(|t| t.id).collect();
    assert_eq!(tracked, vec![3]);
}

#[tokio::test]
async fn test_launcher_client_never_counts_as_game() {
    let client = ProcessInfo::new(900, "steam")
        .with_exe("/home/me/.steam/ubuntu12_32/steam")
        .with_cmdline("steam -silent /games/portal2 steamapps 620");
    let monitor = monitor_with(ScriptedProvider::new(vec![vec![client]]));
    monitor.update_tracked_games(vec![portal().with_platform_id("620")]);

    monitor.poll_now();
    assert_eq!(monitor.last_status(5), Some(false));
}

#[tokio::test]
async fn test_nothing_tracked_is_idle() {
    let monitor = monitor_with(ScriptedProvider::new(vec![vec![portal_process()]]));
    assert_eq!(monitor.poll_now(), PollOutcome::Idle);
}

#[tokio::test]
async fn test_unsubscribed_handler_stops_receiving() {
    let provider = ScriptedProvider::new(vec![vec![portal_process()], Vec::new()]);
    let monitor = monitor_with(provider);
    monitor.update_tracked_games(vec![portal()]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = monitor.subscribe(move |change| sink.lock().unwrap().push(change));

    monitor.poll_now();
    assert!(monitor.unsubscribe(id));
    monitor.poll_now();

    assert_eq!(*seen.lock().unwrap(), vec![change(5, true)]);
}

#[tokio::test]
async fn test_channel_dispatcher_defers_delivery() {
    let (dispatcher, mut queue) = ChannelDispatcher::channel();
    let monitor = GameStatusMonitor::with_parts(
        MonitorConfig::default(),
        MatchingEngine::linux(),
        ScriptedProvider::new(vec![vec![portal_process()]]),
        Arc::new(dispatcher),
    )
    .unwrap();
    monitor.update_tracked_games(vec![portal()]);
    let seen = record(&monitor);

    monitor.poll_now();
    assert!(seen.lock().unwrap().is_empty());
    // Status is updated even though handlers have not run yet.
    assert_eq!(monitor.last_status(5), Some(true));

    assert_eq!(queue.drain(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![change(5, true)]);
}

#[tokio::test]
async fn test_stop_game_kills_every_match() {
    let helper = ProcessInfo::new(4101, "portal2_helper").with_exe("/games/portal2/bin/helper");
    let unrelated = ProcessInfo::new(77, "firefox").with_exe("/usr/lib/firefox/firefox");
    let killed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&killed);

    let monitor = monitor_with(ScriptedProvider::new(vec![vec![
        portal_process(),
        helper,
        unrelated,
    ]]))
    .with_killer(Arc::new(move |pid: u32| {
        log.lock().unwrap().push(pid);
        Ok(true)
    }));

    let stopped = monitor
        .stop_game(&portal(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stopped, 2);
    assert_eq!(*killed.lock().unwrap(), vec![4100, 4101]);
}

#[tokio::test]
async fn test_stop_game_spares_launcher_client() {
    let client = ProcessInfo::new(900, "SteamBootstrap")
        .with_exe("C:\\Program Files (x86)\\Steam\\bin\\bootstrap.exe")
        .with_cmdline("\"C:\\Program Files (x86)\\Steam\\steam.exe\" -applaunch 620 steamapps");
    let game = ProcessInfo::new(901, "portal2.exe")
        .with_exe("C:\\Games\\Steam\\steamapps\\common\\Portal 2\\portal2.exe")
        .with_cmdline("portal2.exe -steam 620 steamapps");
    let killed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&killed);

    let monitor = GameStatusMonitor::with_parts(
        MonitorConfig::default(),
        MatchingEngine::windows(),
        ScriptedProvider::new(vec![vec![client, game]]),
        Arc::new(InlineDispatcher),
    )
    .unwrap()
    .with_killer(Arc::new(move |pid: u32| {
        log.lock().unwrap().push(pid);
        Ok(true)
    }));

    let target = GameTarget::new(620, "Portal 2")
        .with_executable("steam://rungameid/620")
        .with_platform_id("620");
    let stopped = monitor
        .stop_game(&target, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stopped, 1);
    assert_eq!(*killed.lock().unwrap(), vec![901]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_polling_reports_transitions() {
    let provider = ScriptedProvider::new(vec![vec![portal_process()]]);
    let monitor = GameStatusMonitor::with_parts(
        MonitorConfig::default().with_poll_interval(Duration::from_millis(20)),
        MatchingEngine::linux(),
        Arc::clone(&provider) as Arc<dyn ProcessSnapshotProvider>,
        Arc::new(InlineDispatcher),
    )
    .unwrap();
    monitor.update_tracked_games(vec![portal()]);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    monitor.subscribe(move |change| {
        let _ = tx.send(change);
    });

    monitor.start().unwrap();
    assert!(monitor.is_started());

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("poller should report")
        .unwrap();
    assert_eq!(first, change(5, true));

    provider.push(Vec::new());
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("poller should report the exit")
        .unwrap();
    assert_eq!(second, change(5, false));

    monitor.stop();
    assert!(!monitor.is_started());
}

#[cfg(target_os = "linux")]
mod procfs {
    use super::*;
    use gamepulse_core::snapshot::{ProcessCache, ProcfsSnapshotProvider};
    use std::fs;
    use std::os::unix::fs::symlink;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_process(root: &Path, pid: u32, name: &str, exe: &str, cmdline: &str) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("stat"),
            format!("{pid} ({name}) S {}{} 0 0\n", "0 ".repeat(18), 500 + pid),
        )
        .unwrap();
        symlink(exe, dir.join("exe")).unwrap();
        fs::write(dir.join("cmdline"), cmdline.replace(' ', "\0") + "\0").unwrap();
    }

    #[tokio::test]
    async fn test_monitor_over_fake_procfs() {
        let root = TempDir::new().unwrap();
        fake_process(
            root.path(),
            4100,
            "portal2.bin",
            "/games/portal2/portal2.bin",
            "/games/portal2/portal2.bin -game portal2",
        );
        fake_process(
            root.path(),
            4200,
            "wine64-preloader",
            "/usr/bin/wine64-preloader",
            "Z:\\games\\witcher3\\bin\\witcher3.exe",
        );

        let config = MonitorConfig::default().with_procfs_root(root.path());
        let cache = Arc::new(ProcessCache::from_config(&config));
        let monitor = GameStatusMonitor::with_parts(
            config.clone(),
            MatchingEngine::linux(),
            Arc::new(ProcfsSnapshotProvider::from_config(&config, cache)),
            Arc::new(InlineDispatcher),
        )
        .unwrap();

        monitor.update_tracked_games(vec![
            portal(),
            GameTarget::new(7, "The Witcher 3").with_install_path("/games/witcher3"),
            GameTarget::new(8, "Broad").with_install_path("/usr/bin"),
        ]);
        monitor.poll_now();

        assert_eq!(monitor.last_status(5), Some(true));
        assert_eq!(monitor.last_status(7), Some(true));
        assert_eq!(monitor.last_status(8), Some(false));
    }
}
