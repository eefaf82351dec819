//! Change notifications for git's own state.
//!
//! [`ChangeWatcher`] watches the git directory and its ref directories, never
//! the working tree. Qualifying filesystem events feed a [`Debouncer`]; when it
//! fires, one [`Refresh`] is offered on a capacity-1 channel and dropped if the
//! previous one has not been taken yet.
//!
//! Watched, all non-recursive:
//! - the git directory (HEAD, index, MERGE_HEAD, FETCH_HEAD, rebase state)
//! - `refs`, `refs/heads`, `refs/tags`
//! - `refs/remotes` and each remote directory under it, including ones that
//!   appear after start
//! - the directory holding `packed-refs`
//!
//! Linked worktrees keep their refs in the common directory named by the
//! `commondir` file; those paths are used instead.
//!
//! # Public API
//! - [`ChangeWatcher`]: start/stop handle
//! - [`Refresh`]: the notification
//! - [`Debouncer`]: debounce + jitter state machine
//! - [`should_ignore`]: noise-file filter

use crate::core::error::{ConduitError, Result};
use log::{debug, trace, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Something in git's state changed; re-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh;

/// Single pending timer, reset on every event to `base + random(0, base / 2)`.
#[derive(Debug)]
pub struct Debouncer {
    base: Duration,
    deadline: Option<Instant>,
    rng: StdRng,
}

impl Debouncer {
    pub fn new(base: Duration) -> Self {
        Self::from_rng(base, StdRng::from_entropy())
    }

    /// Deterministic jitter, for tests.
    pub fn with_seed(base: Duration, seed: u64) -> Self {
        Self::from_rng(base, StdRng::seed_from_u64(seed))
    }

    fn from_rng(base: Duration, rng: StdRng) -> Self {
        Self {
            base,
            deadline: None,
            rng,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Restart the timer from `now`. Returns the new deadline.
    pub fn on_event(&mut self, now: Instant) -> Instant {
        let deadline = now + self.next_delay();
        self.deadline = Some(deadline);
        deadline
    }

    /// True once when the deadline has passed; the timer is then cleared.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let spread = u64::try_from((self.base / 2).as_nanos()).unwrap_or(u64::MAX);
        if spread == 0 {
            return self.base;
        }
        self.base + Duration::from_nanos(self.rng.gen_range(0..spread))
    }
}

/// True for files whose changes never mean a state transition worth a refresh.
pub fn should_ignore(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    // Held by git mid-operation
    if name.ends_with(".lock") {
        return true;
    }
    // Editor swap and backup files
    if name.ends_with(".swp") || name.ends_with(".swo") || name.ends_with('~') || name.starts_with(".#") {
        return true;
    }
    name == "COMMIT_EDITMSG" || name == "gc.log" || name.starts_with("fsmonitor")
}

/// Directories that hold the refs for `git_dir`.
#[derive(Debug, Clone)]
struct Layout {
    git_dir: PathBuf,
    common_dir: PathBuf,
}

impl Layout {
    fn resolve(git_dir: &Path) -> Self {
        let common_dir = fs::read_to_string(git_dir.join("commondir"))
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(|raw| git_dir.join(raw))
            .unwrap_or_else(|| git_dir.to_path_buf());
        Self {
            git_dir: git_dir.to_path_buf(),
            common_dir,
        }
    }

    fn remotes_dir(&self) -> PathBuf {
        self.common_dir.join("refs").join("remotes")
    }

    fn targets(&self) -> Vec<PathBuf> {
        let refs = self.common_dir.join("refs");
        let mut targets = vec![
            self.git_dir.clone(),
            refs.join("heads"),
            refs.join("tags"),
            refs.clone(),
        ];

        let remotes = self.remotes_dir();
        if let Ok(entries) = fs::read_dir(&remotes) {
            targets.push(remotes.clone());
            targets.extend(
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir()),
            );
        }

        if self.common_dir.join("packed-refs").exists() {
            targets.push(self.common_dir.clone());
        }

        let mut seen = HashSet::new();
        targets.retain(|path| path.is_dir() && seen.insert(path.clone()));
        targets
    }

    /// A newly created directory that should join the watch set.
    fn is_remote_directory(&self, path: &Path) -> bool {
        let remotes = self.remotes_dir();
        (path == remotes || path.parent() == Some(remotes.as_path())) && path.is_dir()
    }
}

enum Signal {
    Fs(notify::Result<Event>),
    Stop,
}

/// Handle to a running watcher. Dropping it stops the watcher.
pub struct ChangeWatcher {
    git_dir: PathBuf,
    control: Sender<Signal>,
    thread: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Start watching `git_dir`. Notifications arrive on the returned receiver,
    /// which disconnects when the watcher stops or fails.
    pub fn start(git_dir: &Path, debounce: Duration) -> Result<(Self, Receiver<Refresh>)> {
        Self::start_with(git_dir, Debouncer::new(debounce))
    }

    pub fn start_with(git_dir: &Path, debouncer: Debouncer) -> Result<(Self, Receiver<Refresh>)> {
        let layout = Layout::resolve(git_dir);
        let (control, signals) = mpsc::channel();
        let events = control.clone();
        let mut watcher = notify::recommended_watcher(move |event| {
            if events.send(Signal::Fs(event)).is_err() {
                trace!("watch event dropped, dispatcher gone");
            }
        })
        .map_err(|e| ConduitError::WatcherInit(Arc::new(e)))?;

        watcher
            .watch(git_dir, RecursiveMode::NonRecursive)
            .map_err(|e| ConduitError::watch(git_dir, e))?;
        let mut watched = HashSet::from([git_dir.to_path_buf()]);
        for target in layout.targets() {
            if watched.contains(&target) {
                continue;
            }
            match watcher.watch(&target, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    watched.insert(target);
                }
                Err(e) => debug!("not watching {}: {e}", target.display()),
            }
        }
        debug!(
            "watching {} directories under {}",
            watched.len(),
            git_dir.display()
        );

        let (refresh_tx, refresh_rx) = mpsc::sync_channel(1);
        let thread = thread::Builder::new()
            .name("git-conduit-watch".to_string())
            .spawn(move || {
                let add_watch = |path: &Path| {
                    if !watched.insert(path.to_path_buf()) {
                        return Ok(());
                    }
                    watcher.watch(path, RecursiveMode::NonRecursive)
                };
                dispatch(signals, refresh_tx, debouncer, &layout, add_watch);
                // The OS watcher is dropped here, closing its handles.
            })?;

        Ok((
            Self {
                git_dir: git_dir.to_path_buf(),
                control,
                thread: Some(thread),
            },
            refresh_rx,
        ))
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop watching. No notification is sent after this returns.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.control.send(Signal::Stop);
        if thread.join().is_err() {
            warn!("watch dispatcher for {} panicked", self.git_dir.display());
        }
        debug!("stopped watching {}", self.git_dir.display());
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Event loop: filter, debounce, emit. Returns on stop, on an OS watch error,
/// or when the notification receiver is gone.
fn dispatch<F>(
    signals: Receiver<Signal>,
    refresh: SyncSender<Refresh>,
    mut debouncer: Debouncer,
    layout: &Layout,
    mut add_watch: F,
) where
    F: FnMut(&Path) -> notify::Result<()>,
{
    loop {
        let signal = match debouncer.deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match signals.recv_timeout(wait) {
                    Ok(signal) => signal,
                    Err(RecvTimeoutError::Timeout) => {
                        if debouncer.poll(Instant::now()) {
                            match refresh.try_send(Refresh) {
                                Ok(()) => trace!("refresh sent"),
                                Err(TrySendError::Full(_)) => trace!("refresh pending, dropped"),
                                Err(TrySendError::Disconnected(_)) => return,
                            }
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match signals.recv() {
                Ok(signal) => signal,
                Err(_) => return,
            },
        };

        let event = match signal {
            Signal::Stop => return,
            Signal::Fs(Ok(event)) => event,
            Signal::Fs(Err(e)) => {
                warn!("watch of {} failed, stopping: {e}", layout.git_dir.display());
                return;
            }
        };

        if matches!(event.kind, EventKind::Access(_)) {
            continue;
        }

        if matches!(event.kind, EventKind::Create(_)) {
            for path in event.paths.iter().filter(|p| layout.is_remote_directory(p)) {
                match add_watch(path) {
                    Ok(()) => debug!("watching new remote directory {}", path.display()),
                    Err(e) => debug!("not watching {}: {e}", path.display()),
                }
            }
        }

        if event.paths.is_empty() || event.paths.iter().any(|p| !should_ignore(p)) {
            debouncer.on_event(Instant::now());
        } else {
            trace!("ignoring {:?}", event.paths);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use tempfile::TempDir;

    const SHORT: Duration = Duration::from_millis(40);

    fn modify(path: &Path) -> Signal {
        Signal::Fs(Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf())))
    }

    fn spawn_dispatch(
        layout: Layout,
        debounce: Duration,
    ) -> (Sender<Signal>, Receiver<Refresh>, JoinHandle<Vec<PathBuf>>) {
        let (signal_tx, signal_rx) = mpsc::channel();
        let (refresh_tx, refresh_rx) = mpsc::sync_channel(1);
        let handle = thread::spawn(move || {
            let mut added = Vec::new();
            dispatch(
                signal_rx,
                refresh_tx,
                Debouncer::with_seed(debounce, 7),
                &layout,
                |path: &Path| {
                    added.push(path.to_path_buf());
                    Ok(())
                },
            );
            added
        });
        (signal_tx, refresh_rx, handle)
    }

    fn layout(dir: &Path) -> Layout {
        Layout {
            git_dir: dir.to_path_buf(),
            common_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_debouncer_fires_once() {
        let mut debouncer = Debouncer::with_seed(Duration::from_millis(100), 1);
        let start = Instant::now();
        assert!(!debouncer.poll(start));

        let deadline = debouncer.on_event(start);
        assert!(deadline >= start + Duration::from_millis(100));
        assert!(deadline < start + Duration::from_millis(150));
        assert!(!debouncer.poll(start + Duration::from_millis(99)));
        assert!(debouncer.poll(deadline));
        assert!(!debouncer.poll(deadline + Duration::from_secs(1)));
    }

    #[test]
    fn test_debouncer_reset_pushes_deadline() {
        let mut debouncer = Debouncer::with_seed(Duration::from_millis(100), 1);
        let start = Instant::now();
        debouncer.on_event(start);
        let later = debouncer.on_event(start + Duration::from_millis(90));
        assert!(later >= start + Duration::from_millis(190));
        assert!(!debouncer.poll(start + Duration::from_millis(160)));
    }

    #[test]
    fn test_zero_debounce_has_no_jitter() {
        let mut debouncer = Debouncer::with_seed(Duration::ZERO, 3);
        let now = Instant::now();
        assert_eq!(debouncer.on_event(now), now);
    }

    #[test]
    fn test_jitter_spreads_instances() {
        let base = Duration::from_millis(500);
        let mut first = Debouncer::with_seed(base, 11);
        let mut second = Debouncer::with_seed(base, 12);

        let mut differing = 0;
        for _ in 0..20 {
            let now = Instant::now();
            if first.on_event(now) != second.on_event(now) {
                differing += 1;
            }
        }
        assert!(differing >= 18, "only {differing} of 20 trials differed");
    }

    #[test]
    fn test_should_ignore_noise() {
        for noisy in [
            "index.lock",
            "refs/heads/main.lock",
            ".COMMIT_EDITMSG.swp",
            "HEAD.swo",
            "config~",
            ".#HEAD",
            "COMMIT_EDITMSG",
            "gc.log",
            "fsmonitor--daemon.ipc",
        ] {
            assert!(should_ignore(Path::new(noisy)), "{noisy} should be ignored");
        }
        for meaningful in ["HEAD", "index", "MERGE_HEAD", "refs/heads/main", "packed-refs", "FETCH_HEAD"] {
            assert!(!should_ignore(Path::new(meaningful)), "{meaningful} should count");
        }
    }

    #[test]
    fn test_burst_coalesces_to_one_refresh() {
        let dir = TempDir::new().unwrap();
        let (signals, refreshes, handle) = spawn_dispatch(layout(dir.path()), SHORT);

        for _ in 0..25 {
            signals.send(modify(&dir.path().join("index"))).unwrap();
        }

        assert_eq!(refreshes.recv_timeout(Duration::from_secs(2)), Ok(Refresh));
        thread::sleep(SHORT * 4);
        assert!(refreshes.try_recv().is_err());

        signals.send(Signal::Stop).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_noise_and_access_events_do_not_refresh() {
        let dir = TempDir::new().unwrap();
        let (signals, refreshes, handle) = spawn_dispatch(layout(dir.path()), SHORT);

        signals.send(modify(&dir.path().join("index.lock"))).unwrap();
        signals.send(modify(&dir.path().join("COMMIT_EDITMSG"))).unwrap();
        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(dir.path().join("HEAD"));
        signals.send(Signal::Fs(Ok(access))).unwrap();

        thread::sleep(SHORT * 4);
        assert!(refreshes.try_recv().is_err());

        signals.send(Signal::Stop).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_unconsumed_refresh_drops_new_one() {
        let dir = TempDir::new().unwrap();
        let (signals, refreshes, handle) = spawn_dispatch(layout(dir.path()), Duration::from_millis(10));

        signals.send(modify(&dir.path().join("HEAD"))).unwrap();
        thread::sleep(Duration::from_millis(100));
        signals.send(modify(&dir.path().join("HEAD"))).unwrap();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(refreshes.try_recv(), Ok(Refresh));
        assert!(refreshes.try_recv().is_err());

        signals.send(Signal::Stop).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_os_error_ends_dispatch() {
        let dir = TempDir::new().unwrap();
        let (signals, refreshes, handle) = spawn_dispatch(layout(dir.path()), SHORT);

        signals
            .send(Signal::Fs(Err(notify::Error::generic("watch limit reached"))))
            .unwrap();
        handle.join().unwrap();
        assert_eq!(refreshes.recv(), Err(mpsc::RecvError));
    }

    #[test]
    fn test_new_remote_directories_are_added() {
        let dir = TempDir::new().unwrap();
        let remotes = dir.path().join("refs").join("remotes");
        fs::create_dir_all(remotes.join("upstream")).unwrap();
        let (signals, _refreshes, handle) = spawn_dispatch(layout(dir.path()), SHORT);

        let created = |path: PathBuf| {
            Signal::Fs(Ok(Event::new(EventKind::Create(CreateKind::Folder)).add_path(path)))
        };
        signals.send(created(remotes.clone())).unwrap();
        signals.send(created(remotes.join("upstream"))).unwrap();
        signals.send(created(dir.path().join("refs").join("heads"))).unwrap();
        signals.send(Signal::Stop).unwrap();

        let added = handle.join().unwrap();
        assert_eq!(added, vec![remotes.clone(), remotes.join("upstream")]);
    }

    #[test]
    fn test_targets_follow_commondir() {
        let common = TempDir::new().unwrap();
        let linked = TempDir::new().unwrap();
        fs::create_dir_all(common.path().join("refs/heads")).unwrap();
        fs::create_dir_all(common.path().join("refs/tags")).unwrap();
        fs::create_dir_all(common.path().join("refs/remotes/origin")).unwrap();
        fs::write(common.path().join("packed-refs"), "").unwrap();
        fs::write(
            linked.path().join("commondir"),
            format!("{}\n", common.path().display()),
        )
        .unwrap();

        let targets = Layout::resolve(linked.path()).targets();
        assert!(targets.contains(&linked.path().to_path_buf()));
        assert!(targets.contains(&common.path().join("refs/heads")));
        assert!(targets.contains(&common.path().join("refs/remotes/origin")));
        assert!(targets.contains(&common.path().to_path_buf()));
        assert!(!targets.contains(&linked.path().join("refs")));
    }

    #[test]
    fn test_real_watcher_stops_cleanly() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();

        let (mut watcher, refreshes) = ChangeWatcher::start(dir.path(), SHORT).unwrap();
        assert!(watcher.is_running());

        fs::write(dir.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        assert_eq!(refreshes.recv_timeout(Duration::from_secs(5)), Ok(Refresh));

        watcher.stop();
        assert!(!watcher.is_running());
        watcher.stop();
        // At most one refresh can still be buffered; after it the channel is closed.
        let _ = refreshes.try_recv();
        assert!(refreshes.recv().is_err());
    }
}
