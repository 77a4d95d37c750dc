//! Filesystem transport using the `notify` crate.
//!
//! Every instance of an application watches one shared directory. Sending a
//! message drops a file named `{millis}_{instance_id}.msg` into it; every other
//! watcher picks the file up and hands its content to its listeners. A
//! cleanup thread deletes files once they are older than the retention TTL.
//!
//! Provides:
//! - `FileWatcherDriver` -- the `HiveDriver` implementation
//! - `message_file_name()` -- the on-disk naming rule

use std::path::{Path, PathBuf};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Instant, SystemTime};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hive_core::delivery::Delivery;
use hive_core::driver::HiveDriver;
use hive_core::listener::{ListenerId, MessageListener};
use hive_core::signal::StopSignal;
use hive_types::config::{HiveConfig, TimingConfig};
use hive_types::error::HiveError;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use uuid::Uuid;

use crate::dir::{app_dir_name, resolve_message_root};

/// Extension of complete message files.
pub const MESSAGE_EXTENSION: &str = "msg";
/// Extension of files still being written.
const PARTIAL_EXTENSION: &str = "tmp";

/// Name of the message file a sender writes: `{millis}_{instance_id}.msg`.
pub fn message_file_name(millis: i64, instance_id: &str) -> String {
    format!("{millis}_{instance_id}.{MESSAGE_EXTENSION}")
}

fn is_message_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MESSAGE_EXTENSION)
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the driver handle and its background threads.
struct Shared {
    dir: PathBuf,
    instance_id: String,
    /// `_{instance_id}.msg`; files ending with it are our own.
    own_suffix: String,
    timing: TimingConfig,
    delivery: Delivery,
    enabled: AtomicBool,
    stop: StopSignal,
    /// Message files already handed to listeners, with when that happened.
    processed: DashMap<String, Instant>,
    last_stamp: AtomicI64,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.enabled.load(Ordering::SeqCst) && !self.stop.is_fired()
    }

    /// Strictly increasing millisecond stamp for outgoing file names.
    fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    fn write_message(&self, payload: &str) -> Result<PathBuf, HiveError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| HiveError::io(&self.dir, e))?;

        let stamp = self.next_stamp();
        let target = self.dir.join(message_file_name(stamp, &self.instance_id));
        let partial = target.with_extension(PARTIAL_EXTENSION);

        std::fs::write(&partial, payload).map_err(|e| HiveError::io(&partial, e))?;
        if let Err(e) = std::fs::rename(&partial, &target) {
            let _ = std::fs::remove_file(&partial);
            return Err(HiveError::io(&target, e));
        }
        Ok(target)
    }

    /// Read a message file and hand it to the listeners.
    fn process(&self, path: &Path) {
        if !self.is_running() || !is_message_file(path) {
            return;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        if name.ends_with(&self.own_suffix) {
            tracing::trace!(file = name, "skipping own message");
            return;
        }

        match self.processed.entry(name.to_string()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
            }
        }

        match std::fs::read_to_string(path) {
            Ok(payload) => {
                tracing::debug!(file = name, bytes = payload.len(), "message received");
                if self.is_running() {
                    self.delivery.deliver(payload);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(file = name, "message file vanished before it was read");
            }
            Err(err) => {
                // Allow a later event for the same file to retry.
                self.processed.remove(name);
                tracing::warn!(file = name, error = %err, "failed to read message file");
            }
        }
    }

    /// Process the message files already present, oldest first.
    fn scan_existing(&self) {
        let mut files = match self.list_files() {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(error = %err, "failed to scan message directory");
                return;
            }
        };
        files.retain(|path| is_message_file(path));
        files.sort();
        for path in files {
            self.process(&path);
        }
    }

    fn list_files(&self) -> Result<Vec<PathBuf>, HiveError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| HiveError::io(&self.dir, e))?;
        Ok(entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect())
    }

    /// Delete message files older than the retention TTL. Returns how many
    /// were removed.
    fn sweep_expired(&self) -> usize {
        let ttl = self.timing.retention_ttl();
        let now = SystemTime::now();
        let mut files = match self.list_files() {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list message directory for cleanup");
                return 0;
            }
        };
        files.sort();

        let mut removed = 0;
        for path in files {
            let expirable = is_message_file(&path)
                || path.extension().is_some_and(|ext| ext == PARTIAL_EXTENSION);
            if !expirable {
                continue;
            }
            let expired = std::fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= ttl);
            if expired && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        self.processed.retain(|_, seen| seen.elapsed() < ttl);
        if removed > 0 {
            tracing::debug!(removed, "expired message files deleted");
        }
        removed
    }
}

/// Run one loop iteration; a panic ends the iteration, not the loop.
fn guarded(activity: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(activity, "background iteration panicked");
    }
}

fn watch_loop(shared: Arc<Shared>, events: Receiver<notify::Result<Event>>) {
    let poll = shared.timing.poll_interval();
    loop {
        if shared.stop.is_fired() {
            break;
        }
        let event = match events.recv_timeout(poll) {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "watch error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let arrived = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        );
        if !arrived || !event.paths.iter().any(|p| is_message_file(p)) {
            continue;
        }
        // Settle before reading; also the point where shutdown interrupts.
        if shared.stop.wait_timeout(shared.timing.settle_delay()) {
            break;
        }
        guarded("watch", || {
            for path in event.paths.iter().filter(|p| is_message_file(p)) {
                shared.process(path);
            }
        });
    }
    tracing::debug!(instance_id = %shared.instance_id, "watch loop stopped");
}

fn cleanup_loop(shared: Arc<Shared>) {
    while !shared.stop.wait_timeout(shared.timing.cleanup_interval()) {
        guarded("cleanup", || {
            shared.sweep_expired();
        });
    }
    tracing::debug!(instance_id = %shared.instance_id, "cleanup loop stopped");
}

// ---------------------------------------------------------------------------
// FileWatcherDriver
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Workers {
    /// Dropping the watcher closes the event channel.
    watcher: Option<RecommendedWatcher>,
    threads: Vec<JoinHandle<()>>,
}

/// Transport that exchanges messages as files in a shared directory.
///
/// Construction never fails: if the directory or the watch cannot be set up
/// the driver comes up disabled and every operation is a no-op.
pub struct FileWatcherDriver {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
}

impl FileWatcherDriver {
    /// Start a driver on `dir` with a fresh instance id.
    pub fn new(dir: impl Into<PathBuf>, timing: TimingConfig) -> Self {
        Self::with_instance_id(dir, Uuid::now_v7().to_string(), timing)
    }

    pub fn with_instance_id(
        dir: impl Into<PathBuf>,
        instance_id: impl Into<String>,
        timing: TimingConfig,
    ) -> Self {
        let instance_id = instance_id.into();
        let shared = Arc::new(Shared {
            dir: dir.into(),
            own_suffix: format!("_{instance_id}.{MESSAGE_EXTENSION}"),
            instance_id,
            timing,
            delivery: Delivery::new(),
            enabled: AtomicBool::new(false),
            stop: StopSignal::new(),
            processed: DashMap::new(),
            last_stamp: AtomicI64::new(0),
        });
        let driver = Self {
            shared,
            workers: Mutex::new(Workers::default()),
        };

        match driver.start() {
            Ok(()) => tracing::info!(
                instance_id = %driver.shared.instance_id,
                dir = %driver.shared.dir.display(),
                "file watcher driver started"
            ),
            Err(err) => {
                tracing::warn!(
                    instance_id = %driver.shared.instance_id,
                    dir = %driver.shared.dir.display(),
                    error = %err,
                    "file watcher driver disabled"
                );
                driver.stop_workers();
            }
        }
        driver
    }

    /// Start a driver in the message directory of the configured application.
    pub fn for_app(config: &HiveConfig) -> Result<Self, HiveError> {
        let name = config.app_name().ok_or(HiveError::MissingAppName)?;
        let dir = resolve_message_root(config).join(app_dir_name(name, config.app_source()));
        Ok(Self::new(dir, config.timing.clone()))
    }

    /// The directory this driver reads and writes.
    pub fn message_dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Run one cleanup pass now. Returns the number of files deleted.
    pub fn cleanup_expired(&self) -> usize {
        self.shared.sweep_expired()
    }

    fn start(&self) -> Result<(), HiveError> {
        let shared = &self.shared;
        std::fs::create_dir_all(&shared.dir).map_err(|e| HiveError::io(&shared.dir, e))?;

        // Watch before scanning so nothing lands in between unseen.
        let (tx, rx) = mpsc::channel();
        let mut watcher =
            notify::recommended_watcher(tx).map_err(|e| HiveError::Watch(e.to_string()))?;
        watcher
            .watch(&shared.dir, RecursiveMode::Recursive)
            .map_err(|e| HiveError::Watch(format!("{}: {e}", shared.dir.display())))?;

        shared.enabled.store(true, Ordering::SeqCst);
        shared.scan_existing();

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.watcher = Some(watcher);

        let watch_shared = Arc::clone(shared);
        workers.threads.push(
            thread::Builder::new()
                .name("hive-watch".to_string())
                .spawn(move || watch_loop(watch_shared, rx))
                .map_err(|e| HiveError::io(&shared.dir, e))?,
        );

        let cleanup_shared = Arc::clone(shared);
        workers.threads.push(
            thread::Builder::new()
                .name("hive-cleanup".to_string())
                .spawn(move || cleanup_loop(cleanup_shared))
                .map_err(|e| HiveError::io(&shared.dir, e))?,
        );
        Ok(())
    }

    /// Disable, stop both threads and wait for them to finish.
    fn stop_workers(&self) {
        self.shared.enabled.store(false, Ordering::SeqCst);
        self.shared.stop.fire();

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        drop(workers.watcher);

        let current = thread::current().id();
        for handle in workers.threads {
            // Shutdown may be called from a listener running on the watch thread.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("hive background thread panicked");
            }
        }
    }
}

impl HiveDriver for FileWatcherDriver {
    fn send(&self, message: &str) {
        if !self.shared.is_running() {
            return;
        }
        match self.shared.write_message(message) {
            Ok(path) => tracing::debug!(file = %path.display(), "message sent"),
            Err(err) => tracing::warn!(error = %err, "failed to send message"),
        }
    }

    fn add_listener(&self, listener: MessageListener) -> ListenerId {
        self.shared.delivery.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.delivery.remove_listener(id)
    }

    fn is_enabled(&self) -> bool {
        self.shared.is_running()
    }

    fn shutdown(&self) {
        let was_running = self.shared.is_running();
        self.stop_workers();
        self.shared.delivery.clear();
        if was_running {
            tracing::info!(instance_id = %self.shared.instance_id, "file watcher driver shut down");
        }
    }

    fn instance_id(&self) -> &str {
        &self.shared.instance_id
    }

    fn name(&self) -> &str {
        "FileWatcher"
    }
}

impl Drop for FileWatcherDriver {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

impl std::fmt::Debug for FileWatcherDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcherDriver")
            .field("instance_id", &self.shared.instance_id)
            .field("dir", &self.shared.dir)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
