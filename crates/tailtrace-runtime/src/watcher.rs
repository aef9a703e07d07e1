use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::time::Duration;

use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tailtrace_engine::{build_chunks, is_ongoing};
use tailtrace_types::{Chunk, ClassifiedMsg};

use crate::error::Result;
use crate::reader::read_session_incremental;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Whole-snapshot update published whenever the watched file grows. The
/// consumer never needs to diff.
#[derive(Debug, Clone)]
pub struct WatchUpdate {
    pub chunks: Vec<Chunk>,
    pub is_ongoing: bool,
}

/// Live tail over one growing session file.
///
/// Owns the accumulated classified messages and a byte offset; on growth it
/// reads incrementally, rebuilds chunks over the whole accumulation and
/// publishes. Rotation or truncation resets the offset and starts over.
/// Read errors are forwarded on the error channel without terminating.
pub struct SessionWatcher {
    _watcher: PollWatcher,
    updates: Receiver<WatchUpdate>,
    errors: Receiver<String>,
    stop: Arc<AtomicBool>,
}

impl SessionWatcher {
    pub fn new(path: PathBuf) -> Result<Self> {
        let (update_tx, update_rx) = channel();
        let (err_tx, err_rx) = channel();
        let (fs_tx, fs_rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));

        let config = notify::Config::default().with_poll_interval(POLL_INTERVAL);
        let mut watcher = PollWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = fs_tx.send(event);
                }
            },
            config,
        )?;
        let watch_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        let worker_stop = stop.clone();
        std::thread::Builder::new()
            .name("session-watcher-worker".to_string())
            .spawn(move || {
                let mut state = WorkerState {
                    path,
                    msgs: Vec::new(),
                    offset: 0,
                };
                state.refresh(&update_tx, &err_tx, true);

                while !worker_stop.load(Ordering::Relaxed) {
                    match fs_rx.recv_timeout(STOP_CHECK_INTERVAL) {
                        Ok(event) => {
                            if event_touches(&event, &state.path) {
                                state.refresh(&update_tx, &err_tx, false);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                // Dropping the senders here closes both outgoing channels.
            })?;

        Ok(Self {
            _watcher: watcher,
            updates: update_rx,
            errors: err_rx,
            stop,
        })
    }

    pub fn updates(&self) -> &Receiver<WatchUpdate> {
        &self.updates
    }

    pub fn errors(&self) -> &Receiver<String> {
        &self.errors
    }

    /// Signal the worker to drain and close its channels.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerState {
    path: PathBuf,
    msgs: Vec<ClassifiedMsg>,
    offset: u64,
}

impl WorkerState {
    fn refresh(
        &mut self,
        updates: &Sender<WatchUpdate>,
        errors: &Sender<String>,
        force_publish: bool,
    ) {
        match std::fs::metadata(&self.path) {
            Ok(meta) => {
                // The offset may legitimately sit one byte past EOF, so
                // only a real shrink counts as rotation.
                if meta.len() + 1 < self.offset {
                    self.offset = 0;
                    self.msgs.clear();
                }
            }
            Err(err) => {
                let _ = errors.send(format!("{}: {}", self.path.display(), err));
                return;
            }
        }

        match read_session_incremental(&self.path, self.offset) {
            Ok((new_msgs, new_offset)) => {
                let grew = !new_msgs.is_empty();
                self.msgs.extend(new_msgs);
                self.offset = new_offset;
                if grew || force_publish {
                    let chunks = build_chunks(&self.msgs);
                    let ongoing = is_ongoing(&chunks);
                    let _ = updates.send(WatchUpdate {
                        chunks,
                        is_ongoing: ongoing,
                    });
                }
            }
            Err(err) => {
                let _ = errors.send(format!("{}: {}", self.path.display(), err));
            }
        }
    }
}

fn event_touches(event: &Event, path: &Path) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    ) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p == path || p.file_name() == path.file_name())
}
