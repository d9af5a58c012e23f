//! Filesystem change watching.
//!
//! A background thread listens for change notifications under the home
//! directory and rebuilds the index when something relevant changed.
//!
//! ## States
//!
//! ```text
//!              relevant event                 throttle tick
//!   ┌──────┐ ───────────────► ┌───────────────┐ ─────────────► ┌───────────┐
//!   │ Idle │                  │ PendingChange │                │ Reloading │
//!   └──────┘ ◄─────────────────────────────────────────────────└───────────┘
//!                        reload finished (success or failure)
//! ```
//!
//! - Events whose paths all look like derivatives are ignored: the
//!   optimisation stage writes derivatives under the watched root, and
//!   reacting to those writes would reload forever.
//! - Reloads only start on a throttle tick, so a burst of events (copying a
//!   whole folder in) costs one rescan.
//! - A reload runs on the watcher thread itself, so two reloads never
//!   overlap. Events arriving meanwhile queue up and mark the next cycle.
//! - A failed reload keeps the previously published generation.

use crate::imaging::ImageBackend;
use crate::naming::Markers;
use crate::process::{self, ProcessConfig};
use crate::shared::SharedIndex;
use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot start file watcher: {0}")]
    Notify(#[from] notify::Error),
    #[error("Cannot start watcher thread: {0}")]
    Spawn(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    PendingChange,
    Reloading,
}

/// The watcher's state machine, independent of any notification source.
#[derive(Debug)]
pub struct ChangeTracker {
    state: WatchState,
    changed_while_reloading: bool,
    markers: Markers,
}

impl ChangeTracker {
    pub fn new(markers: Markers) -> Self {
        Self {
            state: WatchState::Idle,
            changed_while_reloading: false,
            markers,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Whether `event` could change the set of originals.
    pub fn is_relevant(&self, event: &Event) -> bool {
        if let EventKind::Access(kind) = &event.kind {
            if !matches!(kind, AccessKind::Close(AccessMode::Write)) {
                return false;
            }
        }
        // Path-less events (e.g. a rescan request from the backend) count.
        event.paths.is_empty() || event.paths.iter().any(|p| !self.is_own_output(p))
    }

    fn is_own_output(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.markers.name_contains_marker(&name.to_string_lossy()))
    }

    /// Record an event. Returns true if it marked a change.
    pub fn observe(&mut self, event: &Event) -> bool {
        if !self.is_relevant(event) {
            return false;
        }
        match self.state {
            WatchState::Reloading => self.changed_while_reloading = true,
            _ => self.state = WatchState::PendingChange,
        }
        true
    }

    /// Throttle tick. Returns true if a reload should run now.
    pub fn begin_reload(&mut self) -> bool {
        if self.state != WatchState::PendingChange {
            return false;
        }
        self.state = WatchState::Reloading;
        true
    }

    pub fn finish_reload(&mut self) {
        self.state = if std::mem::take(&mut self.changed_while_reloading) {
            WatchState::PendingChange
        } else {
            WatchState::Idle
        };
    }
}

/// Channels the watch loop selects over.
struct LoopChannels {
    events: Receiver<Event>,
    errors: Receiver<notify::Error>,
    shutdown: Receiver<()>,
    ticker: Receiver<std::time::Instant>,
}

fn run_loop(mut tracker: ChangeTracker, channels: LoopChannels, mut reload: impl FnMut()) {
    let LoopChannels {
        events,
        errors,
        shutdown,
        ticker,
    } = channels;

    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    if tracker.observe(&event) {
                        debug!(kind = ?event.kind, paths = ?event.paths, "change detected");
                    }
                }
                Err(_) => break,
            },
            recv(errors) -> msg => match msg {
                Ok(e) => warn!(error = %e, "file watcher error"),
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                if tracker.begin_reload() {
                    reload();
                    tracker.finish_reload();
                }
            }
            recv(shutdown) -> _ => break,
        }
    }
    debug!("watch loop exited");
}

/// Rebuild one generation and publish it; keep the old one on failure.
fn reload_and_publish(
    backend: &impl ImageBackend,
    root: &Path,
    config: &ProcessConfig,
    shared: &SharedIndex,
) {
    info!(path = %root.display(), "reloading index");
    match process::reload(backend, root, config) {
        Ok(index) => {
            info!(images = index.len(), "index reloaded");
            shared.publish(index);
        }
        Err(e) => error!(error = %e, "reload failed, keeping previous index"),
    }
}

/// Settings for [`ChangeWatcher::spawn`].
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub root: PathBuf,
    /// Minimum time between two reloads.
    pub throttle: Duration,
    pub process: ProcessConfig,
}

/// Handle to the running watcher. Dropping it (or calling
/// [`close`](Self::close)) stops event delivery and joins the loop thread.
pub struct ChangeWatcher {
    watcher: Option<RecommendedWatcher>,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    pub fn spawn<B>(
        backend: B,
        settings: WatchSettings,
        shared: Arc<SharedIndex>,
    ) -> Result<Self, WatchError>
    where
        B: ImageBackend + Send + 'static,
    {
        let (event_tx, event_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => {
                    let _ = error_tx.send(e);
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&settings.root, RecursiveMode::Recursive)?;

        let (shutdown_tx, shutdown_rx) = unbounded();
        let channels = LoopChannels {
            events: event_rx,
            errors: error_rx,
            shutdown: shutdown_rx,
            ticker: tick(settings.throttle),
        };
        let tracker = ChangeTracker::new(settings.process.markers.clone());

        info!(
            path = %settings.root.display(),
            throttle_secs = settings.throttle.as_secs_f64(),
            "watching for changes"
        );
        let thread = thread::Builder::new()
            .name("change-watcher".into())
            .spawn(move || {
                run_loop(tracker, channels, || {
                    reload_and_publish(&backend, &settings.root, &settings.process, &shared)
                })
            })
            .map_err(WatchError::Spawn)?;

        Ok(Self {
            watcher: Some(watcher),
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Stop watching. Waits for an in-flight reload to finish.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.watcher.take();
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("watch loop panicked");
            }
            info!("file watcher closed");
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
