//! Execution control primitives shared by every background task.
//!
//! Two process-wide signals coordinate the service layer:
//!
//! - **Shutdown**: a write-once flag broadcast through a watch channel. The
//!   host owns the [`ShutdownController`]; tasks only observe it through
//!   [`AbortSignal`]. Every wait in the crate is built from
//!   [`AbortSignal::wait_for_abort`] so shutdown latency is bounded by the
//!   wait granularity.
//! - **Pause**: a composite gate over foreground activity. Recurring tasks
//!   hold off while any pause reason is active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

/// Owner side of the process shutdown flag.
///
/// The flag transitions false -> true exactly once and never resets.
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a controller with the flag unset.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Get an observer handle for a task.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Broadcast shutdown to every observer.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side of the process shutdown flag.
///
/// A dropped [`ShutdownController`] counts as shutdown: the host is gone and
/// no further work should start.
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Non-blocking check of the shutdown flag.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait up to `timeout`, returning `true` iff shutdown was requested
    /// during (or before) the wait.
    pub async fn wait_for_abort(&self, timeout: Duration) -> bool {
        if self.is_aborted() {
            return true;
        }
        let mut rx = self.rx.clone();
        tokio::select! {
            changed = rx.changed() => match changed {
                Ok(()) => *rx.borrow(),
                Err(_) => true,
            },
            _ = tokio::time::sleep(timeout) => self.is_aborted(),
        }
    }

    /// Resolve once shutdown is requested. Intended for `tokio::select!`.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Composite pause condition gating recurring work.
///
/// The gate is closed while *any* of the reasons is active. The host and UI
/// layer write the flags; tasks only read them, re-evaluating on every poll
/// tick.
#[derive(Debug, Default)]
pub struct PauseGate {
    media_playing: AtomicBool,
    ui_refreshing: AtomicBool,
    paused: AtomicBool,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set by the host player when foreground playback starts/stops.
    pub fn set_media_playing(&self, playing: bool) {
        self.media_playing.store(playing, Ordering::Relaxed);
    }

    /// Set by the UI layer while a list/container refresh is in flight.
    pub fn set_ui_refreshing(&self, refreshing: bool) {
        self.ui_refreshing.store(refreshing, Ordering::Relaxed);
    }

    /// Explicit pause flag, toggled by the host.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Whether recurring tasks must hold off right now.
    pub fn is_paused(&self) -> bool {
        self.media_playing.load(Ordering::Relaxed)
            || self.ui_refreshing.load(Ordering::Relaxed)
            || self.paused.load(Ordering::Relaxed)
    }
}

/// Block while the gate is closed, polling every `tick`.
///
/// Returns `true` if shutdown was requested at any point, in which case the
/// caller must stop instead of proceeding with work.
pub async fn wait_while_paused(gate: &PauseGate, signal: &AbortSignal, tick: Duration) -> bool {
    while gate.is_paused() {
        if signal.wait_for_abort(tick).await {
            return true;
        }
    }
    signal.is_aborted()
}
