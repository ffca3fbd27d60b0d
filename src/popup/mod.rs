//! Popup authorization channel.
//!
//! Owns the lifecycle of a single externally opened window: open it at the
//! authorize URL, detect that it closed by polling, tear it down. The
//! channel knows nothing about what the window displayed. Closure is the
//! only signal it produces, and no OS-level close notification is assumed
//! to exist.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Geometry for the authorization window.
#[derive(Debug, Clone, Copy)]
pub struct PopupGeometry {
    pub width: u32,
    pub height: u32,
}

/// Errors raised when creating the window.
#[derive(Debug, thiserror::Error)]
pub enum PopupError {
    /// The host environment refused to create the window. Fatal to the
    /// attempt; surfaced synchronously from [`WindowOpener::open`], never
    /// via the poll path.
    #[error("authorization window was blocked: {0}")]
    Blocked(String),
}

/// A live authorization window.
#[async_trait]
pub trait AuthWindow: Send + Sync {
    /// Whether the window has closed. Polled on a fixed interval.
    async fn is_closed(&self) -> bool;

    /// Tear the window down. Idempotent: closing an already-closed window
    /// is a no-op.
    async fn close(&self);
}

/// Opens authorization windows. The seam that lets tests substitute a
/// scripted window for a real browser.
pub trait WindowOpener: Send + Sync {
    fn open(
        &self,
        url: &str,
        title: &str,
        geometry: PopupGeometry,
    ) -> Result<Arc<dyn AuthWindow>, PopupError>;
}

/// Wait until `window` reports closed, polling on a fixed interval.
///
/// A lazy single-value wait: each call owns its own timer and resolves
/// exactly once. Dropping the returned future cancels the timer with it.
/// No timeout is imposed here; that policy belongs to the caller.
pub async fn await_closed(window: &dyn AuthWindow, poll_interval: Duration) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if window.is_closed().await {
            debug!("authorization window closed");
            return;
        }
    }
}

// ─── Process-backed window ───────────────────────────────────────────────────

/// Authorization window backed by a spawned browser process. Closure is
/// detected when the child exits; `close` kills it.
pub struct ProcessWindow {
    child: Mutex<Child>,
    done: AtomicBool,
}

#[async_trait]
impl AuthWindow for ProcessWindow {
    async fn is_closed(&self) -> bool {
        if self.done.load(Ordering::SeqCst) {
            return true;
        }
        let mut child = self.child.lock().await;
        match child.try_wait() {
            Ok(Some(_)) => {
                self.done.store(true, Ordering::SeqCst);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(err = %e, "window process poll failed");
                self.done.store(true, Ordering::SeqCst);
                true
            }
        }
    }

    async fn close(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            debug!(err = %e, "window process already gone");
        }
    }
}

/// Opens windows by spawning the configured browser command.
pub struct ProcessWindowOpener {
    command: String,
}

impl ProcessWindowOpener {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl WindowOpener for ProcessWindowOpener {
    fn open(
        &self,
        url: &str,
        title: &str,
        geometry: PopupGeometry,
    ) -> Result<Arc<dyn AuthWindow>, PopupError> {
        let child = Command::new(&self.command)
            .arg(format!("--app={url}"))
            .arg(format!("--window-size={},{}", geometry.width, geometry.height))
            .spawn()
            .map_err(|e| PopupError::Blocked(e.to_string()))?;
        debug!(command = %self.command, url, title, "authorization window opened");
        Ok(Arc::new(ProcessWindow {
            child: Mutex::new(child),
            done: AtomicBool::new(false),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Window that reports closed after a fixed number of polls.
    struct CountdownWindow {
        polls_until_closed: usize,
        polls: AtomicUsize,
        closed: AtomicBool,
    }

    impl CountdownWindow {
        fn new(polls_until_closed: usize) -> Self {
            Self {
                polls_until_closed,
                polls: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl AuthWindow for CountdownWindow {
        async fn is_closed(&self) -> bool {
            if self.closed.load(Ordering::SeqCst) {
                return true;
            }
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.polls_until_closed {
                self.closed.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn await_closed_resolves_after_enough_polls() {
        let window = CountdownWindow::new(4);
        await_closed(&window, Duration::from_millis(1)).await;
        assert_eq!(window.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn await_closed_resolves_immediately_for_closed_window() {
        let window = CountdownWindow::new(1);
        await_closed(&window, Duration::from_millis(1)).await;
        assert!(window.is_closed().await);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let window = CountdownWindow::new(usize::MAX);
        window.close().await;
        window.close().await;
        assert!(window.is_closed().await);
    }

    #[tokio::test]
    async fn spawn_failure_is_blocked_error() {
        let opener = ProcessWindowOpener::new("/nonexistent/browser-binary");
        let result = opener.open(
            "http://127.0.0.1:8000/integrations/hubspot/authorize",
            "HubSpot Authorization",
            PopupGeometry {
                width: 600,
                height: 600,
            },
        );
        assert!(matches!(result, Err(PopupError::Blocked(_))));
    }
}
