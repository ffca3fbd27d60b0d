//! Connection orchestrator.
//!
//! Drives one authorization attempt per provider selection: opens the
//! popup, waits for it to close, fetches the resulting credential, and
//! transitions `Idle → Connecting → (Connected | Failed | Cancelled)`.
//!
//! Popup closure is the only completion signal the flow has. A user who
//! closes the window before finishing authorization looks identical to one
//! whose provider finished and auto-closed it; whether a credential is then
//! found in the store is the only discriminator.

use crate::config::HubConfig;
use crate::credentials::{Credential, CredentialClient};
use crate::events::{EventBroadcaster, CONNECTION_STATE_CHANGED};
use crate::identity::Identity;
use crate::popup::{await_closed, AuthWindow, PopupError, WindowOpener};
use crate::provider::ProviderKind;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ─── States ──────────────────────────────────────────────────────────────────

/// Reason carried by the `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectFailure {
    /// The environment refused to create the authorization window.
    PopupBlocked,
    /// No credential was found after the window closed, or the fetch failed.
    CredentialUnavailable,
    /// The bounded wait for window closure elapsed.
    Timeout,
}

/// Connection attempt state. `Connected`, `Failed`, and `Cancelled` are
/// terminal for the attempt; a fresh `connect` re-enters `Connecting`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected { credential: Credential },
    Failed { reason: ConnectFailure },
    Cancelled,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Failed { .. } => "failed",
            ConnectionState::Cancelled => "cancelled",
        }
    }
}

/// Errors returned by `connect` itself. Flow outcomes (blocked popup,
/// missing credential, timeout) are reported through the state instead.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// An attempt is already in flight; it keeps running untouched. The
    /// caller cancels explicitly if it wants a fresh attempt.
    #[error("a connection attempt is already in progress")]
    AttemptInProgress,
}

// ─── Attempt ─────────────────────────────────────────────────────────────────

struct Attempt {
    id: u64,
    window: Arc<dyn AuthWindow>,
    task: Option<JoinHandle<()>>,
}

/// The connection orchestrator. Exclusively owns the single in-flight
/// attempt; no other component holds its window handle or poll task.
pub struct ConnectionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<HubConfig>,
    client: Arc<CredentialClient>,
    opener: Arc<dyn WindowOpener>,
    broadcaster: Arc<EventBroadcaster>,
    provider: RwLock<Option<ProviderKind>>,
    state: RwLock<ConnectionState>,
    attempt: Mutex<Option<Attempt>>,
    next_attempt_id: AtomicU64,
}

impl ConnectionOrchestrator {
    pub fn new(
        config: Arc<HubConfig>,
        client: Arc<CredentialClient>,
        opener: Arc<dyn WindowOpener>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                client,
                opener,
                broadcaster,
                provider: RwLock::new(None),
                state: RwLock::new(ConnectionState::Idle),
                attempt: Mutex::new(None),
                next_attempt_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current state snapshot.
    pub async fn current_state(&self) -> ConnectionState {
        self.inner.state.read().await.clone()
    }

    /// The held credential, present only while `Connected`.
    pub async fn credential(&self) -> Option<Credential> {
        match &*self.inner.state.read().await {
            ConnectionState::Connected { credential } => Some(credential.clone()),
            _ => None,
        }
    }

    /// Start one authorization attempt for `provider` / `identity`.
    ///
    /// Side-effect driven: completion is observed through the state and the
    /// `connection.stateChanged` notification. Exactly one window is opened
    /// per attempt, and at most one credential fetch is issued, only after
    /// the window has closed.
    pub async fn connect(
        &self,
        provider: ProviderKind,
        identity: Identity,
    ) -> Result<(), ConnectError> {
        let inner = &self.inner;

        // Check-then-register under one lock so two concurrent connects
        // cannot both pass the in-flight guard.
        let mut attempt_slot = inner.attempt.lock().await;
        if attempt_slot.is_some() {
            return Err(ConnectError::AttemptInProgress);
        }

        *inner.provider.write().await = Some(provider);
        inner.transition(ConnectionState::Connecting).await;

        let descriptor = provider.descriptor();
        let url = descriptor.authorize_url(&inner.config.backend.base_url);
        let window = match inner.opener.open(
            &url,
            descriptor.popup_title,
            inner.config.popup_geometry(),
        ) {
            Ok(window) => window,
            Err(PopupError::Blocked(detail)) => {
                warn!(provider = provider.slug(), detail = %detail, "authorization window blocked");
                drop(attempt_slot);
                inner
                    .transition(ConnectionState::Failed {
                        reason: ConnectFailure::PopupBlocked,
                    })
                    .await;
                return Ok(());
            }
        };

        let id = inner.next_attempt_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            provider = provider.slug(),
            user = %identity.user,
            attempt = id,
            "connection attempt started"
        );

        *attempt_slot = Some(Attempt {
            id,
            window: window.clone(),
            task: None,
        });

        let task_inner = Arc::clone(inner);
        let task = tokio::spawn(async move {
            let outcome = task_inner.run_attempt(&window, provider, &identity).await;
            task_inner.apply_outcome(id, outcome).await;
        });
        if let Some(attempt) = attempt_slot.as_mut() {
            attempt.task = Some(task);
        }
        Ok(())
    }

    /// Cancel the in-flight attempt, if any. The poll task is aborted, the
    /// window is torn down, and a late fetch response for the attempt is
    /// discarded. Safe to call when nothing is in flight.
    pub async fn cancel(&self) {
        if self.inner.teardown_attempt().await {
            self.inner.transition(ConnectionState::Cancelled).await;
        }
    }

    /// Change the selected provider.
    ///
    /// An in-flight attempt is cancelled and a held credential is
    /// invalidated: records must never be shown under a credential from a
    /// different provider.
    pub async fn set_provider(&self, provider: Option<ProviderKind>) {
        let inner = &self.inner;
        let previous = {
            let mut slot = inner.provider.write().await;
            std::mem::replace(&mut *slot, provider)
        };
        if previous == provider {
            return;
        }
        if inner.teardown_attempt().await {
            inner.transition(ConnectionState::Cancelled).await;
            return;
        }
        if matches!(*inner.state.read().await, ConnectionState::Connected { .. }) {
            info!(
                provider = provider.map(|p| p.slug()).unwrap_or("none"),
                "provider changed, stored credential invalidated"
            );
            inner.transition(ConnectionState::Idle).await;
        }
    }
}

impl Inner {
    /// One attempt: wait (bounded) for window closure, then fetch the
    /// credential once.
    async fn run_attempt(
        &self,
        window: &Arc<dyn AuthWindow>,
        provider: ProviderKind,
        identity: &Identity,
    ) -> ConnectionState {
        let wait = await_closed(window.as_ref(), self.config.poll_interval());
        if tokio::time::timeout(self.config.connect_timeout(), wait)
            .await
            .is_err()
        {
            warn!(
                provider = provider.slug(),
                "authorization window did not close in time"
            );
            return ConnectionState::Failed {
                reason: ConnectFailure::Timeout,
            };
        }

        // The window is gone. Whether authorization actually completed is
        // only observable through the credential store.
        match self.client.fetch_credential(provider, identity).await {
            Ok(Some(credential)) => ConnectionState::Connected { credential },
            Ok(None) => {
                debug!(
                    provider = provider.slug(),
                    "no credential found after window closed"
                );
                ConnectionState::Failed {
                    reason: ConnectFailure::CredentialUnavailable,
                }
            }
            Err(err) => {
                warn!(provider = provider.slug(), err = %err, "credential fetch failed");
                ConnectionState::Failed {
                    reason: ConnectFailure::CredentialUnavailable,
                }
            }
        }
    }

    /// Apply a terminal outcome for attempt `id`. Outcomes of a superseded
    /// attempt are discarded: a stale fetch response must not transition
    /// state the attempt no longer owns.
    async fn apply_outcome(&self, id: u64, outcome: ConnectionState) {
        let mut attempt_slot = self.attempt.lock().await;
        let attempt = match attempt_slot.take() {
            Some(attempt) if attempt.id == id => attempt,
            other => {
                *attempt_slot = other;
                debug!(attempt = id, "discarding outcome of superseded attempt");
                return;
            }
        };
        drop(attempt_slot);

        attempt.window.close().await;
        self.transition(outcome).await;
    }

    /// Tear down the current attempt: abort its poll task and close its
    /// window. Returns whether one existed. Idempotent.
    async fn teardown_attempt(&self) -> bool {
        let attempt = self.attempt.lock().await.take();
        match attempt {
            Some(attempt) => {
                if let Some(task) = attempt.task {
                    task.abort();
                }
                attempt.window.close().await;
                info!(attempt = attempt.id, "connection attempt torn down");
                true
            }
            None => false,
        }
    }

    async fn transition(&self, next: ConnectionState) {
        {
            let mut state = self.state.write().await;
            *state = next.clone();
        }
        info!(state = next.label(), "connection state changed");
        self.broadcaster
            .broadcast(CONNECTION_STATE_CHANGED, json!({ "state": next }));
    }
}
