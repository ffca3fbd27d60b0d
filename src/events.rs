// SPDX-License-Identifier: MIT
//! Push notifications for state changes.
//!
//! Broadcasts JSON notifications to every subscribed listener. The host UI
//! subscribes once and reacts to `connection.stateChanged` and
//! `records.loaded`; having zero subscribers is not an error.

use serde_json::Value;
use tokio::sync::broadcast;

/// Fired on every orchestrator state transition.
pub const CONNECTION_STATE_CHANGED: &str = "connection.stateChanged";
/// Fired when a record set becomes viewable.
pub const RECORDS_LOADED: &str = "records.loaded";

#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Send a notification to all subscribed listeners.
    pub fn broadcast(&self, event: &str, params: Value) {
        let notification = serde_json::json!({
            "event": event,
            "params": params
        });
        // Ignore errors — no subscribers is fine
        let _ = self
            .tx
            .send(serde_json::to_string(&notification).unwrap_or_default());
    }

    /// Subscribe to all broadcast notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
