// SPDX-License-Identifier: MIT
//! Structured logging helpers.
//!
//! Subscriber initialization for hosts and tests, plus round-trip latency
//! tracking for backend calls.

use std::time::Instant;
use tracing::{debug, info};

/// Initialize the global tracing subscriber.
///
/// An explicit `filter` wins; otherwise `RUST_LOG` is honored, falling back
/// to `info`. Calling more than once is a no-op.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = match filter {
        Some(f) => tracing_subscriber::EnvFilter::new(f),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

/// Track latency of one backend call and emit a structured log event.
pub struct LatencyTracker {
    operation: &'static str,
    provider: &'static str,
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking latency for an operation.
    ///
    /// Examples:
    ///   let tracker = LatencyTracker::start("credentials.fetch", "hubspot");
    pub fn start(operation: &'static str, provider: &'static str) -> Self {
        Self {
            operation,
            provider,
            start: Instant::now(),
        }
    }

    /// Finish tracking and emit a log event with the elapsed time.
    pub fn finish(self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        if elapsed_ms > 1000 {
            // Slow backend call — log at info level
            info!(
                operation = self.operation,
                provider = self.provider,
                elapsed_ms = elapsed_ms,
                "slow backend call"
            );
        } else {
            debug!(
                operation = self.operation,
                provider = self.provider,
                elapsed_ms = elapsed_ms,
                "backend call complete"
            );
        }
    }
}
