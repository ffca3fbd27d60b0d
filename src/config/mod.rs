//! Host configuration.
//!
//! The only externally configurable values: the backend base URL, popup
//! geometry and browser command, the closed-poll interval, the bounded
//! connect wait, and the optional shortcut record-set identifier. Loaded
//! from a TOML file with environment overrides; a missing file yields the
//! defaults.

use crate::popup::PopupGeometry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_POPUP_WIDTH: u32 = 600;
const DEFAULT_POPUP_HEIGHT: u32 = 600;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BROWSER_COMMAND: &str = "chromium";

// ─── BackendConfig ───────────────────────────────────────────────────────────

/// Backend collaborator endpoints (`[backend]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the credential store and item service.
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

// ─── PopupConfig ─────────────────────────────────────────────────────────────

/// Authorization window configuration (`[popup]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// Interval between closed-state polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Command used to open the authorization window. The URL is appended
    /// as `--app=<url>`, geometry as `--window-size=<w>,<h>`.
    pub browser_command: String,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_POPUP_WIDTH,
            height: DEFAULT_POPUP_HEIGHT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            browser_command: DEFAULT_BROWSER_COMMAND.to_string(),
        }
    }
}

// ─── ConnectConfig ───────────────────────────────────────────────────────────

/// Connection attempt limits (`[connect]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Bounded wait for window closure, in seconds. When it elapses the
    /// attempt fails with a timeout reason.
    pub timeout_secs: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

// ─── RecordsConfig ───────────────────────────────────────────────────────────

/// Record viewing configuration (`[records]` in config.toml).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// Record-set identifier for the fixed shortcut view. `None` disables
    /// the shortcut entry point.
    pub shortcut_record_set_id: Option<String>,
}

// ─── HubConfig ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HubConfig {
    pub backend: BackendConfig,
    pub popup: PopupConfig,
    pub connect: ConnectConfig,
    pub records: RecordsConfig,
}

impl HubConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides (`HUB_BASE_URL`, `HUB_SHORTCUT_RECORD_SET`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", p.display()))?
            }
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("HUB_BASE_URL") {
            if !url.is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(id) = std::env::var("HUB_SHORTCUT_RECORD_SET") {
            if !id.is_empty() {
                self.records.shortcut_record_set_id = Some(id);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.backend.base_url.is_empty(),
            "backend.base_url must not be empty"
        );
        anyhow::ensure!(
            self.popup.poll_interval_ms > 0,
            "popup.poll_interval_ms must be positive"
        );
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.popup.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect.timeout_secs)
    }

    pub fn popup_geometry(&self) -> PopupGeometry {
        PopupGeometry {
            width: self.popup.width,
            height: self.popup.height,
        }
    }
}
