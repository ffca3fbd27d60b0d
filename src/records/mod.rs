//! Record-set view model.
//!
//! The ordered records returned after a successful load. Read-only display
//! data, not cached beyond the current view; accessors render absent fields
//! as `"not available"` instead of failing, since provider data is routinely
//! partial.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder shown for absent or unusable fields.
pub const NOT_AVAILABLE: &str = "not available";

/// Opaque identifier of a loaded record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSetHandle(pub String);

impl RecordSetHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordSetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One provider record: an id plus a free-form metadata mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl IntegrationRecord {
    /// String metadata field; `None` when absent, non-string, or blank.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Metadata field rendered for display.
    pub fn display_field(&self, key: &str) -> &str {
        self.field(key).unwrap_or(NOT_AVAILABLE)
    }

    pub fn email(&self) -> &str {
        self.display_field("email")
    }

    pub fn phone(&self) -> &str {
        self.display_field("phone")
    }

    pub fn company(&self) -> &str {
        self.display_field("company")
    }

    pub fn job_title(&self) -> &str {
        self.display_field("jobtitle")
    }

    /// Creation date as `YYYY-MM-DD`, or the placeholder when the timestamp
    /// is absent or unparseable.
    pub fn created_date(&self) -> String {
        self.field("createdAt")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}
