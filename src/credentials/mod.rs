//! Credential store client.
//!
//! Request/response calls against the backend collaborator: fetch the
//! stored credential for an identity, submit a credential to trigger a data
//! load, and retrieve the resulting record set. Every call is single-shot
//! with no internal retry; manual re-invocation is the recovery path.

use crate::identity::Identity;
use crate::observability::LatencyTracker;
use crate::provider::ProviderKind;
use crate::records::{IntegrationRecord, RecordSetHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

// ─── Credential ──────────────────────────────────────────────────────────────

/// Opaque authorization artifact returned by the backend once a provider
/// grants access. Never mutated after creation; a new authorization attempt
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(Value);

impl Credential {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// `true` for JSON null or an empty object, the backend's "nothing
    /// stored yet" shapes.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Access scope granted by the provider.
    pub fn scope(&self) -> Option<&str> {
        self.0.get("scope").and_then(Value::as_str)
    }

    /// Record-set identifier embedded in the credential, when the backend
    /// stored one at authorization time.
    pub fn integration_id(&self) -> Option<String> {
        self.0.get("integration_id").and_then(id_to_string)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

/// Response body of a load submission.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadResponse {
    /// Identifier of the record set created by the load. May be absent;
    /// callers fall back to the credential's own identifier.
    #[serde(default)]
    pub integration_id: Option<Value>,
}

impl LoadResponse {
    pub fn record_set_id(&self) -> Option<String> {
        self.integration_id.as_ref().and_then(id_to_string)
    }
}

/// Identifiers arrive as strings or numbers depending on the provider.
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors surfaced by the credential client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a usable response.
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with an error status; `detail` carries its
    /// user-displayable message when one was provided.
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    /// The response body was not the JSON shape the contract promises.
    #[error("backend response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Stateless HTTP client for the backend credential store and item service.
pub struct CredentialClient {
    http: reqwest::Client,
    base_url: String,
}

impl CredentialClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Fetch the stored credential for `identity`.
    ///
    /// `Ok(None)` when the backend has nothing stored (404 or an empty
    /// body); transport and server failures are `Err`. The orchestrator
    /// collapses both signals into the same "no credential available"
    /// outcome.
    pub async fn fetch_credential(
        &self,
        provider: ProviderKind,
        identity: &Identity,
    ) -> Result<Option<Credential>, ClientError> {
        let url = self.url(&format!(
            "integrations/{}/credentials/{}",
            provider.slug(),
            identity.user
        ));
        let tracker = LatencyTracker::start("credentials.fetch", provider.slug());
        let response = self
            .http
            .get(&url)
            .query(&[("org", identity.org.as_str())])
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            tracker.finish();
            debug!(provider = provider.slug(), user = %identity.user, "no credential stored");
            return Ok(None);
        }
        if !status.is_success() {
            let detail = error_detail(response).await;
            tracker.finish();
            return Err(ClientError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        tracker.finish();
        if body.trim().is_empty() {
            return Ok(None);
        }
        let credential = Credential::new(serde_json::from_str(&body)?);
        if credential.is_empty() {
            Ok(None)
        } else {
            Ok(Some(credential))
        }
    }

    /// Submit a credential to trigger a data load.
    ///
    /// The credential travels as a `credentials` form field holding its
    /// JSON, the shape the backend contract expects.
    pub async fn submit_credential(
        &self,
        provider: ProviderKind,
        credential: &Credential,
    ) -> Result<LoadResponse, ClientError> {
        let url = self.url(&format!("integrations/{}/load", provider.slug()));
        let form = [("credentials", serde_json::to_string(credential.as_json())?)];
        let tracker = LatencyTracker::start("credentials.submit", provider.slug());
        let response = self.http.post(&url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = error_detail(response).await;
            tracker.finish();
            warn!(
                provider = provider.slug(),
                status = status.as_u16(),
                "load submission rejected"
            );
            return Err(ClientError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed = response.json::<LoadResponse>().await?;
        tracker.finish();
        Ok(parsed)
    }

    /// Retrieve the ordered record set for a previously loaded handle.
    pub async fn fetch_records(
        &self,
        provider: ProviderKind,
        handle: &RecordSetHandle,
    ) -> Result<Vec<IntegrationRecord>, ClientError> {
        let url = self.url(&format!(
            "integrations/{}/items/{}",
            provider.slug(),
            handle.as_str()
        ));
        let tracker = LatencyTracker::start("records.fetch", provider.slug());
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = error_detail(response).await;
            tracker.finish();
            return Err(ClientError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let records = response.json().await?;
        tracker.finish();
        Ok(records)
    }
}

/// Extract the backend's `detail` message from an error response, falling
/// back to the raw body, then the canonical status text.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}
