//! Data load pipeline.
//!
//! Exchanges a stored credential for a record-set handle, then the handle
//! for the ordered record list. Pipeline failures surface as displayable
//! messages and never touch the connection state machine.

use crate::config::HubConfig;
use crate::credentials::{ClientError, Credential, CredentialClient};
use crate::events::{EventBroadcaster, RECORDS_LOADED};
use crate::provider::ProviderKind;
use crate::records::{IntegrationRecord, RecordSetHandle};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Errors surfaced by the pipeline. All are user-displayable; none are
/// retried, since re-invoking `load` is the recovery path.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The backend rejected the load; the message is its `detail` field.
    #[error("{0}")]
    Backend(String),
    /// Neither the load response nor the credential carried a record-set
    /// identifier.
    #[error("no record-set identifier in response or credential")]
    MissingIdentifier,
    /// The request never reached the backend.
    #[error("failed to load data: {0}")]
    Transport(String),
}

impl From<ClientError> for LoadError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { detail, .. } => LoadError::Backend(detail),
            other => LoadError::Transport(other.to_string()),
        }
    }
}

pub struct DataLoadPipeline {
    config: Arc<HubConfig>,
    client: Arc<CredentialClient>,
    broadcaster: Arc<EventBroadcaster>,
}

impl DataLoadPipeline {
    pub fn new(
        config: Arc<HubConfig>,
        client: Arc<CredentialClient>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            config,
            client,
            broadcaster,
        }
    }

    /// Submit `credential` and resolve the record-set handle.
    ///
    /// The identifier comes from the load response when present, else from
    /// the credential itself. An id missing from the response but embedded
    /// in the credential is success, not an error (compatibility fallback
    /// for backends that return nothing from the load call).
    pub async fn load(
        &self,
        provider: ProviderKind,
        credential: &Credential,
    ) -> Result<RecordSetHandle, LoadError> {
        let response = self.client.submit_credential(provider, credential).await?;
        let record_set_id = response
            .record_set_id()
            .or_else(|| credential.integration_id())
            .ok_or(LoadError::MissingIdentifier)?;

        let handle = RecordSetHandle(record_set_id);
        info!(
            provider = provider.slug(),
            record_set = handle.as_str(),
            "record set loaded"
        );
        self.broadcaster.broadcast(
            RECORDS_LOADED,
            json!({ "provider": provider.slug(), "recordSetId": handle.as_str() }),
        );
        Ok(handle)
    }

    /// Retrieve the ordered records for `handle`.
    pub async fn fetch_records(
        &self,
        provider: ProviderKind,
        handle: &RecordSetHandle,
    ) -> Result<Vec<IntegrationRecord>, LoadError> {
        let records = self.client.fetch_records(provider, handle).await?;
        info!(
            provider = provider.slug(),
            record_set = handle.as_str(),
            count = records.len(),
            "records fetched"
        );
        Ok(records)
    }

    /// The fixed shortcut entry into record-set viewing, bypassing
    /// credential submission entirely. The identifier is configuration
    /// (`records.shortcut_record_set_id`), not business logic; `None` when
    /// unconfigured. Not part of the authorization state machine.
    pub fn shortcut_handle(&self, provider: ProviderKind) -> Option<RecordSetHandle> {
        let id = self.config.records.shortcut_record_set_id.clone()?;
        let handle = RecordSetHandle(id);
        info!(
            provider = provider.slug(),
            record_set = handle.as_str(),
            "shortcut record set opened"
        );
        self.broadcaster.broadcast(
            RECORDS_LOADED,
            json!({
                "provider": provider.slug(),
                "recordSetId": handle.as_str(),
                "shortcut": true
            }),
        );
        Some(handle)
    }
}
