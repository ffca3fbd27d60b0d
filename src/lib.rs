//! SaaS integration connection orchestration.
//!
//! Attaches a third-party provider account (HubSpot, Airtable, Notion) to a
//! local integration record by running the provider's OAuth flow in a popup
//! window, then exchanges the stored credential for the provider's records.
//!
//! The host embeds one [`AppContext`] and drives it: provider selection →
//! [`connect::ConnectionOrchestrator::connect`] → `connection.stateChanged`
//! notifications → [`pipeline::DataLoadPipeline::load`] → record display.

pub mod config;
pub mod connect;
pub mod credentials;
pub mod events;
pub mod identity;
pub mod observability;
pub mod pipeline;
pub mod popup;
pub mod provider;
pub mod records;

use std::sync::Arc;

use config::HubConfig;
use connect::ConnectionOrchestrator;
use credentials::CredentialClient;
use events::EventBroadcaster;
use pipeline::DataLoadPipeline;
use popup::{ProcessWindowOpener, WindowOpener};

/// Shared application state handed to the host: one value wired through the
/// call chain instead of ambient shared state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<HubConfig>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub orchestrator: Arc<ConnectionOrchestrator>,
    pub pipeline: Arc<DataLoadPipeline>,
}

impl AppContext {
    /// Wire the components together. `opener` is the window seam: the
    /// process-spawning opener in production, a scripted one in tests.
    pub fn new(config: HubConfig, opener: Arc<dyn WindowOpener>) -> Self {
        let config = Arc::new(config);
        let broadcaster = Arc::new(EventBroadcaster::new());
        let client = Arc::new(CredentialClient::new(config.backend.base_url.clone()));
        let orchestrator = Arc::new(ConnectionOrchestrator::new(
            config.clone(),
            client.clone(),
            opener,
            broadcaster.clone(),
        ));
        let pipeline = Arc::new(DataLoadPipeline::new(
            config.clone(),
            client,
            broadcaster.clone(),
        ));
        Self {
            config,
            broadcaster,
            orchestrator,
            pipeline,
        }
    }

    /// Context that opens real windows with the configured browser command.
    pub fn with_process_windows(config: HubConfig) -> Self {
        let opener = Arc::new(ProcessWindowOpener::new(config.popup.browser_command.clone()));
        Self::new(config, opener)
    }
}
