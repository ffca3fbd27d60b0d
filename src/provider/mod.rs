//! Provider registry.
//!
//! Maps a provider key to its capability bundle: the authorize endpoint the
//! popup opens against and the labels the host displays. Selection is purely
//! data-driven: adding a provider means one enum variant and one table
//! entry, no shared base type.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The closed set of providers an integration can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    HubSpot,
    Airtable,
    Notion,
}

impl ProviderKind {
    /// Every known provider, in display order.
    pub fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::HubSpot,
            ProviderKind::Airtable,
            ProviderKind::Notion,
        ]
    }

    /// Capability bundle for this provider.
    pub fn descriptor(self) -> &'static ProviderDescriptor {
        &REGISTRY[&self]
    }

    /// Backend path segment for this provider's endpoints.
    pub fn slug(self) -> &'static str {
        self.descriptor().slug
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.descriptor().label)
    }
}

/// Raised when a host-supplied provider name matches nothing in the registry.
#[derive(Debug, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl std::str::FromStr for ProviderKind {
    type Err = UnknownProvider;

    /// Accepts the display label or the backend slug, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ProviderKind::all()
            .iter()
            .copied()
            .find(|kind| {
                let desc = kind.descriptor();
                desc.slug == lower || desc.label.to_lowercase() == lower
            })
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Per-provider behavior: everything the connection flow needs to know about
/// a provider lives here, not in a class hierarchy.
#[derive(Debug)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    /// Human-readable name shown in the host UI.
    pub label: &'static str,
    /// Backend path segment (`/integrations/{slug}/...`).
    pub slug: &'static str,
    /// Title for the authorization window.
    pub popup_title: &'static str,
}

impl ProviderDescriptor {
    /// Initial location for the authorization popup. The backend redirects
    /// from here to the provider's consent screen.
    pub fn authorize_url(&self, base_url: &str) -> String {
        format!(
            "{}/integrations/{}/authorize",
            base_url.trim_end_matches('/'),
            self.slug
        )
    }
}

static REGISTRY: Lazy<HashMap<ProviderKind, ProviderDescriptor>> = Lazy::new(|| {
    HashMap::from([
        (
            ProviderKind::HubSpot,
            ProviderDescriptor {
                kind: ProviderKind::HubSpot,
                label: "HubSpot",
                slug: "hubspot",
                popup_title: "HubSpot Authorization",
            },
        ),
        (
            ProviderKind::Airtable,
            ProviderDescriptor {
                kind: ProviderKind::Airtable,
                label: "Airtable",
                slug: "airtable",
                popup_title: "Airtable Authorization",
            },
        ),
        (
            ProviderKind::Notion,
            ProviderDescriptor {
                kind: ProviderKind::Notion,
                label: "Notion",
                slug: "notion",
                popup_title: "Notion Authorization",
            },
        ),
    ])
});
