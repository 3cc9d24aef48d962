// ── Config synchronization ──
//
// Orchestrates the registry against the frpc admin API. `load` is
// fetch → parse → seeded grouping; `save` is resolve pending ports →
// rehydrate baseline → generate → PUT → reload. A failed save leaves
// the registry as the source of truth and is safely retryable: saving
// unchanged state produces byte-identical output.

use tracing::{debug, info};

use frpsite_api::AdminClient;

use crate::error::CoreError;
use crate::registry::SiteRegistry;
use crate::transcode;

/// What a successful `load` brought in.
#[derive(Debug, Clone, Copy)]
pub struct LoadOutcome {
    pub site_count: usize,
    pub proxy_count: usize,
    pub warning_count: usize,
}

/// What a successful `save` pushed out.
#[derive(Debug, Clone, Copy)]
pub struct SaveOutcome {
    pub site_count: usize,
    /// How many sentinel bind ports were allocated during this save.
    pub resolved_ports: usize,
    pub bytes: usize,
}

/// Load/save driver between a [`SiteRegistry`] and the admin API.
///
/// One in-flight request at a time by construction: both operations
/// borrow the registry mutably for their full duration.
pub struct ConfigSync {
    client: AdminClient,
}

impl ConfigSync {
    pub fn new(client: AdminClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AdminClient {
        &self.client
    }

    /// Fetch the current configuration and rebuild the registry from it.
    ///
    /// Parsing never fails -- malformed content degrades to warnings --
    /// so the only error here is the fetch itself. Devices with zero
    /// proxies are retained.
    pub async fn load(&self, registry: &mut SiteRegistry) -> Result<LoadOutcome, CoreError> {
        let text = self
            .client
            .get_config()
            .await
            .map_err(|e| CoreError::Fetch {
                reason: e.to_string(),
            })?;

        let parsed = transcode::parse(&text);
        let sites = transcode::sites_from_config(&parsed);
        let outcome = LoadOutcome {
            site_count: sites.len(),
            proxy_count: parsed.stcp_configs.len(),
            warning_count: parsed.warnings.len(),
        };
        info!(
            sites = outcome.site_count,
            proxies = outcome.proxy_count,
            warnings = outcome.warning_count,
            "configuration loaded"
        );

        registry.install_loaded(sites, parsed);
        Ok(outcome)
    }

    /// Serialize the registry and push it live.
    ///
    /// Requires a prior successful [`load`](Self::load) -- the retained
    /// baseline is where `common` and unrecognized sections come from.
    /// A `Reload` error means the configuration IS durably saved; only
    /// the running tunnel client is still on the old one until a retry
    /// succeeds.
    pub async fn save(&self, registry: &mut SiteRegistry) -> Result<SaveOutcome, CoreError> {
        if !registry.has_baseline() {
            return Err(CoreError::NoBaseline);
        }

        let resolved_ports = registry.resolve_pending_ports()?;
        let doc = registry.snapshot_config()?;
        let text = transcode::generate(&doc);
        debug!(bytes = text.len(), "pushing configuration");

        self.client
            .put_config(&text)
            .await
            .map_err(|e| CoreError::Save {
                reason: e.to_string(),
            })?;
        registry.mark_saved(doc);

        self.client
            .reload()
            .await
            .map_err(|e| CoreError::Reload {
                reason: e.to_string(),
            })?;

        let outcome = SaveOutcome {
            site_count: registry.len(),
            resolved_ports,
            bytes: text.len(),
        };
        info!(
            sites = outcome.site_count,
            resolved_ports, "configuration saved and reloaded"
        );
        Ok(outcome)
    }
}
