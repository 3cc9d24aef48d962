// ── Core error types ──
//
// User-facing errors from frpsite-core. These are NOT transport-specific --
// consumers never see reqwest failures or HTTP status codes directly. The
// sync layer translates `frpsite_api::Error` into the boundary variants,
// keeping "not saved" (Save) distinct from "saved but not live" (Reload).

use thiserror::Error;

use crate::model::MacAddress;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registry errors ──────────────────────────────────────────────
    #[error("A site with MAC address {mac} already exists")]
    DuplicateMac { mac: MacAddress },

    #[error("Site code '{code}' is already in use")]
    DuplicateSiteCode { code: String },

    #[error("No site with MAC address {mac}")]
    SiteNotFound { mac: MacAddress },

    #[error("Bind port {port} is already in use")]
    DuplicateBindPort { port: u16 },

    // ── Port allocation ──────────────────────────────────────────────
    #[error("No free bind port in {start}..={max}")]
    PortRangeExhausted { start: u16, max: u16 },

    // ── Admin API boundary ───────────────────────────────────────────
    #[error("Failed to fetch configuration: {reason}")]
    Fetch { reason: String },

    #[error("Failed to save configuration: {reason}")]
    Save { reason: String },

    #[error("Configuration saved, but reload failed: {reason}")]
    Reload { reason: String },

    #[error("No configuration loaded yet -- load before saving")]
    NoBaseline,
}

impl CoreError {
    /// Returns `true` if the persisted configuration reflects the
    /// registry despite this error (only the running process is stale).
    pub fn is_saved_but_stale(&self) -> bool {
        matches!(self, Self::Reload { .. })
    }
}
