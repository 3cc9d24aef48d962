//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text. The one distinction worth extra care: a failed reload
//! means the data IS saved -- the help text says so.

use miette::Diagnostic;
use thiserror::Error;

use frpsite_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Admin API boundary ───────────────────────────────────────────

    #[error("Could not fetch the configuration")]
    #[diagnostic(
        code(frpsite::fetch_failed),
        help(
            "Check that frpc is running and its admin port is reachable.\n\
             Reason: {reason}\n\
             Try: frpsite detect"
        )
    )]
    FetchFailed { reason: String },

    #[error("Could not save the configuration")]
    #[diagnostic(
        code(frpsite::save_failed),
        help(
            "Nothing was written; your changes were not applied.\n\
             Reason: {reason}"
        )
    )]
    SaveFailed { reason: String },

    #[error("Configuration saved, but frpc did not reload it")]
    #[diagnostic(
        code(frpsite::reload_failed),
        help(
            "Your changes ARE persisted; the running frpc is still on the\n\
             old configuration. Re-run `frpsite push` to retry the reload.\n\
             Reason: {reason}"
        )
    )]
    ReloadFailed { reason: String },

    #[error("No frpc admin port found on {host}")]
    #[diagnostic(
        code(frpsite::no_admin_port),
        help(
            "None of the probed ports answered. Pin one in your profile\n\
             (admin_port = ...) or pass --endpoint."
        )
    )]
    NoAdminPort { host: String },

    // ── Registry ─────────────────────────────────────────────────────

    #[error("Site '{mac}' not found")]
    #[diagnostic(
        code(frpsite::site_not_found),
        help("Run: frpsite sites list to see registered sites")
    )]
    SiteNotFound { mac: String },

    #[error("{what}")]
    #[diagnostic(code(frpsite::conflict))]
    Conflict { what: String },

    #[error("No free bind port in {start}..={max}")]
    #[diagnostic(
        code(frpsite::ports_exhausted),
        help("Lower start_port in your profile or delete unused proxies.")
    )]
    PortsExhausted { start: u16, max: u16 },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(frpsite::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(frpsite::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: frpsite config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(frpsite::config))]
    Config(#[from] frpsite_config::ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(frpsite::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    #[diagnostic(code(frpsite::url))]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    #[diagnostic(code(frpsite::api))]
    Api(#[from] frpsite_api::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FetchFailed { .. } | Self::NoAdminPort { .. } => exit_code::CONNECTION,
            Self::Api(frpsite_api::Error::Unauthorized) => exit_code::AUTH,
            Self::SiteNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DuplicateMac { .. }
            | CoreError::DuplicateSiteCode { .. }
            | CoreError::DuplicateBindPort { .. } => CliError::Conflict {
                what: err.to_string(),
            },

            CoreError::SiteNotFound { mac } => CliError::SiteNotFound {
                mac: mac.to_string(),
            },

            CoreError::PortRangeExhausted { start, max } => {
                CliError::PortsExhausted { start, max }
            }

            CoreError::Fetch { reason } => CliError::FetchFailed { reason },
            CoreError::Save { reason } => CliError::SaveFailed { reason },
            CoreError::Reload { reason } => CliError::ReloadFailed { reason },

            CoreError::NoBaseline => CliError::Validation {
                field: "state".into(),
                reason: "save attempted before any successful load".into(),
            },
        }
    }
}
