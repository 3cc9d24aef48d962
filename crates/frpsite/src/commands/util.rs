//! Shared helpers for command handlers.

use std::path::Path;

use url::Url;

use frpsite_api::{AdminClient, DEFAULT_PROBE_PORTS, detect_admin_port};
use frpsite_config::Profile;
use frpsite_core::model::Site;
use frpsite_core::{ConfigSync, LoadOutcome, MacAddress, SaveOutcome, SiteRegistry};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// One CLI invocation's view of the live configuration: every mutating
/// command is load → mutate → save against this.
pub struct Session {
    pub sync: ConfigSync,
    pub registry: SiteRegistry,
}

impl Session {
    pub async fn load(&mut self) -> Result<LoadOutcome, CliError> {
        Ok(self.sync.load(&mut self.registry).await?)
    }

    pub async fn save(&mut self) -> Result<SaveOutcome, CliError> {
        Ok(self.sync.save(&mut self.registry).await?)
    }
}

/// Build a session from the active profile, probing for the admin port
/// when the profile doesn't pin one.
pub async fn open_session(global: &GlobalOpts) -> Result<Session, CliError> {
    let (profile, profile_name) = config::resolve_profile(global)?;
    let transport = frpsite_config::profile_to_transport(&profile);
    let auth = frpsite_config::resolve_admin_auth(&profile, &profile_name);

    let base = match frpsite_config::resolve_endpoint(&profile)? {
        Some(url) => url,
        None => {
            let port = detect_admin_port(&profile.host, DEFAULT_PROBE_PORTS, Some(&auth), &transport)
                .await
                .ok_or_else(|| CliError::NoAdminPort {
                    host: profile.host.clone(),
                })?;
            Url::parse(&format!("http://{}:{port}", profile.host))?
        }
    };

    let client = AdminClient::new(base, Some(auth), &transport)?;
    Ok(Session {
        sync: ConfigSync::new(client),
        registry: frpsite_config::profile_to_registry(&profile),
    })
}

/// Open a session and load the live configuration in one step.
pub async fn open_loaded(global: &GlobalOpts) -> Result<Session, CliError> {
    let mut session = open_session(global).await?;
    session.load().await?;
    Ok(session)
}

/// Parse a MAC argument, insisting on the canonical 12-hex shape for
/// values the operator types in.
pub fn parse_mac(raw: &str) -> Result<MacAddress, CliError> {
    let mac = MacAddress::new(raw);
    if !mac.is_well_formed() {
        return Err(CliError::Validation {
            field: "mac".into(),
            reason: format!("'{raw}' is not a 12-digit hex MAC address"),
        });
    }
    Ok(mac)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read and parse a JSON site list for `import`.
pub fn read_sites_file(path: &Path) -> Result<Vec<Site>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
