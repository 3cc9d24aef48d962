//! Profile resolution for the CLI: config file + CLI flag overrides.

use frpsite_config::{Config, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The profile name the CLI should act on.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the active profile with CLI flag overrides applied.
///
/// An explicitly requested profile must exist; the implicit default may
/// fall back to a stock profile so the zero-config localhost case works.
pub fn resolve_profile(global: &GlobalOpts) -> Result<(Profile, String), CliError> {
    let cfg = frpsite_config::load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: available.join(", "),
            });
        }
        None => Profile::default(),
    };

    if let Some(ref endpoint) = global.endpoint {
        profile.endpoint = Some(endpoint.clone());
    }
    if let Some(ref username) = global.username {
        profile.username = username.clone();
    }
    if let Some(ref prefix) = global.prefix {
        profile.proxy_prefix = prefix.clone();
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok((profile, name))
}
