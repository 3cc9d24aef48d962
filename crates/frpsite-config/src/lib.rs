//! Shared configuration for the frpsite CLI.
//!
//! TOML profiles, admin-credential resolution (env + keyring +
//! plaintext, with frpc's well-known `admin:admin` as the last resort),
//! and translation into the transport/registry settings the other
//! crates consume.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use frpsite_api::{AdminAuth, TlsMode, TransportConfig};
use frpsite_core::SiteRegistry;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named frpc-instance profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named frpc-instance profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Full admin endpoint URL (e.g., "http://127.0.0.1:7400").
    /// When absent, `host` + `admin_port` are used; when those are
    /// absent too, the CLI falls back to port probing.
    pub endpoint: Option<String>,

    /// Host the frpc admin port lives on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Admin port, when known.
    pub admin_port: Option<u16>,

    /// Admin username (frpc's `admin_user`).
    #[serde(default = "default_username")]
    pub username: String,

    /// Admin password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the admin password.
    pub password_env: Option<String>,

    /// First bind port considered for allocation.
    #[serde(default = "default_start_port")]
    pub start_port: u16,

    /// Proxy-name prefix (`R-<MAC>-<port>` by default).
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept self-signed certificates.
    pub insecure: Option<bool>,

    /// Override request timeout in seconds.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: None,
            host: default_host(),
            admin_port: None,
            username: default_username(),
            password: None,
            password_env: None,
            start_port: default_start_port(),
            proxy_prefix: default_proxy_prefix(),
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_username() -> String {
    "admin".into()
}
fn default_start_port() -> u16 {
    18000
}
fn default_proxy_prefix() -> String {
    "R".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "frpsite", "frpsite").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("frpsite");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("FRPSITE_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the admin password from the credential chain.
///
/// Order: profile's `password_env` → `FRPSITE_ADMIN_PASSWORD` → system
/// keyring → plaintext in config → frpc's stock `admin`. There is no
/// "no credentials" failure here: an unconfigured frpc admin port
/// accepts the stock pair.
pub fn resolve_admin_password(profile: &Profile, profile_name: &str) -> SecretString {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return SecretString::from(val);
        }
    }

    if let Ok(val) = std::env::var("FRPSITE_ADMIN_PASSWORD") {
        return SecretString::from(val);
    }

    if let Ok(entry) = keyring::Entry::new("frpsite", &format!("{profile_name}/admin-password")) {
        if let Ok(secret) = entry.get_password() {
            return SecretString::from(secret);
        }
    }

    if let Some(ref password) = profile.password {
        return SecretString::from(password.clone());
    }

    SecretString::from("admin".to_owned())
}

/// Resolve the full basic-auth pair for a profile.
pub fn resolve_admin_auth(profile: &Profile, profile_name: &str) -> AdminAuth {
    AdminAuth::new(
        profile.username.clone(),
        resolve_admin_password(profile, profile_name),
    )
}

/// Store an admin password in the system keyring.
pub fn store_admin_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new("frpsite", &format!("{profile_name}/admin-password"))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })?;
    entry.set_password(password).map_err(|e| ConfigError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    })
}

// ── Translation to other crates' settings ───────────────────────────

/// Build a `TransportConfig` from a profile.
pub fn profile_to_transport(profile: &Profile) -> TransportConfig {
    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(default_timeout())),
    }
}

/// Build an empty `SiteRegistry` with the profile's allocation settings.
pub fn profile_to_registry(profile: &Profile) -> SiteRegistry {
    SiteRegistry::with_options(profile.start_port, profile.proxy_prefix.clone())
}

/// Resolve the admin endpoint URL, if the profile pins one.
///
/// `None` means "unknown -- probe for it".
pub fn resolve_endpoint(profile: &Profile) -> Result<Option<url::Url>, ConfigError> {
    if let Some(ref endpoint) = profile.endpoint {
        let url = endpoint.parse().map_err(|_| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("invalid URL: {endpoint}"),
        })?;
        return Ok(Some(url));
    }
    if let Some(port) = profile.admin_port {
        let raw = format!("http://{}:{port}", profile.host);
        let url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "host".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        return Ok(Some(url));
    }
    Ok(None)
}
