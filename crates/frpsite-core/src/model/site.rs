// ── Site domain types ──
//
// A Site is one managed edge endpoint: its identity metadata (Device,
// persisted in the config's device-registry comment block) plus the
// stcp visitor proxies bound for it.

use serde::{Deserialize, Serialize};

use super::mac::MacAddress;

/// Tunnel mode used for every proxy this tool manages.
pub const STCP_TYPE: &str = "stcp";

/// The management side is always the tunnel consumer.
pub const VISITOR_ROLE: &str = "visitor";

/// Local bind interface default.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Service ports provisioned for a fresh site: SSH, MySQL, web panel.
pub const DEFAULT_SERVICE_PORTS: [u16; 3] = [22, 3306, 5000];

// ── Device ──────────────────────────────────────────────────────────

/// Identity metadata for one site, as stored in the device registry
/// block of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "macAddress")]
    pub mac: MacAddress,

    /// Operator-assigned short identifier; unique when non-empty.
    #[serde(default)]
    pub site_code: String,

    /// Human label.
    #[serde(default)]
    pub site_name: String,

    /// Stored in plaintext in the config file.
    #[serde(default)]
    pub password: String,

    /// Insertion-ordered; uniqueness is enforced at the add-tag
    /// operation, not by the container.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Device {
    pub fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            site_code: String::new(),
            site_name: String::new(),
            password: String::new(),
            tags: Vec::new(),
        }
    }

    /// Placeholder for a proxy section whose `sk` matches no registered
    /// device: the raw sk doubles as code and name.
    pub fn placeholder(sk: &str) -> Self {
        Self {
            mac: MacAddress::new(sk),
            site_code: sk.to_owned(),
            site_name: sk.to_owned(),
            password: String::new(),
            tags: Vec::new(),
        }
    }

    /// Best label for display: name, else code, else the MAC itself.
    pub fn display_name(&self) -> &str {
        if !self.site_name.is_empty() {
            &self.site_name
        } else if !self.site_code.is_empty() {
            &self.site_code
        } else {
            self.mac.as_str()
        }
    }
}

// ── ProxyConfig ─────────────────────────────────────────────────────

/// One local-bind-port ↔ remote-service mapping (an stcp visitor leg).
///
/// `bind_port == 0` is the "unassigned" sentinel: the port is allocated
/// when the configuration is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Section identifier, by convention `<prefix>-<MAC>-<servicePort>`.
    pub name: String,

    #[serde(rename = "type", default = "default_proxy_type")]
    pub proxy_type: String,

    #[serde(default = "default_role")]
    pub role: String,

    /// Remote-exposed service identifier; by convention equals `name`.
    #[serde(default)]
    pub server_name: String,

    /// Shared secret -- carries the owning device's MAC address.
    #[serde(default)]
    pub sk: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub bind_port: u16,
}

fn default_proxy_type() -> String {
    STCP_TYPE.to_owned()
}

fn default_role() -> String {
    VISITOR_ROLE.to_owned()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_owned()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            proxy_type: default_proxy_type(),
            role: default_role(),
            server_name: String::new(),
            sk: String::new(),
            bind_addr: default_bind_addr(),
            bind_port: 0,
        }
    }
}

impl ProxyConfig {
    /// Build a visitor proxy for one service port of a site, with the
    /// conventional name and an unassigned bind port.
    pub fn visitor(prefix: &str, mac: &MacAddress, service_port: u16) -> Self {
        let name = format!("{prefix}-{mac}-{service_port}");
        Self {
            server_name: name.clone(),
            sk: mac.as_str().to_owned(),
            name,
            ..Self::default()
        }
    }

    /// Recover the service port embedded as the last `-` segment of the
    /// name, if there is one.
    pub fn service_port(&self) -> Option<u16> {
        self.name.rsplit('-').next()?.parse().ok()
    }

    /// Whether the bind port still carries the "allocate on save" sentinel.
    pub fn is_pending(&self) -> bool {
        self.bind_port == 0
    }
}

// ── Site ────────────────────────────────────────────────────────────

/// The unit the registry manages: a device plus its proxy list.
///
/// Every owned config's `sk` agrees with `device.mac`; the registry
/// maintains that on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    #[serde(flatten)]
    pub device: Device,

    #[serde(default)]
    pub configs: Vec<ProxyConfig>,
}

impl Site {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            configs: Vec::new(),
        }
    }

    pub fn mac(&self) -> &MacAddress {
        &self.device.mac
    }

    /// The proxy serving a given remote service port, if provisioned.
    pub fn find_service(&self, service_port: u16) -> Option<&ProxyConfig> {
        self.configs
            .iter()
            .find(|p| p.service_port() == Some(service_port))
    }
}
