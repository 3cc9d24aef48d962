// ── Domain model ──

mod mac;
mod site;

pub use mac::MacAddress;
pub use site::{
    DEFAULT_BIND_ADDR, DEFAULT_SERVICE_PORTS, Device, ProxyConfig, STCP_TYPE, Site, VISITOR_ROLE,
};
