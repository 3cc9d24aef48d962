//! Async client for the frpc admin API.
//!
//! The frpc client process exposes a small HTTP admin surface on its
//! configured admin port: the full INI configuration as plain text
//! (`GET/PUT /api/config`) and a reload trigger (`GET /api/reload`).
//! This crate wraps those three endpoints plus best-effort admin-port
//! detection. `frpsite-core` maps these errors into user-facing
//! diagnostics.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{AdminAuth, AdminClient, DEFAULT_PROBE_PORTS, detect_admin_port};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
