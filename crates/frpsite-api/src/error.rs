use thiserror::Error;

/// Top-level error type for the `frpsite-api` crate.
///
/// Covers every failure mode of the admin API surface: transport,
/// authentication, and unexpected responses. The three endpoints share
/// one error type -- which *operation* failed is the caller's context.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Admin API ───────────────────────────────────────────────────
    /// The admin port rejected the credentials (HTTP 401).
    #[error("Admin API rejected the credentials")]
    Unauthorized,

    /// Any other non-2xx response, with the body for debugging.
    #[error("Admin API returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` if re-entering credentials might resolve this.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
