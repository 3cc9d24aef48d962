// Admin API HTTP client
//
// Wraps `reqwest::Client` with frpc-specific URL construction and
// response handling. The admin surface is three endpoints returning
// plain text, protected by HTTP basic auth.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Admin ports frpc deployments commonly bind, in probe order.
pub const DEFAULT_PROBE_PORTS: &[u16] = &[7400, 7401, 7402, 7500, 8080, 8081];

/// Basic-auth credentials for the admin port.
///
/// frpc ships with `admin:admin` unless `admin_user`/`admin_pwd` are set
/// in its `[common]` section.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub username: String,
    pub password: SecretString,
}

impl AdminAuth {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Raw HTTP client for the frpc admin API.
///
/// `get_config`/`put_config` move the full INI text; `reload` asks the
/// running client to re-read the persisted file. The three are kept
/// separate because a save can succeed while the reload fails -- callers
/// need to tell those outcomes apart.
pub struct AdminClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Option<AdminAuth>,
}

impl AdminClient {
    /// Create a new admin client from a `TransportConfig`.
    ///
    /// `base_url` is the admin root, e.g. `http://127.0.0.1:7400`.
    pub fn new(
        base_url: Url,
        auth: Option<AdminAuth>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    /// Create an admin client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: Option<AdminAuth>) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    /// The admin base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an admin API path: `{base}/api/{path}`.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    /// Apply basic auth to a request builder, if credentials are set.
    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(auth) => req.basic_auth(&auth.username, Some(auth.password.expose_secret())),
            None => req,
        }
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch the full INI configuration text.
    pub async fn get_config(&self) -> Result<String, Error> {
        let url = self.api_url("config")?;
        debug!("GET {url}");

        let resp = self.authed(self.http.get(url)).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.text().await?)
    }

    /// Replace the persisted INI configuration text.
    ///
    /// The running client keeps serving the old configuration until
    /// [`reload`](Self::reload) succeeds.
    pub async fn put_config(&self, text: &str) -> Result<(), Error> {
        let url = self.api_url("config")?;
        debug!("PUT {url} ({} bytes)", text.len());

        let resp = self
            .authed(self.http.put(url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(text.to_owned())
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Ask the frpc process to reload from the persisted file.
    pub async fn reload(&self) -> Result<(), Error> {
        let url = self.api_url("reload")?;
        debug!("GET {url}");

        let resp = self.authed(self.http.get(url)).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Check whether something frpc-shaped answers on this base URL.
    ///
    /// Sends a HEAD to `/api/config`; both 2xx and 401 count -- a 401
    /// still proves an admin port is listening, just with different
    /// credentials.
    pub async fn probe(&self) -> bool {
        let Ok(url) = self.api_url("config") else {
            return false;
        };
        debug!("HEAD {url}");

        match self.authed(self.http.head(url)).send().await {
            Ok(resp) => {
                resp.status().is_success() || resp.status() == reqwest::StatusCode::UNAUTHORIZED
            }
            Err(_) => false,
        }
    }
}

/// Scan candidate ports on `host` for a responding frpc admin API.
///
/// Returns the first port whose `/api/config` answers (2xx or 401), or
/// `None` if the whole candidate list stays silent. Probes use a short
/// per-request timeout regardless of the configured one.
pub async fn detect_admin_port(
    host: &str,
    ports: &[u16],
    auth: Option<&AdminAuth>,
    transport: &TransportConfig,
) -> Option<u16> {
    let probe_transport = transport.for_probe();

    for &port in ports {
        let Ok(base) = Url::parse(&format!("http://{host}:{port}")) else {
            continue;
        };
        let Ok(client) = AdminClient::new(base, auth.cloned(), &probe_transport) else {
            continue;
        };
        if client.probe().await {
            debug!(port, "admin port responded");
            return Some(port);
        }
    }
    None
}

// ── Response helpers ─────────────────────────────────────────────────

/// Map non-2xx responses to errors, preserving the body for diagnostics.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}
