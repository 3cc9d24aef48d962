#![allow(clippy::unwrap_used)]
// Integration tests for `AdminClient` using wiremock.

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use frpsite_api::{AdminAuth, AdminClient, Error, TransportConfig, detect_admin_port};

// ── Helpers ─────────────────────────────────────────────────────────

fn auth() -> AdminAuth {
    AdminAuth::new("admin", SecretString::from("admin".to_owned()))
}

async fn setup() -> (MockServer, AdminClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = AdminClient::with_client(reqwest::Client::new(), base_url, Some(auth()));
    (server, client)
}

const SAMPLE_CONFIG: &str = "[common]\nserver_addr = frps.example.com\nserver_port = 7000\n";

// ── get_config ──────────────────────────────────────────────────────

#[tokio::test]
async fn get_config_returns_body_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/config"))
        .and(header("Authorization", "Basic YWRtaW46YWRtaW4="))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_CONFIG))
        .mount(&server)
        .await;

    let text = client.get_config().await.unwrap();
    assert_eq!(text, SAMPLE_CONFIG);
}

#[tokio::test]
async fn get_config_maps_401_to_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.get_config().await;
    assert!(
        matches!(result, Err(Error::Unauthorized)),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn get_config_preserves_error_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(500).set_body_string("load config file error"))
        .mount(&server)
        .await;

    match client.get_config().await {
        Err(Error::UnexpectedStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "load config file error");
        }
        other => panic!("expected UnexpectedStatus, got: {other:?}"),
    }
}

// ── put_config ──────────────────────────────────────────────────────

#[tokio::test]
async fn put_config_sends_plain_text_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/config"))
        .and(header("Content-Type", "text/plain"))
        .and(body_string(SAMPLE_CONFIG))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.put_config(SAMPLE_CONFIG).await.unwrap();
}

#[tokio::test]
async fn put_config_surfaces_failure_status() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(500).set_body_string("write error"))
        .mount(&server)
        .await;

    let result = client.put_config(SAMPLE_CONFIG).await;
    assert!(matches!(
        result,
        Err(Error::UnexpectedStatus { status: 500, .. })
    ));
}

// ── reload ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reload_hits_reload_endpoint() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/reload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.reload().await.unwrap();
}

#[tokio::test]
async fn reload_failure_is_reported() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/reload"))
        .respond_with(ResponseTemplate::new(503).set_body_string("reload pending"))
        .mount(&server)
        .await;

    let result = client.reload().await;
    assert!(matches!(
        result,
        Err(Error::UnexpectedStatus { status: 503, .. })
    ));
}

// ── probe / detection ───────────────────────────────────────────────

#[tokio::test]
async fn probe_accepts_401_as_alive() {
    let (server, client) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(client.probe().await);
}

#[tokio::test]
async fn probe_rejects_unexpected_status() {
    let (server, client) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!client.probe().await);
}

#[tokio::test]
async fn detect_admin_port_finds_listening_port() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let addr = server.address();
    let port = detect_admin_port(
        &addr.ip().to_string(),
        &[addr.port()],
        Some(&auth()),
        &TransportConfig::default(),
    )
    .await;

    assert_eq!(port, Some(addr.port()));
}
