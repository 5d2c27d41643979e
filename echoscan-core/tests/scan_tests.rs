// Tests for scan orchestration

use async_trait::async_trait;
use echoscan_core::scan::{ScanOptions, extract_url_path, run_crawl, run_scan};
use echoscan_scanner::browser::{Browser, ElementInfo, ElementRef, Page, WaitUntil};
use echoscan_scanner::error::{Result, ScanError};
use echoscan_scanner::{HttpTransport, Transport, TraversalMode};
use std::sync::Arc;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

// ============================================================================
// URL Path Extraction Tests
// ============================================================================

#[test]
fn test_extract_url_path_root() {
    assert_eq!(extract_url_path("http://example.com/"), "/");
    assert_eq!(extract_url_path("http://example.com"), "/");
}

#[test]
fn test_extract_url_path_nested_with_query() {
    assert_eq!(extract_url_path("http://example.com/a/b?key=value"), "/a/b");
}

#[test]
fn test_extract_url_path_drops_plain_fragment() {
    assert_eq!(extract_url_path("http://example.com/page#section"), "/page");
}

#[test]
fn test_extract_url_path_keeps_spa_route() {
    assert_eq!(extract_url_path("http://localhost:3000/#/login"), "/#/login");
}

#[test]
fn test_extract_url_path_invalid_url() {
    let url = "not a valid url";
    assert_eq!(extract_url_path(url), url);
}

// ============================================================================
// Orchestration Tests
// ============================================================================

/// Browser whose pages render the decoded `q` query parameter into the body.
struct EchoBrowser;

struct EchoPage {
    url: String,
}

impl EchoPage {
    fn echoed(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "q")
                    .map(|(_, v)| v.into_owned())
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Page for EchoPage {
    fn url(&self) -> String {
        self.url.clone()
    }

    async fn content(&self) -> Result<String> {
        Ok(format!("<html><body><h1>Results for {}</h1></body></html>", self.echoed()))
    }

    async fn inner_text(&self, _selector: &str) -> Result<String> {
        Ok(format!("Results for {}", self.echoed()))
    }

    async fn query(&self, _selector: &str) -> Result<Vec<ElementInfo>> {
        Ok(Vec::new())
    }

    async fn fill(&self, _target: &ElementRef, _text: &str) -> Result<()> {
        Err(ScanError::Interaction("no fields".to_string()))
    }

    async fn press(&self, _target: &ElementRef, _key: &str) -> Result<()> {
        Err(ScanError::Interaction("no fields".to_string()))
    }

    async fn click(&self, _target: &ElementRef) -> Result<()> {
        Err(ScanError::Interaction("no buttons".to_string()))
    }
}

#[async_trait]
impl Browser for EchoBrowser {
    async fn open(&self, url: &str, _wait_until: WaitUntil) -> Result<Box<dyn Page>> {
        Ok(Box::new(EchoPage {
            url: url.to_string(),
        }))
    }
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_bytes(body.as_bytes()),
        )
        .mount(server)
        .await;
}

fn options_for(server: &MockServer) -> ScanOptions {
    ScanOptions {
        url: server.uri(),
        max_depth: 2,
        max_pages: 10,
        ..ScanOptions::default()
    }
}

#[tokio::test]
async fn test_run_crawl_static() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<a href="/about">About</a><a href="/missing">Missing</a><a href="https://elsewhere.test/">X</a>"#,
    )
    .await;
    mount_html(&server, "/about", "<p>about us</p>").await;

    let options = options_for(&server);
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&server.uri()).unwrap());
    let report = run_crawl(&options, transport, None).await.unwrap();

    assert_eq!(report.mode, TraversalMode::Static);
    assert!(report.findings.is_none());
    assert_eq!(report.outcome.visited.len(), 3);
    assert!(report.started_at <= report.finished_at);

    // wiremock answers unmatched routes with 404 and no content type.
    let missing = report
        .outcome
        .pages
        .iter()
        .find(|p| p.url.ends_with("/missing"))
        .unwrap();
    assert_eq!(missing.status_code, 404);
    assert!(missing.links_found.is_empty());
}

#[tokio::test]
async fn test_run_crawl_rejects_bad_start_url() {
    let options = ScanOptions {
        url: "::not-a-url".to_string(),
        ..ScanOptions::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new("http://127.0.0.1:9").unwrap());

    let err = run_crawl(&options, transport, None).await.unwrap_err();
    assert!(err.contains("Invalid URL"));
}

#[tokio::test]
async fn test_run_scan_finds_query_reflection() {
    let server = MockServer::start().await;
    mount_html(&server, "/", r#"<a href="/search?q=shoes">Search</a>"#).await;
    mount_html(&server, "/search", "<p>results</p>").await;

    let options = options_for(&server);
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&server.uri()).unwrap());
    let report = run_scan(&options, transport, Arc::new(EchoBrowser)).await.unwrap();

    let findings = report.findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].vulnerability_name(),
        "Potential XSS (DOM/Rendered Reflection)"
    );
    assert!(findings[0].detail().starts_with("Query param 'q' reflected"));
    assert!(findings[0].url().contains("/search?q="));
}

#[tokio::test]
async fn test_run_scan_dynamic_mode_renders_through_browser() {
    let options = ScanOptions {
        url: "http://spa.test/?q=1".to_string(),
        dynamic: true,
        max_depth: 0,
        ..ScanOptions::default()
    };
    // The transport is never hit in dynamic mode.
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new("http://spa.test/").unwrap());

    let report = run_scan(&options, transport, Arc::new(EchoBrowser)).await.unwrap();

    assert_eq!(report.mode, TraversalMode::Dynamic);
    assert_eq!(report.outcome.visited_urls(), vec!["http://spa.test/?q=1"]);
    assert_eq!(report.findings().len(), 1);
}
