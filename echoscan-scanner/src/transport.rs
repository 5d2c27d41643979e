use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Host (and explicit port) of the target; everything else is off limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainScope {
    authority: String,
}

impl DomainScope {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        authority_of(&parsed)
            .map(|authority| Self { authority })
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: URL has no host", base_url)))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Host-less URLs count as in scope.
    pub fn contains(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => authority_of(&parsed)
                .map(|authority| authority == self.authority)
                .unwrap_or(true),
            Err(_) => true,
        }
    }
}

fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
    }
}

/// Fetches pages for the static crawler and knows which URLs belong to the target.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    fn same_domain(&self, url: &str) -> bool;

    fn resolve(&self, url: &str) -> String;

    fn scope(&self) -> &DomainScope;
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
    scope: DomainScope,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, 10)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                "echoscan/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/trapdoorsec/echoscan)"
            ))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        let trimmed = base_url.trim_end_matches('/');
        let base = Url::parse(trimmed)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let scope = DomainScope::new(base.as_str())?;

        Ok(Self {
            client,
            base_url: base,
            scope,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let full_url = self.resolve(url);
        debug!("GET {}", full_url);

        let response = self.client.get(&full_url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            url: final_url,
            status,
            headers,
            body,
        })
    }

    fn same_domain(&self, url: &str) -> bool {
        self.scope.contains(url)
    }

    fn resolve(&self, url: &str) -> String {
        self.base_url
            .join(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string())
    }

    fn scope(&self) -> &DomainScope {
        &self.scope
    }
}
