use crate::browser::{Browser, WaitUntil};
use crate::error::{Result, ScanError};
use crate::extract::{LinkExtractor, SpaLinkExtractor, StaticLinkExtractor, count_forms};
use crate::normalize::{TraversalMode, normalize_spa, normalize_static};
use crate::result::CrawlResult;
use crate::transport::Transport;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Called with `(depth, url)` right before a page is fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_MAX_PAGES: usize = 50;

/// Bounded breadth-first crawler.
///
/// Static mode fetches pages through the [`Transport`]; dynamic mode renders
/// them through a [`Browser`] and follows SPA hash routes.
pub struct Crawler {
    transport: Arc<dyn Transport>,
    browser: Option<Arc<dyn Browser>>,
    extractor: Box<dyn LinkExtractor>,
    mode: TraversalMode,
    max_depth: usize,
    max_pages: usize,
    wait_until: WaitUntil,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let extractor = Box::new(StaticLinkExtractor::new(transport.scope().clone()));
        Self {
            transport,
            browser: None,
            extractor,
            mode: TraversalMode::Static,
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: DEFAULT_MAX_PAGES,
            wait_until: WaitUntil::NetworkIdle,
            progress_callback: None,
        }
    }

    pub fn dynamic(transport: Arc<dyn Transport>, browser: Arc<dyn Browser>) -> Self {
        let extractor = Box::new(SpaLinkExtractor::new(transport.scope().clone()));
        Self {
            browser: Some(browser),
            extractor,
            mode: TraversalMode::Dynamic,
            ..Self::new(transport)
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    /// Crawls from `start_url`. Page failures are recorded and skipped; only an
    /// unparseable start URL is an error.
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlOutcome> {
        Url::parse(start_url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;

        let start = self.mode.normalize(start_url);
        info!(
            "Starting {} crawl of {} (max depth {}, max pages {})",
            self.mode, start, self.max_depth, self.max_pages
        );

        let mut frontier = Frontier::new(start);
        let mut pages = Vec::new();

        while frontier.visited.len() < self.max_pages {
            let Some((url, depth)) = frontier.queue.pop_front() else {
                break;
            };
            if frontier.visited.contains(&url) {
                continue;
            }
            if depth > self.max_depth {
                debug!("Dropping {} at depth {}", url, depth);
                continue;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(depth, url.clone());
            }
            debug!("[Crawl] depth={} url={}", depth, url);
            frontier.visited.insert(url.clone());

            let result = self.visit(&url, depth).await;
            if depth < self.max_depth {
                for link in &result.links_found {
                    frontier.offer(link, depth + 1);
                }
            }
            pages.push(result);
        }

        info!(
            "Crawl complete. Visited {} pages, {} left in queue",
            frontier.visited.len(),
            frontier.queue.len()
        );

        Ok(CrawlOutcome {
            pages,
            visited: frontier.visited,
            discovered: frontier.discovered,
        })
    }

    async fn visit(&self, url: &str, depth: usize) -> CrawlResult {
        let outcome = match (self.mode, &self.browser) {
            (TraversalMode::Dynamic, Some(browser)) => self.render_page(browser.as_ref(), url, depth).await,
            _ => self.fetch_page(url, depth).await,
        };

        outcome.unwrap_or_else(|e| {
            warn!("Skipping {}: {}", url, e);
            CrawlResult::with_error(url.to_string(), depth, e.to_string())
        })
    }

    async fn fetch_page(&self, url: &str, depth: usize) -> Result<CrawlResult> {
        let started = Instant::now();
        let response = self.transport.get(url).await?;

        let mut result = CrawlResult::new(url.to_string(), depth);
        result.response_time = started.elapsed();
        result.status_code = response.status;
        result.content_type = response.content_type().map(String::from);
        result.content_length = response
            .content_length()
            .or(Some(response.body.len() as u64));

        if !response.is_html() {
            let mismatch = ScanError::ResourceTypeMismatch {
                url: url.to_string(),
                content_type: result.content_type.clone().unwrap_or_default(),
            };
            debug!("{}", mismatch);
            return Ok(result);
        }

        // Relative links resolve against where redirects ended up.
        let base = normalize_static(&response.url);
        if base != url {
            debug!("{} redirected to {}", url, base);
        }
        result.links_found = self.extractor.extract(&response.body, &base);
        result.forms_found = count_forms(&response.body);
        Ok(result)
    }

    async fn render_page(&self, browser: &dyn Browser, url: &str, depth: usize) -> Result<CrawlResult> {
        let started = Instant::now();
        let rendered = browser.render(url, self.wait_until).await?;
        let final_url = normalize_spa(&rendered.final_url);
        if final_url != url {
            debug!("{} settled on {}", url, final_url);
        }

        let mut result = CrawlResult::new(url.to_string(), depth);
        result.response_time = started.elapsed();
        result.content_type = Some("text/html".to_string());
        result.content_length = Some(rendered.html.len() as u64);
        result.links_found = self.extractor.extract(&rendered.html, &final_url);
        result.forms_found = count_forms(&rendered.html);
        Ok(result)
    }
}

/// Queue plus bookkeeping for one traversal. Never outlives a `crawl()` call.
struct Frontier {
    queue: VecDeque<(String, usize)>,
    visited: HashSet<String>,
    discovered: HashMap<String, usize>,
}

impl Frontier {
    fn new(start: String) -> Self {
        let mut discovered = HashMap::new();
        discovered.insert(start.clone(), 0);
        Self {
            queue: VecDeque::from([(start, 0)]),
            visited: HashSet::new(),
            discovered,
        }
    }

    /// Records and enqueues `url` unless it has been seen before.
    fn offer(&mut self, url: &str, depth: usize) -> bool {
        if self.visited.contains(url) || self.discovered.contains_key(url) {
            return false;
        }
        self.discovered.insert(url.to_string(), depth);
        self.queue.push_back((url.to_string(), depth));
        true
    }
}

/// What a finished crawl saw.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// One record per visited URL, in visit order.
    pub pages: Vec<CrawlResult>,
    /// Every URL that was fetched or attempted.
    pub visited: HashSet<String>,
    /// URL -> depth at first discovery.
    pub discovered: HashMap<String, usize>,
}

impl CrawlOutcome {
    pub fn visited_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.visited.iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn depth_of(&self, url: &str) -> Option<usize> {
        self.discovered.get(url).copied()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &CrawlResult> {
        self.pages.iter().filter(|page| page.is_skipped())
    }
}
