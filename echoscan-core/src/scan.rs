use chrono::{DateTime, Utc};
use echoscan_scanner::{
    Browser, BrowserOptions, CrawlOutcome, Crawler, HeadlessBrowser, HttpTransport, ProbeConfig,
    Prober, ProgressCallback, ScanResult, Transport, TraversalMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Options for configuring a crawl or scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub url: String,
    pub max_depth: usize,
    pub max_pages: usize,
    /// Render pages in the browser and follow SPA hash routes.
    pub dynamic: bool,
    pub timeout_secs: u64,
    pub payloads: Vec<String>,
    pub headless: bool,
    pub show_progress_bars: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_depth: echoscan_scanner::crawler::DEFAULT_MAX_DEPTH,
            max_pages: echoscan_scanner::crawler::DEFAULT_MAX_PAGES,
            dynamic: false,
            timeout_secs: 10,
            payloads: echoscan_scanner::probe::DEFAULT_PAYLOADS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            headless: true,
            show_progress_bars: false,
        }
    }
}

impl ScanOptions {
    pub fn mode(&self) -> TraversalMode {
        if self.dynamic {
            TraversalMode::Dynamic
        } else {
            TraversalMode::Static
        }
    }
}

/// Callback for status lines worth showing to the user
pub type ScanProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Everything a finished crawl or scan produced.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    pub mode: TraversalMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CrawlOutcome,
    /// `None` when only a crawl was run.
    pub findings: Option<Vec<ScanResult>>,
}

impl ScanReport {
    pub fn findings(&self) -> &[ScanResult] {
        self.findings.as_deref().unwrap_or_default()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Extract the path component from a URL, keeping SPA hash routes
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = match u.path() {
                "" | "/" => "/".to_string(),
                path => path.to_string(),
            };
            match u.fragment() {
                Some(route) if route.starts_with('/') => format!("{}#{}", path, route),
                _ => path,
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn spinner(show: bool, message: &'static str) -> Option<Arc<ProgressBar>> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Some(Arc::new(pb))
}

async fn launch_browser(headless: bool) -> Result<Arc<dyn Browser>, String> {
    let options = BrowserOptions {
        headless,
        ..BrowserOptions::default()
    };
    let browser = tokio::task::spawn_blocking(move || HeadlessBrowser::launch(options))
        .await
        .map_err(|e| format!("Browser launch task failed: {}", e))?
        .map_err(|e| e.to_string())?;
    Ok(Arc::new(browser))
}

fn build_transport(options: &ScanOptions) -> Result<Arc<dyn Transport>, String> {
    HttpTransport::with_timeout(&options.url, options.timeout_secs)
        .map(|t| Arc::new(t) as Arc<dyn Transport>)
        .map_err(|e| e.to_string())
}

/// Crawl only. Launches a browser when `options.dynamic` is set.
pub async fn execute_crawl(
    options: ScanOptions,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<ScanReport, String> {
    let transport = build_transport(&options)?;
    let browser = if options.dynamic {
        if let Some(ref callback) = progress_callback {
            callback("Launching headless browser...".to_string());
        }
        Some(launch_browser(options.headless).await?)
    } else {
        None
    };

    run_crawl(&options, transport, browser).await
}

/// Crawl, then probe every visited URL. Probing always needs the browser.
pub async fn execute_scan(
    options: ScanOptions,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<ScanReport, String> {
    let transport = build_transport(&options)?;
    if let Some(ref callback) = progress_callback {
        callback("Launching headless browser...".to_string());
    }
    let browser = launch_browser(options.headless).await?;

    run_scan(&options, transport, browser).await
}

/// Crawl over already-built collaborators.
pub async fn run_crawl(
    options: &ScanOptions,
    transport: Arc<dyn Transport>,
    browser: Option<Arc<dyn Browser>>,
) -> Result<ScanReport, String> {
    let started_at = Utc::now();
    let outcome = crawl(options, transport, browser).await?;

    Ok(ScanReport {
        target: options.url.clone(),
        mode: options.mode(),
        started_at,
        finished_at: Utc::now(),
        outcome,
        findings: None,
    })
}

/// Crawl and probe over already-built collaborators.
pub async fn run_scan(
    options: &ScanOptions,
    transport: Arc<dyn Transport>,
    browser: Arc<dyn Browser>,
) -> Result<ScanReport, String> {
    let started_at = Utc::now();
    let outcome = crawl(options, transport, Some(browser.clone())).await?;
    let findings = probe(options, browser, &outcome.visited_urls()).await;

    Ok(ScanReport {
        target: options.url.clone(),
        mode: options.mode(),
        started_at,
        finished_at: Utc::now(),
        outcome,
        findings: Some(findings),
    })
}

async fn crawl(
    options: &ScanOptions,
    transport: Arc<dyn Transport>,
    browser: Option<Arc<dyn Browser>>,
) -> Result<CrawlOutcome, String> {
    let progress_bar = spinner(options.show_progress_bars, "Starting crawl...");
    let processed = Arc::new(AtomicUsize::new(0));

    let callback: ProgressCallback = match progress_bar.clone() {
        Some(pb) => {
            let processed = processed.clone();
            Arc::new(move |depth: usize, url: String| {
                let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!(
                    "Crawling... {} pages [depth {}] {}",
                    count,
                    depth,
                    extract_url_path(&url)
                ));
            })
        }
        None => Arc::new(|_depth: usize, _url: String| {}),
    };

    let crawler = match (options.dynamic, browser) {
        (true, Some(browser)) => Crawler::dynamic(transport, browser),
        _ => Crawler::new(transport),
    }
    .with_max_depth(options.max_depth)
    .with_max_pages(options.max_pages)
    .with_progress_callback(callback);

    let result = crawler.crawl(&options.url).await;

    if let Some(ref pb) = progress_bar {
        pb.finish_and_clear();
    }

    let outcome = result.map_err(|e| e.to_string())?;
    info!(
        "Crawl of {} finished: {} visited, {} failed",
        options.url,
        outcome.visited.len(),
        outcome.failed_pages().count()
    );
    Ok(outcome)
}

async fn probe(options: &ScanOptions, browser: Arc<dyn Browser>, urls: &[String]) -> Vec<ScanResult> {
    let progress_bar = spinner(options.show_progress_bars, "Starting probe...");
    let total = urls.len();

    let mut prober = Prober::new(
        browser,
        ProbeConfig::default().with_payloads(options.payloads.clone()),
    );
    if let Some(pb) = progress_bar.clone() {
        prober = prober.with_progress_callback(Arc::new(move |position: usize, url: String| {
            pb.set_message(format!(
                "Probing {}/{} {}",
                position + 1,
                total,
                extract_url_path(&url)
            ));
        }));
    }

    let findings = prober.probe_all(urls).await;

    if let Some(ref pb) = progress_bar {
        pb.finish_and_clear();
    }
    findings
}
