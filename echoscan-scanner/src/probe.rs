use crate::browser::{Browser, ElementInfo, ElementRef, Page, WaitUntil};
use crate::crawler::ProgressCallback;
use crate::error::Result;
use crate::oracle::{Reflection, is_reflected};
use crate::result::{ScanResult, VulnerabilityKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_PAYLOADS: [&str; 2] = [
    "XSS_TEST_1337<svg onload=alert(1337)>",
    "\"><svg onload=alert(1337)>",
];

/// Text-entry fields, in the order they are looked for.
const FIELD_SELECTORS: [&str; 4] = [
    "input[type='text']",
    "input[type='search']",
    "input:not([type])",
    "textarea",
];

const SUBMIT_SELECTORS: [&str; 2] = ["button[type='submit']", "input[type='submit']"];

const SKIPPED_FIELD_TYPES: [&str; 5] = ["password", "hidden", "checkbox", "radio", "file"];

const SPA_SEARCH_ROUTE: &str = "#/search";

const FIELD_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub payloads: Vec<String>,
    pub wait_until: WaitUntil,
    /// Pause after every navigation.
    pub settle_delay: Duration,
    /// Pause after pressing Enter in a field.
    pub input_delay: Duration,
    /// Pause after clicking a submit control.
    pub submit_delay: Duration,
    /// How long a reloaded page gets to show the target field.
    pub field_wait: Duration,
    pub max_form_fields: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            payloads: DEFAULT_PAYLOADS.iter().map(|p| p.to_string()).collect(),
            wait_until: WaitUntil::NetworkIdle,
            settle_delay: Duration::from_millis(250),
            input_delay: Duration::from_millis(300),
            submit_delay: Duration::from_millis(400),
            field_wait: Duration::from_secs(2),
            max_form_fields: 5,
        }
    }
}

impl ProbeConfig {
    pub fn with_payloads(mut self, payloads: Vec<String>) -> Self {
        self.payloads = payloads;
        self
    }
}

/// One injectable field on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    pub url: String,
    pub selector: String,
    /// Position among the elements matching `selector`.
    pub index: usize,
    pub note: String,
}

impl FormTarget {
    fn element(&self) -> ElementRef {
        ElementRef::new(self.selector.clone(), self.index)
    }
}

/// Drives the three reflection strategies against rendered pages.
pub struct Prober {
    browser: Arc<dyn Browser>,
    config: ProbeConfig,
    progress_callback: Option<ProgressCallback>,
}

impl Prober {
    pub fn new(browser: Arc<dyn Browser>, config: ProbeConfig) -> Self {
        Self {
            browser,
            config,
            progress_callback: None,
        }
    }

    /// Called with `(position, url)` before each URL is probed.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub async fn probe_all(&self, urls: &[String]) -> Vec<ScanResult> {
        info!("Probing {} URLs with {} payloads", urls.len(), self.config.payloads.len());

        let mut results = Vec::new();
        for (position, url) in urls.iter().enumerate() {
            if let Some(ref callback) = self.progress_callback {
                callback(position, url.clone());
            }
            results.extend(self.probe(url).await);
        }

        info!("Probe finished: {} potential issue(s)", results.len());
        results
    }

    /// Query mutation, route guessing, then form injection.
    pub async fn probe(&self, url: &str) -> Vec<ScanResult> {
        debug!("[Probe] {}", url);
        let mut results = self.probe_query_params(url).await;
        results.extend(self.probe_spa_route(url).await);
        results.extend(self.probe_forms(url).await);
        results
    }

    pub async fn probe_query_params(&self, url: &str) -> Vec<ScanResult> {
        let mut results = Vec::new();

        for param in query_param_names(url) {
            for payload in &self.config.payloads {
                let test_url = mutate_query_param(url, &param, payload);
                let outcome = self.render_and_check(&test_url, payload).await;
                if let Some(reflection) = self.settle_outcome(&test_url, outcome) {
                    results.push(ScanResult::new(
                        test_url,
                        VulnerabilityKind::RenderedReflection,
                        format!("Query param '{}' reflected: {}", param, reflection.reason()),
                    ));
                    break;
                }
            }
        }

        results
    }

    pub async fn probe_spa_route(&self, url: &str) -> Vec<ScanResult> {
        for payload in &self.config.payloads {
            let Some(guessed) = spa_search_guess(url, payload) else {
                return Vec::new();
            };
            let outcome = self.render_and_check(&guessed, payload).await;
            if let Some(reflection) = self.settle_outcome(&guessed, outcome) {
                return vec![ScanResult::new(
                    guessed,
                    VulnerabilityKind::SpaRouteReflection,
                    format!(
                        "Guessed SPA param 'q' reflected on {}: {}",
                        SPA_SEARCH_ROUTE,
                        reflection.reason()
                    ),
                )];
            }
        }
        Vec::new()
    }

    pub async fn probe_forms(&self, url: &str) -> Vec<ScanResult> {
        let targets = match self.find_injectable_fields(url).await {
            Ok(targets) => targets,
            Err(e) => {
                debug!("Field discovery failed on {}: {}", url, e);
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for target in &targets {
            for payload in &self.config.payloads {
                let outcome = self.inject_and_submit(target, payload).await;
                if let Some(reflection) = self.settle_outcome(&target.url, outcome) {
                    results.push(ScanResult::new(
                        target.url.clone(),
                        VulnerabilityKind::FormReflection,
                        format!(
                            "Injected into {} ({}) and saw reflection: {}",
                            target.selector,
                            target.note,
                            reflection.reason()
                        ),
                    ));
                    break;
                }
            }
        }
        results
    }

    /// Up to `max_form_fields` visible, enabled text-entry fields on `url`.
    pub async fn find_injectable_fields(&self, url: &str) -> Result<Vec<FormTarget>> {
        let page = self.open(url).await?;
        let mut targets = Vec::new();

        for selector in FIELD_SELECTORS {
            let fields = match page.query(selector).await {
                Ok(fields) => fields,
                Err(e) => {
                    debug!("Query {} failed on {}: {}", selector, url, e);
                    continue;
                }
            };

            for field in fields.iter().filter(|f| is_injectable(f)) {
                let target = locate(url, selector, field);
                debug!("Injectable <{}> at {} ({})", field.tag, target.selector, target.note);
                targets.push(target);
                if targets.len() >= self.config.max_form_fields {
                    return Ok(targets);
                }
            }
        }

        debug!("{} injectable field(s) on {}", targets.len(), url);
        Ok(targets)
    }

    /// Fills `payload` into the target on a fresh page, submits, and checks the result.
    pub async fn inject_and_submit(&self, target: &FormTarget, payload: &str) -> Result<Option<Reflection>> {
        let page = self.open(&target.url).await?;
        let element = target.element();

        if !self.wait_for_visible(page.as_ref(), target).await? {
            debug!("{} not visible on {}", target.selector, target.url);
            return Ok(None);
        }

        page.fill(&element, payload).await?;

        match page.press(&element, "Enter").await {
            Ok(()) => pause(self.config.input_delay).await,
            Err(e) => debug!("Enter on {} failed: {}", target.selector, e),
        }

        if let Some(button) = first_submit_control(page.as_ref()).await {
            match page.click(&button).await {
                Ok(()) => pause(self.config.submit_delay).await,
                Err(e) => debug!("Submit click on {} failed: {}", button.selector, e),
            }
        }

        check_page(page.as_ref(), payload).await
    }

    /// Polls until the target is visible or `field_wait` runs out.
    async fn wait_for_visible(&self, page: &dyn Page, target: &FormTarget) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + self.config.field_wait;
        loop {
            let visible = page
                .query(&target.selector)
                .await?
                .into_iter()
                .find(|f| f.index == target.index)
                .is_some_and(|f| f.visible);
            if visible {
                return Ok(true);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            pause(FIELD_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Renders `test_url` on a fresh page and consults the oracle.
    pub async fn render_and_check(&self, test_url: &str, payload: &str) -> Result<Option<Reflection>> {
        let page = self.open(test_url).await?;
        check_page(page.as_ref(), payload).await
    }

    async fn open(&self, url: &str) -> Result<Box<dyn Page>> {
        let page = self.browser.open(url, self.config.wait_until).await?;
        pause(self.config.settle_delay).await;
        Ok(page)
    }

    fn settle_outcome(&self, url: &str, outcome: Result<Option<Reflection>>) -> Option<Reflection> {
        match outcome {
            Ok(Some(reflection)) => {
                info!("Reflection on {}: {}", url, reflection.reason());
                Some(reflection)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Probe attempt on {} failed: {}", url, e);
                None
            }
        }
    }
}

async fn check_page(page: &dyn Page, payload: &str) -> Result<Option<Reflection>> {
    let html = page.content().await?;
    let text = page.inner_text("body").await.unwrap_or_default();
    Ok(is_reflected(&html, &text, payload))
}

async fn first_submit_control(page: &dyn Page) -> Option<ElementRef> {
    for selector in SUBMIT_SELECTORS {
        let Ok(buttons) = page.query(selector).await else {
            continue;
        };
        if let Some(button) = buttons.iter().find(|b| b.visible && b.enabled) {
            return Some(ElementRef::new(selector, button.index));
        }
    }
    None
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn is_injectable(field: &ElementInfo) -> bool {
    if !field.visible || !field.enabled {
        return false;
    }
    let input_type = field.input_type.as_deref().unwrap_or("").to_lowercase();
    !SKIPPED_FIELD_TYPES.contains(&input_type.as_str())
}

fn locate(url: &str, selector: &str, field: &ElementInfo) -> FormTarget {
    let (selector, index, note) = match (non_empty(&field.id), non_empty(&field.name)) {
        (Some(id), _) => (id_selector(id), 0, "field by id"),
        (None, Some(name)) => (format!("[name='{}']", name), 0, "field by name"),
        (None, None) => (selector.to_string(), field.index, "field by generic selector"),
    };
    FormTarget {
        url: url.to_string(),
        selector,
        index,
        note: note.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn id_selector(id: &str) -> String {
    let plain = id
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        format!("#{}", id)
    } else {
        format!("[id=\"{}\"]", id.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Distinct query parameter names of `url`, sorted.
pub fn query_param_names(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    parsed
        .query_pairs()
        .map(|(name, _)| name.into_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Replaces every value of `param` with `payload`, keeping all other pairs in order.
pub fn mutate_query_param(url: &str, param: &str, payload: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == param { payload.to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    if pairs.is_empty() {
        return url.to_string();
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

/// Appends a `q` parameter to a `#/search` route, or `None` for any other URL.
pub fn spa_search_guess(url: &str, payload: &str) -> Option<String> {
    if !url.contains(SPA_SEARCH_ROUTE) {
        return None;
    }
    let (base, fragment) = url.split_once('#')?;
    let separator = if fragment.contains('?') { '&' } else { '?' };
    Some(format!("{}#{}{}q={}", base, fragment, separator, payload))
}
