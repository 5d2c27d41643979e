//! Browser automation seam.
//!
//! The engine talks to a rendering browser through [`Browser`] and [`Page`].
//! [`HeadlessBrowser`] drives Chrome/Chromium through `headless_chrome`, whose
//! API is blocking, so every call is pushed onto tokio's blocking pool.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use headless_chrome::{LaunchOptions, Tab};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Completion condition for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The load event fired.
    Load,
    /// The load event fired and the network has had time to go quiet.
    NetworkIdle,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub final_url: String,
}

/// An element matched by a selector, as seen at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementInfo {
    pub index: usize,
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub visible: bool,
    pub enabled: bool,
}

/// Addresses the `index`-th element matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
}

impl ElementRef {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// One open page. Implementations release the underlying tab on drop.
#[async_trait]
pub trait Page: Send + Sync {
    fn url(&self) -> String;

    async fn content(&self) -> Result<String>;

    async fn inner_text(&self, selector: &str) -> Result<String>;

    async fn query(&self, selector: &str) -> Result<Vec<ElementInfo>>;

    async fn fill(&self, target: &ElementRef, text: &str) -> Result<()>;

    async fn press(&self, target: &ElementRef, key: &str) -> Result<()>;

    async fn click(&self, target: &ElementRef) -> Result<()>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self, url: &str, wait_until: WaitUntil) -> Result<Box<dyn Page>>;

    async fn render(&self, url: &str, wait_until: WaitUntil) -> Result<RenderedPage> {
        let page = self.open(url, wait_until).await?;
        let html = page.content().await.map_err(into_render_error)?;
        Ok(RenderedPage {
            html,
            final_url: page.url(),
        })
    }
}

fn into_render_error(err: ScanError) -> ScanError {
    match err {
        ScanError::Interaction(msg) => ScanError::Render(msg),
        other => other,
    }
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub idle_timeout: Duration,
    /// Quiet period granted after navigation for [`WaitUntil::NetworkIdle`].
    pub network_idle: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            idle_timeout: Duration::from_secs(60),
            network_idle: Duration::from_millis(500),
        }
    }
}

pub struct HeadlessBrowser {
    browser: headless_chrome::Browser,
    network_idle: Duration,
}

impl HeadlessBrowser {
    /// Starts Chrome/Chromium. Blocking; call from a blocking context or at startup.
    pub fn launch(options: BrowserOptions) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .idle_browser_timeout(options.idle_timeout)
            .build()
            .map_err(|e| ScanError::BrowserLaunch(e.to_string()))?;

        let browser = headless_chrome::Browser::new(launch_options)
            .map_err(|e| ScanError::BrowserLaunch(e.to_string()))?;

        info!("Browser launched (headless: {})", options.headless);
        Ok(Self {
            browser,
            network_idle: options.network_idle,
        })
    }
}

#[async_trait]
impl Browser for HeadlessBrowser {
    async fn open(&self, url: &str, wait_until: WaitUntil) -> Result<Box<dyn Page>> {
        let browser = self.browser.clone();
        let url = url.to_string();
        let settle = match wait_until {
            WaitUntil::Load => Duration::ZERO,
            WaitUntil::NetworkIdle => self.network_idle,
        };

        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>> {
            let tab = browser
                .new_tab()
                .map_err(|e| ScanError::Render(format!("new tab: {}", e)))?;
            if let Err(e) = tab.navigate_to(&url).and_then(|t| t.wait_until_navigated()) {
                let _ = tab.close(false);
                return Err(ScanError::Render(format!("{}: {}", url, e)));
            }
            Ok(tab)
        })
        .await??;

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        debug!("Opened {}", tab.get_url());
        Ok(Box::new(HeadlessPage { tab }))
    }
}

pub struct HeadlessPage {
    tab: Arc<Tab>,
}

impl HeadlessPage {
    async fn with_tab<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || op(&tab))
            .await?
            .map_err(|e| ScanError::Interaction(e.to_string()))
    }
}

const QUERY_JS: &str = r#"
    (function(sel) {
        return JSON.stringify(Array.from(document.querySelectorAll(sel)).map(function(el, i) {
            var style = window.getComputedStyle(el);
            var boxed = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
            return {
                index: i,
                tag: el.tagName.toLowerCase(),
                type: el.getAttribute('type'),
                id: el.getAttribute('id'),
                name: el.getAttribute('name'),
                visible: boxed && style.visibility !== 'hidden' && style.display !== 'none',
                enabled: !el.disabled
            };
        }));
    })(%SELECTOR%)
"#;

// Goes through the prototype's setter: React tracks values assigned on the
// element itself and would swallow the input event.
const FILL_JS: &str = r#"
    function(value) {
        this.focus();
        const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(this), 'value').set;
        setter.call(this, value);
        this.dispatchEvent(new Event('input', { bubbles: true }));
        this.dispatchEvent(new Event('change', { bubbles: true }));
    }
"#;

fn nth_element<'a>(
    tab: &'a Tab,
    target: &ElementRef,
) -> anyhow::Result<headless_chrome::Element<'a>> {
    tab.find_elements(&target.selector)?
        .into_iter()
        .nth(target.index)
        .ok_or_else(|| anyhow::anyhow!("no element {} #{}", target.selector, target.index))
}

#[async_trait]
impl Page for HeadlessPage {
    fn url(&self) -> String {
        self.tab.get_url()
    }

    async fn content(&self) -> Result<String> {
        self.with_tab(|tab| tab.get_content()).await
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        let selector = selector.to_string();
        self.with_tab(move |tab| tab.find_element(&selector)?.get_inner_text())
            .await
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementInfo>> {
        let literal = serde_json::to_string(selector)
            .map_err(|e| ScanError::Interaction(e.to_string()))?;
        let expression = QUERY_JS.replace("%SELECTOR%", &literal);

        self.with_tab(move |tab| {
            let remote = tab.evaluate(&expression, false)?;
            match remote.value {
                Some(serde_json::Value::String(json)) => Ok(serde_json::from_str(&json)?),
                _ => Ok(Vec::new()),
            }
        })
        .await
    }

    async fn fill(&self, target: &ElementRef, text: &str) -> Result<()> {
        let target = target.clone();
        let text = text.to_string();
        self.with_tab(move |tab| {
            nth_element(tab, &target)?.call_js_fn(
                FILL_JS,
                vec![serde_json::Value::String(text)],
                false,
            )?;
            Ok(())
        })
        .await
    }

    async fn press(&self, target: &ElementRef, key: &str) -> Result<()> {
        let target = target.clone();
        let key = key.to_string();
        self.with_tab(move |tab| {
            nth_element(tab, &target)?.focus()?;
            tab.press_key(&key)?;
            Ok(())
        })
        .await
    }

    async fn click(&self, target: &ElementRef) -> Result<()> {
        let target = target.clone();
        self.with_tab(move |tab| {
            nth_element(tab, &target)?.click()?;
            Ok(())
        })
        .await
    }
}

impl Drop for HeadlessPage {
    fn drop(&mut self) {
        let tab = self.tab.clone();
        let close = move || {
            if let Err(e) = tab.close(false) {
                debug!("Failed to close tab: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(close);
            }
            Err(_) => close(),
        }
    }
}
