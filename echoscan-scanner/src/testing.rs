// In-memory transport and browser used by the engine's unit tests.

use crate::browser::{Browser, ElementInfo, ElementRef, Page, WaitUntil};
use crate::error::{Result, ScanError};
use crate::oracle::html_escape;
use crate::transport::{DomainScope, HttpResponse, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct FakeTransport {
    scope: DomainScope,
    base: String,
    pages: HashMap<String, std::result::Result<HttpResponse, String>>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(base: &str) -> Self {
        Self {
            scope: DomainScope::new(base).unwrap(),
            base: base.to_string(),
            pages: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn html(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(response(url, "text/html; charset=utf-8", body)));
        self
    }

    /// Serves `body` for `url` as if the request had been redirected to `target`.
    pub fn redirect(mut self, url: &str, target: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(response(target, "text/html", body)));
        self
    }

    pub fn resource(mut self, url: &str, content_type: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(response(url, content_type, body)));
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Err("connection reset".to_string()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn response(url: &str, content_type: &str, body: &str) -> HttpResponse {
    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), content_type.to_string());
    HttpResponse {
        url: url.to_string(),
        status: 200,
        headers,
        body: body.to_string(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(msg)) => Err(ScanError::Network(msg.clone())),
            None => Err(ScanError::Network(format!("connection refused: {}", url))),
        }
    }

    fn same_domain(&self, url: &str) -> bool {
        self.scope.contains(url)
    }

    fn resolve(&self, url: &str) -> String {
        url::Url::parse(&self.base)
            .and_then(|b| b.join(url))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string())
    }

    fn scope(&self) -> &DomainScope {
        &self.scope
    }
}

/// How a fake page reacts to a submitted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Nothing,
    Raw,
    Escaped,
}

type RenderFn = dyn Fn(&str) -> Result<String> + Send + Sync;

pub struct FakeBrowser {
    render: Arc<RenderFn>,
    elements: Arc<HashMap<String, Vec<ElementInfo>>>,
    echo: Echo,
    echo_on_click_only: bool,
    fail_fill: bool,
    hidden_queries: usize,
    pub opened: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicUsize>,
    pub actions: Arc<Mutex<Vec<String>>>,
}

impl FakeBrowser {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            render: Arc::new(render),
            elements: Arc::new(HashMap::new()),
            echo: Echo::Nothing,
            echo_on_click_only: false,
            fail_fill: false,
            hidden_queries: 0,
            opened: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicUsize::new(0)),
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serves the same static document for every URL.
    pub fn serving(html: &str) -> Self {
        let html = html.to_string();
        Self::new(move |_| Ok(html.clone()))
    }

    pub fn with_elements(mut self, selector: &str, infos: Vec<ElementInfo>) -> Self {
        Arc::make_mut(&mut self.elements).insert(selector.to_string(), infos);
        self
    }

    pub fn echoing(mut self, echo: Echo) -> Self {
        self.echo = echo;
        self
    }

    pub fn echo_on_click_only(mut self) -> Self {
        self.echo_on_click_only = true;
        self
    }

    pub fn failing_fill(mut self) -> Self {
        self.fail_fill = true;
        self
    }

    /// Each page reports its elements as hidden for the first `queries`
    /// lookups of every selector, like fields a SPA renders late.
    pub fn revealing_after(mut self, queries: usize) -> Self {
        self.hidden_queries = queries;
        self
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn action_log(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open(&self, url: &str, _wait_until: WaitUntil) -> Result<Box<dyn Page>> {
        self.opened.lock().unwrap().push(url.to_string());
        let html = (self.render)(url)?;
        Ok(Box::new(FakePage {
            url: url.to_string(),
            html,
            elements: self.elements.clone(),
            echo: self.echo,
            echo_on_click_only: self.echo_on_click_only,
            fail_fill: self.fail_fill,
            hidden_queries: self.hidden_queries,
            queries: Mutex::new(HashMap::new()),
            state: Mutex::new(PageState::default()),
            closed: self.closed.clone(),
            actions: self.actions.clone(),
        }))
    }
}

#[derive(Default)]
struct PageState {
    filled: Option<String>,
    submitted: bool,
}

pub struct FakePage {
    url: String,
    html: String,
    elements: Arc<HashMap<String, Vec<ElementInfo>>>,
    echo: Echo,
    echo_on_click_only: bool,
    fail_fill: bool,
    hidden_queries: usize,
    queries: Mutex<HashMap<String, usize>>,
    state: Mutex<PageState>,
    closed: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl FakePage {
    fn echoed(&self) -> String {
        let state = self.state.lock().unwrap();
        match (&state.filled, state.submitted, self.echo) {
            (Some(value), true, Echo::Raw) => value.clone(),
            (Some(value), true, Echo::Escaped) => html_escape(value),
            _ => String::new(),
        }
    }

    fn log(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn exists(&self, target: &ElementRef) -> Result<()> {
        let found = self
            .elements
            .get(&target.selector)
            .map(|infos| target.index < infos.len())
            .unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(ScanError::Interaction(format!("no element {}", target.selector)))
        }
    }
}

#[async_trait]
impl Page for FakePage {
    fn url(&self) -> String {
        self.url.clone()
    }

    async fn content(&self) -> Result<String> {
        Ok(format!("{}<div id=\"echo\">{}</div>", self.html, self.echoed()))
    }

    async fn inner_text(&self, _selector: &str) -> Result<String> {
        Ok(self.echoed())
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementInfo>> {
        let seen = {
            let mut queries = self.queries.lock().unwrap();
            let count = queries.entry(selector.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let mut infos = self.elements.get(selector).cloned().unwrap_or_default();
        if seen <= self.hidden_queries {
            for info in &mut infos {
                info.visible = false;
            }
        }
        Ok(infos)
    }

    async fn fill(&self, target: &ElementRef, text: &str) -> Result<()> {
        self.exists(target)?;
        if self.fail_fill {
            return Err(ScanError::Interaction("element is not editable".to_string()));
        }
        self.log(format!("fill {}[{}]", target.selector, target.index));
        self.state.lock().unwrap().filled = Some(text.to_string());
        Ok(())
    }

    async fn press(&self, target: &ElementRef, key: &str) -> Result<()> {
        self.exists(target)?;
        self.log(format!("press {} {}", target.selector, key));
        if !self.echo_on_click_only {
            self.state.lock().unwrap().submitted = true;
        }
        Ok(())
    }

    async fn click(&self, target: &ElementRef) -> Result<()> {
        self.exists(target)?;
        self.log(format!("click {}[{}]", target.selector, target.index));
        self.state.lock().unwrap().submitted = true;
        Ok(())
    }
}

impl Drop for FakePage {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn field(index: usize, input_type: Option<&str>, id: Option<&str>, name: Option<&str>) -> ElementInfo {
    ElementInfo {
        index,
        tag: "input".to_string(),
        input_type: input_type.map(String::from),
        id: id.map(String::from),
        name: name.map(String::from),
        visible: true,
        enabled: true,
    }
}
