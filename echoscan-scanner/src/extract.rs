use crate::normalize::{normalize_spa, normalize_static, strip_fragment};
use crate::transport::DomainScope;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
static ROUTER_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[routerlink]").expect("static selector"));
static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("static selector"));

/// Pulls same-domain candidate links out of a document.
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, document: &str, current_url: &str) -> Vec<String>;
}

/// Link extraction for conventional server-rendered sites.
pub struct StaticLinkExtractor {
    scope: DomainScope,
}

impl StaticLinkExtractor {
    pub fn new(scope: DomainScope) -> Self {
        Self { scope }
    }
}

impl LinkExtractor for StaticLinkExtractor {
    fn extract(&self, document: &str, current_url: &str) -> Vec<String> {
        let document = Html::parse_document(document);
        let mut links = Vec::new();

        for element in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if is_non_navigable(href) || href.starts_with('#') {
                continue;
            }
            let Some(absolute) = join(current_url, href) else {
                continue;
            };
            let absolute = normalize_static(&absolute);

            if self.scope.contains(&absolute) {
                debug!("Found link: {}", absolute);
                links.push(absolute);
            } else {
                debug!("Skipping off-domain link: {}", absolute);
            }
        }

        links
    }
}

/// Link extraction for single-page apps whose routes live in the fragment.
pub struct SpaLinkExtractor {
    scope: DomainScope,
}

impl SpaLinkExtractor {
    pub fn new(scope: DomainScope) -> Self {
        Self { scope }
    }

    fn href_to_absolute(href: &str, current_url: &str) -> Option<String> {
        if let Some(route) = href.strip_prefix("#/") {
            return Some(format!("{}#/{}", strip_fragment(current_url), route));
        }
        if href.starts_with('#') {
            // Same-page anchor.
            return None;
        }
        join(current_url, href)
    }

    fn keep(&self, candidate: &str, links: &mut BTreeSet<String>) {
        let normalized = normalize_spa(candidate);
        if self.scope.contains(&normalized) {
            debug!("Found route: {}", normalized);
            links.insert(normalized);
        }
    }
}

impl LinkExtractor for SpaLinkExtractor {
    fn extract(&self, document: &str, current_url: &str) -> Vec<String> {
        let document = Html::parse_document(document);
        let mut links = BTreeSet::new();

        for element in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if is_non_navigable(href) {
                continue;
            }
            if let Some(absolute) = Self::href_to_absolute(href, current_url) {
                self.keep(&absolute, &mut links);
            }
        }

        // Angular-style routerLink; html5ever lowercases attribute names.
        let base = strip_fragment(current_url);
        for element in document.select(&ROUTER_LINK_SELECTOR) {
            let Some(route) = element.value().attr("routerlink") else {
                continue;
            };
            let route = route.trim();
            if route.is_empty() {
                continue;
            }
            if let Some(absolute) = join(base, route) {
                self.keep(&absolute, &mut links);
            }
        }

        links.into_iter().collect()
    }
}

/// Number of `<form>` elements in a document.
pub fn count_forms(document: &str) -> usize {
    Html::parse_document(document).select(&FORM_SELECTOR).count()
}

fn is_non_navigable(href: &str) -> bool {
    href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
}

fn join(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}
