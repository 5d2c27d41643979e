use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How pages are fetched and which URL identity applies to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalMode {
    /// Plain HTTP GET; fragments are not distinct resources.
    Static,
    /// Rendered in a browser; fragments carry client-side routes.
    Dynamic,
}

impl TraversalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalMode::Static => "static",
            TraversalMode::Dynamic => "dynamic",
        }
    }

    pub fn normalize(&self, url: &str) -> String {
        match self {
            TraversalMode::Static => normalize_static(url),
            TraversalMode::Dynamic => normalize_spa(url),
        }
    }
}

impl fmt::Display for TraversalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drops the fragment.
///
/// Parseable URLs come back in `url::Url`'s serialization: the scheme and host
/// are lowercased, an empty path becomes `/` and unsafe characters are
/// percent-encoded, so `HTTP://Example.com` and `http://example.com/` are one
/// page. Anything else is cut at the first `#` and left as is.
pub fn normalize_static(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => strip_fragment(url).to_string(),
    }
}

/// Keeps the fragment (SPA routers live there) and only trims trailing slashes.
pub fn normalize_spa(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// The part of a URL before the first `#`.
pub fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map(|(base, _)| base).unwrap_or(url)
}
