use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome of fetching or rendering one page during a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub depth: usize,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response_time: Duration,
    pub links_found: Vec<String>,
    pub forms_found: usize,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            status_code: 0,
            content_type: None,
            content_length: None,
            response_time: Duration::from_secs(0),
            links_found: Vec::new(),
            forms_found: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of reflection the prober can confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnerabilityKind {
    /// A query parameter came back in the rendered page.
    RenderedReflection,
    /// A guessed `q` parameter on a `#/search` route came back.
    SpaRouteReflection,
    /// Text typed into a form field came back after submit.
    FormReflection,
}

impl VulnerabilityKind {
    pub fn name(&self) -> &'static str {
        match self {
            VulnerabilityKind::RenderedReflection => "Potential XSS (DOM/Rendered Reflection)",
            VulnerabilityKind::SpaRouteReflection => "Potential XSS (SPA Route Param Reflection)",
            VulnerabilityKind::FormReflection => "Potential XSS (Form/Input Reflection)",
        }
    }
}

/// A confirmed reflection. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    url: String,
    #[serde(rename = "vulnerability", with = "kind_name")]
    kind: VulnerabilityKind,
    severity: Severity,
    detail: String,
}

impl ScanResult {
    /// Every confirmed reflection is reported as HIGH; no mitigating analysis is done.
    pub fn new(url: impl Into<String>, kind: VulnerabilityKind, detail: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            severity: Severity::High,
            detail: detail.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> VulnerabilityKind {
        self.kind
    }

    pub fn vulnerability_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {} - {}",
            self.severity,
            self.kind.name(),
            self.url,
            self.detail
        )
    }
}

// Findings serialize with the human-readable vulnerability name.
mod kind_name {
    use super::VulnerabilityKind;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const ALL: [VulnerabilityKind; 3] = [
        VulnerabilityKind::RenderedReflection,
        VulnerabilityKind::SpaRouteReflection,
        VulnerabilityKind::FormReflection,
    ];

    pub fn serialize<S: Serializer>(kind: &VulnerabilityKind, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(kind.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VulnerabilityKind, D::Error> {
        let name = String::deserialize(d)?;
        ALL.into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| D::Error::custom(format!("unknown vulnerability: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_result_is_always_high() {
        let result = ScanResult::new(
            "http://x/search?q=1",
            VulnerabilityKind::RenderedReflection,
            "Query param 'q' reflected",
        );
        assert_eq!(result.severity(), Severity::High);
        assert_eq!(
            result.vulnerability_name(),
            "Potential XSS (DOM/Rendered Reflection)"
        );
    }

    #[test]
    fn test_scan_result_display() {
        let result = ScanResult::new("http://x/", VulnerabilityKind::FormReflection, "Injected into #q");
        assert_eq!(
            result.to_string(),
            "[HIGH] Potential XSS (Form/Input Reflection) at http://x/ - Injected into #q"
        );
    }

    #[test]
    fn test_scan_result_json_shape() {
        let result = ScanResult::new("http://x/#/search?q=p", VulnerabilityKind::SpaRouteReflection, "d");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["url"], "http://x/#/search?q=p");
        assert_eq!(value["vulnerability"], "Potential XSS (SPA Route Param Reflection)");
        assert_eq!(value["severity"], "HIGH");
        assert_eq!(value["detail"], "d");

        let back: ScanResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_crawl_result_with_error_is_skipped() {
        let ok = CrawlResult::new("http://x/".to_string(), 0);
        let failed = CrawlResult::with_error("http://x/a".to_string(), 1, "boom".to_string());
        assert!(!ok.is_skipped());
        assert!(failed.is_skipped());
        assert_eq!(failed.depth, 1);
    }
}
