pub mod browser;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod oracle;
pub mod probe;
pub mod result;
pub mod transport;

#[cfg(test)]
mod testing;

pub use browser::{Browser, BrowserOptions, HeadlessBrowser, Page, WaitUntil};
pub use crawler::{CrawlOutcome, Crawler, ProgressCallback};
pub use error::ScanError;
pub use oracle::{Reflection, is_reflected};
pub use probe::{FormTarget, ProbeConfig, Prober};
pub use result::{CrawlResult, ScanResult, Severity, VulnerabilityKind};
pub use transport::{DomainScope, HttpTransport, Transport};
pub use normalize::TraversalMode;
