// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{load_payloads_from_file, options_from_matches, parse_url_line, resolve_payloads};

// Re-export scan functionality from echoscan-core
pub use echoscan_core::scan::{ScanOptions, ScanReport, execute_crawl, execute_scan, extract_url_path};
