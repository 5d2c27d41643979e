// Report generation from scan results

use crate::scan::{ScanReport, extract_url_path};
use chrono::{DateTime, Utc};
use echoscan_scanner::{ScanResult, Severity};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub report_id: String,
    pub target: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: Vec<PageEntry>,
    pub failed_pages: Vec<FailedPage>,
    /// `None` for crawl-only runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<ScanResult>>,
    pub severity_counts: SeverityCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub url: String,
    pub depth: usize,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub links_found: usize,
    pub forms_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    pub depth: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[ScanResult]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity() {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

impl ReportData {
    pub fn from_scan(report: &ScanReport) -> Self {
        // Visited URLs sorted; each page carries its crawl record when there is one.
        let pages = report
            .outcome
            .visited_urls()
            .into_iter()
            .filter_map(|url| {
                report
                    .outcome
                    .pages
                    .iter()
                    .find(|p| p.url == url && !p.is_skipped())
            })
            .map(|p| PageEntry {
                url: p.url.clone(),
                depth: p.depth,
                status_code: p.status_code,
                content_type: p.content_type.clone(),
                links_found: p.links_found.len(),
                forms_found: p.forms_found,
            })
            .collect();

        let failed_pages = report
            .outcome
            .failed_pages()
            .map(|p| FailedPage {
                url: p.url.clone(),
                depth: p.depth,
                error: p.error.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            target: report.target.clone(),
            mode: report.mode.to_string(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            pages,
            failed_pages,
            severity_counts: SeverityCounts::from_findings(report.findings()),
            findings: report.findings.clone(),
        }
    }

    pub fn visited_count(&self) -> usize {
        self.pages.len() + self.failed_pages.len()
    }

    pub fn findings(&self) -> &[ScanResult] {
        self.findings.as_deref().unwrap_or_default()
    }

    fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Csv => Ok(generate_csv_report(data)),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                        ECHOSCAN REFLECTED XSS REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Report ID:    {}\n", data.report_id));
    report.push_str(&format!("Target:       {}\n", data.target));
    report.push_str(&format!("Mode:         {}\n", data.mode));
    report.push_str(&format!(
        "Scan Date:    {}\n",
        data.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Duration:     {} seconds\n", data.duration_seconds()));
    report.push_str(&format!("Pages Found:  {}\n", data.visited_count()));
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("VISITED PAGES\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    if data.pages.is_empty() {
        report.push_str("  (none)\n");
    }
    for page in &data.pages {
        let mut line = format!(
            "  [{}] {} {}",
            page.depth,
            status_label(page.status_code),
            page.url
        );
        if let Some(ref content_type) = page.content_type
            && !content_type.contains("text/html")
        {
            line.push_str(&format!("  {}", content_type));
        }
        report.push_str(&line);
        report.push('\n');
    }

    if !data.failed_pages.is_empty() {
        report.push_str("\nSkipped (fetch/render failed):\n");
        for page in &data.failed_pages {
            report.push_str(&format!("  [{}] {}\n", page.depth, page.url));
            report.push_str(&wrap_text(&page.error, 80, "        "));
        }
    }
    report.push('\n');

    if let Some(ref findings) = data.findings {
        report.push_str(HEAVY_RULE);
        report.push_str("EXECUTIVE SUMMARY\n");
        report.push_str(HEAVY_RULE);
        report.push('\n');

        report.push_str(&format!("Total Findings: {}\n\n", data.severity_counts.total()));
        if findings.is_empty() {
            report.push_str("  No potential reflected XSS found (with basic checks).\n");
        }
        for (label, count) in severity_rows(&data.severity_counts) {
            if count > 0 {
                report.push_str(&format!("  {:<10} {}\n", label, count));
            }
        }
        report.push('\n');

        if !findings.is_empty() {
            report.push_str(HEAVY_RULE);
            report.push_str("DETAILED FINDINGS\n");
            report.push_str(HEAVY_RULE);
            report.push('\n');

            for (idx, finding) in findings.iter().enumerate() {
                report.push_str(&format!("[{}] {}\n", idx + 1, finding.vulnerability_name()));
                report.push_str(&format!("Severity:     {}\n", finding.severity()));
                report.push_str(&format!("URL:          {}\n", finding.url()));
                report.push_str("\nDetail:\n");
                report.push_str(&wrap_text(finding.detail(), 80, "  "));
                report.push('\n');
                report.push_str(LIGHT_RULE);
                report.push('\n');
            }
        }
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                          End of Report\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\nGenerated by echoscan - crawl-and-probe reflected XSS scanner\n");
    report.push_str("For authorized security testing only.\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "echoscan",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "scan": {
                "id": data.report_id,
                "target": data.target,
                "mode": data.mode,
                "start_time": data.started_at.to_rfc3339(),
                "end_time": data.finished_at.to_rfc3339(),
                "duration_seconds": data.duration_seconds()
            },
            "summary": {
                "visited_pages": data.visited_count(),
                "failed_pages": data.failed_pages.len(),
                "total_findings": data.severity_counts.total(),
                "severity_breakdown": data.severity_counts
            },
            "pages": data.pages,
            "failed_pages": data.failed_pages,
            "findings": data.findings
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// One row per finding; crawl-only reports list the visited pages instead.
pub fn generate_csv_report(data: &ReportData) -> String {
    let mut csv = String::new();

    match data.findings {
        Some(ref findings) => {
            csv.push_str("url,vulnerability,severity,detail\n");
            for finding in findings {
                csv.push_str(&format!(
                    "{},{},{},{}\n",
                    csv_field(finding.url()),
                    csv_field(finding.vulnerability_name()),
                    csv_field(finding.severity().as_str()),
                    csv_field(finding.detail())
                ));
            }
        }
        None => {
            csv.push_str("url,depth,status_code,content_type,error\n");
            for page in &data.pages {
                csv.push_str(&format!(
                    "{},{},{},{},\n",
                    csv_field(&page.url),
                    page.depth,
                    page.status_code,
                    csv_field(page.content_type.as_deref().unwrap_or(""))
                ));
            }
            for page in &data.failed_pages {
                csv.push_str(&format!(
                    "{},{},0,,{}\n",
                    csv_field(&page.url),
                    page.depth,
                    csv_field(&page.error)
                ));
            }
        }
    }

    csv
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut md = String::new();

    md.push_str("# echoscan Report\n\n");
    md.push_str(&format!("- **Report ID:** `{}`\n", data.report_id));
    md.push_str(&format!("- **Target:** {}\n", data.target));
    md.push_str(&format!("- **Mode:** {}\n", data.mode));
    md.push_str(&format!("- **Started:** {}\n", data.started_at.to_rfc3339()));
    md.push_str(&format!("- **Duration:** {} seconds\n", data.duration_seconds()));
    md.push_str(&format!("- **Pages visited:** {}\n\n", data.visited_count()));

    if let Some(ref findings) = data.findings {
        md.push_str("## Findings\n\n");
        if findings.is_empty() {
            md.push_str("No potential reflected XSS found.\n\n");
        } else {
            md.push_str("| Severity | Count |\n|---|---|\n");
            for (label, count) in severity_rows(&data.severity_counts) {
                if count > 0 {
                    md.push_str(&format!("| {} | {} |\n", label, count));
                }
            }
            md.push('\n');

            for (idx, finding) in findings.iter().enumerate() {
                md.push_str(&format!(
                    "### {}. {}\n\n",
                    idx + 1,
                    finding.vulnerability_name()
                ));
                md.push_str(&format!("- **Severity:** {}\n", finding.severity()));
                md.push_str(&format!("- **URL:** `{}`\n", finding.url().replace('`', "\\`")));
                md.push_str(&format!("- **Detail:** {}\n\n", md_escape(finding.detail())));
            }
        }
    }

    md.push_str("## Visited Pages\n\n");
    md.push_str("| Depth | Status | Path | URL |\n|---|---|---|---|\n");
    for page in &data.pages {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            page.depth,
            page.status_code,
            md_escape(&extract_url_path(&page.url)),
            md_escape(&page.url)
        ));
    }
    md.push('\n');

    if !data.failed_pages.is_empty() {
        md.push_str("## Skipped Pages\n\n");
        for page in &data.failed_pages {
            md.push_str(&format!("- {} - {}\n", md_escape(&page.url), md_escape(&page.error)));
        }
        md.push('\n');
    }

    md
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn severity_rows(counts: &SeverityCounts) -> [(&'static str, usize); 5] {
    [
        ("[CRITICAL]", counts.critical),
        ("[HIGH]", counts.high),
        ("[MEDIUM]", counts.medium),
        ("[LOW]", counts.low),
        ("[INFO]", counts.info),
    ]
}

fn status_label(status_code: u16) -> String {
    match status_code {
        0 => "---".to_string(),
        code => code.to_string(),
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn md_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
