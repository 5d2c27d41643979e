use clap::ArgMatches;
use colored::Colorize;
use echoscan_core::report::{ReportData, ReportFormat, generate_report, save_report};
use echoscan_core::scan::{ScanOptions, ScanProgressCallback, ScanReport, execute_crawl, execute_scan};
use pager::Pager;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

// Helper functions for the crawl and scan handlers

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // "host:port" parses as a URL with scheme "host", so require a host
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    None
}

/// Load payloads from a newline-delimited file; blank lines and `#` comments are skipped
pub fn load_payloads_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read payload file {}: {}", path.display(), e))?;

    let payloads: Vec<String> = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(String::from)
        .collect();

    if payloads.is_empty() {
        return Err(format!("No payloads found in {}", path.display()));
    }

    debug!("Loaded {} payloads from {}", payloads.len(), path.display());
    Ok(payloads)
}

/// Payloads from `-p`, `-P`, or the built-in defaults, in that order of preference
pub fn resolve_payloads(
    inline: Option<Vec<String>>,
    payload_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(payloads) = inline
        && !payloads.is_empty()
    {
        return Ok(payloads);
    }
    if let Some(path) = payload_file {
        return load_payloads_from_file(path);
    }
    Ok(ScanOptions::default().payloads)
}

/// Build scan options from the arguments shared by `crawl` and `scan`
pub fn options_from_matches(sub_matches: &ArgMatches, quiet: bool) -> Result<ScanOptions, String> {
    let raw_url = sub_matches
        .get_one::<String>("url")
        .ok_or_else(|| "--url is required".to_string())?;
    let url = parse_url_line(raw_url.trim()).ok_or_else(|| format!("'{}' is not a valid URL", raw_url))?;

    let defaults = ScanOptions::default();
    Ok(ScanOptions {
        url,
        max_depth: sub_matches
            .get_one::<usize>("max-depth")
            .copied()
            .unwrap_or(defaults.max_depth),
        max_pages: sub_matches
            .get_one::<usize>("max-pages")
            .copied()
            .unwrap_or(defaults.max_pages),
        dynamic: sub_matches.get_flag("dynamic"),
        timeout_secs: sub_matches
            .get_one::<u64>("timeout")
            .copied()
            .unwrap_or(defaults.timeout_secs),
        show_progress_bars: !quiet,
        ..defaults
    })
}

/// Install the fmt subscriber; `-v` turns on debug output for our crates.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "echoscan=debug,echoscan_core=debug,echoscan_scanner=debug"
    } else {
        "warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_target(false)
        .try_init();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_configuration(title: &str, options: &ScanOptions) {
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
    println!("{} Target:    {}", "→".blue(), options.url.bright_white());
    println!("{} Mode:      {}", "→".blue(), options.mode());
    println!("{} Max depth: {}", "→".blue(), options.max_depth);
    println!("{} Max pages: {}", "→".blue(), options.max_pages);
    println!();
}

fn status_callback(quiet: bool) -> Option<ScanProgressCallback> {
    if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{} {}", "→".blue(), msg);
        }))
    }
}

fn report_format(sub_matches: &ArgMatches) -> ReportFormat {
    sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

/// Render the report and either save it or page it to the terminal
fn emit_report(report: &ScanReport, sub_matches: &ArgMatches, quiet: bool) {
    let format = report_format(sub_matches);
    let data = ReportData::from_scan(report);
    let content = match generate_report(&data, format) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{} Failed to generate report: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    match sub_matches.get_one::<PathBuf>("output") {
        Some(output) => {
            let expanded = shellexpand::tilde(&output.to_string_lossy()).to_string();
            let path = Path::new(&expanded);
            match save_report(&content, path) {
                Ok(()) => println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                ),
                Err(e) => {
                    eprintln!("{} Failed to save report: {}", "✗".red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            if !quiet && format == ReportFormat::Text {
                Pager::with_pager("less -R").setup();
            }
            print!("{}", content);
        }
    }
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) {
    let options = match options_from_matches(sub_matches, quiet) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        print_configuration("ECHOSCAN CRAWL", &options);
    }

    let report = match execute_crawl(options, status_callback(quiet)).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        println!(
            "\n{} Crawl complete! {} pages visited, {} skipped\n",
            "✓".green().bold(),
            report.outcome.visited.len(),
            report.outcome.failed_pages().count()
        );
    }

    emit_report(&report, sub_matches, quiet);
}

pub async fn handle_scan(sub_matches: &ArgMatches, quiet: bool) {
    let options = match options_from_matches(sub_matches, quiet) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let inline = sub_matches
        .get_many::<String>("payload")
        .map(|values| values.cloned().collect());
    let payloads = match resolve_payloads(inline, sub_matches.get_one::<PathBuf>("payload-file")) {
        Ok(payloads) => payloads,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let options = ScanOptions {
        payloads,
        headless: !sub_matches.get_flag("show-browser"),
        ..options
    };

    if !quiet {
        print_configuration("ECHOSCAN SCAN", &options);
        println!("{} Payloads:  {}\n", "→".blue(), options.payloads.len());
    }

    let report = match execute_scan(options, status_callback(quiet)).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} Scan failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        let findings = report.findings();
        println!();
        if findings.is_empty() {
            println!(
                "{} No potential reflected XSS found (with basic checks).",
                "-".yellow()
            );
        } else {
            println!(
                "{} Found {} potential XSS issue(s):",
                "+".red().bold(),
                findings.len()
            );
            for finding in findings {
                println!("  - {}", finding);
            }
        }
        println!();
    }

    emit_report(&report, sub_matches, quiet);
}
