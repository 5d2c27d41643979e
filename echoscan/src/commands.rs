use crate::CLAP_STYLING;
use clap::{Arg, arg, command};

fn target_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-u --"url" <URL>)
            .required(true)
            .help("The target URL (http:// is assumed when no scheme is given)"),
    )
    .arg(
        arg!(-d --"max-depth" <DEPTH>)
            .required(false)
            .help("Maximum link depth from the start URL")
            .value_parser(clap::value_parser!(usize))
            .default_value("2"),
    )
    .arg(
        arg!(-m --"max-pages" <PAGES>)
            .required(false)
            .help("Maximum number of pages to visit")
            .value_parser(clap::value_parser!(usize))
            .default_value("50"),
    )
    .arg(
        arg!(--"dynamic")
            .required(false)
            .help("Render pages in a headless browser and follow SPA hash routes")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("HTTP request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("10"),
    )
}

fn report_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, csv, markdown")
            .value_parser(["text", "json", "csv", "markdown", "md"])
            .default_value("text"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("echoscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("echoscan")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .subcommand_required(false)
        .subcommand(report_args(target_args(
            command!("crawl").about(
                "Crawl a target breadth-first within depth and page limits and list the visited \
                pages.",
            ),
        )))
        .subcommand(
            report_args(target_args(command!("scan").about(
                "Crawl a target, then probe every visited page for reflected XSS through query \
                parameters, SPA search routes and form fields.",
            )))
            .arg(
                Arg::new("payload")
                    .short('p')
                    .long("payload")
                    .value_name("PAYLOAD")
                    .help("Payload to inject (repeatable; replaces the built-in payloads)")
                    .action(clap::ArgAction::Append)
                    .conflicts_with("payload-file"),
            )
            .arg(
                arg!(-P --"payload-file" <PATH>)
                    .required(false)
                    .help("Newline-delimited payload file ('#' starts a comment)")
                    .value_parser(clap::value_parser!(std::path::PathBuf)),
            )
            .arg(
                arg!(--"show-browser")
                    .required(false)
                    .help("Run the browser with a visible window")
                    .action(clap::ArgAction::SetTrue),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["echoscan", "scan", "-u", "localhost:3000"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "scan");
        assert_eq!(sub.get_one::<usize>("max-depth"), Some(&2));
        assert_eq!(sub.get_one::<usize>("max-pages"), Some(&50));
        assert_eq!(sub.get_one::<u64>("timeout"), Some(&10));
        assert!(!sub.get_flag("dynamic"));
        assert!(sub.get_many::<String>("payload").is_none());
    }

    #[test]
    fn test_scan_repeated_payloads() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "echoscan", "-q", "scan", "-u", "http://x/", "--dynamic", "-p", "<a>", "-p", "<b>",
            ])
            .unwrap();
        assert!(matches.get_flag("quiet"));
        let sub = matches.subcommand_matches("scan").unwrap();
        let payloads: Vec<&String> = sub.get_many::<String>("payload").unwrap().collect();
        assert_eq!(payloads, vec!["<a>", "<b>"]);
        assert!(sub.get_flag("dynamic"));
    }

    #[test]
    fn test_crawl_has_no_payload_options() {
        let result = command_argument_builder().try_get_matches_from([
            "echoscan", "crawl", "-u", "http://x/", "-p", "<a>",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_url_is_required() {
        assert!(
            command_argument_builder()
                .try_get_matches_from(["echoscan", "scan"])
                .is_err()
        );
    }
}
