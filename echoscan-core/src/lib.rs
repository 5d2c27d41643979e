pub mod report;
pub mod scan;

use colored::Colorize;

const BANNER: &str = r#"
  ███████╗ ██████╗██╗  ██╗ ██████╗ ███████╗ ██████╗ █████╗ ███╗   ██╗
  ██╔════╝██╔════╝██║  ██║██╔═══██╗██╔════╝██╔════╝██╔══██╗████╗  ██║
  █████╗  ██║     ███████║██║   ██║███████╗██║     ███████║██╔██╗ ██║
  ██╔══╝  ██║     ██╔══██║██║   ██║╚════██║██║     ██╔══██║██║╚██╗██║
  ███████╗╚██████╗██║  ██║╚██████╔╝███████║╚██████╗██║  ██║██║ ╚████║
  ╚══════╝ ╚═════╝╚═╝  ╚═╝ ╚═════╝ ╚══════╝ ╚═════╝╚═╝  ╚═╝╚═╝  ╚═══╝"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "crawl-and-probe reflected XSS scanner".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
