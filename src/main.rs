#![forbid(unsafe_code)]

//! slist filesystem snapshot CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        if e.is_reportable() {
            eprintln!("slist: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
