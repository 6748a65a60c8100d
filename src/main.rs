//! Folio CLI entry point.
//!
//! Parses arguments, dispatches to the CLI module, prints errors to
//! stderr, and exits non-zero on failure. All startup logic lives in
//! `cli::run`.

use folio::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
