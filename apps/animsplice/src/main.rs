//! # animsplice
//!
//! Command-line front end for the animsplice engine.
//!
//! ## Usage
//!
//! ```bash
//! # Splice a hat's animation layers into an avatar graph
//! animsplice merge -s hat.json -d avatar.json -c hat.toml -o merged.json
//!
//! # Inspect and fingerprint documents
//! animsplice inspect -i merged.json
//! animsplice hash -i merged.aspl --json-mode
//! ```

use animsplice::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // ANIMSPLICE_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("ANIMSPLICE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "animsplice=debug,animsplice_core=debug"
    } else {
        "animsplice=info,animsplice_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
