//! Gardenia — keeps editor plugin bundles at the tip of their primary branch.
//!
//! # Usage
//!
//! ```text
//! gardenia [-c <cache dir>] [-e] [-f] [-l] [-j <jobs>]
//!          [--install-root <path>] [--config <path>] [--branch <name>] [--json] [-v...]
//! ```
//!
//! Bundles are declared in `<install root>/gardenia.json`.

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::sync::SyncArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gardenia",
    version,
    about = "Install and update plugin bundles from their upstream branch",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    sync: SyncArgs,

    /// Raise log verbosity (-v info, -vv debug). `GARDENIA_LOG` overrides.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.sync.run()
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("GARDENIA_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
