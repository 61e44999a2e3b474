mod cli;
mod commands;
mod config;
mod error;
mod io;
mod logging;
mod output;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("AquaNet CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = match cli.command {
        Commands::Analyze(ref args) => {
            info!("Dispatching to 'analyze' command.");
            commands::analyze::run(args, cli.threads)
        }
    };

    match &result {
        Ok(_) => {
            info!("✅ Command completed successfully.");
        }
        Err(e) => {
            error!("❌ Command failed: {}", e);
        }
    }

    result
}
