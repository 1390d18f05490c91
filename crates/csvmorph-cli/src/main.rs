//! csvmorph CLI - convert CSV data between dialects under a typed schema.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert {
            config_file,
            input,
            output,
        } => commands::convert::run(config_file, input, output, cli.verbose),

        Commands::Check { config_file, json } => {
            commands::check::run(config_file, json, cli.verbose)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so they never mix with converted data on stdout.
fn init_logging(verbose: bool) {
    let default = if verbose { "csvmorph=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
