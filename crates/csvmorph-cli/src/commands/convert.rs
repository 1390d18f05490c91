//! Convert command - stream records through the conversion pipeline.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use colored::Colorize;
use csvmorph::{ConfigurationFile, Pipeline};
use tracing::debug;

pub fn run(
    config_file: PathBuf,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigurationFile::load(&config_file)?;
    debug!(
        config = %config_file.display(),
        input = ?input,
        output = ?output,
        "starting conversion"
    );
    // Patterns and charsets are checked here, before any data is touched
    let pipeline = Pipeline::new(&config)?;

    let source: Box<dyn Read> = match &input {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|e| format!("Cannot open input '{}': {}", path.display(), e))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .map_err(|e| format!("Cannot create output '{}': {}", path.display(), e))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let stats = pipeline.run(source, sink)?;

    // Summary goes to stderr; stdout may be carrying the data
    if verbose || output.is_some() {
        eprintln!(
            "{} Converted {} record(s){}",
            "✓".green().bold(),
            stats.records.to_string().bold(),
            if stats.header_written {
                " plus header"
            } else {
                ""
            }
        );
        if let Some(path) = &output {
            eprintln!("  {} {}", "Output:".dimmed(), path.display());
        }
    }

    Ok(())
}
