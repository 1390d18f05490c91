//! Check command - validate a configuration and show it normalized.

use std::path::PathBuf;

use colored::Colorize;
use csvmorph::{ConfigurationFile, CsvFormat, DataType, Pipeline};
use tracing::debug;

pub fn run(
    config_file: PathBuf,
    json_output: bool,
    _verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigurationFile::load(&config_file)?;
    // Compiles the date patterns and resolves both charsets
    Pipeline::new(&config)?;
    debug!(
        config = %config_file.display(),
        columns = config.schema.len(),
        "configuration is valid"
    );

    if json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "✓".green().bold(),
        format!("{} is valid", config_file.display()).bold()
    );
    println!();

    println!("{}", "Schema".bold().underline());
    for column in &config.schema {
        println!(
            "  {:<24} {:<10} {:<10} {}",
            column.name.cyan(),
            column.data_type.to_string(),
            if column.nullable {
                "nullable".dimmed()
            } else {
                "required".yellow()
            },
            pattern_change(&config, column.data_type)
        );
    }
    println!();

    print_format("Input", &config.input);
    println!();
    print_format("Output", &config.output);

    Ok(())
}

/// For date and datetime columns, the pattern rewrite they undergo.
fn pattern_change(config: &ConfigurationFile, data_type: DataType) -> String {
    if !data_type.is_temporal() {
        return String::new();
    }
    let (from, to) = match data_type {
        DataType::Date => (&config.input.date_format, &config.output.date_format),
        _ => (&config.input.datetime_format, &config.output.datetime_format),
    };
    format!("{} → {}", from, to).dimmed().to_string()
}

fn print_format(title: &str, format: &CsvFormat) {
    println!("{}", title.bold().underline());
    println!("  {:<18} {:?}", "separator:".dimmed(), format.separator);
    println!("  {:<18} {}", "header:".dimmed(), format.header);
    println!("  {:<18} {:?}", "encoding:".dimmed(), format.encoding);
    println!(
        "  {:<18} {:?} (strict: {})",
        "enclosing:".dimmed(),
        format.enclosing.characters,
        format.enclosing.strict
    );
    println!("  {:<18} {:?}", "escape:".dimmed(), format.escape);
    println!("  {:<18} {:?}", "nulls:".dimmed(), format.nulls_encoded_as);
    println!(
        "  {:<18} {:?} / {:?}",
        "true / false:".dimmed(),
        format.true_encoded_as,
        format.false_encoded_as
    );
    println!("  {:<18} {}", "date:".dimmed(), format.date_format);
    println!("  {:<18} {}", "datetime:".dimmed(), format.datetime_format);
}
