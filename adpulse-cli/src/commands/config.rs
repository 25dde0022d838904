//! Starter configuration file generation.

use anyhow::{Context, Result};
use shared::config::{Config, ConfigFormat};
use std::{fs, path::Path};

/// Renders the default configuration in `format`.
///
/// Prints to standard output, or writes `output` when given.
///
/// # Errors
/// Returns an error if rendering fails or the file cannot be written.
pub fn generate_config(format: ConfigFormat, output: Option<&Path>) -> Result<()> {
    let rendered = Config::with_defaults()
        .to_string_pretty(format)
        .context("failed to render configuration")?;

    match output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "Configuration file '{}' generated successfully.",
                path.display()
            );
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
