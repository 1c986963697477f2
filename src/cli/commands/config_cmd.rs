//! Configuration display command.

use console::style;

use crate::config::{Config, Settings};

/// Print the effective settings and configuration.
pub async fn cmd_config(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults (no config file found)".to_string());

    eprintln!("{} Source: {}", style("→").dim(), source);
    eprintln!("{} Data dir: {}", style("→").dim(), settings.data_dir.display());
    eprintln!(
        "{} Ledger: {}",
        style("→").dim(),
        settings.database_path().display()
    );
    eprintln!(
        "{} Sink descriptor: {}{}",
        style("→").dim(),
        settings.sink_file.display(),
        if settings.sink_file.exists() {
            ""
        } else {
            " (absent, saving locally)"
        }
    );
    eprintln!();

    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
