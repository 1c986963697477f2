//! Initialize command.

use console::style;

use super::super::helpers::open_ledger;
use crate::config::{Settings, SinkDescriptor};

/// Initialize the data directory and ledger.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let ledger = open_ledger(settings)?;

    match SinkDescriptor::from_file(&settings.sink_file)? {
        Some(descriptor) => println!(
            "  {} Remote sink: Dropbox at {}",
            style("✓").green(),
            descriptor.path
        ),
        None => println!(
            "  {} No sink descriptor at {}, files will be saved locally",
            style("!").yellow(),
            settings.sink_file.display()
        ),
    }

    println!(
        "{} Initialized crsacquire in {} (ledger: {})",
        style("✓").green(),
        settings.data_dir.display(),
        ledger.db_path().display()
    );

    Ok(())
}
