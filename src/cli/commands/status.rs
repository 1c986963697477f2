//! Status command for showing ledger state.

use console::style;
use serde_json::json;

use super::super::helpers::format_number;
use crate::config::Settings;
use crate::repository::FetchLedger;

/// Show ledger statistics and the most recent entries.
pub async fn cmd_status(settings: &Settings, recent: usize, json: bool) -> anyhow::Result<()> {
    if !settings.database_exists() {
        println!(
            "{} Ledger not initialized. Run 'crs init' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let ledger = FetchLedger::open(&settings.database_path())?;
    let stats = ledger.stats()?;
    let entries = ledger.recent(recent)?;

    if json {
        let output = json!({
            "database": settings.database_path(),
            "stats": stats,
            "recent": entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let separator = "─".repeat(70);
    println!();
    println!("{}", style("crsacquire status").bold());
    println!("{}", separator);
    println!("Ledger:   {}", settings.database_path().display());
    println!("Data Dir: {}", settings.data_dir.display());
    println!();

    println!("{}", style("LEDGER").cyan().bold());
    println!("  {:<20} {:>10}", "Total:", format_number(stats.total));
    println!("  {:<20} {:>10}", "Documents:", format_number(stats.documents));
    println!("  {:<20} {:>10}", "Files:", format_number(stats.files));
    println!("  {:<20} {:>10}", "  images:", format_number(stats.images));
    if stats.other > 0 {
        println!("  {:<20} {:>10}", "Other:", format_number(stats.other));
    }
    if let Some(last) = stats.last_fetched {
        println!("  {:<20} {}", "Last fetched:", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if !entries.is_empty() {
        println!();
        println!("{}", style("RECENT").cyan().bold());
        for entry in &entries {
            println!(
                "  {}  {}  {}",
                entry.fetched_at.format("%Y-%m-%d %H:%M"),
                &entry.content_hash[..entry.content_hash.len().min(12)],
                entry.filename
            );
        }
    }
    println!();

    Ok(())
}
