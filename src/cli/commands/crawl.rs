//! Crawl commands: the paginated listing and the linked page tree.

use std::sync::Arc;

use console::style;

use super::super::helpers::{build_sink, log_throttle_stats, open_ledger};
use crate::config::{Config, Settings};
use crate::crawl::{LinkGraphCrawler, ListingCrawler};
use crate::http_client::HttpClient;

/// Fetch new and changed reports from the search listing.
pub async fn cmd_listing(
    settings: &Settings,
    config: &Config,
    start_page: Option<u32>,
) -> anyhow::Result<()> {
    let ledger = open_ledger(settings)?;
    let client = HttpClient::new(&settings.http)?;
    let sink = build_sink(settings, &client, "").await?;

    let mut listing = config.listing.clone();
    if let Some(page) = start_page {
        listing.start_page = page;
    }

    let crawler = ListingCrawler::new(Arc::new(client.clone()), sink, ledger, listing)?;
    let report = crawler.run().await;
    log_throttle_stats(&client).await;
    let report = report?;

    println!(
        "{} Listing done: {} pages, {} reports fetched ({} files, {} images)",
        style("✓").green(),
        report.pages_fetched,
        report.documents_fetched,
        report.files_stored,
        report.images_stored
    );
    println!(
        "  {} Skipped {} already recorded, {} before {}",
        style("→").dim(),
        report.skipped_already_recorded,
        report.skipped_too_old,
        crawler.config().cutoff
    );
    Ok(())
}

/// Crawl the Constitution Annotated page tree.
pub async fn cmd_conan(
    settings: &Settings,
    config: &Config,
    root: Option<&str>,
) -> anyhow::Result<()> {
    let client = HttpClient::new(&settings.http)?;
    let link_graph = config.link_graph.clone();
    let sink = build_sink(settings, &client, &link_graph.remote_suffix).await?;

    let root = root.unwrap_or(link_graph.root_path.as_str()).to_string();
    let crawler = LinkGraphCrawler::new(Arc::new(client.clone()), sink, link_graph)?;
    let report = crawler.traverse(&root).await;
    log_throttle_stats(&client).await;
    let report = report?;

    println!(
        "{} Crawled {} pages from {} ({} fetched, {} from cache)",
        style("✓").green(),
        report.pages_visited,
        root,
        report.pages_fetched,
        report.pages_cached
    );
    Ok(())
}
