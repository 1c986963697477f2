//! Shared setup for CLI commands.

use std::sync::Arc;

use console::style;
use tracing::info;

use crate::config::{Settings, SinkDescriptor};
use crate::http_client::HttpClient;
use crate::rate_limit::DomainStats;
use crate::repository::FetchLedger;
use crate::storage::{DropboxSink, LocalSink, Sink};

/// Open the ledger in the data directory, creating both if needed.
pub fn open_ledger(settings: &Settings) -> anyhow::Result<Arc<FetchLedger>> {
    settings.ensure_directories()?;
    let ledger = FetchLedger::open(&settings.database_path())?;
    Ok(Arc::new(ledger))
}

/// Choose the sink for a crawler.
///
/// With a sink descriptor present everything goes to Dropbox under the
/// descriptor's path plus `remote_suffix`; otherwise files are written below
/// the data directory.
pub async fn build_sink(
    settings: &Settings,
    client: &HttpClient,
    remote_suffix: &str,
) -> anyhow::Result<Arc<dyn Sink>> {
    let Some(descriptor) = SinkDescriptor::from_file(&settings.sink_file)? else {
        settings.ensure_directories()?;
        let sink = LocalSink::new(settings.data_dir.clone());
        info!("Saving to {}", sink.describe());
        return Ok(Arc::new(sink));
    };

    let sink = DropboxSink::new(
        client.client().clone(),
        descriptor.token.clone(),
        descriptor.remote_root(remote_suffix),
    );
    let account = sink.current_account().await?;
    println!(
        "{} Uploading to Dropbox account {} {} at {}",
        style("→").dim(),
        account.name.display_name,
        account.email,
        sink.root_path()
    );
    Ok(Arc::new(sink))
}

/// Log the throttle state of every domain the client has talked to.
pub async fn log_throttle_stats(client: &HttpClient) {
    let mut stats: Vec<_> = client.rate_limiter().get_stats().await.into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    for (domain, domain_stats) in &stats {
        info!("{}", throttle_summary(domain, domain_stats));
    }
}

fn throttle_summary(domain: &str, stats: &DomainStats) -> String {
    let mut line = format!(
        "{}: {} requests, {} rate limited, delay {:?}",
        domain,
        format_number(stats.total_requests),
        stats.rate_limit_hits,
        stats.current_delay
    );
    if stats.in_backoff {
        line.push_str(" (backing off)");
    }
    line
}

/// Format a count with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
