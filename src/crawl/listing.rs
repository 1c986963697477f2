//! Paginated search listing crawler.
//!
//! Requests numbered result pages until one comes back empty. Every listed
//! report is stored as a content-addressed metadata record plus its files,
//! and HTML files additionally have their embedded images stored.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use regex::bytes::Regex;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::{byte_pattern, DocumentOutcome};
use crate::config::ListingConfig;
use crate::error::{Error, Result};
use crate::http_client::{FetchedResponse, Fetcher};
use crate::models::{Document, FormatProvenance};
use crate::repository::FetchLedger;
use crate::storage::content::content_hash;
use crate::storage::Sink;

/// Summary of one listing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingReport {
    /// Pages requested, the final empty page included.
    pub pages_fetched: u32,
    pub documents_fetched: usize,
    pub skipped_too_old: usize,
    pub skipped_already_recorded: usize,
    pub files_stored: usize,
    pub images_stored: usize,
}

impl ListingReport {
    fn tally(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Fetched => self.documents_fetched += 1,
            DocumentOutcome::TooOld => self.skipped_too_old += 1,
            DocumentOutcome::AlreadyRecorded => self.skipped_already_recorded += 1,
        }
    }
}

/// Embedded image paths in an HTML file, in order of first appearance.
///
/// Capture group 1 of `pattern` is the path as written in the page.
pub fn extract_image_paths(content: &[u8], pattern: &Regex) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for caps in pattern.captures_iter(content) {
        if let Some(m) = caps.get(1) {
            let path = String::from_utf8_lossy(m.as_bytes()).into_owned();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Crawler over the paginated report listing.
pub struct ListingCrawler {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn Sink>,
    ledger: Arc<FetchLedger>,
    config: ListingConfig,
    image_pattern: Regex,
}

impl ListingCrawler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn Sink>,
        ledger: Arc<FetchLedger>,
        config: ListingConfig,
    ) -> Result<Self> {
        let image_pattern = byte_pattern(&config.image_pattern)?;
        Ok(Self {
            fetcher,
            sink,
            ledger,
            config,
            image_pattern,
        })
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    /// Walk listing pages from the configured start page until an empty one.
    pub async fn run(&self) -> Result<ListingReport> {
        let mut report = ListingReport::default();
        let mut page = self.config.start_page;

        loop {
            info!("Fetching page {} ...", page);
            let (items, non_empty) = self.fetch_listing(page).await?;
            report.pages_fetched += 1;
            if !non_empty {
                break;
            }

            for item in items {
                let outcome = self.process_document(item, &mut report).await?;
                report.tally(outcome);
            }
            page += 1;
        }

        info!(
            "Listing finished after {} pages: {} fetched, {} too old, {} already recorded",
            report.pages_fetched,
            report.documents_fetched,
            report.skipped_too_old,
            report.skipped_already_recorded
        );
        Ok(report)
    }

    /// Request one listing page. Returns its items and whether there were any.
    pub async fn fetch_listing(&self, page: u32) -> Result<(Vec<Value>, bool)> {
        let response = self.fetcher.get(&self.config.page_url(page)).await?;
        let mut body: Value = serde_json::from_slice(&response.bytes)?;

        let items = match body.get_mut("SearchResults").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => return Err(Error::MissingField("SearchResults")),
        };
        let non_empty = !items.is_empty();
        Ok((items, non_empty))
    }

    /// Fetch one listing item and everything it references, unless it is too
    /// old or already recorded.
    pub async fn fetch_document(&self, item: Value) -> Result<DocumentOutcome> {
        let mut report = ListingReport::default();
        self.process_document(item, &mut report).await
    }

    async fn process_document(
        &self,
        item: Value,
        report: &mut ListingReport,
    ) -> Result<DocumentOutcome> {
        let mut document = Document::new(item);
        let report_date = document.report_date()?;
        let metadata_filename = document.metadata_filename()?;

        if report_date.as_str() < self.config.cutoff.as_str() {
            debug!("Skipping {} (before {})", metadata_filename, self.config.cutoff);
            return Ok(DocumentOutcome::TooOld);
        }

        if !self.ledger.claim(&metadata_filename)? {
            info!("Already got {}", metadata_filename);
            return Ok(DocumentOutcome::AlreadyRecorded);
        }

        let result = self
            .store_document(&mut document, &metadata_filename, report)
            .await;
        if result.is_err() {
            self.ledger.release(&metadata_filename);
        }
        result.map(|_| DocumentOutcome::Fetched)
    }

    async fn store_document(
        &self,
        document: &mut Document,
        metadata_filename: &str,
        report: &mut ListingReport,
    ) -> Result<()> {
        document.mark_fetched(Utc::now())?;

        for (index, format) in document.formats()?.into_iter().enumerate() {
            let file_url = format!("{}{}", self.config.file_base_url, format.url);
            info!("{} ...", file_url);
            let response = self.fetcher.get(&file_url).await?;

            let hash = content_hash(&response.bytes);
            let filename = document.file_filename(&hash, &format.format_type)?;

            let images = if format.format_type.is_html() {
                Some(self.store_images(document, &response, report).await?)
            } else {
                None
            };

            let provenance = FormatProvenance {
                encoding: response.encoding.clone(),
                url: response.final_url.clone(),
                headers: response.headers.clone(),
                sha256: hash,
                filename: filename.clone(),
                images,
            };
            document.attach_provenance(index, &provenance)?;

            self.save(&filename, &response.bytes).await?;
            report.files_stored += 1;
        }

        self.save(metadata_filename, &document.to_pretty_json()?)
            .await?;
        Ok(())
    }

    /// Store the images embedded in an HTML file. Returns in-page path →
    /// stored filename.
    async fn store_images(
        &self,
        document: &Document,
        page: &FetchedResponse,
        report: &mut ListingReport,
    ) -> Result<BTreeMap<String, String>> {
        let mut images = BTreeMap::new();
        for path in extract_image_paths(&page.bytes, &self.image_pattern) {
            let Some(image_url) = self.resolve_image_url(&page.final_url, &path) else {
                debug!("Skipping non-web image source {:.60}", path);
                continue;
            };
            info!("{} ...", image_url);
            let response = self.fetcher.get(&image_url).await?;

            let filename = document.image_filename(&content_hash(&response.bytes))?;
            self.save(&filename, &response.bytes).await?;
            report.images_stored += 1;
            images.insert(path, filename);
        }
        Ok(images)
    }

    /// Image paths resolve against the page they appear in, falling back to
    /// the file base URL when the page URL does not parse. Sources that do
    /// not resolve to an http(s) URL, such as inline `data:` images, yield
    /// `None`.
    fn resolve_image_url(&self, page_url: &str, path: &str) -> Option<String> {
        let path = path.replace("&amp;", "&");
        let url = match Url::parse(page_url).and_then(|base| base.join(&path)) {
            Ok(url) => url,
            Err(_) => match Url::parse(&path) {
                Ok(absolute) => absolute,
                Err(_) => Url::parse(&format!(
                    "{}{}",
                    self.config.file_base_url,
                    path.trim_start_matches('/')
                ))
                .ok()?,
            },
        };
        matches!(url.scheme(), "http" | "https").then(|| url.to_string())
    }

    /// Store `content` at `filename` and record it in the ledger.
    async fn save(&self, filename: &str, content: &[u8]) -> Result<()> {
        info!("> {}", filename);
        self.sink.store(filename, content).await?;
        self.ledger.record(filename, &content_hash(content))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySink;
    use serde_json::json;

    fn pattern() -> Regex {
        byte_pattern(&ListingConfig::default().image_pattern).unwrap()
    }

    #[test]
    fn test_extract_image_paths() {
        let html = br#"<p><img alt="chart" src="/Reports/R1/fig1.png"></p>
            <img src="fig2.png"/><IMG SRC="upper.png"><img src="/Reports/R1/fig1.png">"#;
        assert_eq!(
            extract_image_paths(html, &pattern()),
            vec!["/Reports/R1/fig1.png", "fig2.png"]
        );
    }

    #[test]
    fn test_extract_image_paths_none() {
        assert!(extract_image_paths(b"<html><body>text</body></html>", &pattern()).is_empty());
    }

    #[test]
    fn test_tally() {
        let mut report = ListingReport::default();
        report.tally(DocumentOutcome::Fetched);
        report.tally(DocumentOutcome::TooOld);
        report.tally(DocumentOutcome::TooOld);
        report.tally(DocumentOutcome::AlreadyRecorded);
        assert_eq!(report.documents_fetched, 1);
        assert_eq!(report.skipped_too_old, 2);
        assert_eq!(report.skipped_already_recorded, 1);
    }

    struct NoFetch;

    #[async_trait::async_trait]
    impl Fetcher for NoFetch {
        async fn get(&self, url: &str) -> Result<FetchedResponse> {
            panic!("unexpected fetch of {}", url);
        }
    }

    fn crawler(dir: &tempfile::TempDir) -> ListingCrawler {
        let ledger = FetchLedger::open(&dir.path().join("ledger.db")).unwrap();
        ListingCrawler::new(
            Arc::new(NoFetch),
            Arc::new(MemorySink::new()),
            Arc::new(ledger),
            ListingConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_image_url() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&dir);
        let page = "http://crs.gov/Reports/R1/index.html";
        assert_eq!(
            crawler.resolve_image_url(page, "fig1.png").as_deref(),
            Some("http://crs.gov/Reports/R1/fig1.png")
        );
        assert_eq!(
            crawler.resolve_image_url(page, "/img/a.png?x=1&amp;y=2").as_deref(),
            Some("http://crs.gov/img/a.png?x=1&y=2")
        );
        assert_eq!(
            crawler.resolve_image_url("not a url", "/img/a.png").as_deref(),
            Some("http://crs.gov/img/a.png")
        );
    }

    #[test]
    fn test_resolve_image_url_skips_non_web_sources() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&dir);
        let page = "http://crs.gov/Reports/R1/index.html";
        assert_eq!(
            crawler.resolve_image_url(page, "data:image/png;base64,iVBORw0KGgo="),
            None
        );
        assert_eq!(
            crawler.resolve_image_url("not a url", "data:image/gif;base64,R0lGOD"),
            None
        );
        assert_eq!(
            crawler.resolve_image_url(page, "https://cdn.crs.gov/x.png").as_deref(),
            Some("https://cdn.crs.gov/x.png")
        );
    }

    #[test]
    fn test_extract_image_paths_latin1() {
        assert_eq!(
            extract_image_paths(b"<img src=\"fig\xe9.png\">", &pattern()),
            vec!["fig\u{fffd}.png"]
        );
    }

    #[tokio::test]
    async fn test_too_old_is_never_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&dir);
        let item = json!({
            "ProductNumber": "RL1",
            "CoverDate": "2016-03-31",
            "FormatList": [{"FormatType": "PDF", "Url": "x.pdf"}]
        });
        let outcome = crawler.fetch_document(item).await.unwrap();
        assert_eq!(outcome, DocumentOutcome::TooOld);
        assert!(!outcome.did_work());
    }

    #[tokio::test]
    async fn test_recorded_metadata_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&dir);
        let item = json!({
            "ProductNumber": "RL2",
            "CoverDate": "2016-04-01",
            "FormatList": [{"FormatType": "PDF", "Url": "x.pdf"}]
        });
        let filename = Document::new(item.clone()).metadata_filename().unwrap();
        crawler.ledger.record(&filename, "h").unwrap();

        let outcome = crawler.fetch_document(item).await.unwrap();
        assert_eq!(outcome, DocumentOutcome::AlreadyRecorded);
    }

    #[tokio::test]
    async fn test_missing_product_number_fails() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(&dir);
        let result = crawler
            .fetch_document(json!({"CoverDate": "2017-01-01", "FormatList": []}))
            .await;
        assert!(matches!(result, Err(Error::MissingField("ProductNumber"))));
    }
}
