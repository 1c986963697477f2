//! Depth-first crawl of a hyperlinked page tree.
//!
//! Starting from a root page, every page is fetched, saved through the sink
//! and scanned for further links matching the configured pattern. Pages are
//! visited once per run, in link-appearance order.

use std::collections::HashSet;
use std::sync::Arc;

use regex::bytes::Regex;
use tracing::{debug, info};

use super::byte_pattern;
use crate::config::LinkGraphConfig;
use crate::error::Result;
use crate::http_client::Fetcher;
use crate::storage::Sink;

/// Page paths seen during one traversal.
#[derive(Debug, Default)]
pub struct VisitedSet {
    paths: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` visited. Returns false if it already was.
    pub fn insert(&mut self, path: &str) -> bool {
        if self.paths.contains(path) {
            return false;
        }
        self.paths.insert(path.to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Summary of one traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalReport {
    pub pages_visited: usize,
    pub pages_fetched: usize,
    pub pages_cached: usize,
}

/// Extract page paths from `content`.
///
/// Capture group 1 of `pattern` is the path. HTML-escaped ampersands are
/// decoded and fragments dropped, so `index/A?x=1&amp;y=2#s` yields
/// `index/A?x=1&y=2`. Matches are returned in document order, duplicates
/// included.
pub fn extract_links(content: &[u8], pattern: &Regex) -> Vec<String> {
    pattern
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let link = String::from_utf8_lossy(m.as_bytes()).replace("&amp;", "&");
            match link.find('#') {
                Some(i) => link[..i].to_string(),
                None => link,
            }
        })
        .collect()
}

/// Sink path for a page: `<cache_dir>/<path with '/' as '_', percent-encoded>.html`.
pub fn cache_path(cache_dir: &str, path: &str) -> String {
    format!(
        "{}/{}.html",
        cache_dir,
        urlencoding::encode(&path.replace('/', "_"))
    )
}

/// Crawler over a hyperlinked page tree.
pub struct LinkGraphCrawler {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn Sink>,
    config: LinkGraphConfig,
    link_pattern: Regex,
}

impl LinkGraphCrawler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn Sink>,
        config: LinkGraphConfig,
    ) -> Result<Self> {
        let link_pattern = byte_pattern(&config.link_pattern)?;
        Ok(Self {
            fetcher,
            sink,
            config,
            link_pattern,
        })
    }

    pub fn config(&self) -> &LinkGraphConfig {
        &self.config
    }

    /// Crawl everything reachable from `root_path`.
    ///
    /// Any fetch or store failure aborts the traversal; pages saved before
    /// the failure stay saved.
    pub async fn traverse(&self, root_path: &str) -> Result<TraversalReport> {
        let mut visited = VisitedSet::new();
        let mut report = TraversalReport::default();

        // Links are pushed in reverse so they pop in appearance order.
        let mut stack = vec![root_path.to_string()];
        while let Some(path) = stack.pop() {
            let links = self.visit(&path, &mut visited, &mut report).await?;
            stack.extend(links.into_iter().rev());
        }

        info!(
            "Traversal from {} finished: {} pages ({} fetched, {} cached)",
            root_path, report.pages_visited, report.pages_fetched, report.pages_cached
        );
        Ok(report)
    }

    /// Visit one page and return the links still to follow.
    async fn visit(
        &self,
        path: &str,
        visited: &mut VisitedSet,
        report: &mut TraversalReport,
    ) -> Result<Vec<String>> {
        if !visited.insert(path) {
            return Ok(Vec::new());
        }
        report.pages_visited += 1;

        let filename = cache_path(&self.config.cache_dir, path);
        let content = match self.sink.load_cached(&filename).await? {
            Some(cached) => {
                debug!("Using cached {}", filename);
                report.pages_cached += 1;
                cached
            }
            None => {
                let url = format!("{}{}", self.config.base_url, path);
                info!("{}...", url);
                let response = self.fetcher.get(&url).await?;
                info!("> {}", filename);
                self.sink.store(&filename, &response.bytes).await?;
                report.pages_fetched += 1;
                response.bytes
            }
        };

        Ok(extract_links(&content, &self.link_pattern)
            .into_iter()
            .filter(|link| !visited.contains(link))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::http_client::FetchedResponse;
    use crate::storage::MemorySink;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    const BASE: &str = "http://www.crs.gov/conan/";

    fn default_pattern() -> Regex {
        byte_pattern(&LinkGraphConfig::default().link_pattern).unwrap()
    }

    /// Serves fixed pages and logs requested URLs.
    #[derive(Default)]
    struct Site {
        pages: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl Site {
        fn page(mut self, path: &str, body: &str) -> Self {
            self.pages
                .insert(format!("{}{}", BASE, path), body.as_bytes().to_vec());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for Site {
        async fn get(&self, url: &str) -> Result<FetchedResponse> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(FetchedResponse::new(
                    body.clone(),
                    url.to_string(),
                    BTreeMap::new(),
                )),
                None => Err(Error::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn crawler(site: Arc<Site>, sink: MemorySink) -> LinkGraphCrawler {
        LinkGraphCrawler::new(site, Arc::new(sink), LinkGraphConfig::default()).unwrap()
    }

    #[test]
    fn test_extract_links_keeps_latin1_paths() {
        let html = b"<a href=\"/conan/index/caf\xe9\">x</a><a href=\"/conan/index/ok\">y</a>";
        assert_eq!(
            extract_links(html, &default_pattern()),
            vec!["index/caf\u{fffd}", "index/ok"]
        );
    }

    #[test]
    fn test_extract_links_decodes_and_strips_fragment() {
        let html = br#"<a href="/conan/index/A?x=1&amp;y=2#sec">A</a>
            <a href="/conan/details/B">B</a>
            <a href="/conan/search/C">C</a>
            <a href="/other/index/D">D</a>"#;
        assert_eq!(
            extract_links(html, &default_pattern()),
            vec!["index/A?x=1&y=2", "details/B"]
        );
    }

    #[test]
    fn test_extract_links_keeps_order_and_duplicates() {
        let html = br#"<a href="/conan/details/2">x</a><a href="/conan/index/1">y</a><a href="/conan/details/2">z</a>"#;
        assert_eq!(
            extract_links(html, &default_pattern()),
            vec!["details/2", "index/1", "details/2"]
        );
    }

    #[test]
    fn test_extract_links_empty() {
        assert!(extract_links(b"<p>no links</p>", &default_pattern()).is_empty());
    }

    #[test]
    fn test_cache_path_encoding() {
        assert_eq!(
            cache_path("conan", "constitutionannotated"),
            "conan/constitutionannotated.html"
        );
        assert_eq!(
            cache_path("conan", "index/A?x=1&y=2"),
            "conan/index_A%3Fx%3D1%26y%3D2.html"
        );
    }

    #[test]
    fn test_visited_set() {
        let mut visited = VisitedSet::new();
        assert!(visited.is_empty());
        assert!(visited.insert("a"));
        assert!(!visited.insert("a"));
        assert!(visited.contains("a"));
        assert_eq!(visited.len(), 1);
    }

    #[tokio::test]
    async fn test_traverse_depth_first_in_link_order() {
        let site = Arc::new(
            Site::default()
                .page(
                    "root",
                    r#"<a href="/conan/index/A">A</a><a href="/conan/index/B">B</a>"#,
                )
                .page("index/A", r#"<a href="/conan/details/A1">A1</a>"#)
                .page("details/A1", "leaf")
                .page("index/B", "leaf"),
        );
        let sink = MemorySink::new();
        let report = crawler(site.clone(), sink.clone())
            .traverse("root")
            .await
            .unwrap();

        assert_eq!(
            site.requests(),
            vec![
                format!("{}root", BASE),
                format!("{}index/A", BASE),
                format!("{}details/A1", BASE),
                format!("{}index/B", BASE),
            ]
        );
        assert_eq!(report.pages_visited, 4);
        assert_eq!(report.pages_fetched, 4);
        assert_eq!(sink.get("conan/index_A.html").unwrap(), b"<a href=\"/conan/details/A1\">A1</a>");
    }

    #[tokio::test]
    async fn test_traverse_terminates_on_cycle() {
        let site = Arc::new(
            Site::default()
                .page("index/A", r#"<a href="/conan/index/B">B</a>"#)
                .page(
                    "index/B",
                    r#"<a href="/conan/index/A">A</a><a href="/conan/index/B#top">B</a>"#,
                ),
        );
        let report = crawler(site.clone(), MemorySink::new())
            .traverse("index/A")
            .await
            .unwrap();

        assert_eq!(site.requests().len(), 2);
        assert_eq!(report.pages_visited, 2);
    }

    #[tokio::test]
    async fn test_traverse_uses_cache_when_sink_serves_it() {
        let site = Arc::new(Site::default().page("root", r#"<a href="/conan/index/A">A</a>"#));
        let sink = MemorySink::caching();
        sink.store("conan/index_A.html", b"cached leaf").await.unwrap();

        let report = crawler(site.clone(), sink.clone())
            .traverse("root")
            .await
            .unwrap();

        assert_eq!(site.requests(), vec![format!("{}root", BASE)]);
        assert_eq!(report.pages_cached, 1);
        assert_eq!(report.pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_traverse_refetches_without_cache() {
        let site = Arc::new(Site::default().page("root", "leaf"));
        let sink = MemorySink::new();
        sink.store("conan/root.html", b"stale").await.unwrap();

        crawler(site.clone(), sink.clone())
            .traverse("root")
            .await
            .unwrap();

        assert_eq!(site.requests().len(), 1);
        assert_eq!(sink.get("conan/root.html").unwrap(), b"leaf");
    }

    #[tokio::test]
    async fn test_traverse_aborts_on_fetch_error() {
        let site = Arc::new(Site::default().page(
            "root",
            r#"<a href="/conan/index/missing">x</a><a href="/conan/index/B">B</a>"#,
        ));
        let sink = MemorySink::new();
        let result = crawler(site.clone(), sink.clone()).traverse("root").await;

        assert!(matches!(result, Err(Error::Status { status: 404, .. })));
        assert_eq!(sink.paths(), vec!["conan/root.html"]);
        assert_eq!(site.requests().len(), 2);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = LinkGraphConfig {
            link_pattern: "(".to_string(),
            ..Default::default()
        };
        let result = LinkGraphCrawler::new(
            Arc::new(Site::default()),
            Arc::new(MemorySink::new()),
            config,
        );
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
    }
}
