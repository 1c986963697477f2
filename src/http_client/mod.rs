//! Throttled, retrying HTTP fetcher.
//!
//! Crawlers only see the [`Fetcher`] trait: a URL goes in and either a fully
//! read successful response or a terminal error comes out. Throttling and
//! retries of transient failures happen here.

mod response;
mod user_agent;

pub use response::{encoding_from_content_type, FetchedResponse};
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::error::{Error, Result};
use crate::rate_limit::{RateLimitConfig, RateLimiter};

/// Source of fetched content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, failing terminally for that URL on error.
    async fn get(&self, url: &str) -> Result<FetchedResponse>;
}

/// reqwest-backed fetcher with a per-domain throttle and bounded retries.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
    retry_attempts: u32,
    retry_wait: Duration,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let user_agent = resolve_user_agent(settings.user_agent.as_deref());
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(settings.request_timeout))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(RateLimitConfig::per_minute(
                settings.requests_per_minute,
            )),
            retry_attempts: settings.retry_attempts,
            retry_wait: Duration::from_secs(settings.retry_wait_secs),
        })
    }

    /// The underlying reqwest client, for sharing its connection pool.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let domain = self.rate_limiter.acquire(url).await;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) => return Attempt::Retry(e.into()),
            Err(e) => return Attempt::Fail(e.into()),
        };

        let status = response.status();
        if let Some(ref domain) = domain {
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                self.rate_limiter
                    .report_rate_limit(domain, status.as_u16())
                    .await;
            } else if status.is_success() {
                self.rate_limiter.report_success(domain).await;
            }
        }

        if !status.is_success() {
            let error = Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            };
            if is_retryable_status(status) {
                return Attempt::Retry(error);
            }
            return Attempt::Fail(error);
        }

        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());

        match response.bytes().await {
            Ok(bytes) => Attempt::Done(FetchedResponse::new(bytes.to_vec(), final_url, headers)),
            Err(e) if is_transient(&e) => Attempt::Retry(e.into()),
            Err(e) => Attempt::Fail(e.into()),
        }
    }
}

/// Flatten response headers into lowercase name -> value.
///
/// Repeated headers are joined with `", "`. Values that are not visible
/// ASCII are decoded as ISO-8859-1.
fn collect_headers(map: &HeaderMap) -> BTreeMap<String, String> {
    map.keys()
        .map(|name| {
            let values: Vec<String> = map
                .get_all(name)
                .iter()
                .map(|value| match value.to_str() {
                    Ok(v) => v.to_string(),
                    Err(_) => value.as_bytes().iter().map(|&b| b as char).collect(),
                })
                .collect();
            (name.to_string(), values.join(", "))
        })
        .collect()
}

enum Attempt {
    Done(FetchedResponse),
    /// Transient failure; returned as-is once retries run out.
    Retry(Error),
    Fail(Error),
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body()
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get(&self, url: &str) -> Result<FetchedResponse> {
        let mut retries = 0;
        loop {
            match self.attempt(url).await {
                Attempt::Done(response) => {
                    debug!("Fetched {} ({} bytes)", url, response.bytes.len());
                    return Ok(response);
                }
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) if retries < self.retry_attempts => {
                    retries += 1;
                    warn!(
                        "Fetching {} failed ({}), retry {}/{} in {:?}",
                        url, e, retries, self.retry_attempts, self.retry_wait
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
                Attempt::Retry(e) => {
                    warn!("Giving up on {} after {} retries: {}", url, retries, e);
                    return Err(e);
                }
            }
        }
    }
}
