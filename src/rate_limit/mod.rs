//! Fixed-rate per-domain request throttle.
//!
//! Every request to a domain waits until `base_delay` has passed since the
//! previous one. A 429 or 503 response doubles the delay up to `max_delay`;
//! after enough consecutive successes it falls back to the base delay.

mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use domain_state::DomainState;

/// Configuration for throttling behavior.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Delay between requests to the same domain.
    pub base_delay: Duration,
    /// Ceiling for backoff.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Consecutive successes needed to leave backoff.
    pub recovery_threshold: u32,
}

impl RateLimitConfig {
    /// Throttle to at most `requests_per_minute` requests per domain.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let base_delay = Duration::from_secs(60) / requests_per_minute.max(1);
        Self {
            base_delay,
            ..Self::default()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.0,
            recovery_threshold: 5,
        }
    }
}

/// Statistics for a domain.
#[derive(Debug, Clone)]
pub struct DomainStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}

/// Per-domain throttle shared by all clones.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<Mutex<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Throttle key for a URL: its root domain, so `www.crs.gov` and
    /// `crs.gov` share one budget.
    pub fn extract_domain(url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let host = url.host_str()?;
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() >= 2 && url.domain().is_some() {
            Some(parts[parts.len() - 2..].join("."))
        } else {
            Some(host.to_string())
        }
    }

    /// Wait until the domain is ready, then mark a request as started.
    ///
    /// The lock is held across the wait so concurrent callers queue up and
    /// the aggregate rate stays within the budget.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let mut domains = self.domains.lock().await;
        let state = domains
            .entry(domain.clone())
            .or_insert_with(|| DomainState::new(self.config.base_delay));

        let wait = state.time_until_ready();
        if wait > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }
        state.last_request = Some(Instant::now());
        state.total_requests += 1;

        Some(domain)
    }

    /// Report a successful request.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;
            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                state.in_backoff = false;
                state.current_delay = self.config.base_delay;
                state.consecutive_successes = 0;
                info!("Domain {} recovered from rate limit backoff", domain);
            }
        }
    }

    /// Report a rate limit response (429 or 503).
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.lock().await;
        if let Some(state) = domains.get_mut(domain) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;

            let new_delay = Duration::from_secs_f64(
                state.current_delay.as_secs_f64() * self.config.backoff_multiplier,
            );
            state.current_delay = new_delay.min(self.config.max_delay);

            warn!(
                "Rate limited by {} (HTTP {}), backing off to {:?}",
                domain, status_code, state.current_delay
            );
        }
    }

    /// Get statistics for all domains.
    pub async fn get_stats(&self) -> HashMap<String, DomainStats> {
        let domains = self.domains.lock().await;
        domains
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    DomainStats {
                        current_delay: v.current_delay,
                        in_backoff: v.in_backoff,
                        total_requests: v.total_requests,
                        rate_limit_hits: v.rate_limit_hits,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
