//! Shared fixtures: a scripted site standing in for the network.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crsacquire::config::ListingConfig;
use crsacquire::http_client::{FetchedResponse, Fetcher};
use crsacquire::{Error, Result};

pub const SEARCH: &str = "http://www.crs.gov/search?page={page}";
pub const FILES: &str = "http://crs.gov/";

/// Listing settings pointing at the fake site.
pub fn listing_config() -> ListingConfig {
    ListingConfig {
        search_url_template: SEARCH.to_string(),
        file_base_url: FILES.to_string(),
        ..ListingConfig::default()
    }
}

pub fn page_url(page: u32) -> String {
    SEARCH.replace("{page}", &page.to_string())
}

/// A listing item with the given formats as `(FormatType, Url)` pairs.
pub fn report(product: &str, cover_date: &str, formats: &[(&str, &str)]) -> Value {
    let formats: Vec<Value> = formats
        .iter()
        .map(|(format_type, url)| json!({"FormatType": format_type, "Url": url}))
        .collect();
    json!({
        "ProductNumber": product,
        "CoverDate": cover_date,
        "Title": format!("Report {}", product),
        "FormatList": formats,
    })
}

/// Serves canned responses by exact URL and logs every request.
/// Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct FakeSite {
    responses: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &[u8], content_type: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), (body.to_vec(), content_type.to_string()));
    }

    /// Serve a listing page holding `items`.
    pub fn listing(&self, page: u32, items: Vec<Value>) {
        let body = serde_json::to_vec(&json!({ "SearchResults": items })).unwrap();
        self.serve(&page_url(page), &body, "application/json; charset=utf-8");
    }

    pub fn file(&self, path: &str, body: &[u8], content_type: &str) {
        self.serve(&format!("{}{}", FILES, path), body, content_type);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Requests that were not for listing pages.
    pub fn file_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|url| url.starts_with(FILES))
            .collect()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn get(&self, url: &str) -> Result<FetchedResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        let found = self.responses.lock().unwrap().get(url).cloned();
        match found {
            Some((body, content_type)) => {
                let headers = BTreeMap::from([("content-type".to_string(), content_type)]);
                Ok(FetchedResponse::new(body, url, headers))
            }
            None => Err(Error::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
