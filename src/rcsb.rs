use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::EntryId;
use crate::error::SyncError;

pub const SEARCH_ENDPOINT: &str = "https://search.rcsb.org/rcsbsearch/v2/query";
const DEFAULT_PAGE_ROWS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(Vec<u8>),
    NotFound,
}

pub trait RecordFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchOutcome, SyncError>;
}

pub trait SearchClient: Send + Sync {
    fn search(&self, query: &Value) -> Result<Vec<EntryId>, SyncError>;
}

impl<T: RecordFetcher + ?Sized> RecordFetcher for &T {
    fn fetch(&self, url: &str) -> Result<FetchOutcome, SyncError> {
        (**self).fetch(url)
    }
}

impl<T: SearchClient + ?Sized> SearchClient for &T {
    fn search(&self, query: &Value) -> Result<Vec<EntryId>, SyncError> {
        (**self).search(query)
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    result_set: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    identifier: String,
}

#[derive(Clone)]
pub struct RcsbHttpClient {
    client: Client,
}

impl RcsbHttpClient {
    pub fn new() -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pdb-sync/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::RcsbHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SyncError::RcsbHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn search_page(&self, query: &Value) -> Result<Option<SearchPage>, SyncError> {
        let response = self
            .client
            .post(SEARCH_ENDPOINT)
            .json(query)
            .send()
            .map_err(|err| SyncError::SearchHttp(err.to_string()))?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "RCSB search failed".to_string());
            return Err(SyncError::SearchStatus { status, message });
        }
        let page = response
            .json()
            .map_err(|err| SyncError::SearchHttp(err.to_string()))?;
        Ok(Some(page))
    }

    fn handle_status(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "RCSB request failed".to_string());
        Err(SyncError::RcsbStatus { status, message })
    }
}

impl RecordFetcher for RcsbHttpClient {
    fn fetch(&self, url: &str) -> Result<FetchOutcome, SyncError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SyncError::RcsbHttp(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| SyncError::RcsbHttp(err.to_string()))?;
        Ok(FetchOutcome::Fetched(bytes.to_vec()))
    }
}

impl SearchClient for RcsbHttpClient {
    fn search(&self, query: &Value) -> Result<Vec<EntryId>, SyncError> {
        collect_pages(query, |page_query| self.search_page(page_query))
    }
}

// A `None` page is HTTP 204.
fn collect_pages<P>(query: &Value, mut fetch_page: P) -> Result<Vec<EntryId>, SyncError>
where
    P: FnMut(&Value) -> Result<Option<SearchPage>, SyncError>,
{
    let mut ids = Vec::new();
    if returns_all_hits(query) {
        if let Some(page) = fetch_page(query)? {
            collect_ids(page.result_set, &mut ids)?;
        }
        return Ok(ids);
    }

    let rows = page_rows(query);
    let mut start = 0u64;
    loop {
        let page_query = with_page(query, start, rows);
        let Some(page) = fetch_page(&page_query)? else {
            break;
        };
        let received = page.result_set.len() as u64;
        debug!(start, received, total = page.total_count, "search page");
        collect_ids(page.result_set, &mut ids)?;
        start += received;
        if received == 0 || start >= page.total_count {
            break;
        }
    }
    Ok(ids)
}

fn collect_ids(hits: Vec<SearchHit>, ids: &mut Vec<EntryId>) -> Result<(), SyncError> {
    for hit in hits {
        ids.push(hit.identifier.parse()?);
    }
    Ok(())
}

fn returns_all_hits(query: &Value) -> bool {
    query
        .pointer("/request_options/return_all_hits")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn page_rows(query: &Value) -> u64 {
    query
        .pointer("/request_options/paginate/rows")
        .and_then(Value::as_u64)
        .filter(|rows| *rows > 0)
        .unwrap_or(DEFAULT_PAGE_ROWS)
}

fn with_page(query: &Value, start: u64, rows: u64) -> Value {
    let mut query = query.clone();
    if let Some(object) = query.as_object_mut() {
        let options = object
            .entry("request_options")
            .or_insert_with(|| json!({}));
        if let Some(options) = options.as_object_mut() {
            options.insert("paginate".to_string(), json!({ "start": start, "rows": rows }));
        }
    }
    query
}
