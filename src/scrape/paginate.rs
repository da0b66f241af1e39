//! Pagination state machine with loop-safe termination.
//!
//! Three independent stop conditions are checked on every page because none
//! alone is trustworthy: empty-page detection misses sources that render a
//! non-empty "no results" template, next-link detection misses sources with
//! inconsistent navigation markup, and the content-repeat guard bounds the
//! common failure where a server ignores the page parameter and re-serves
//! the same listing forever. A configurable page ceiling backstops all
//! three.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::extract::ExtractRecords;
use super::fetch::{FetchError, FetchPage};
use super::normalize::normalize;
use crate::models::{PageResult, Record, Termination};

/// Bounds applied to one source's pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeLimits {
    /// Hard ceiling on pages per source. The loop guard only looks back one
    /// page, so a source cycling through several distinct pages before
    /// repeating would otherwise paginate indefinitely.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Extra fetch attempts per page before the source is abandoned.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
}

fn default_max_pages() -> u32 {
    500
}

fn default_retry_budget() -> u32 {
    1
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            retry_budget: default_retry_budget(),
        }
    }
}

/// Cooperative cancellation flag, checked before each page fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything gathered from one source's pagination, including partial
/// results when a mid-run failure ended it early.
#[derive(Debug)]
pub struct SourceRun {
    pub records: Vec<Record>,
    pub pages_scraped: u32,
    pub dropped: usize,
    pub termination: Termination,
    pub error: Option<String>,
}

/// Drive one source's pagination to exhaustion.
///
/// Pages are fetched strictly sequentially in increasing page-number order;
/// the loop guard's one-step lookback is only meaningful under that order.
pub async fn paginate(
    fetcher: &dyn FetchPage,
    extractor: &dyn ExtractRecords,
    entity_type: &str,
    identity_field: &str,
    limits: &ScrapeLimits,
    cancel: &CancelToken,
) -> SourceRun {
    let mut records: Vec<Record> = Vec::new();
    let mut previous_keys: BTreeSet<String> = BTreeSet::new();
    let mut pages_scraped = 0u32;
    let mut dropped = 0usize;
    let mut page = 1u32;

    loop {
        if cancel.is_cancelled() {
            info!("Pagination cancelled for {} at page {}", entity_type, page);
            return finish(records, pages_scraped, dropped, Termination::Cancelled, None);
        }

        if page > limits.max_pages {
            warn!(
                "Page ceiling of {} reached for {}; terminating",
                limits.max_pages, entity_type
            );
            return finish(records, pages_scraped, dropped, Termination::PageLimit, None);
        }

        let body = match fetch_with_retry(fetcher, page, limits.retry_budget).await {
            Ok(body) => body,
            Err(err) => {
                warn!("Fetch failed for {} page {}: {}", entity_type, page, err);
                // Partial-result policy: keep what earlier pages gathered.
                return finish(
                    records,
                    pages_scraped,
                    dropped,
                    Termination::Error,
                    Some(err.to_string()),
                );
            }
        };
        pages_scraped += 1;

        let extracted = match extractor.extract(&body) {
            Ok(extracted) => extracted,
            Err(err) => {
                warn!("Parse failed for {} page {}: {}", entity_type, page, err);
                return finish(
                    records,
                    pages_scraped,
                    dropped,
                    Termination::Error,
                    Some(err.to_string()),
                );
            }
        };

        if extracted.records.is_empty() {
            debug!("No records on {} page {}", entity_type, page);
            return finish(records, pages_scraped, dropped, Termination::EmptyPage, None);
        }

        let mut page_records = Vec::with_capacity(extracted.records.len());
        let mut page_dropped = 0usize;
        for raw in &extracted.records {
            match normalize(raw, entity_type, identity_field) {
                Some(record) => page_records.push(record),
                None => page_dropped += 1,
            }
        }
        dropped += page_dropped;

        let result = PageResult {
            page_number: page,
            records: page_records,
            has_next_link: extracted.has_next_link,
            dropped: page_dropped,
        };
        let page_keys = result.identity_keys();

        // Loop guard: a page introducing no new identity keys means the
        // server re-served previous content instead of advancing. Subset
        // rather than equality also catches reshuffled partial overlap.
        if page > 1 && page_keys.is_subset(&previous_keys) {
            warn!(
                "Duplicate content on {} page {}; terminating to avoid a pagination loop",
                entity_type, page
            );
            return finish(
                records,
                pages_scraped,
                dropped,
                Termination::DuplicateContent,
                None,
            );
        }

        info!(
            "Found {} records on {} page {}",
            result.records.len(),
            entity_type,
            page
        );
        records.extend(result.records);
        previous_keys = page_keys;

        if !result.has_next_link {
            debug!("No next link on {} page {}", entity_type, page);
            return finish(records, pages_scraped, dropped, Termination::NoNextLink, None);
        }

        page += 1;
    }
}

async fn fetch_with_retry(
    fetcher: &dyn FetchPage,
    page: u32,
    retry_budget: u32,
) -> Result<Vec<u8>, FetchError> {
    let mut attempt = 0u32;
    loop {
        match fetcher.fetch(page).await {
            Ok(body) => return Ok(body),
            Err(err) if attempt < retry_budget => {
                attempt += 1;
                warn!(
                    "Fetch attempt {} for page {} failed, retrying: {}",
                    attempt, page, err
                );
            }
            Err(err) => return Err(err),
        }
    }
}

fn finish(
    records: Vec<Record>,
    pages_scraped: u32,
    dropped: usize,
    termination: Termination,
    error: Option<String>,
) -> SourceRun {
    SourceRun {
        records,
        pages_scraped,
        dropped,
        termination,
        error,
    }
}
