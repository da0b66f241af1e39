//! Run orchestration across configured sources.
//!
//! Sources are isolated from each other: one source's fetch, parse or
//! write failure is recorded in its summary entry and never aborts the
//! siblings. Pages within a source stay strictly sequential.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::models::{RunSummary, SourceOutcome};
use crate::scrape::{paginate, CancelToken, HttpPageFetcher, ScrapeLimits};
use crate::store::{BatchWriter, BlobStore, DocumentStore};

/// Drives one or more logical sources end to end.
///
/// Store handles are injected at construction; their lifecycle belongs to
/// the caller.
pub struct Harvester {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    limits: ScrapeLimits,
    timeout: Duration,
    request_delay: Duration,
    deadline: Option<Duration>,
}

impl Harvester {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        limits: ScrapeLimits,
        timeout: Duration,
        request_delay: Duration,
    ) -> Self {
        Self {
            docs,
            blobs,
            limits,
            timeout,
            request_delay,
            deadline: None,
        }
    }

    /// Apply an overall run deadline; remaining fetches are cancelled once
    /// it elapses. The deadline is per run, not per harvester: a long-lived
    /// harvester serving repeated triggers gets a fresh window each time.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run all configured sources and aggregate their outcomes.
    ///
    /// Sources run as independent tasks; each one's pagination loop shares
    /// no mutable state with another, and the stores tolerate concurrent
    /// writers because keys are scoped by entity type.
    pub async fn run(&self, sources: &BTreeMap<String, SourceConfig>) -> RunSummary {
        // Cancellation is scoped to this run; a deadline hit must not leave
        // the harvester cancelled for later triggers.
        let cancel = CancelToken::new();
        let watchdog = self.deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!("Run deadline reached, cancelling remaining fetches");
                cancel.cancel();
            })
        });

        let mut tasks = JoinSet::new();
        for (name, source) in sources {
            let name = name.clone();
            let source = source.clone();
            let docs = Arc::clone(&self.docs);
            let blobs = Arc::clone(&self.blobs);
            let limits = self.limits.clone();
            let cancel = cancel.clone();
            let timeout = self.timeout;
            let request_delay = self.request_delay;

            tasks.spawn(async move {
                let outcome = run_source(
                    &name,
                    &source,
                    docs.as_ref(),
                    blobs.as_ref(),
                    &limits,
                    &cancel,
                    timeout,
                    request_delay,
                )
                .await;
                (name, outcome)
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    summary.sources.insert(name, outcome);
                }
                Err(err) => warn!("Source task panicked: {}", err),
            }
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        info!(
            "Run complete: {} records across {} sources",
            summary.total_records(),
            summary.sources.len()
        );
        summary
    }
}

/// Scrape and persist one source. All failures end up in the returned
/// outcome rather than propagating.
#[allow(clippy::too_many_arguments)]
async fn run_source(
    name: &str,
    source: &SourceConfig,
    docs: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    limits: &ScrapeLimits,
    cancel: &CancelToken,
    timeout: Duration,
    request_delay: Duration,
) -> SourceOutcome {
    info!("Processing {}", name);

    let extractor = match source.extractor() {
        Ok(extractor) => extractor,
        Err(err) => {
            warn!("Invalid selector config for {}: {}", name, err);
            return SourceOutcome::failed(err.to_string());
        }
    };

    let fetcher = HttpPageFetcher::new(
        &source.url,
        &source.page_param,
        timeout,
        request_delay,
        source.user_agent.as_deref(),
    );

    let run = paginate(
        &fetcher,
        extractor.as_ref(),
        name,
        &source.identity_field,
        limits,
        cancel,
    )
    .await;

    let mut outcome = SourceOutcome {
        record_count: run.records.len(),
        pages_scraped: run.pages_scraped,
        dropped: run.dropped,
        termination: run.termination,
        error: run.error,
    };

    if run.records.is_empty() {
        info!("No records gathered for {}; skipping storage", name);
        return outcome;
    }

    let writer = BatchWriter::new(docs, blobs);
    let written = writer.commit(&run.records, name).await;
    if let Some(err) = written.error {
        outcome.error.get_or_insert(err.to_string());
    }

    info!(
        "Finished {}: {} records over {} pages ({})",
        name, outcome.record_count, outcome.pages_scraped, outcome.termination
    );
    outcome
}
