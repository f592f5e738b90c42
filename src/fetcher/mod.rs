//! Fetch scheduler
//!
//! Drains a queue of URLs, fetching each document, handing it to the
//! extraction adapter and storing the resulting record. Two interchangeable
//! [`Fetcher`] implementations exist:
//!
//! - [`WorkerPool`] - a fixed number of tokio tasks sharing one queue
//! - [`SerialFetcher`] - one URL at a time, in order
//!
//! A network failure marks the URL unreachable and moves on. A store failure
//! aborts the run.

use crate::config::FetchConfig;
use crate::db::Database;
use crate::error::Result;
use crate::extraction::{ExtractionService, extract};
use crate::failures::FailureIndex;
use crate::types::{Counts, Record, RecordStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

pub mod pool;
pub mod request;
pub mod serial;

pub use pool::WorkerPool;
pub use request::{FetchOutcome, build_client, fetch_document};
pub use serial::SerialFetcher;

/// Shared state a worker needs to handle a URL
#[derive(Clone)]
pub struct FetchContext {
    /// HTTP client shared by all workers
    pub client: reqwest::Client,
    /// Record store
    pub db: Arc<Database>,
    /// Extraction service
    pub service: Arc<dyn ExtractionService>,
    /// Failures of the current run
    pub failures: Arc<FailureIndex>,
    /// Statistics of the current run
    pub counts: Arc<Counts>,
    /// Collection every fetched URL is added to
    pub collection: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Bounded-concurrency fetching of a URL queue
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Name for log output
    fn name(&self) -> &'static str;

    /// Number of URLs in flight at most
    fn workers(&self) -> usize;

    /// Fetch, extract and store every URL in `urls`
    ///
    /// Returns the first store error, after all workers have stopped.
    async fn fetch(&self, urls: Vec<String>, ctx: &FetchContext) -> Result<()>;
}

/// Pick the fetcher for the current runtime
///
/// The worker pool needs a tokio runtime; without one, or with a single
/// connection, URLs are fetched serially.
pub fn select_fetcher(config: &FetchConfig) -> Box<dyn Fetcher> {
    let connections = config.connections;
    let has_runtime = tokio::runtime::Handle::try_current().is_ok();
    if has_runtime && connections > 1 {
        return Box::new(WorkerPool::new(connections));
    }
    if connections > 1 {
        tracing::warn!(
            connections,
            "no async runtime available, fetching with a single connection"
        );
    }
    Box::new(SerialFetcher::new())
}

/// Full per-request timeouts granted to each queued URL within a session
pub(crate) const SESSION_TIMEOUT_FACTOR: u32 = 10;

/// Deadline for the whole session
///
/// Each queued URL gets [`SESSION_TIMEOUT_FACTOR`] full timeouts, so a run
/// that stalls on every URL still gives the last one its whole timeout.
/// `None` if the deadline is too far away to represent.
pub(crate) fn session_deadline(timeout: Duration, queued: usize) -> Option<Instant> {
    let queued = u32::try_from(queued).ok()?;
    let budget = timeout
        .checked_mul(queued)?
        .checked_mul(SESSION_TIMEOUT_FACTOR)?;
    Instant::now().checked_add(budget)
}

/// Timeout for a request started at `now`: the per-request timeout, bounded by the session
pub(crate) fn request_timeout(timeout: Duration, deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => timeout.min(deadline.saturating_duration_since(now)),
        None => timeout,
    }
}

/// Fetch, extract and store a single URL
pub(crate) async fn process_url(
    url: &str,
    ctx: &FetchContext,
    deadline: Option<Instant>,
) -> Result<Record> {
    let span = tracing::info_span!("fetch", url = %url);
    async move {
        tracing::info!("fetching");
        let timeout = request_timeout(ctx.timeout, deadline, Instant::now());

        let record = match fetch_document(&ctx.client, url, timeout).await {
            FetchOutcome::Document(bytes) => {
                ctx.counts.inc_reached();
                extract(url, &bytes, ctx.service.as_ref(), &ctx.failures)
            }
            FetchOutcome::Partial { bytes, error } => {
                ctx.counts.inc_reached();
                tracing::warn!(error = %error, bytes = bytes.len(), "extracting from partial document");
                extract(url, &bytes, ctx.service.as_ref(), &ctx.failures)
            }
            FetchOutcome::Unreachable(reason) => {
                tracing::debug!(reason = %reason, "marking unreachable");
                Record::placeholder(url, RecordStatus::Unreachable, ctx.service.version())
            }
        };
        ctx.counts.record_parsed(record.status);

        ctx.db
            .upsert_record_into(&record, Some(&ctx.collection))
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to store record"))
    }
    .instrument(span)
    .await
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
