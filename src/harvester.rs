//! Run orchestration
//!
//! A run identifies URLs in the input strings, lets the cache decide which of
//! them need fetching, drains that queue through a [`Fetcher`], then folds the
//! collected extraction failures into reports.

use crate::cache;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extraction::{ExtractionService, SchemaOrgExtractor};
use crate::failures::{FailureIndex, FailureReport, build_reports, write_reports};
use crate::fetcher::{FetchContext, Fetcher, SerialFetcher, build_client, select_fetcher};
use crate::types::{Counts, CountsSnapshot, Record};
use crate::utils::identify_urls;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct Harvest {
    /// Statistics of the run
    pub counts: CountsSnapshot,
    /// URLs that went through the network
    pub fetched: usize,
    /// Failure reports, one per (host, method, exception) cluster
    pub reports: Vec<FailureReport>,
    /// Reports written to the report directory
    pub reports_written: usize,
}

/// Harvests recipe URLs into the record store
///
/// Cloneable; the database and extraction service are shared.
#[derive(Clone)]
pub struct Harvester {
    /// Record store (public for callers that read records directly)
    pub db: Arc<Database>,
    config: Arc<Config>,
    service: Arc<dyn ExtractionService>,
}

impl Harvester {
    /// Open the store and use the schema.org extractor
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_service(config, Arc::new(SchemaOrgExtractor::new())).await
    }

    /// Open the store and use `service` for extraction
    pub async fn with_service(config: Config, service: Arc<dyn ExtractionService>) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Ok(Self::from_parts(config, Arc::new(db), service))
    }

    /// Assemble a harvester from an already opened store
    pub fn from_parts(config: Config, db: Arc<Database>, service: Arc<dyn ExtractionService>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            service,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identify URLs among `lines` and harvest them
    pub async fn run_lines<S: AsRef<str>>(&self, lines: &[S]) -> Result<Harvest> {
        let counts = Arc::new(Counts::new());
        let urls = identify_urls(lines, &counts);
        let fetcher = select_fetcher(&self.config.fetch);
        self.run_with(&urls, counts, fetcher.as_ref()).await
    }

    /// Harvest an already identified set of URLs
    pub async fn run(&self, urls: &BTreeSet<String>) -> Result<Harvest> {
        let counts = Arc::new(Counts::new());
        let fetcher = select_fetcher(&self.config.fetch);
        self.run_with(urls, counts, fetcher.as_ref()).await
    }

    async fn run_with(
        &self,
        urls: &BTreeSet<String>,
        counts: Arc<Counts>,
        fetcher: &dyn Fetcher,
    ) -> Result<Harvest> {
        self.config.validate()?;
        if urls.is_empty() {
            return Err(Error::config("urls", "no URLs supplied"));
        }

        let version = self.service.version().to_string();
        let queue = cache::resolve(
            &self.db,
            urls,
            self.config.cache,
            &version,
            &self.config.collection,
            &counts,
        )
        .await?;

        let failures = Arc::new(FailureIndex::new());
        let fetched = queue.len();
        if !queue.is_empty() {
            let ctx = FetchContext {
                client: build_client(&self.config.fetch)?,
                db: self.db.clone(),
                service: self.service.clone(),
                failures: failures.clone(),
                counts: counts.clone(),
                collection: self.config.collection.clone(),
                timeout: self.config.fetch.timeout,
            };
            tracing::info!(
                urls = fetched,
                fetcher = fetcher.name(),
                workers = fetcher.workers(),
                "fetching"
            );
            fetcher.fetch(queue.into_iter().collect(), &ctx).await?;
        }

        let reports = build_reports(&failures, &version, &self.config.reports.project_marker);
        let reports_written = match &self.config.reports.report_dir {
            Some(dir) => write_reports(&reports, dir).await?,
            None => 0,
        };

        let counts = counts.snapshot();
        tracing::info!(
            urls = counts.urls,
            fetched,
            reached = counts.reached,
            reports = reports.len(),
            "run finished"
        );

        Ok(Harvest {
            counts,
            fetched,
            reports,
            reports_written,
        })
    }

    /// Records of the configured collection worth displaying, ordered by URL
    pub async fn records(&self) -> Result<Vec<Record>> {
        self.db.collection_records(&self.config.collection).await
    }

    /// `(title, host)` pairs of the configured collection for a table of contents
    pub async fn titles(&self) -> Result<Vec<(String, String)>> {
        self.db.collection_titles(&self.config.collection).await
    }
}

/// Run a harvest without an async runtime
///
/// Builds a current-thread runtime and fetches serially. Must not be called
/// from within a runtime.
pub fn run_blocking<S: AsRef<str>>(
    config: Config,
    service: Arc<dyn ExtractionService>,
    lines: &[S],
) -> Result<(Harvest, Vec<Record>)> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::Other(
            "run_blocking called from within an async runtime".to_string(),
        ));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let harvester = Harvester::with_service(config, service).await?;
        let counts = Arc::new(Counts::new());
        let urls = identify_urls(lines, &counts);
        let harvest = harvester
            .run_with(&urls, counts, &SerialFetcher::new())
            .await?;
        let records = harvester.records().await?;
        harvester.db.pool().close().await;
        Ok((harvest, records))
    })
}
