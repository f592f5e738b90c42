//! Fixed-size pool of fetch workers sharing one queue

use super::{FetchContext, Fetcher, process_url, session_deadline};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Runs up to `workers` fetches at the same time
///
/// Every URL is taken from the queue exactly once. After a store error the
/// remaining workers finish their current URL and stop.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with `workers` concurrent workers (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

#[async_trait]
impl Fetcher for WorkerPool {
    fn name(&self) -> &'static str {
        "worker pool"
    }

    fn workers(&self) -> usize {
        self.workers
    }

    async fn fetch(&self, urls: Vec<String>, ctx: &FetchContext) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let deadline = session_deadline(ctx.timeout, urls.len());
        let worker_count = self.workers.min(urls.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(urls)));
        let abort = Arc::new(AtomicBool::new(false));

        tracing::info!(workers = worker_count, "starting fetch workers");

        let handles: Vec<_> = (0..worker_count)
            .map(|worker| {
                let queue = queue.clone();
                let abort = abort.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    loop {
                        if abort.load(Ordering::SeqCst) {
                            tracing::debug!(worker, "worker stopping after abort");
                            return Ok(());
                        }
                        let next = queue.lock().await.pop_front();
                        let Some(url) = next else {
                            tracing::debug!(worker, "queue drained");
                            return Ok(());
                        };
                        if let Err(e) = process_url(&url, &ctx, deadline).await {
                            abort.store(true, Ordering::SeqCst);
                            return Err(e);
                        }
                    }
                })
            })
            .collect();

        let mut first_error = None;
        for joined in futures::future::join_all(handles).await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "fetch worker panicked");
                    Err(Error::Other(format!("fetch worker failed: {}", e)))
                }
            };
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
