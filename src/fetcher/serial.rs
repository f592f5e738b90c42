//! One URL at a time

use super::{FetchContext, Fetcher, process_url, session_deadline};
use crate::error::Result;
use async_trait::async_trait;

/// Fetches the queue in order on the calling task
#[derive(Debug, Clone, Default)]
pub struct SerialFetcher;

impl SerialFetcher {
    /// Create a serial fetcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fetcher for SerialFetcher {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn workers(&self) -> usize {
        1
    }

    async fn fetch(&self, urls: Vec<String>, ctx: &FetchContext) -> Result<()> {
        let deadline = session_deadline(ctx.timeout, urls.len());
        for url in &urls {
            process_url(url, ctx, deadline).await?;
        }
        Ok(())
    }
}
