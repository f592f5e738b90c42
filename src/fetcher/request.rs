//! HTTP requests and their classification

use crate::config::FetchConfig;
use crate::error::Result;
use std::time::Duration;

/// Redirects followed before a site counts as unreachable
pub const MAX_REDIRECTS: usize = 10;

/// What a single request produced
#[derive(Debug)]
pub enum FetchOutcome {
    /// Complete response body
    Document(Vec<u8>),
    /// The body broke off midway for a reason other than a timeout
    Partial {
        /// Bytes received before the failure
        bytes: Vec<u8>,
        /// Why the read failed
        error: String,
    },
    /// No usable response (timeout, redirect loop, connection failure, HTTP error)
    Unreachable(String),
}

/// Build the HTTP client shared by all workers
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

/// GET `url`, giving up after `timeout`
///
/// Never fails: every problem is folded into the returned [`FetchOutcome`].
pub async fn fetch_document(client: &reqwest::Client, url: &str, timeout: Duration) -> FetchOutcome {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() || e.is_redirect() || e.is_connect() => {
            tracing::error!(error = %e, "unable to reach website");
            return FetchOutcome::Unreachable(e.to_string());
        }
        Err(e) => {
            tracing::error!(error = %e, "request failed");
            return FetchOutcome::Unreachable(e.to_string());
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::error!(status = %status, "connection error");
        return FetchOutcome::Unreachable(format!("HTTP {}", status));
    }

    let mut response = response;
    let mut bytes = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_redirect() => {
                tracing::error!(error = %e, received = bytes.len(), "unable to reach website");
                return FetchOutcome::Unreachable(e.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, received = bytes.len(), "reading response body failed");
                if bytes.is_empty() {
                    return FetchOutcome::Unreachable(e.to_string());
                }
                return FetchOutcome::Partial {
                    bytes,
                    error: e.to_string(),
                };
            }
        }
    }

    tracing::debug!(bytes = bytes.len(), "response received");
    FetchOutcome::Document(bytes)
}
