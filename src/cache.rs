//! Cache policy and staleness rules
//!
//! Decides which of the requested URLs still have to be fetched, given what the
//! [`Database`] already holds and which extractor version produced it.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Counts, RecordStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// How the record cache is consulted for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Fetch what is missing or stale
    #[default]
    Default,
    /// Never fetch, use what is stored
    Only,
    /// Fetch everything
    New,
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CachePolicy::Default => "default",
            CachePolicy::Only => "only",
            CachePolicy::New => "new",
        };
        f.write_str(name)
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(CachePolicy::Default),
            "only" => Ok(CachePolicy::Only),
            "new" => Ok(CachePolicy::New),
            other => Err(Error::config(
                "cache",
                format!("unknown cache policy '{}' (expected default, only or new)", other),
            )),
        }
    }
}

/// Whether a stored record should be fetched again
///
/// Unreachable and structurally broken records are always retried. Records that
/// were extracted, but not completely, are retried once the extractor version
/// changes. Complete records are final.
pub fn needs_refetch(status: RecordStatus, stored_version: &str, current_version: &str) -> bool {
    match status {
        RecordStatus::NotInitialized
        | RecordStatus::Unreachable
        | RecordStatus::IncompleteEssential => true,
        RecordStatus::Unknown
        | RecordStatus::IncompleteOnDisplay
        | RecordStatus::CompleteOnDisplay => stored_version != current_version,
        RecordStatus::Complete => false,
    }
}

/// Reduce the requested URLs to the ones that must be fetched
///
/// URLs that are not fetched but stored are added to `collection` so they still
/// end up in the output. Updates the `urls` and `require_fetching` counts.
pub async fn resolve(
    db: &Database,
    urls: &BTreeSet<String>,
    policy: CachePolicy,
    current_version: &str,
    collection: &str,
    counts: &Counts,
) -> Result<BTreeSet<String>> {
    counts.add_urls(urls.len());

    let fetch_set = match policy {
        CachePolicy::Only => {
            let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
            let seen = db.add_to_collection(collection, &urls).await?;
            tracing::info!(requested = urls.len(), cached = seen, "using cache only");
            BTreeSet::new()
        }
        CachePolicy::New => {
            let urls_ref: Vec<&str> = urls.iter().map(String::as_str).collect();
            db.add_to_collection(collection, &urls_ref).await?;
            urls.clone()
        }
        CachePolicy::Default => {
            let stored: HashMap<String, (RecordStatus, String)> = db
                .list_record_states()
                .await?
                .into_iter()
                .map(|s| (s.url, (s.status, s.extractor_version)))
                .collect();

            let mut fetch_set = BTreeSet::new();
            let mut cached = Vec::new();
            for url in urls {
                match stored.get(url) {
                    Some((status, version)) if !needs_refetch(*status, version, current_version) => {
                        if *status == RecordStatus::Unknown {
                            tracing::info!(
                                url = %url,
                                version = %version,
                                "not refetching, extractor version since last fetch has not changed"
                            );
                        } else {
                            tracing::info!(url = %url, "using cached version");
                        }
                        cached.push(url.as_str());
                    }
                    _ => {
                        fetch_set.insert(url.clone());
                    }
                }
            }

            db.add_to_collection(collection, &cached).await?;
            fetch_set
        }
    };

    counts.add_require_fetching(fetch_set.len());
    Ok(fetch_set)
}
