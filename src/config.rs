//! Configuration types for recipe-harvest

use crate::cache::CachePolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Network behaviour of the fetch scheduler
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Number of concurrent fetch workers (default: 4)
    ///
    /// Clamped to 1 when no async runtime is available.
    #[serde(default = "default_connections")]
    pub connections: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connections: default_connections(),
            user_agent: default_user_agent(),
        }
    }
}

/// Where the record cache lives
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./recipe-harvest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Failure report settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory the failure reports are written to (None = do not write)
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Directory name that anchors file paths shown in stack traces
    ///
    /// Everything before it is replaced with `...` so reports do not leak the
    /// local filesystem layout.
    #[serde(default = "default_project_marker")]
    pub project_marker: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_dir: None,
            project_marker: default_project_marker(),
        }
    }
}

/// Main configuration for [`crate::Harvester`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Fetch scheduler settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// How the cache is consulted (default: `default`)
    #[serde(default)]
    pub cache: CachePolicy,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Failure report settings
    #[serde(default)]
    pub reports: ReportConfig,

    /// Collection the requested URLs belong to, usually the output file name
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            cache: CachePolicy::default(),
            persistence: PersistenceConfig::default(),
            reports: ReportConfig::default(),
            collection: default_collection(),
        }
    }
}

impl Config {
    /// Reject settings that would make a run meaningless
    ///
    /// Called before any network activity starts.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout.is_zero() {
            return Err(Error::config(
                "timeout",
                "timeout must be greater than zero",
            ));
        }
        if self.fetch.connections == 0 {
            return Err(Error::config(
                "connections",
                "at least one connection is required",
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::config("collection", "collection name is empty"));
        }
        Ok(())
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connections() -> usize {
    4
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:115.0) Gecko/20100101 Firefox/115.0"
        .to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./recipe-harvest.db")
}

fn default_project_marker() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_collection() -> String {
    "recipes".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
