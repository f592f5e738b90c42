//! Test configuration helpers for creating harvesters on temporary stores

use recipe_harvest::{CachePolicy, Config, Harvester};
use std::time::Duration;
use tempfile::TempDir;

/// Configuration with the store and report directory inside `temp_dir`
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("records.db");
    config.reports.report_dir = Some(temp_dir.path().join("reports"));
    config.fetch.timeout = Duration::from_secs(5);
    config.fetch.connections = 4;
    config.collection = "test-collection".to_string();
    config
}

/// Harvester on a fresh temporary store
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub async fn create_test_harvester() -> (Harvester, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(test_config(&temp_dir)).await.unwrap();
    (harvester, temp_dir)
}

/// Harvester with a custom cache policy and timeout
pub async fn create_harvester_with(
    policy: CachePolicy,
    timeout: Duration,
) -> (Harvester, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.cache = policy;
    config.fetch.timeout = timeout;
    let harvester = Harvester::new(config).await.unwrap();
    (harvester, temp_dir)
}
