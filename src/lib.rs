//! # recipe-harvest
//!
//! Cached, concurrency-bounded acquisition pipeline for recipe documents.
//!
//! ## Design Philosophy
//!
//! recipe-harvest is designed to be:
//! - **Cache-first** - Stored records are reused until the extractor changes
//! - **Failure-tolerant** - A broken field never costs the rest of the record
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//! - **Pluggable** - Extraction sits behind the [`ExtractionService`] trait
//!
//! ## Quick Start
//!
//! ```no_run
//! use recipe_harvest::{Config, Harvester};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         collection: "weeknight".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let harvester = Harvester::new(config).await?;
//!     let harvest = harvester
//!         .run_lines(&["https://www.example.com/recipes/pancakes"])
//!         .await?;
//!     println!("{}", harvest.counts);
//!
//!     for record in harvester.records().await? {
//!         println!("{}: {}", record.url, record.display_title());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cache policies and staleness rules
pub mod cache;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Field extraction through a pluggable service
pub mod extraction;
/// Failure clustering and report generation
pub mod failures;
/// Bounded-concurrency fetching
pub mod fetcher;
/// Run orchestration
pub mod harvester;
/// Core types
pub mod types;
/// Helper utilities
pub mod utils;

pub use cache::CachePolicy;
pub use config::{Config, FetchConfig, PersistenceConfig, ReportConfig};
pub use db::Database;
pub use error::{Error, Result, ToExitCode};
pub use extraction::{
    DocumentFailure, ExtractionService, FailureKind, FieldFailure, FieldValue, ParsedDocument,
    SchemaOrgExtractor,
};
pub use failures::{FailureIndex, FailureReport};
pub use harvester::{Harvest, Harvester, run_blocking};
pub use types::{Counts, CountsSnapshot, Field, NA, Record, RecordFields, RecordStatus};
