//! Database layer for recipe-harvest
//!
//! Handles SQLite persistence of extracted records, the cache every run consults
//! before touching the network.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`records`] - Record CRUD with merge-on-write
//! - [`collections`] - Which URLs belong to which output collection

use crate::types::{Record, RecordFields, RecordStatus};
use sqlx::{FromRow, sqlite::SqlitePool};

mod collections;
mod migrations;
mod records;

pub(crate) use records::merge_fields;

/// Record row from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    /// Unique database ID
    pub id: i64,
    /// Source URL (unique)
    pub url: String,
    /// Completeness status
    pub status: RecordStatus,
    /// Extractor version the row was last written with
    pub extractor_version: String,
    /// Unix timestamp of the last write
    pub last_fetched: i64,
    /// Ingredient list
    pub ingredients: String,
    /// Preparation steps
    pub instructions: String,
    /// Title
    pub title: String,
    /// Total time in minutes
    pub total_time: String,
    /// Servings
    pub yields: String,
    /// Host
    pub host: String,
    /// Image URL
    pub image: String,
    /// Nutrient table
    pub nutrients: String,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            url: row.url,
            fields: RecordFields {
                ingredients: row.ingredients,
                instructions: row.instructions,
                title: row.title,
                total_time: row.total_time,
                yields: row.yields,
                host: row.host,
                image: row.image,
                nutrients: row.nutrients,
            },
            status: row.status,
            extractor_version: row.extractor_version,
        }
    }
}

/// Cache-relevant columns of a stored record
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecordState {
    /// Source URL
    pub url: String,
    /// Completeness status
    pub status: RecordStatus,
    /// Extractor version the row was last written with
    pub extractor_version: String,
}

/// Database handle for recipe-harvest
///
/// Writes are serialized through `write_lock`, one transaction per record; WAL
/// mode lets reads proceed alongside them.
pub struct Database {
    pool: SqlitePool,
    write_lock: tokio::sync::Mutex<()>,
}
