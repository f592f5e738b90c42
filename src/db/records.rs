//! Record CRUD with merge-on-write.

use crate::error::DatabaseError;
use crate::types::{Field, Record, RecordFields, NA};
use crate::utils::head_str;
use crate::{Error, Result};
use sqlx::SqliteConnection;

use super::{Database, RecordRow, RecordState};

const RECORD_COLUMNS: &str = "id, url, status, extractor_version, last_fetched, \
     ingredients, instructions, title, total_time, yields, host, image, nutrients";

/// Merge freshly extracted values into stored ones
///
/// A sentinel in `new` keeps the stored value; anything else overwrites it.
/// Returns the merged values and the fields whose stored value changed.
pub(crate) fn merge_fields(old: &RecordFields, new: &RecordFields) -> (RecordFields, Vec<Field>) {
    let mut merged = old.clone();
    let mut replaced = Vec::new();
    for field in Field::ALL {
        let value = new.get(field);
        if value != NA && value != old.get(field) {
            merged.set(field, value);
            replaced.push(field);
        }
    }
    (merged, replaced)
}

impl Database {
    /// Insert a record, or merge it into the stored one
    ///
    /// Attributes that are the sentinel in `record` keep their stored value; status
    /// and extractor version always take the new values. Runs as one transaction.
    /// Returns the record as stored.
    pub async fn upsert_record(&self, record: &Record) -> Result<Record> {
        self.upsert_record_into(record, None).await
    }

    /// Like [`Database::upsert_record`], also adding the URL to `collection`
    /// inside the same transaction
    pub async fn upsert_record_into(
        &self,
        record: &Record,
        collection: Option<&str>,
    ) -> Result<Record> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let stored = Self::upsert_on(&mut tx, record).await?;
        if let Some(name) = collection {
            let collection_id = Self::ensure_collection_on(&mut tx, name).await?;
            Self::add_member_on(&mut tx, collection_id, &record.url).await?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit record: {}",
                e
            )))
        })?;

        Ok(stored)
    }

    async fn upsert_on(conn: &mut SqliteConnection, record: &Record) -> Result<Record> {
        let now = chrono::Utc::now().timestamp();
        let existing = Self::fetch_row_on(&mut *conn, &record.url).await?;

        let Some(existing) = existing else {
            let f = &record.fields;
            sqlx::query(
                r#"
                INSERT INTO recipes (
                    url, status, extractor_version, last_fetched,
                    ingredients, instructions, title, total_time,
                    yields, host, image, nutrients
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.url)
            .bind(record.status)
            .bind(&record.extractor_version)
            .bind(now)
            .bind(&f.ingredients)
            .bind(&f.instructions)
            .bind(&f.title)
            .bind(&f.total_time)
            .bind(&f.yields)
            .bind(&f.host)
            .bind(&f.image)
            .bind(&f.nutrients)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert record: {}",
                    e
                )))
            })?;

            tracing::debug!(url = %record.url, status = %record.status, "inserted record");
            return Ok(record.clone());
        };

        let old = Record::from(existing);
        let (merged, replaced) = merge_fields(&old.fields, &record.fields);
        for field in &replaced {
            tracing::debug!(
                url = %record.url,
                "{}: {} => {}",
                field,
                head_str(old.fields.get(*field), 50),
                head_str(merged.get(*field), 50)
            );
        }
        if old.status != record.status {
            tracing::debug!(url = %record.url, old = %old.status, new = %record.status, "status changed");
        }

        sqlx::query(
            r#"
            UPDATE recipes SET
                status = ?, extractor_version = ?, last_fetched = ?,
                ingredients = ?, instructions = ?, title = ?, total_time = ?,
                yields = ?, host = ?, image = ?, nutrients = ?
            WHERE url = ?
            "#,
        )
        .bind(record.status)
        .bind(&record.extractor_version)
        .bind(now)
        .bind(&merged.ingredients)
        .bind(&merged.instructions)
        .bind(&merged.title)
        .bind(&merged.total_time)
        .bind(&merged.yields)
        .bind(&merged.host)
        .bind(&merged.image)
        .bind(&merged.nutrients)
        .bind(&record.url)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update record: {}",
                e
            )))
        })?;

        Ok(Record {
            url: record.url.clone(),
            fields: merged,
            status: record.status,
            extractor_version: record.extractor_version.clone(),
        })
    }

    async fn fetch_row_on(conn: &mut SqliteConnection, url: &str) -> Result<Option<RecordRow>> {
        sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM recipes WHERE url = ?",
            RECORD_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get record: {}",
                e
            )))
        })
    }

    /// Get a record by URL
    pub async fn get_record(&self, url: &str) -> Result<Option<Record>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;
        Ok(Self::fetch_row_on(&mut conn, url).await?.map(Record::from))
    }

    /// List all records, ordered by URL
    pub async fn list_records(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM recipes ORDER BY url ASC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list records: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Record::from).collect())
    }

    /// Status and extractor version of every stored record
    pub async fn list_record_states(&self) -> Result<Vec<RecordState>> {
        sqlx::query_as::<_, RecordState>("SELECT url, status, extractor_version FROM recipes")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list record states: {}",
                    e
                )))
            })
    }

    /// Count stored records
    pub async fn count_records(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count records: {}",
                    e
                )))
            })
    }

    /// Remove every record and collection
    pub async fn delete_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        for table in ["collection_members", "collections", "recipes"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to clear {}: {}",
                        table, e
                    )))
                })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit delete: {}",
                e
            )))
        })?;

        tracing::info!("cleared record cache");
        Ok(())
    }
}
