//! Collection membership: which URLs belong to which output.

use crate::error::DatabaseError;
use crate::types::{Record, RecordStatus};
use crate::{Error, Result};
use sqlx::SqliteConnection;

use super::{Database, RecordRow};

impl Database {
    pub(super) async fn ensure_collection_on(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to create collection: {}",
                    e
                )))
            })?;

        sqlx::query_scalar("SELECT id FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to look up collection: {}",
                    e
                )))
            })
    }

    /// Returns whether a membership row was added (false if already a member
    /// or the URL is not stored)
    pub(super) async fn add_member_on(
        conn: &mut SqliteConnection,
        collection_id: i64,
        url: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO collection_members (collection_id, recipe_id)
            SELECT ?, id FROM recipes WHERE url = ?
            "#,
        )
        .bind(collection_id)
        .bind(url)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to add collection member: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Associate stored URLs with a collection
    ///
    /// URLs that are not in the store are skipped. Returns the number of new
    /// memberships.
    pub async fn add_to_collection<S: AsRef<str>>(&self, name: &str, urls: &[S]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let collection_id = Self::ensure_collection_on(&mut tx, name).await?;
        let mut added = 0;
        for url in urls {
            if Self::add_member_on(&mut tx, collection_id, url.as_ref()).await? {
                added += 1;
            }
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit collection members: {}",
                e
            )))
        })?;

        Ok(added)
    }

    /// URLs in a collection, ordered by URL
    pub async fn collection_urls(&self, name: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT r.url FROM recipes r
            JOIN collection_members m ON m.recipe_id = r.id
            JOIN collections c ON c.id = m.collection_id
            WHERE c.name = ?
            ORDER BY r.url ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list collection URLs: {}",
                e
            )))
        })
    }

    /// Records in a collection that are worth writing out, ordered by URL
    ///
    /// Only records with at least [`RecordStatus::IncompleteOnDisplay`] are returned.
    pub async fn collection_records(&self, name: &str) -> Result<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT r.id, r.url, r.status, r.extractor_version, r.last_fetched,
                   r.ingredients, r.instructions, r.title, r.total_time,
                   r.yields, r.host, r.image, r.nutrients
            FROM recipes r
            JOIN collection_members m ON m.recipe_id = r.id
            JOIN collections c ON c.id = m.collection_id
            WHERE c.name = ? AND r.status >= ?
            ORDER BY r.url ASC
            "#,
        )
        .bind(name)
        .bind(RecordStatus::IncompleteOnDisplay)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list collection records: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Record::from).collect())
    }

    /// `(title, host)` of every displayable record in a collection, ordered by
    /// host and then title, for a table of contents
    pub async fn collection_titles(&self, name: &str) -> Result<Vec<(String, String)>> {
        sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT r.title, r.host FROM recipes r
            JOIN collection_members m ON m.recipe_id = r.id
            JOIN collections c ON c.id = m.collection_id
            WHERE c.name = ? AND r.status >= ?
            ORDER BY r.host ASC, r.title ASC
            "#,
        )
        .bind(name)
        .bind(RecordStatus::IncompleteOnDisplay)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list collection titles: {}",
                e
            )))
        })
    }
}
