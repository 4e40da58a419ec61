use anyhow::Result;

use super::schema::Database;
use super::types::{NewSource, Source, SourceDbRow};

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Insert a new source, returning its ID.
    ///
    /// The title defaults to the URL until a sync supplies the feed's own title.
    pub async fn insert_source(&self, source: &NewSource) -> Result<i64> {
        let title = source
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| source.url.clone());

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sources (url, title, kind, download_limit, category)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&source.url)
        .bind(&title)
        .bind(source.kind.as_str())
        .bind(source.download_limit.max(0))
        .bind(&source.category)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(source_id = id, url = %source.url, kind = %source.kind, "Source added");
        Ok(id)
    }

    /// Get a single source by ID.
    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceDbRow>(
            r#"
            SELECT id, url, title, kind, download_limit, category, last_synced
            FROM sources
            WHERE id = ?
        "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SourceDbRow::into_source))
    }

    /// List all sources ordered by category, then title.
    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceDbRow>(
            r#"
            SELECT id, url, title, kind, download_limit, category, last_synced
            FROM sources
            ORDER BY category IS NULL, category, title
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SourceDbRow::into_source).collect())
    }

    /// Apply a user edit to a source. Returns whether the source existed.
    pub async fn update_source(&self, source: &Source) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET url = ?, title = ?, kind = ?, download_limit = ?, category = ?
            WHERE id = ?
        "#,
        )
        .bind(&source.url)
        .bind(&source.title)
        .bind(source.kind.as_str())
        .bind(source.download_limit.max(0))
        .bind(&source.category)
        .bind(source.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a source and (via cascade) all of its articles.
    pub async fn delete_source(&self, source_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful sync: stamp `last_synced` and, when the source
    /// still carries its placeholder title (its URL), adopt the feed's title.
    pub async fn record_source_synced(
        &self,
        source_id: i64,
        feed_title: Option<&str>,
        now: i64,
    ) -> Result<()> {
        let feed_title = feed_title.map(str::trim).filter(|t| !t.is_empty());

        sqlx::query(
            r#"
            UPDATE sources
            SET last_synced = ?,
                title = CASE WHEN title = url AND ? IS NOT NULL THEN ? ELSE title END
            WHERE id = ?
        "#,
        )
        .bind(now)
        .bind(feed_title)
        .bind(feed_title)
        .bind(source_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
