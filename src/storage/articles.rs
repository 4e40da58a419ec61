use anyhow::Result;

use super::schema::Database;
use super::types::{Article, ArticleDbRow};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of articles to return from any single query (OOM protection)
const MAX_ARTICLES: i64 = 2000;

const ARTICLE_COLUMNS: &str = "id, source_id, title, url, content, published, cached, local_path, \
     favorite, read, image_url, local_image_path";

impl Database {
    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Look up an article by its reconciliation key.
    pub async fn get_article_by_key(&self, source_id: i64, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE source_id = ? AND url = ?"
        ))
        .bind(source_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleDbRow::into_article))
    }

    /// Insert or update an article keyed by `(source_id, url)`, returning its ID.
    ///
    /// `article.id` is ignored. Callers merge existing state before calling
    /// (see [`Article::merged_with`]); this writes every column as given.
    pub async fn upsert_article(&self, article: &Article) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO articles
                (source_id, title, url, content, published, cached, local_path,
                 favorite, read, image_url, local_image_path)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id, url) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                published = excluded.published,
                cached = excluded.cached,
                local_path = excluded.local_path,
                favorite = excluded.favorite,
                read = excluded.read,
                image_url = excluded.image_url,
                local_image_path = excluded.local_image_path
            RETURNING id
        "#,
        )
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.content)
        .bind(article.published)
        .bind(article.cached)
        .bind(&article.local_path)
        .bind(article.favorite)
        .bind(article.read)
        .bind(&article.image_url)
        .bind(&article.local_image_path)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    // ========================================================================
    // Retention
    // ========================================================================

    /// Delete articles published before `cutoff` (unix seconds).
    ///
    /// Returns the number of rows removed.
    pub async fn delete_articles_older_than(
        &self,
        source_id: i64,
        cutoff: i64,
        exclude_favorites: bool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM articles
            WHERE source_id = ? AND published < ? AND (? = 0 OR favorite = 0)
        "#,
        )
        .bind(source_id)
        .bind(cutoff)
        .bind(exclude_favorites)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete every article outside the `keep_count` most recent for a source.
    ///
    /// Favorites still occupy a slot in the most-recent window; with
    /// `exclude_favorites` they also survive outside it.
    pub async fn delete_excess_articles(
        &self,
        source_id: i64,
        keep_count: i64,
        exclude_favorites: bool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM articles
            WHERE source_id = ?
              AND (? = 0 OR favorite = 0)
              AND id NOT IN (
                  SELECT id FROM articles
                  WHERE source_id = ?
                  ORDER BY published DESC, id DESC
                  LIMIT ?
              )
        "#,
        )
        .bind(source_id)
        .bind(exclude_favorites)
        .bind(source_id)
        .bind(keep_count.max(0))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// The most recent articles whose full content has not been downloaded.
    pub async fn get_uncached_articles(&self, source_id: i64, limit: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE source_id = ? AND cached = 0 \
             ORDER BY published DESC, id DESC LIMIT ?"
        ))
        .bind(source_id)
        .bind(limit.clamp(0, MAX_ARTICLES))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    /// Articles for a source, unread first, then newest first.
    pub async fn get_articles_for_source(&self, source_id: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE source_id = ? \
             ORDER BY read ASC, published DESC LIMIT ?"
        ))
        .bind(source_id)
        .bind(MAX_ARTICLES)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    /// Get a single article by its ID.
    pub async fn get_article_by_id(&self, article_id: i64) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleDbRow::into_article))
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Record downloaded content for an existing article and mark it cached.
    ///
    /// Only pipeline-owned columns are written (`content`, `cached`,
    /// `image_url`, `local_image_path`, and `published` when given), so
    /// read/favorite changes made while the download was in flight survive.
    /// Returns whether the article still exists.
    pub async fn store_downloaded_content(
        &self,
        article: &Article,
        published: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET content = ?,
                cached = 1,
                image_url = ?,
                local_image_path = ?,
                published = COALESCE(?, published)
            WHERE id = ?
        "#,
        )
        .bind(&article.content)
        .bind(&article.image_url)
        .bind(&article.local_image_path)
        .bind(published)
        .bind(article.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the read flag, returning whether the article exists.
    pub async fn set_article_read(&self, article_id: i64, read: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET read = ? WHERE id = ?")
            .bind(read)
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the favorite flag, returning whether the article exists.
    pub async fn set_article_favorite(&self, article_id: i64, favorite: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET favorite = ? WHERE id = ?")
            .bind(favorite)
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
