use anyhow::Result;

use super::schema::Database;
use super::types::{Article, InsertReport, StoredArticle};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of articles to return from any single query (OOM protection)
pub(crate) const MAX_ARTICLES: i64 = 2000;

/// Column list shared by every article read query
pub(crate) const ARTICLE_COLUMNS: &str =
    "id, source, title, description, url, published_at, content, created_at";

impl Database {
    // ========================================================================
    // Article Writes
    // ========================================================================

    /// Insert an article unless one with the same URL is already stored.
    ///
    /// Returns `true` when a row was written and `false` when the URL already
    /// existed. A collision never overwrites the stored row and is not an error,
    /// so replaying a pipeline run is safe.
    ///
    /// `ON CONFLICT(url) DO NOTHING` only swallows the URL collision; any other
    /// constraint failure is still returned as an error.
    pub async fn insert_if_absent(&self, article: &Article) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (source, title, description, url, published_at, content)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(&article.source)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.url)
        .bind(&article.published_at)
        .bind(&article.content)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a batch of articles one row at a time.
    ///
    /// A failing row is logged and counted in [`InsertReport::failed`]; it never
    /// aborts the rest of the batch.
    pub async fn insert_articles(&self, articles: &[Article]) -> InsertReport {
        let mut report = InsertReport::default();

        for article in articles {
            match self.insert_if_absent(article).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.duplicates += 1,
                Err(e) => {
                    tracing::error!(
                        source = %article.source,
                        url = %article.url,
                        error = %e,
                        "Failed to save article"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            "Article batch persisted"
        );

        report
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Total number of stored articles
    pub async fn count_articles(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Distinct source names present in the store, sorted alphabetically
    pub async fn list_sources(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT source FROM articles ORDER BY source")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(source,)| source).collect())
    }

    /// One page of articles, newest first.
    ///
    /// `published_at` values are RFC 3339 UTC strings of identical shape, so the
    /// text ordering is chronological. `id DESC` breaks ties, which keeps
    /// consecutive pages disjoint even when many articles share a timestamp.
    ///
    /// PERF-003: `limit` is capped at MAX_ARTICLES (2000); negative values are
    /// treated as zero.
    pub async fn get_articles_page(&self, limit: i64, offset: i64) -> Result<Vec<StoredArticle>> {
        let limit = limit.clamp(0, MAX_ARTICLES);
        let offset = offset.max(0);

        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             ORDER BY published_at DESC, id DESC \
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, StoredArticle>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Look up a stored article by its URL
    pub async fn get_article_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE url = ?");
        let row = sqlx::query_as::<_, StoredArticle>(&sql)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
