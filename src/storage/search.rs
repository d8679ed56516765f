use anyhow::Result;

use super::articles::{ARTICLE_COLUMNS, MAX_ARTICLES};
use super::schema::Database;
use super::types::StoredArticle;
use crate::util::MAX_SEARCH_QUERY_LENGTH;

// ============================================================================
// LIKE Pattern Construction
// ============================================================================

/// Build a `LIKE` pattern matching `query` as a literal substring.
///
/// `%`, `_` and the escape character itself are escaped with `\`, so the
/// statement must use `ESCAPE '\'`.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn validate_query(query: &str) -> Result<()> {
    if query.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        anyhow::bail!(
            "Search query exceeds maximum length of {} characters",
            MAX_SEARCH_QUERY_LENGTH
        );
    }
    Ok(())
}

const MATCH_CLAUSE: &str =
    "title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\'";

impl Database {
    // ========================================================================
    // Search Operations
    // ========================================================================

    /// Search articles whose title, description or content contains `query`.
    ///
    /// Matching is a literal substring test through SQLite `LIKE`: ASCII letters
    /// compare case-insensitively, every other character is case-sensitive.
    /// Results use the same ordering as [`Database::get_articles_page`].
    ///
    /// Leading and trailing whitespace is ignored; an empty or whitespace-only
    /// query returns no results.
    ///
    /// # Errors
    ///
    /// Fails if the query exceeds `MAX_SEARCH_QUERY_LENGTH` characters or the
    /// database query fails.
    pub async fn search_articles(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredArticle>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        validate_query(query)?;

        let limit = limit.clamp(0, MAX_ARTICLES);
        let offset = offset.max(0);
        let pattern = like_pattern(query);

        tracing::debug!(query = %query, limit = limit, offset = offset, "search_articles");

        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE {MATCH_CLAUSE} \
             ORDER BY published_at DESC, id DESC \
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, StoredArticle>(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Number of articles [`Database::search_articles`] would match without
    /// pagination.
    pub async fn count_search_results(&self, query: &str) -> Result<i64> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(0);
        }
        validate_query(query)?;

        let pattern = like_pattern(query);
        let sql = format!("SELECT COUNT(*) FROM articles WHERE {MATCH_CLAUSE}");
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Article;

    async fn seeded_db() -> Database {
        let db = Database::open(":memory:").await.unwrap();
        let articles = vec![
            Article {
                source: "Wired".to_string(),
                title: "OpenAI ships a new GPT model".to_string(),
                description: None,
                url: "https://example.com/gpt".to_string(),
                published_at: "2024-03-01T10:00:00Z".to_string(),
                content: None,
            },
            Article {
                source: "The Verge".to_string(),
                title: "Phones of the year".to_string(),
                description: Some("Our favourite handsets, no gpt inside".to_string()),
                url: "https://example.com/phones".to_string(),
                published_at: "2024-03-02T10:00:00Z".to_string(),
                content: None,
            },
            Article {
                source: "TechCrunch".to_string(),
                title: "Funding round".to_string(),
                description: Some("Startup raises money".to_string()),
                url: "https://example.com/funding".to_string(),
                published_at: "2024-03-03T10:00:00Z".to_string(),
                content: Some("<p>Growth is 100% driven by transformer_models</p>".to_string()),
            },
        ];
        db.insert_articles(&articles).await;
        db
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("gpt"), "%gpt%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\dir"), "%c:\\\\dir%");
    }

    #[tokio::test]
    async fn test_search_matches_title_description_and_content() {
        let db = seeded_db().await;

        let gpt = db.search_articles("gpt", 50, 0).await.unwrap();
        let urls: Vec<_> = gpt.iter().map(|a| a.url.as_str()).collect();
        // Newest first; ASCII matching is case-insensitive.
        assert_eq!(
            urls,
            vec!["https://example.com/phones", "https://example.com/gpt"]
        );

        let content = db.search_articles("transformer", 50, 0).await.unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].url, "https://example.com/funding");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let db = seeded_db().await;
        assert_eq!(db.search_articles("100%", 50, 0).await.unwrap().len(), 1);
        assert_eq!(
            db.search_articles("transformer_models", 50, 0)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(db.search_articles("%", 50, 0).await.unwrap().len() == 1);
        assert!(db.search_articles("_", 50, 0).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_search_pagination_and_count() {
        let db = seeded_db().await;
        let first = db.search_articles("gpt", 1, 0).await.unwrap();
        let second = db.search_articles("gpt", 1, 1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);
        assert_eq!(db.count_search_results("gpt").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let db = seeded_db().await;
        assert!(db.search_articles("   ", 50, 0).await.unwrap().is_empty());
        assert_eq!(db.count_search_results("").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overlong_query_rejected() {
        let db = seeded_db().await;
        let query = "a".repeat(MAX_SEARCH_QUERY_LENGTH + 1);
        assert!(db.search_articles(&query, 50, 0).await.is_err());
        assert!(db.count_search_results(&query).await.is_err());
    }

    #[tokio::test]
    async fn test_no_match() {
        let db = seeded_db().await;
        assert!(db
            .search_articles("bakery", 50, 0)
            .await
            .unwrap()
            .is_empty());
    }
}
