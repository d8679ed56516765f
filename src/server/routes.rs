//! Read-only article endpoints.
//!
//! GET /                    liveness message
//! GET /api/news            newest articles, paginated
//! GET /api/news/sources    distinct source names
//! GET /api/news/search     substring search, paginated
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::storage::StoredArticle;
use crate::util::MAX_SEARCH_QUERY_LENGTH;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    query: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
pub struct NewsResponse {
    status: &'static str,
    #[serde(rename = "totalResults")]
    total_results: i64,
    articles: Vec<ArticleView>,
}

#[derive(Serialize)]
pub struct SourcesResponse {
    sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceRef {
    id: String,
    name: String,
}

/// An article as rendered by the API.
#[derive(Debug, Serialize)]
pub struct ArticleView {
    source: SourceRef,
    title: String,
    description: Option<String>,
    url: String,
    published_at: String,
    content: Option<String>,
}

impl From<StoredArticle> for ArticleView {
    fn from(article: StoredArticle) -> Self {
        Self {
            source: SourceRef {
                id: article.source.clone(),
                name: article.source,
            },
            title: article.title,
            description: article.description,
            url: article.url,
            published_at: article.published_at,
            content: article.content,
        }
    }
}

/// Validated `limit` and derived `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Page {
    limit: i64,
    offset: i64,
}

impl Page {
    fn from_params(page: Option<i64>, limit: Option<i64>) -> Result<Self, ApiError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(ApiError::InvalidParams(
                "page must be greater than or equal to 1".to_string(),
            ));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::InvalidParams(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| ApiError::InvalidParams("page is out of range".to_string()))?;
        Ok(Self { limit, offset })
    }
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::InvalidParams(rejection.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "fastrss API server",
        status: "ok",
    })
}

pub async fn list_news(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let params = query_params(query)?;
    let page = Page::from_params(params.page, params.limit)?;

    let articles = state.db.get_articles_page(page.limit, page.offset).await?;
    let total_results = state.db.count_articles().await?;

    Ok(Json(NewsResponse {
        status: "ok",
        total_results,
        articles: articles.into_iter().map(ArticleView::from).collect(),
    }))
}

pub async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = state.db.list_sources().await?;
    Ok(Json(SourcesResponse { sources }))
}

/// `totalResults` is the number of matching rows, not the page size.
pub async fn search_news(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let params = query_params(query)?;
    let raw = params
        .query
        .ok_or_else(|| ApiError::InvalidParams("query parameter is required".to_string()))?;
    // Surrounding whitespace is ignored, including for the length limit.
    let text = raw.trim();
    if text.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        return Err(ApiError::InvalidParams(format!(
            "query must be at most {MAX_SEARCH_QUERY_LENGTH} characters"
        )));
    }
    let page = Page::from_params(params.page, params.limit)?;

    let articles = state
        .db
        .search_articles(text, page.limit, page.offset)
        .await?;
    let total_results = state.db.count_search_results(text).await?;

    Ok(Json(NewsResponse {
        status: "ok",
        total_results,
        articles: articles.into_iter().map(ArticleView::from).collect(),
    }))
}
