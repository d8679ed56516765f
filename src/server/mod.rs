//! HTTP read API over the article store.
//!
//! The API never writes: articles only enter the store through a pipeline
//! run (`fastrss fetch`).
mod error;
mod routes;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::storage::Database;

pub use error::ApiError;
pub use routes::ArticleView;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Build the API router with permissive CORS and request tracing.
pub fn build_router(db: Database) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/api/news", get(routes::list_news))
        .route("/api/news/sources", get(routes::list_sources))
        .route("/api/news/search", get(routes::search_news))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { db })
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn serve(db: Database, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to address {bind}"))?;
    tracing::info!(addr = %bind, "API server listening");

    axum::serve(listener, build_router(db))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Article;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn seeded_db() -> Database {
        let db = Database::open(":memory:").await.unwrap();
        for (i, (source, title)) in [
            ("Wired", "GPT-4 turbo pricing"),
            ("The Verge", "Deep learning on phones"),
            ("Wired", "TikTok creators adopt AI"),
        ]
        .into_iter()
        .enumerate()
        {
            let article = Article {
                source: source.to_string(),
                title: title.to_string(),
                description: Some(format!("Description {i}")),
                url: format!("https://example.com/{i}"),
                published_at: format!("2024-01-0{}T00:00:00Z", i + 1),
                content: None,
            };
            assert!(db.insert_if_absent(&article).await.unwrap());
        }
        db
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn titles(body: &Value) -> Vec<&str> {
        body["articles"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["title"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_root() {
        let (status, body) = get_json(build_router(seeded_db().await), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"message": "fastrss API server", "status": "ok"})
        );
    }

    #[tokio::test]
    async fn test_news_newest_first_with_total() {
        let (status, body) = get_json(build_router(seeded_db().await), "/api/news").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["totalResults"], 3);
        assert_eq!(
            titles(&body),
            vec![
                "TikTok creators adopt AI",
                "Deep learning on phones",
                "GPT-4 turbo pricing"
            ]
        );
        assert_eq!(body["articles"][0]["source"]["id"], "Wired");
        assert_eq!(body["articles"][0]["source"]["name"], "Wired");
    }

    #[tokio::test]
    async fn test_news_pagination() {
        let db = seeded_db().await;
        let (_, page2) = get_json(build_router(db.clone()), "/api/news?page=2&limit=2").await;
        assert_eq!(titles(&page2), vec!["GPT-4 turbo pricing"]);
        assert_eq!(page2["totalResults"], 3);

        let (_, page3) = get_json(build_router(db), "/api/news?page=3&limit=2").await;
        assert!(titles(&page3).is_empty());
    }

    #[tokio::test]
    async fn test_news_invalid_params_422() {
        let db = seeded_db().await;
        for uri in [
            "/api/news?page=0",
            "/api/news?limit=0",
            "/api/news?limit=101",
            "/api/news?page=abc",
        ] {
            let (status, body) = get_json(build_router(db.clone()), uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert_eq!(body["status"], "error");
        }
    }

    #[tokio::test]
    async fn test_sources() {
        let (status, body) = get_json(build_router(seeded_db().await), "/api/news/sources").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"sources": ["The Verge", "Wired"]}));
    }

    #[tokio::test]
    async fn test_search_reports_true_match_count() {
        let db = seeded_db().await;
        let (status, body) = get_json(
            build_router(db),
            "/api/news/search?query=description&limit=1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(titles(&body), vec!["TikTok creators adopt AI"]);
        assert_eq!(body["totalResults"], 3);
    }

    #[tokio::test]
    async fn test_search_case_insensitive_ascii() {
        let (_, body) = get_json(
            build_router(seeded_db().await),
            "/api/news/search?query=gpt-4",
        )
        .await;
        assert_eq!(titles(&body), vec!["GPT-4 turbo pricing"]);
        assert_eq!(body["totalResults"], 1);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (status, body) =
            get_json(build_router(seeded_db().await), "/api/news/search").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_search_query_too_long() {
        let uri = format!("/api/news/search?query={}", "a".repeat(257));
        let (status, _) = get_json(build_router(seeded_db().await), &uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_search_padding_not_counted_toward_limit() {
        let padding = "%20".repeat(300);
        let uri = format!("/api/news/search?query={padding}gpt-4{padding}");
        let (status, body) = get_json(build_router(seeded_db().await), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(titles(&body), vec!["GPT-4 turbo pricing"]);
        assert_eq!(body["totalResults"], 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_generic_500() {
        let db = seeded_db().await;
        db.pool.close().await;

        let (status, body) = get_json(build_router(db), "/api/news").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({"status": "error", "message": "Internal server error"})
        );
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let response = build_router(seeded_db().await)
            .oneshot(
                Request::builder()
                    .uri("/api/news")
                    .header("Origin", "https://reader.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .map(|v| v.to_str().unwrap()),
            Some("*")
        );
    }
}
