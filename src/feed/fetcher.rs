use crate::config::FetchConfig;
use crate::feed::parser::parse_entries;
use crate::storage::{Article, Source};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors that can occur while fetching a single source.
///
/// None of these escape the fetch round: each is carried in the source's
/// [`FetchResult`] and logged.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The shared HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request plus body read exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The fetch task panicked or was cancelled
    #[error("Fetch task failed: {0}")]
    Task(String),
}

/// Outcome of fetching one source: its name and either the normalized
/// articles (feed order) or the reason it contributed nothing.
#[derive(Debug)]
pub struct FetchResult {
    pub source: String,
    pub result: Result<Vec<Article>, FetchError>,
}

/// Every per-source outcome of one [`fetch_all`] call, in completion order.
#[derive(Debug, Default)]
pub struct FetchRound {
    pub results: Vec<FetchResult>,
}

impl FetchRound {
    /// Concatenation of all successful sources' articles.
    ///
    /// No ordering is guaranteed across sources; within a source the feed
    /// order is kept.
    pub fn into_articles(self) -> Vec<Article> {
        self.results
            .into_iter()
            .filter_map(|r| r.result.ok())
            .flatten()
            .collect()
    }

    /// Names of the sources whose fetch failed
    pub fn failed_sources(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.source.as_str())
            .collect()
    }

    /// Total articles across successful sources
    pub fn article_count(&self) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().ok())
            .map(Vec::len)
            .sum()
    }
}

/// Build the HTTP client shared by every fetch of one round.
///
/// Only the connect phase is bounded here; the overall per-fetch deadline is
/// enforced in [`fetch_one`] so that it also covers the body read.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(config.timeout())
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// Fetches every source concurrently and collects the outcomes.
///
/// Each source runs in its own tokio task. Up to `max_concurrent_fetches`
/// tasks run at once (0 means one slot per source, i.e. full fan-out).
/// A failing, slow or panicking source only affects its own [`FetchResult`]:
/// it is bounded by its own timeout and never cancels the others.
///
/// One `reqwest::Client` is created per call and shared by all tasks. Every
/// task is awaited before returning, so the client and its pooled connections
/// are released when this function returns, whatever the individual outcomes.
/// Dropping the returned future aborts the fetch tasks still in flight.
pub async fn fetch_all(sources: &[Source], config: &FetchConfig) -> FetchRound {
    if sources.is_empty() {
        return FetchRound::default();
    }

    let client = match build_client(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Cannot fetch feeds without an HTTP client");
            let reason = e.to_string();
            let results = sources
                .iter()
                .map(|s| FetchResult {
                    source: s.name.clone(),
                    result: Err(FetchError::Client(reason.clone())),
                })
                .collect();
            return FetchRound { results };
        }
    };

    let concurrency = match config.max_concurrent_fetches {
        0 => sources.len(),
        n => n,
    };

    tracing::info!(
        sources = sources.len(),
        concurrency = concurrency,
        "Starting fetch round"
    );

    // Tasks are spawned lazily as buffer_unordered pulls from the stream, so
    // at most `concurrency` are in flight.
    let results: Vec<FetchResult> = stream::iter(sources.iter().cloned())
        .map(|source| {
            let client = client.clone();
            let config = config.clone();
            let name = source.name.clone();
            let handle = tokio::spawn(async move { fetch_one(&client, &source, &config).await });
            join_fetch(name, AbortOnDrop(handle))
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let round = FetchRound { results };
    tracing::info!(
        articles = round.article_count(),
        failed = round.failed_sources().len(),
        "Fetch round complete"
    );
    round
}

/// Aborts the wrapped task when dropped before it finishes.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Await a fetch task, turning a panic or cancellation into a failed result
/// for that source.
async fn join_fetch(source: String, mut task: AbortOnDrop<FetchResult>) -> FetchResult {
    match (&mut task.0).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(source = %source, error = %e, "Fetch task did not complete");
            FetchResult {
                source,
                result: Err(FetchError::Task(e.to_string())),
            }
        }
    }
}

/// Fetches one source and normalizes its entries.
///
/// Never fails past this boundary: errors are logged and returned inside the
/// [`FetchResult`].
///
/// # Errors
///
/// The returned `FetchResult.result` may contain:
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Request plus body read exceeded the timeout
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `max_feed_bytes`
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
/// - [`FetchError::Parse`] - Invalid feed document
pub async fn fetch_one(
    client: &reqwest::Client,
    source: &Source,
    config: &FetchConfig,
) -> FetchResult {
    let result = match tokio::time::timeout(config.timeout(), fetch_articles(client, source, config))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };

    match &result {
        Ok(articles) => {
            tracing::info!(
                source = %source.name,
                articles = articles.len(),
                "Fetched feed"
            );
        }
        Err(e) => {
            tracing::warn!(
                source = %source.name,
                url = %source.url,
                error = %e,
                "Failed to fetch feed"
            );
        }
    }

    FetchResult {
        source: source.name.clone(),
        result,
    }
}

async fn fetch_articles(
    client: &reqwest::Client,
    source: &Source,
    config: &FetchConfig,
) -> Result<Vec<Article>, FetchError> {
    let response = client.get(&source.url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, config.max_feed_bytes).await?;
    let fetched_at = chrono::Utc::now();

    let entries = parse_entries(&bytes, config.max_entries_per_source)
        .map_err(|e| FetchError::Parse(e.to_string()))?;

    Ok(entries
        .into_iter()
        .map(|entry| entry.into_article(&source.name, fetched_at))
        .collect())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
