//! One fetch → filter → persist run.
use std::time::Instant;

use crate::config::Config;
use crate::feed::fetch_all;
use crate::filter::{ContentFilter, FilterStats};
use crate::storage::{Database, Source};

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Sources attempted
    pub sources: usize,
    /// Names of sources that contributed nothing because their fetch failed
    pub failed_sources: Vec<String>,
    /// Articles fetched across all successful sources
    pub fetched: usize,
    /// Articles that passed the filter
    pub filtered: usize,
    /// New rows written
    pub saved: usize,
    /// Filtered articles whose URL was already stored
    pub duplicates: usize,
    /// Filtered articles whose insert failed
    pub write_failures: usize,
    pub rejections: FilterStats,
}

/// Fetch every source, filter the articles and store the survivors.
///
/// Always completes: failing sources and failing rows are logged and counted
/// in the report. Running twice over the same feeds writes nothing new the
/// second time.
pub async fn run_once(db: &Database, config: &Config, sources: &[Source]) -> RunReport {
    let started = Instant::now();
    tracing::info!(sources = sources.len(), "Starting pipeline run");

    let round = fetch_all(sources, &config.fetch).await;
    let failed_sources = round
        .failed_sources()
        .into_iter()
        .map(str::to_string)
        .collect();
    let articles = round.into_articles();
    let fetched = articles.len();
    tracing::info!(articles = fetched, "Fetched articles from all sources");

    let (kept, rejections) = ContentFilter::new(&config.filter).partition(articles);
    tracing::info!(
        kept = kept.len(),
        blocked_domain = rejections.blocked_domain,
        non_english = rejections.non_english,
        off_topic = rejections.off_topic,
        invalid_url = rejections.invalid_url,
        "Filtered articles"
    );

    let written = db.insert_articles(&kept).await;

    let report = RunReport {
        sources: sources.len(),
        failed_sources,
        fetched,
        filtered: kept.len(),
        saved: written.inserted,
        duplicates: written.duplicates,
        write_failures: written.failed,
        rejections,
    };

    tracing::info!(
        saved = report.saved,
        duplicates = report.duplicates,
        write_failures = report.write_failures,
        failed_sources = report.failed_sources.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline run complete"
    );

    report
}
