use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;

use crate::storage::Article;

/// Title used when an entry carries none
pub const UNTITLED: &str = "Untitled";

/// One feed item as delivered by the parser, before normalization.
///
/// Every field the feed may omit stays optional here; the fallbacks are
/// applied in [`RawEntry::into_article`] only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl From<Entry> for RawEntry {
    fn from(entry: Entry) -> Self {
        Self {
            title: entry.title.map(|t| t.content),
            summary: entry.summary.map(|s| s.content),
            content: entry.content.and_then(|c| c.body),
            link: article_link(entry.links),
            published: entry.published,
            updated: entry.updated,
        }
    }
}

/// The entry's article link: the first `alternate` (or untyped) link, else
/// the first link of any kind. Atom entries may list `replies`, `edit` or
/// `self` links ahead of the article itself.
fn article_link(links: Vec<Link>) -> Option<String> {
    let alternate = links
        .iter()
        .position(|l| matches!(l.rel.as_deref(), None | Some("alternate")));
    let index = alternate.unwrap_or(0);
    links.into_iter().nth(index).map(|l| l.href)
}

impl RawEntry {
    /// Normalize into an [`Article`] attributed to `source`.
    ///
    /// Fallbacks, in order:
    /// - title: entry title, else `"Untitled"`
    /// - description/content: left `None` when absent (an empty string stays `Some`)
    /// - url: alternate link, else first link, else empty (rejected later by the URL predicate)
    /// - published_at: `published`, else `updated`, else `fetched_at`
    ///
    /// Timestamps are rendered as RFC 3339 UTC with second precision so stored
    /// values from different feed formats sort chronologically as text.
    pub fn into_article(self, source: &str, fetched_at: DateTime<Utc>) -> Article {
        let published = self.published.or(self.updated).unwrap_or(fetched_at);

        Article {
            source: source.to_string(),
            title: self.title.unwrap_or_else(|| UNTITLED.to_string()),
            description: self.summary,
            url: self
                .link
                .map(|l| l.trim().to_string())
                .unwrap_or_default(),
            published_at: format_timestamp(published),
            content: self.content,
        }
    }
}

/// Render a timestamp in the canonical stored form (`2024-01-31T09:30:00Z`)
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse RSS, Atom or JSON Feed bytes into at most `max_entries` raw entries,
/// preserving feed order.
pub fn parse_entries(bytes: &[u8], max_entries: usize) -> Result<Vec<RawEntry>> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .take(max_entries)
        .map(RawEntry::from)
        .collect();

    Ok(entries)
}
