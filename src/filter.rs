//! Keyword and language filtering of fetched articles.
//!
//! [`ContentFilter`] is a pure predicate chain: it never performs I/O, never
//! alters an article and keeps the input order. Its vocabulary comes from
//! [`FilterConfig`], so tests and deployments can swap it freely.
use std::fmt;
use std::ops::RangeInclusive;

use crate::config::FilterConfig;
use crate::storage::Article;
use crate::util::strip_markup;

/// The first predicate an article failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// URL contains a blocked domain
    BlockedDomain,
    /// Title or description contains non-Latin script
    NonEnglish,
    /// Neither title nor description mentions a keyword
    OffTopic,
    /// URL empty or too short
    InvalidUrl,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::BlockedDomain => "blocked domain",
            Rejection::NonEnglish => "non-English text",
            Rejection::OffTopic => "off topic",
            Rejection::InvalidUrl => "invalid URL",
        };
        f.write_str(reason)
    }
}

/// Per-reason tally of one [`ContentFilter::partition`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub blocked_domain: usize,
    pub non_english: usize,
    pub off_topic: usize,
    pub invalid_url: usize,
}

impl FilterStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::BlockedDomain => self.blocked_domain += 1,
            Rejection::NonEnglish => self.non_english += 1,
            Rejection::OffTopic => self.off_topic += 1,
            Rejection::InvalidUrl => self.invalid_url += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.blocked_domain + self.non_english + self.off_topic + self.invalid_url
    }
}

/// Selects topical, English articles with a usable URL.
///
/// Per article, the first failing check drops it:
/// 1. URL contains a blocked domain
/// 2. Title or description contains a character from a non-Latin range, once
///    HTML tags and links are stripped (absent text passes)
/// 3. Neither title nor description contains a keyword, case-insensitively
///    (absent text never matches)
/// 4. URL is shorter than `min_url_chars`
#[derive(Debug, Clone)]
pub struct ContentFilter {
    blocked_domains: Vec<String>,
    /// Domain and adjacent terms, lowercased.
    keywords: Vec<String>,
    min_url_chars: usize,
    non_latin: Vec<RangeInclusive<u32>>,
}

impl ContentFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let keywords = config
            .keywords
            .iter()
            .chain(&config.adjacent_keywords)
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            blocked_domains: config
                .blocked_domains
                .iter()
                .filter(|d| !d.is_empty())
                .cloned()
                .collect(),
            keywords,
            min_url_chars: config.min_url_chars,
            non_latin: config
                .non_latin_ranges
                .iter()
                .map(|&(start, end)| start..=end)
                .collect(),
        }
    }

    /// Articles passing every check, in input order.
    pub fn filter(&self, articles: &[Article]) -> Vec<Article> {
        articles
            .iter()
            .filter(|a| self.check(a).is_ok())
            .cloned()
            .collect()
    }

    /// Like [`ContentFilter::filter`], also counting why articles were dropped.
    pub fn partition(&self, articles: Vec<Article>) -> (Vec<Article>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut kept = Vec::with_capacity(articles.len());

        for article in articles {
            match self.check(&article) {
                Ok(()) => kept.push(article),
                Err(rejection) => {
                    tracing::trace!(
                        source = %article.source,
                        url = %article.url,
                        reason = %rejection,
                        "Article filtered out"
                    );
                    stats.record(rejection);
                }
            }
        }

        stats.kept = kept.len();
        (kept, stats)
    }

    pub fn check(&self, article: &Article) -> Result<(), Rejection> {
        if self
            .blocked_domains
            .iter()
            .any(|d| article.url.contains(d.as_str()))
        {
            return Err(Rejection::BlockedDomain);
        }

        let description = article.description.as_deref();
        if !self.is_english(Some(&article.title)) || !self.is_english(description) {
            return Err(Rejection::NonEnglish);
        }

        if !self.is_on_topic(Some(&article.title)) && !self.is_on_topic(description) {
            return Err(Rejection::OffTopic);
        }

        if article.url.chars().count() < self.min_url_chars.max(1) {
            return Err(Rejection::InvalidUrl);
        }

        Ok(())
    }

    /// `false` when the text, without markup and links, contains any character
    /// from the configured non-Latin ranges. Absent text is English.
    pub fn is_english(&self, text: Option<&str>) -> bool {
        let Some(text) = text else {
            return true;
        };
        let cleaned = strip_markup(text);
        !cleaned.chars().any(|c| {
            let code = u32::from(c);
            self.non_latin.iter().any(|range| range.contains(&code))
        })
    }

    pub fn is_on_topic(&self, text: Option<&str>) -> bool {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return false;
        };
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}
