//! Configuration file parser for `fastrss.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which carries the built-in source list and filter vocabulary. Unknown keys
//! are accepted by serde but logged, since they are usually typos.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::storage::Source;
use crate::util::validate_url;

/// Environment variable overriding `database_path`
pub const DATABASE_ENV: &str = "FASTRSS_DATABASE";
/// Environment variable overriding `server.bind`
pub const BIND_ENV: &str = "FASTRSS_BIND";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// When `[[sources]]` is absent the built-in source list is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Optional OPML file whose feeds are appended to `sources`.
    pub sources_opml: Option<PathBuf>,

    pub fetch: FetchConfig,
    pub filter: FilterConfig,
    pub server: ServerConfig,

    /// Feeds to fetch, in configuration order.
    pub sources: Vec<Source>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("rss_articles.db"),
            sources_opml: None,
            fetch: FetchConfig::default(),
            filter: FilterConfig::default(),
            server: ServerConfig::default(),
            sources: default_sources(),
        }
    }
}

/// Limits applied to every fetch round.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-source deadline covering the request and the body read.
    pub timeout_secs: u64,

    /// Entries converted per feed, in feed order.
    pub max_entries_per_source: usize,

    /// Fetch tasks in flight at once. 0 = one per source.
    pub max_concurrent_fetches: usize,

    /// Largest accepted response body.
    pub max_feed_bytes: usize,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_entries_per_source: 100,
            max_concurrent_fetches: 0,
            max_feed_bytes: 10 * 1024 * 1024,
            user_agent: concat!("fastrss/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vocabulary and thresholds for the content filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Articles whose URL contains any of these substrings are dropped.
    pub blocked_domains: Vec<String>,

    /// Domain terms (AI/ML and generative AI).
    pub keywords: Vec<String>,

    /// Adjacent terms (influencer and creator topics) that also count as relevant.
    pub adjacent_keywords: Vec<String>,

    /// URLs shorter than this are treated as invalid.
    pub min_url_chars: usize,

    /// Inclusive code point ranges of scripts treated as non-English.
    pub non_latin_ranges: Vec<(u32, u32)>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blocked_domains: vec!["pypi.org".to_string()],
            keywords: to_strings(&[
                "artificial intelligence",
                "machine learning",
                "deep learning",
                "neural network",
                "generative ai",
                "genai",
                "gpt",
                "chatgpt",
                "llm",
                "large language model",
                "ai model",
                "ai assistant",
                "natural language processing",
                "nlp",
                "computer vision",
                "reinforcement learning",
                "transformer",
                "stable diffusion",
                "dall-e",
                "midjourney",
                "imagen",
            ]),
            adjacent_keywords: to_strings(&[
                "influencer",
                "social media",
                "content creator",
                "youtube",
                "tiktok",
                "instagram",
            ]),
            min_url_chars: 10,
            non_latin_ranges: vec![
                (0x0600, 0x06FF), // Arabic
                (0x0400, 0x04FF), // Cyrillic
                (0x4E00, 0x9FFF), // CJK Unified Ideographs
                (0x3040, 0x309F), // Hiragana
                (0x30A0, 0x30FF), // Katakana
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for `fastrss serve`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The built-in source list used when the config names no sources.
pub fn default_sources() -> Vec<Source> {
    [
        ("Futurism", "https://futurism.com/feed"),
        ("The Verge", "https://www.theverge.com/rss/index.xml"),
        ("TechCrunch", "https://techcrunch.com/feed/"),
        ("ZDNET", "https://www.zdnet.com/news/rss.xml"),
        ("Decrypt", "https://decrypt.co/feed"),
        ("CNBC", "https://www.cnbc.com/id/100003114/device/rss/rss.html"),
        ("GitHub", "https://github.blog/feed/"),
        ("Medium", "https://medium.com/feed/tag/technology"),
        ("Medium AI", "https://medium.com/feed/tag/artificial-intelligence"),
        ("BBC News", "http://feeds.bbci.co.uk/news/rss.xml"),
        ("TechCrunch AI", "https://techcrunch.com/tag/artificial-intelligence/feed/"),
        ("TechCrunch Apps", "https://techcrunch.com/category/apps/feed/"),
        ("The Register", "https://www.theregister.com/software/ai_ml/headlines.atom"),
        (
            "CNBC AI",
            "https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=19854910",
        ),
        ("NVIDIA", "https://blogs.nvidia.com/blog/category/generative-ai/feed/"),
        ("Crunchbase AI", "https://news.crunchbase.com/sections/ai/feed/"),
        (
            "NY Times AI",
            "https://www.nytimes.com/svc/collections/v1/publish/https://www.nytimes.com/spotlight/artificial-intelligence/rss.xml",
        ),
        ("Futurism Ethics", "https://futurism.com/category/ethics/feed"),
        ("Wired", "https://www.wired.com/feed/rss"),
        ("The Decoder", "https://the-decoder.com/feed/"),
        ("aisearch", "https://aisearch.substack.com/feed"),
        ("The Creators AI", "https://thecreatorsai.com/feed"),
        ("Superhuman", "https://www.superhuman.ai/feed"),
        ("The Rundown", "https://www.therundown.ai/feed"),
        ("The Neuron", "https://www.theneuron.ai/newsletter/feed"),
        ("DeepLearning.AI", "https://www.deeplearning.ai/the-batch/feed"),
    ]
    .into_iter()
    .map(|(name, url)| Source::new(name, url))
    .collect()
}

const KNOWN_KEYS: &[&str] = &[
    "database_path",
    "sources_opml",
    "fetch",
    "filter",
    "server",
    "sources",
];

const KNOWN_SECTION_KEYS: &[(&str, &[&str])] = &[
    (
        "fetch",
        &[
            "timeout_secs",
            "max_entries_per_source",
            "max_concurrent_fetches",
            "max_feed_bytes",
            "user_agent",
        ],
    ),
    (
        "filter",
        &[
            "blocked_domains",
            "keywords",
            "adjacent_keywords",
            "min_url_chars",
            "non_latin_ranges",
        ],
    ),
    ("server", &["bind"]),
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file is never pulled into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let mut config: Config = toml::from_str(&content)?;
        config.normalize();
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply `FASTRSS_DATABASE` / `FASTRSS_BIND` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(path = %path, "Database path overridden from environment");
            self.database_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(bind = %bind, "Bind address overridden from environment");
            self.server.bind = bind;
        }
    }

    /// Configured sources plus those of `sources_opml`, validated and
    /// de-duplicated by name.
    ///
    /// An unreadable OPML file is logged and ignored; the configured sources
    /// are still returned.
    pub async fn resolve_sources(&self) -> Vec<Source> {
        let mut sources = self.sources.clone();

        if let Some(opml) = &self.sources_opml {
            match crate::feed::load_sources(opml).await {
                Ok(extra) => {
                    tracing::info!(
                        path = %opml.display(),
                        sources = extra.len(),
                        "Loaded sources from OPML"
                    );
                    sources.extend(extra);
                }
                Err(e) => {
                    tracing::warn!(path = %opml.display(), error = %e, "Ignoring unreadable OPML file");
                }
            }
        }

        dedup_sources(sources)
    }

    /// Fix values that would make the pipeline useless rather than fail.
    fn normalize(&mut self) {
        if self.fetch.timeout_secs == 0 {
            tracing::warn!("fetch.timeout_secs = 0 would time out every fetch, using default");
            self.fetch.timeout_secs = FetchConfig::default().timeout_secs;
        }
        if self.fetch.max_entries_per_source == 0 {
            tracing::warn!("fetch.max_entries_per_source = 0, no entries would be kept");
        }
        self.filter.non_latin_ranges.retain(|&(start, end)| {
            let valid = start <= end;
            if !valid {
                tracing::warn!(start, end, "Ignoring reversed non_latin_ranges entry");
            }
            valid
        });
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    for (section, known) in KNOWN_SECTION_KEYS {
        if let Some(toml::Value::Table(table)) = raw.get(*section) {
            for key in table.keys() {
                if !known.contains(&key.as_str()) {
                    tracing::warn!(section = %section, key = %key, "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

/// Drop sources with unsafe or malformed URLs and collapse repeated names.
///
/// The first definition of a name wins; later ones are logged and skipped.
pub fn dedup_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(sources.len());

    for source in sources {
        if let Err(e) = validate_url(&source.url) {
            tracing::warn!(source = %source.name, url = %source.url, error = %e, "Skipping source with invalid URL");
            continue;
        }
        if !seen.insert(source.name.clone()) {
            tracing::warn!(source = %source.name, url = %source.url, "Duplicate source name, keeping the first");
            continue;
        }
        kept.push(source);
    }

    kept
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn write_config(test: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("fastrss_config_test_{test}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fastrss.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("rss_articles.db"));
        assert_eq!(config.sources.len(), 26);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.max_entries_per_source, 100);
        assert_eq!(config.fetch.max_concurrent_fetches, 0);
        assert_eq!(config.filter.blocked_domains, vec!["pypi.org"]);
        assert_eq!(config.filter.min_url_chars, 10);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_default_sources_are_valid_and_unique() {
        let sources = default_sources();
        assert_eq!(dedup_sources(sources.clone()), sources);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/fastrss_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.sources.len(), 26);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config(
            "partial",
            "database_path = \"/var/lib/fastrss/articles.db\"\n\n[fetch]\ntimeout_secs = 5\n",
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/fastrss/articles.db"));
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.max_entries_per_source, 100); // default
        assert_eq!(config.sources.len(), 26); // default
        assert_eq!(config.filter.keywords, FilterConfig::default().keywords);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
database_path = "news.db"
sources_opml = "feeds.opml"

[fetch]
timeout_secs = 30
max_entries_per_source = 20
max_concurrent_fetches = 4
max_feed_bytes = 2048
user_agent = "test-agent"

[filter]
blocked_domains = ["pypi.org", "spam.example"]
keywords = ["rust"]
adjacent_keywords = []
min_url_chars = 12
non_latin_ranges = [[0x0400, 0x04FF]]

[server]
bind = "127.0.0.1:9000"

[[sources]]
name = "Rust Blog"
url = "https://blog.rust-lang.org/feed.xml"

[[sources]]
name = "This Week in Rust"
url = "https://this-week-in-rust.org/rss.xml"
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("news.db"));
        assert_eq!(config.sources_opml, Some(PathBuf::from("feeds.opml")));
        assert_eq!(config.fetch.timeout(), Duration::from_secs(30));
        assert_eq!(config.fetch.max_concurrent_fetches, 4);
        assert_eq!(config.fetch.user_agent, "test-agent");
        assert_eq!(config.filter.blocked_domains, vec!["pypi.org", "spam.example"]);
        assert_eq!(config.filter.keywords, vec!["rust"]);
        assert!(config.filter.adjacent_keywords.is_empty());
        assert_eq!(config.filter.non_latin_ranges, vec![(0x0400, 0x04FF)]);
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(
            config.sources,
            vec![
                Source::new("Rust Blog", "https://blog.rust-lang.org/feed.xml"),
                Source::new("This Week in Rust", "https://this-week-in-rust.org/rss.xml"),
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config(
            "unknown",
            "totally_fake_key = 1\n\n[fetch]\ntimeout_sec = 3\n",
        );

        let config = Config::load(&path).unwrap();
        // The misspelled key is ignored, so the default stays.
        assert_eq!(config.fetch.timeout_secs, 15);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "[fetch]\ntimeout_secs = \"fast\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_timeout_replaced_by_default() {
        let (dir, path) = write_config("zero_timeout", "[fetch]\ntimeout_secs = 0\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch.timeout_secs, 15);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reversed_range_dropped() {
        let (dir, path) = write_config(
            "reversed_range",
            "[filter]\nnon_latin_ranges = [[0x04FF, 0x0400], [0x0600, 0x06FF]]\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.filter.non_latin_ranges, vec![(0x0600, 0x06FF)]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [
            (DATABASE_ENV, "/data/articles.db"),
            (BIND_ENV, "127.0.0.1:8080"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_path, PathBuf::from("/data/articles.db"));
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.database_path, PathBuf::from("rss_articles.db"));
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_dedup_first_name_wins() {
        let sources = vec![
            Source::new("Wired", "https://www.wired.com/feed/rss"),
            Source::new("Local", "http://127.0.0.1/feed"),
            Source::new("Wired", "https://www.wired.com/other"),
            Source::new("Decrypt", "https://decrypt.co/feed"),
        ];

        assert_eq!(
            dedup_sources(sources),
            vec![
                Source::new("Wired", "https://www.wired.com/feed/rss"),
                Source::new("Decrypt", "https://decrypt.co/feed"),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_sources_merges_opml() {
        let dir = std::env::temp_dir().join("fastrss_config_test_opml");
        std::fs::create_dir_all(&dir).unwrap();
        let opml = dir.join("feeds.opml");
        std::fs::write(
            &opml,
            r#"<opml><body>
                <outline text="Wired" xmlUrl="https://duplicate.example/feed"/>
                <outline text="Rust Blog" xmlUrl="https://blog.rust-lang.org/feed.xml"/>
            </body></opml>"#,
        )
        .unwrap();

        let config = Config {
            sources: vec![Source::new("Wired", "https://www.wired.com/feed/rss")],
            sources_opml: Some(opml),
            ..Config::default()
        };

        assert_eq!(
            config.resolve_sources().await,
            vec![
                Source::new("Wired", "https://www.wired.com/feed/rss"),
                Source::new("Rust Blog", "https://blog.rust-lang.org/feed.xml"),
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_resolve_sources_missing_opml_keeps_config() {
        let config = Config {
            sources: vec![Source::new("Wired", "https://www.wired.com/feed/rss")],
            sources_opml: Some(PathBuf::from("/tmp/fastrss_no_such_feeds.opml")),
            ..Config::default()
        };
        assert_eq!(config.resolve_sources().await.len(), 1);
    }
}
