//! Feed retrieval: parsing, concurrent fetching and OPML source lists.
//!
//! - [`parser`] - Feed bytes to ordered [`RawEntry`] values using `feed-rs`
//! - [`fetcher`] - Time-bounded HTTP fetches, one tokio task per source
//! - [`opml`] - OPML subscription lists as an extra source of [`Source`]s
//!
//! [`Source`]: crate::storage::Source
//!
//! # Example
//!
//! ```ignore
//! use fastrss::feed::fetch_all;
//!
//! let round = fetch_all(&config.sources, &config.fetch).await;
//! for failed in round.failed_sources() {
//!     tracing::warn!(source = failed, "No articles this round");
//! }
//! let articles = round.into_articles();
//! ```

mod fetcher;
mod opml;
mod parser;

pub use fetcher::{build_client, fetch_all, fetch_one, FetchError, FetchResult, FetchRound};
pub use opml::{export_opml, load_sources, OpmlError};
pub use parser::{format_timestamp, parse_entries, RawEntry, UNTITLED};
