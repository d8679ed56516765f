//! Concurrent RSS/Atom aggregation: fetch every configured source at once,
//! keep the topical English articles, store them once per URL in SQLite and
//! serve them through a read-only JSON API.
//!
//! The pieces compose as [`pipeline::run_once`]:
//! [`feed::fetch_all`] → [`filter::ContentFilter`] → [`storage::Database`].
//! [`server::build_router`] reads from the same store independently.

pub mod config;
pub mod feed;
pub mod filter;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod util;
