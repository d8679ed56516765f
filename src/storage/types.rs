use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The article database is locked by another process. Please try again.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::Locked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6) surface as
/// these messages through sqlx.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
}

// ============================================================================
// Data Structures
// ============================================================================

/// A configured feed endpoint.
///
/// `name` is the display and grouping key stored alongside every article the
/// source contributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A normalized feed entry, ready for filtering and persistence.
///
/// Fields are only set at construction; filtering selects articles but never
/// rewrites them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub source: String,
    pub title: String,
    /// Raw summary, possibly containing markup. `None` when the feed has none.
    pub description: Option<String>,
    /// Canonical link and deduplication key. Empty when the entry had no link.
    pub url: String,
    /// RFC 3339 UTC timestamp, see `feed::parser` for the fallback chain.
    pub published_at: String,
    pub content: Option<String>,
}

/// An article row read back from the `articles` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredArticle {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: String,
    pub content: Option<String>,
    /// Write-time timestamp assigned by SQLite (`CURRENT_TIMESTAMP`).
    pub created_at: String,
}

/// Outcome of persisting a batch of articles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Rows actually written
    pub inserted: usize,
    /// Articles skipped because their URL was already stored
    pub duplicates: usize,
    /// Articles whose insert failed for any other reason (logged and skipped)
    pub failed: usize,
}
