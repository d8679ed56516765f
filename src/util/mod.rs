//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Security-focused validation of configured feed URLs
//! - **Text processing**: Stripping markup and links from feed text
//!
//! # Examples
//!
//! ```
//! use fastrss::util::{strip_markup, validate_url};
//!
//! // Validate a feed URL
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//!
//! // Plain text for the language heuristic
//! let text = strip_markup("<p>Hello</p>");
//! assert_eq!(text, "Hello");
//! ```

mod text;
mod url_validator;

pub use text::strip_markup;
pub use url_validator::{validate_url, UrlValidationError};

/// Maximum allowed search query length, shared by the API and the store
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
