mod articles;
mod schema;
mod search;
mod types;

pub use schema::Database;
pub use types::{Article, DatabaseError, InsertReport, Source, StoredArticle};
