mod articles;
mod schema;
mod sources;
mod types;

pub use schema::Database;
pub use types::{Article, ArticleDraft, DatabaseError, NewSource, Source, SourceKind};
