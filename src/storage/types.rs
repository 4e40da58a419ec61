use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another process. Close it and try again.")]
    InstanceLocked,

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
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Source Kind
// ============================================================================

/// How a source produces articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS or Atom feed
    Syndication,
    /// Micro-blog endpoint that serves RSS/Atom (e.g. a Mastodon account feed)
    MicroBlog,
    /// A single HTML page kept as one article
    SinglePage,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Syndication => "syndication",
            SourceKind::MicroBlog => "micro_blog",
            SourceKind::SinglePage => "single_page",
        }
    }

    /// Whether articles are discovered by fetching a syndication document.
    pub fn is_feed(self) -> bool {
        matches!(self, SourceKind::Syndication | SourceKind::MicroBlog)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syndication" => Ok(SourceKind::Syndication),
            "micro_blog" => Ok(SourceKind::MicroBlog),
            "single_page" => Ok(SourceKind::SinglePage),
            other => Err(format!("unknown source kind '{other}'")),
        }
    }
}

// ============================================================================
// Helper Types
// ============================================================================

/// Fields supplied by the user when creating or editing a source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub url: String,
    pub title: Option<String>,
    pub kind: SourceKind,
    pub download_limit: i64,
    pub category: Option<String>,
}

/// An article as read from a syndication document, before reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub url: String,
    pub content: String,
    /// Unix seconds; `None` when the entry carries no date
    pub published: Option<i64>,
    pub image_url: Option<String>,
}

/// Internal row type for Source queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SourceDbRow {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub kind: String,
    pub download_limit: i64,
    pub category: Option<String>,
    pub last_synced: Option<i64>,
}

impl SourceDbRow {
    pub(crate) fn into_source(self) -> Source {
        let kind = self.kind.parse().unwrap_or_else(|e: String| {
            tracing::warn!(source_id = self.id, error = %e, "Treating source as syndication");
            SourceKind::Syndication
        });
        Source {
            id: self.id,
            url: self.url,
            title: self.title,
            kind,
            download_limit: self.download_limit,
            category: self.category,
            last_synced: self.last_synced,
        }
    }
}

/// Internal row type for Article queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published: i64,
    pub cached: bool,
    pub local_path: Option<String>,
    pub favorite: bool,
    pub read: bool,
    pub image_url: Option<String>,
    pub local_image_path: Option<String>,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Article {
        Article {
            id: self.id,
            source_id: self.source_id,
            title: self.title,
            url: self.url,
            content: self.content,
            published: self.published,
            cached: self.cached,
            local_path: self.local_path,
            favorite: self.favorite,
            read: self.read,
            image_url: self.image_url,
            local_image_path: self.local_image_path,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A configured origin of articles
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub kind: SourceKind,
    /// Number of articles to pre-download per sync (0 = none)
    pub download_limit: i64,
    pub category: Option<String>,
    /// Unix seconds of the last successful sync
    pub last_synced: Option<i64>,
}

/// One ingested content item belonging to a [`Source`].
///
/// `(source_id, url)` is unique and is the reconciliation key; `id` is
/// assigned by the database and ignored by [`Database::upsert_article`].
///
/// [`Database::upsert_article`]: super::Database::upsert_article
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    /// HTML: the feed summary until cached, the extracted document afterwards
    pub content: String,
    /// Unix seconds
    pub published: i64,
    pub cached: bool,
    pub local_path: Option<String>,
    pub favorite: bool,
    pub read: bool,
    pub image_url: Option<String>,
    pub local_image_path: Option<String>,
}

impl Article {
    /// A not-yet-persisted article built from a feed draft.
    pub fn from_draft(source_id: i64, draft: ArticleDraft, now: i64) -> Self {
        Self {
            id: 0,
            source_id,
            title: draft.title,
            url: draft.url,
            content: draft.content,
            published: draft.published.unwrap_or(now),
            cached: false,
            local_path: None,
            favorite: false,
            read: false,
            image_url: draft.image_url,
            local_image_path: None,
        }
    }

    /// Merge a fresh draft into this stored article.
    ///
    /// Upstream metadata (title, publish date, image URL) is refreshed while
    /// pipeline and user state (`cached`, cached `content`, `favorite`,
    /// `read`, local paths) is kept.
    pub fn merged_with(&self, draft: ArticleDraft) -> Self {
        let title = if draft.title.trim().is_empty() {
            self.title.clone()
        } else {
            draft.title
        };
        let content = if self.cached {
            self.content.clone()
        } else {
            draft.content
        };

        Self {
            id: self.id,
            source_id: self.source_id,
            title,
            url: self.url.clone(),
            content,
            published: draft.published.unwrap_or(self.published),
            cached: self.cached,
            local_path: self.local_path.clone(),
            favorite: self.favorite,
            read: self.read,
            image_url: draft.image_url.or_else(|| self.image_url.clone()),
            local_image_path: self.local_image_path.clone(),
        }
    }
}
