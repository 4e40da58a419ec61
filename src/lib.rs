//! Feed ingestion pipeline that keeps readable offline copies of web articles.
//!
//! Sources (RSS/Atom feeds, micro-blogs, or single pages) are synchronized by
//! the [`sync::Synchronizer`]: feeds are fetched and reconciled into stored
//! articles, retention limits are applied, and the newest articles have their
//! full content extracted with site recipes and cached with their images.

pub mod config;
pub mod content;
pub mod extract;
pub mod feed;
pub mod recipes;
pub mod storage;
pub mod sync;
pub mod util;
