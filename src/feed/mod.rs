//! RSS/Atom retrieval.
//!
//! - [`parser`] - feed bytes to article drafts using the `feed-rs` crate
//! - [`discovery`] - locating a feed link inside an HTML page
//! - [`fetcher`] - HTTP retrieval that follows a discovered link once
//!
//! ```ignore
//! use crate::feed::FeedFetcher;
//!
//! let fetcher = FeedFetcher::new(client, Duration::from_secs(10));
//! if let Some(feed) = fetcher.fetch("https://example.com/news").await {
//!     println!("{} articles", feed.articles.len());
//! }
//! ```

mod discovery;
mod fetcher;
mod parser;

pub use discovery::find_feed_link;
pub use fetcher::FeedFetcher;
pub use parser::{parse_feed, FetchedFeed};
