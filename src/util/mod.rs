//! Utility functions for common operations.
//!
//! - **HTTP**: browser-like request headers, per-call timeouts, and
//!   size-limited body reads shared by the feed, page, and image fetchers
//! - **URLs**: resolving relative links found in fetched documents
//! - **Files**: unique temp names for write-then-rename

mod files;
mod http;
mod urls;

pub use http::{
    browser_headers, build_client, content_type, get_checked, read_limited_bytes, FetchError,
    DEFAULT_USER_AGENT,
};
pub use files::temp_sibling;
pub use urls::resolve_url;
