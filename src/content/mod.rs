//! Network retrieval of article pages and their images.

mod images;
mod page;

pub use images::ImageCache;
pub use page::PageFetcher;
