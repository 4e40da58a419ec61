use crate::extract::extract_image;
use crate::storage::ArticleDraft;
use crate::util::{resolve_url, FetchError};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;

/// A parsed RSS/Atom document.
#[derive(Debug, Clone, Default)]
pub struct FetchedFeed {
    /// Channel title, when the feed declares one
    pub title: Option<String>,
    pub articles: Vec<ArticleDraft>,
}

/// Parse RSS or Atom bytes into article drafts.
///
/// Entries without a link are skipped: the link is the article's identity
/// within its source.
pub fn parse_feed(bytes: &[u8]) -> Result<FetchedFeed, FetchError> {
    let feed = parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let total = feed.entries.len();
    let articles: Vec<ArticleDraft> = feed.entries.into_iter().filter_map(into_draft).collect();

    let skipped = total - articles.len();
    if skipped > 0 {
        tracing::debug!(skipped = skipped, "Feed entries without a link skipped");
    }

    Ok(FetchedFeed { title, articles })
}

fn into_draft(entry: Entry) -> Option<ArticleDraft> {
    let url = article_link(&entry)?;

    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());

    let content = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    let image_url = media_image(&entry)
        .or_else(|| extract_image(&content))
        .map(|src| resolve_url(&src, &url));

    Some(ArticleDraft {
        title,
        url,
        content,
        published,
        image_url,
    })
}

/// The entry's page link: the first `alternate` (or rel-less) link, else
/// whatever link comes first. Atom entries often list `replies` or
/// `enclosure` links ahead of the article itself.
fn article_link(entry: &Entry) -> Option<String> {
    let usable = |l: &&Link| !l.href.trim().is_empty();
    entry
        .links
        .iter()
        .filter(usable)
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.iter().find(usable))
        .map(|l| l.href.trim().to_string())
}

/// Image declared through media thumbnails or image enclosures.
fn media_image(entry: &Entry) -> Option<String> {
    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .find(|uri| !uri.is_empty());

    thumbnail.or_else(|| {
        entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .filter(|c| {
                c.content_type
                    .as_ref()
                    .is_some_and(|ct| ct.ty().as_str() == "image")
            })
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rss_entries_become_drafts() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>City Desk</title>
  <item>
    <title>Bridge reopens</title>
    <link>https://news.test/bridge</link>
    <description>&lt;p&gt;Traffic resumes.&lt;/p&gt;</description>
    <pubDate>Mon, 01 Jan 2024 12:00:00 GMT</pubDate>
  </item>
  <item>
    <title>No link here</title>
  </item>
</channel></rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("City Desk"));
        assert_eq!(feed.articles.len(), 1);

        let draft = &feed.articles[0];
        assert_eq!(draft.title, "Bridge reopens");
        assert_eq!(draft.url, "https://news.test/bridge");
        assert_eq!(draft.content, "<p>Traffic resumes.</p>");
        assert_eq!(draft.published, Some(1_704_110_400));
        assert_eq!(draft.image_url, None);
    }

    #[test]
    fn test_image_from_enclosure() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item>
    <title>Photo story</title>
    <link>https://news.test/photo</link>
    <enclosure url="https://cdn.test/photo.jpg" type="image/jpeg" length="1000"/>
  </item>
</channel></rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(
            feed.articles[0].image_url.as_deref(),
            Some("https://cdn.test/photo.jpg")
        );
    }

    #[test]
    fn test_image_from_summary_resolved_against_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Blog</title>
  <id>urn:blog</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <id>urn:post:1</id>
    <title></title>
    <link href="https://blog.test/posts/1"/>
    <updated>2024-01-02T00:00:00Z</updated>
    <summary type="html">&lt;img src="/img/hero.png"&gt;</summary>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        let draft = &feed.articles[0];
        assert_eq!(draft.title, "Untitled");
        assert_eq!(draft.published, Some(1_704_153_600));
        assert_eq!(
            draft.image_url.as_deref(),
            Some("https://blog.test/img/hero.png")
        );
    }

    #[test]
    fn test_alternate_link_preferred_over_replies() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Blog</title>
  <id>urn:blog</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <id>urn:post:2</id>
    <title>Threaded</title>
    <link rel="replies" href="https://blog.test/posts/2/comments"/>
    <link rel="enclosure" type="audio/mpeg" href="https://blog.test/posts/2.mp3"/>
    <link rel="alternate" href="https://blog.test/posts/2"/>
    <updated>2024-01-02T00:00:00Z</updated>
  </entry>
  <entry>
    <id>urn:post:3</id>
    <title>Only replies</title>
    <link rel="replies" href="https://blog.test/posts/3/comments"/>
    <updated>2024-01-02T00:00:00Z</updated>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(feed.articles[0].url, "https://blog.test/posts/2");
        assert_eq!(feed.articles[1].url, "https://blog.test/posts/3/comments");
    }

    #[test]
    fn test_invalid_feed_is_parse_error() {
        let result = parse_feed(b"<html><body>nope</body></html>");
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }
}
