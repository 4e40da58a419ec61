use crate::util::resolve_url;
use regex::Regex;
use std::sync::OnceLock;

const FEED_TYPES: &[&str] = &["application/rss+xml", "application/atom+xml"];

fn link_tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?is)<link\b[^>]*>").ok())
        .as_ref()
}

fn attribute_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?is)([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).ok()
        })
        .as_ref()
}

/// Find the first `<link>` whose `type` names an RSS or Atom feed and return
/// its `href` resolved against `base_url`.
///
/// Attribute order, quoting style, and case do not matter. No conventional
/// path such as `/feed` is ever guessed.
pub fn find_feed_link(html: &str, base_url: &str) -> Option<String> {
    let tags = link_tag_pattern()?;

    tags.find_iter(html).find_map(|tag| {
        let attrs = parse_attributes(tag.as_str());
        let kind = attrs
            .iter()
            .find(|(name, _)| name == "type")
            .map(|(_, value)| value.trim().to_ascii_lowercase())?;
        if !FEED_TYPES.iter().any(|t| kind.starts_with(t)) {
            return None;
        }

        let href = attrs
            .iter()
            .find(|(name, _)| name == "href")
            .map(|(_, value)| value.trim().replace("&amp;", "&"))
            .filter(|href| !href.is_empty())?;
        Some(resolve_url(&href, base_url))
    })
}

/// Lowercased attribute names paired with their raw values.
fn parse_attributes(tag: &str) -> Vec<(String, String)> {
    let Some(pattern) = attribute_pattern() else {
        return Vec::new();
    };

    pattern
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or(caps.get(3)).or(caps.get(4))?.as_str();
            Some((name, value.to_string()))
        })
        .collect()
}
