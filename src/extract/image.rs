use scraper::{Html, Selector};

/// Images at or below this declared size are treated as icons or trackers
const MIN_DIMENSION: u32 = 50;

const META_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"], meta[name="og:image"]"#,
    r#"meta[name="twitter:image"], meta[property="twitter:image"]"#,
];

/// Best-effort representative image for a page or feed summary.
///
/// Checks the Open Graph image, then the Twitter card image, then the first
/// `<img>` with a `src` whose declared width and height (when present) both
/// exceed 50px. The URL is returned as written; callers resolve it.
pub fn extract_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector in META_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let found = document
            .root_element()
            .select(&selector)
            .filter_map(|meta| meta.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty());
        if let Some(content) = found {
            return Some(content.to_string());
        }
    }

    let images = Selector::parse("img[src]").ok()?;
    document
        .root_element()
        .select(&images)
        .find(|img| {
            let large_enough = |attr: &str| {
                img.value()
                    .attr(attr)
                    .and_then(declared_pixels)
                    .map_or(true, |px| px > MIN_DIMENSION)
            };
            large_enough("width") && large_enough("height")
        })
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

/// Leading integer of a dimension attribute (`"120"`, `"120px"`); anything
/// else counts as undeclared.
fn declared_pixels(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
