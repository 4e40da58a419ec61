use serde::{Deserialize, Serialize};

/// A declarative, site-specific rule for pulling clean article content out
/// of a page's markup.
///
/// Recipes are plain values: two recipes are the same recipe exactly when
/// every field is equal. The JSON shape uses the camelCase names of the
/// import/export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecipe {
    /// Regex searched (not anchored) within the article URL
    pub domain_pattern: String,
    #[serde(flatten)]
    pub strategy: Strategy,
    /// Elements to strip before assembly; wrappers left empty go with them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_selectors: Vec<String>,
    /// Put the feed entry's image above the body
    #[serde(default)]
    pub inject_rss_image: bool,
    /// Byline naming the publisher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

/// How a recipe locates title and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy")]
pub enum Strategy {
    /// The article is embedded as a JavaScript object literal assigned to
    /// `target_identifier`; paths look like `articles[0].body`.
    #[serde(rename = "EXTRACT_FROM_JS_VAR", rename_all = "camelCase")]
    JsVariable {
        target_identifier: String,
        content_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title_path: Option<String>,
    },
    /// Title and body are picked out of the parsed document with CSS selectors.
    #[serde(rename = "CSS_SELECTOR", rename_all = "camelCase")]
    CssSelector {
        #[serde(alias = "contentPath")]
        content_selector: String,
        #[serde(default, alias = "titlePath", skip_serializing_if = "Option::is_none")]
        title_selector: Option<String>,
    },
}

impl ExtractionRecipe {
    /// Built-in recipes, keyed by the stable record name they are stored under.
    pub fn defaults() -> Vec<(&'static str, ExtractionRecipe)> {
        vec![(
            "toledoblade",
            ExtractionRecipe {
                domain_pattern: r".*toledoblade\.com".to_string(),
                strategy: Strategy::JsVariable {
                    target_identifier: "pgStoryZeroJSON".to_string(),
                    content_path: "articles[0].body".to_string(),
                    title_path: Some("articles[0].title".to_string()),
                },
                remove_selectors: [
                    "iframe",
                    "script",
                    ".embed-container",
                    ".video-container",
                    ".iframe-wrapper",
                    "figure:has(iframe)",
                    "div.embed-youtube",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
                inject_rss_image: true,
                source_name: Some("The Toledo Blade".to_string()),
            },
        )]
    }
}
