//! Recipe-driven content extraction.
//!
//! The [`ExtractionEngine`] holds an immutable snapshot of recipes, compiled
//! once per sync cycle. For a page URL it picks the first recipe whose domain
//! pattern matches and applies that recipe's [`Strategy`]:
//!
//! - [`js_var`] - article embedded as a JavaScript object literal
//! - [`prune`] - CSS selector removal with empty-ancestor collapse
//!
//! Both strategies produce a title and body that [`document`] assembles into
//! a standalone offline page. [`extract_image`] is independent of recipes.

mod document;
mod image;
mod js_var;
mod prune;

pub use document::NO_TITLE;
pub use image::extract_image;

use crate::recipes::{ExtractionRecipe, Strategy};
use regex::Regex;
use scraper::{Html, Selector};

/// A recipe with its pattern and selectors compiled.
#[derive(Debug)]
struct CompiledRecipe {
    recipe: ExtractionRecipe,
    pattern: Regex,
    method: Method,
    remove: Vec<Selector>,
}

#[derive(Debug)]
enum Method {
    JsVariable {
        identifier: String,
        content_path: String,
        title_path: Option<String>,
    },
    CssSelector {
        content: Selector,
        title: Option<Selector>,
    },
}

/// Applies the first matching recipe to fetched pages.
#[derive(Debug, Default)]
pub struct ExtractionEngine {
    recipes: Vec<CompiledRecipe>,
}

impl ExtractionEngine {
    /// Compile a recipe snapshot, preserving order.
    ///
    /// Recipes with an invalid domain pattern or content selector are skipped
    /// with a warning; invalid removal or title selectors are dropped
    /// individually.
    pub fn new(recipes: Vec<ExtractionRecipe>) -> Self {
        let recipes = recipes.into_iter().filter_map(compile).collect();
        Self { recipes }
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// First recipe whose domain pattern is found anywhere in `url`.
    pub fn recipe_for(&self, url: &str) -> Option<&ExtractionRecipe> {
        self.find(url).map(|compiled| &compiled.recipe)
    }

    /// Run the matching recipe over `html`.
    ///
    /// Returns `None` when no recipe matches or the recipe cannot extract a
    /// body; callers then keep the raw page. `image_url` is placed above the
    /// body only when the recipe asks for it.
    pub fn process(&self, url: &str, html: &str, image_url: Option<&str>) -> Option<String> {
        let compiled = self.find(url)?;
        let recipe = &compiled.recipe;

        let extracted = match &compiled.method {
            Method::JsVariable {
                identifier,
                content_path,
                title_path,
            } => js_var::extract(html, identifier, content_path, title_path.as_deref())
                .map(|(title, body)| (title, prune_fragment(&body, &compiled.remove))),
            Method::CssSelector { content, title } => {
                extract_by_selector(html, content, title.as_ref(), &compiled.remove)
            }
        };

        let Some((title, body)) = extracted else {
            tracing::debug!(url = %url, pattern = %recipe.domain_pattern, "Recipe matched but extraction failed");
            return None;
        };

        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());
        let image = image_url.filter(|_| recipe.inject_rss_image);

        tracing::debug!(url = %url, pattern = %recipe.domain_pattern, "Extracted article");
        Some(document::build_document(
            &title,
            &body,
            recipe.source_name.as_deref(),
            image,
        ))
    }

    fn find(&self, url: &str) -> Option<&CompiledRecipe> {
        self.recipes.iter().find(|c| c.pattern.is_match(url))
    }
}

fn compile(recipe: ExtractionRecipe) -> Option<CompiledRecipe> {
    let pattern = match Regex::new(&recipe.domain_pattern) {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!(pattern = %recipe.domain_pattern, error = %e, "Skipping recipe with invalid domain pattern");
            return None;
        }
    };

    let method = match &recipe.strategy {
        Strategy::JsVariable {
            target_identifier,
            content_path,
            title_path,
        } => Method::JsVariable {
            identifier: target_identifier.clone(),
            content_path: content_path.clone(),
            title_path: title_path.clone(),
        },
        Strategy::CssSelector {
            content_selector,
            title_selector,
        } => {
            let Some(content) = parse_selector(content_selector) else {
                tracing::warn!(pattern = %recipe.domain_pattern, selector = %content_selector, "Skipping recipe with invalid content selector");
                return None;
            };
            let title = title_selector.as_deref().and_then(parse_selector);
            Method::CssSelector { content, title }
        }
    };

    let remove = recipe
        .remove_selectors
        .iter()
        .filter_map(|s| parse_selector(s))
        .collect();

    Some(CompiledRecipe {
        recipe,
        pattern,
        method,
        remove,
    })
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::warn!(selector = %selector, error = %e, "Ignoring invalid CSS selector");
            None
        }
    }
}

fn extract_by_selector(
    html: &str,
    content: &Selector,
    title: Option<&Selector>,
    remove: &[Selector],
) -> Option<(Option<String>, String)> {
    let mut document = Html::parse_document(html);
    if !remove.is_empty() {
        prune::prune(&mut document, remove);
    }

    let root = document.root_element();
    let title = title
        .and_then(|selector| root.select(selector).next())
        .map(|element| element.text().collect::<String>());
    let body = root.select(content).next()?.inner_html();

    Some((title, body))
}

/// Prune an extracted body fragment; returned unchanged when nothing applies.
fn prune_fragment(body: &str, remove: &[Selector]) -> String {
    if remove.is_empty() {
        return body.to_string();
    }
    let mut fragment = Html::parse_fragment(body);
    if prune::prune(&mut fragment, remove) == 0 {
        return body.to_string();
    }
    fragment.root_element().inner_html()
}
