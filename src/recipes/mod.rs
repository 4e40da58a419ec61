//! Site-specific extraction recipes.
//!
//! - [`recipe`] - the [`ExtractionRecipe`] value type and its JSON wire shape
//! - [`store`] - durable storage as one JSON record per recipe, with built-in defaults

mod recipe;
mod store;

pub use recipe::{ExtractionRecipe, Strategy};
pub use store::{RecipeError, RecipeStore};
