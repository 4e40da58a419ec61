use std::path::{Path, PathBuf};
use thiserror::Error;

use super::recipe::ExtractionRecipe;
use crate::util::temp_sibling;

/// Records from an older release that carried a broken configuration
const LEGACY_RECORDS: &[&str] = &["toledo_blade.json"];

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid recipe JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directory of recipe records, one JSON file per recipe.
#[derive(Debug, Clone)]
pub struct RecipeStore {
    dir: PathBuf,
}

impl RecipeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write each built-in recipe whose record is missing and drop legacy records.
    ///
    /// Existing records are never overwritten, so user edits to a default
    /// recipe survive.
    pub async fn ensure_defaults(&self) -> Result<(), RecipeError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for legacy in LEGACY_RECORDS {
            let path = self.dir.join(legacy);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::info!(path = %path.display(), "Removed legacy recipe record"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        for (name, recipe) in ExtractionRecipe::defaults() {
            let path = self.record_path(name);
            if tokio::fs::try_exists(&path).await? {
                continue;
            }
            tokio::fs::write(&path, serde_json::to_vec_pretty(&recipe)?).await?;
            tracing::debug!(path = %path.display(), "Wrote default recipe");
        }

        Ok(())
    }

    /// Load every recipe, in file-name order.
    ///
    /// Order is significant: the first recipe whose pattern matches a URL
    /// wins. Unreadable or malformed records are skipped with a warning.
    pub async fn load_all(&self) -> Result<Vec<ExtractionRecipe>, RecipeError> {
        let mut recipes = Vec::new();
        for path in self.record_paths().await? {
            match read_record(&path).await {
                Ok(recipe) => recipes.push(recipe),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable recipe")
                }
            }
        }
        Ok(recipes)
    }

    /// Save a recipe under `name` (without extension), replacing any record of that name.
    pub async fn save(&self, name: &str, recipe: &ExtractionRecipe) -> Result<PathBuf, RecipeError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(name);
        tokio::fs::write(&path, serde_json::to_vec_pretty(recipe)?).await?;
        Ok(path)
    }

    /// Import recipes from exported JSON: either a single recipe object or an array.
    ///
    /// Each recipe is stored under a name derived from its domain pattern.
    /// A different recipe already holding that name is kept and the import
    /// takes the next free `_2`, `_3`, ... suffix. Returns the imported recipes.
    pub async fn import(&self, json: &str) -> Result<Vec<ExtractionRecipe>, RecipeError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let recipes: Vec<ExtractionRecipe> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };

        for recipe in &recipes {
            let name = self.free_name(&record_name(&recipe.domain_pattern), recipe).await?;
            let path = self.save(&name, recipe).await?;
            tracing::info!(path = %path.display(), pattern = %recipe.domain_pattern, "Imported recipe");
        }

        Ok(recipes)
    }

    /// Serialize every stored recipe as a JSON array, in load order.
    pub async fn export_all(&self) -> Result<String, RecipeError> {
        let recipes = self.load_all().await?;
        Ok(serde_json::to_string_pretty(&recipes)?)
    }

    /// Write the `export_all` array to `dst`, replacing it atomically.
    pub async fn export_to(&self, dst: &Path) -> Result<PathBuf, RecipeError> {
        let json = self.export_all().await?;
        let temp_path = temp_sibling(dst);

        if let Err(e) = tokio::fs::write(&temp_path, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, dst).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::info!(path = %dst.display(), "Exported recipes");
        Ok(dst.to_path_buf())
    }

    /// Delete every record structurally equal to `recipe`.
    ///
    /// Returns the number of records removed.
    pub async fn delete(&self, recipe: &ExtractionRecipe) -> Result<usize, RecipeError> {
        let mut removed = 0;
        for path in self.record_paths().await? {
            match read_record(&path).await {
                Ok(loaded) if loaded == *recipe => {
                    tokio::fs::remove_file(&path).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable recipe")
                }
            }
        }
        Ok(removed)
    }

    /// First of `base`, `base_2`, `base_3`, ... that is unused or already holds `recipe`.
    async fn free_name(&self, base: &str, recipe: &ExtractionRecipe) -> Result<String, RecipeError> {
        let mut name = base.to_string();
        for n in 2.. {
            let path = self.record_path(&name);
            if !tokio::fs::try_exists(&path).await? {
                break;
            }
            match read_record(&path).await {
                Ok(existing) if existing == *recipe => break,
                Ok(_) => {}
                // Unreadable records are replaced
                Err(RecipeError::Json(_)) => break,
                Err(e) => return Err(e),
            }
            name = format!("{base}_{n}");
        }
        Ok(name)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// `*.json` records sorted by file name; a missing directory has none.
    async fn record_paths(&self) -> Result<Vec<PathBuf>, RecipeError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

async fn read_record(path: &Path) -> Result<ExtractionRecipe, RecipeError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Stable file name for a domain pattern: alphanumerics kept, runs of
/// anything else collapsed to `_`.
fn record_name(domain_pattern: &str) -> String {
    let mut name = String::with_capacity(domain_pattern.len());
    for c in domain_pattern.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_');
    if name.is_empty() {
        "recipe".to_string()
    } else {
        name.to_string()
    }
}
