//! Traversal of a bioconda `recipes/` folder.

use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};

use crate::error::{FinderError, Result};
use crate::logging;
use crate::recipe::{Recipe, META_FILE};

/// Name and source of one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeSource {
    /// Recipe directory relative to the recipes folder.
    pub recipe: String,
    pub name: String,
    pub version: Option<String>,
    pub url: String,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub recipe: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub sources: Vec<RecipeSource>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Collect `(name, source url)` for every recipe below `recipes_path`.
///
/// Directories up to `max_depth` levels deep are considered, which covers
/// versioned sub-recipes such as `blast/2.2.31`. Recipes that fail to parse
/// or have no `source/url` end up in [`ScanReport::failures`].
pub fn scan_recipes(recipes_path: &Path, max_depth: usize) -> Result<ScanReport> {
    if !recipes_path.is_dir() {
        return Err(FinderError::recipe_dir_not_found(
            recipes_path.display().to_string(),
        ));
    }

    let started = Instant::now();
    let mut report = ScanReport::default();

    let walker = WalkDir::new(recipes_path)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let meta_yaml_path = entry.path().join(META_FILE);
        tracing::trace!(path = %meta_yaml_path.display(), "Checking for recipe");
        if !meta_yaml_path.is_file() {
            continue;
        }

        match read_source(recipes_path, &meta_yaml_path) {
            Ok(source) => {
                logging::log_recipe_scanned(&source.recipe, &source.name, &source.url);
                report.sources.push(source);
            }
            Err((recipe, err)) => {
                let message = err.to_string().trim().to_string();
                logging::log_recipe_error(&recipe, &message);
                report.failures.push(ScanFailure { recipe, message });
            }
        }
    }

    logging::log_performance("scan_recipes", started.elapsed().as_millis() as u64);
    Ok(report)
}

fn read_source(
    recipes_path: &Path,
    meta_yaml_path: &Path,
) -> std::result::Result<RecipeSource, (String, FinderError)> {
    let fallback_name = meta_yaml_path
        .parent()
        .and_then(|p| p.strip_prefix(recipes_path).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();

    let recipe = Recipe::from_file(recipes_path, meta_yaml_path).map_err(|e| (fallback_name, e))?;
    let reldir = recipe.reldir().to_string();
    let name = recipe.name().map_err(|e| (reldir.clone(), e))?;
    let url = recipe.get_str("source/url").map_err(|e| (reldir.clone(), e))?;

    Ok(RecipeSource {
        recipe: reldir,
        name,
        version: recipe.version().ok(),
        url,
        sha256: recipe.get_str("source/sha256").ok(),
    })
}

/// Resolve recipe names given on the command line to sources.
///
/// Unlike [`scan_recipes`] the first failure is returned.
pub fn load_sources(recipes_path: &Path, recipes: &[String]) -> Result<Vec<RecipeSource>> {
    if !recipes_path.is_dir() {
        return Err(FinderError::recipe_dir_not_found(
            recipes_path.display().to_string(),
        ));
    }
    recipes
        .iter()
        .map(|reldir| {
            let recipe = Recipe::load(recipes_path, reldir)?;
            Ok(RecipeSource {
                recipe: recipe.reldir().to_string(),
                name: recipe.name()?,
                version: recipe.version().ok(),
                url: recipe.get_str("source/url")?,
                sha256: recipe.get_str("source/sha256").ok(),
            })
        })
        .collect()
}
