//! Sanity filtering: keep candidates whose recipe still builds after a build number bump.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::builder::PackageBuilder;
use crate::error::Result;
use crate::logging;
use crate::recipe::Recipe;
use crate::scanner::RecipeSource;

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    /// Put the old build number back when a build fails.
    pub revert_failed: bool,
    pub show_progress: bool,
}

#[derive(Debug, Default)]
pub struct FilterReport {
    pub passed: Vec<RecipeSource>,
    pub failed: Vec<String>,
    /// Recipes whose build number could not be bumped, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Bump `build/number` of `recipes_path/<recipe>/meta.yaml` on disk.
pub fn increment_build_number(recipes_path: &Path, recipe: &str) -> Result<(u64, u64)> {
    let mut loaded = Recipe::load(recipes_path, recipe)?;
    let numbers = loaded.increment_build_number()?;
    loaded.save()?;
    tracing::debug!(
        recipe = recipe,
        from = numbers.0,
        to = numbers.1,
        "Build number incremented"
    );
    Ok(numbers)
}

pub fn restore_build_number(recipes_path: &Path, recipe: &str, number: u64) -> Result<()> {
    let mut loaded = Recipe::load(recipes_path, recipe)?;
    loaded.set_build_number(number)?;
    loaded.save()
}

/// Bump and build every candidate, keeping the ones that build.
///
/// Build numbers of passing recipes stay bumped.
pub fn filter_candidates(
    candidates: &[RecipeSource],
    recipes_path: &Path,
    builder: &dyn PackageBuilder,
    options: FilterOptions,
) -> FilterReport {
    let mut report = FilterReport::default();

    let pb = if options.show_progress {
        let pb = ProgressBar::new(candidates.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    for candidate in candidates {
        pb.set_message(candidate.recipe.clone());

        let (old, _) = match increment_build_number(recipes_path, &candidate.recipe) {
            Ok(numbers) => numbers,
            Err(e) => {
                let message = e.to_string().trim().to_string();
                logging::log_recipe_error(&candidate.recipe, &message);
                report.skipped.push((candidate.recipe.clone(), message));
                pb.inc(1);
                continue;
            }
        };

        let passed = crate::builder::mini_sanity_check(builder, &candidate.recipe);
        if passed {
            report.passed.push(candidate.clone());
        } else {
            if options.revert_failed {
                if let Err(e) = restore_build_number(recipes_path, &candidate.recipe, old) {
                    logging::log_recipe_error(&candidate.recipe, e.to_string().trim());
                }
            }
            report.failed.push(candidate.recipe.clone());
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    report
}
