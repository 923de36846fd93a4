//! The end-to-end candidate search.

use colored::Colorize;
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::builder::{BiocondaUtilsBuilder, PackageBuilder};
use crate::commands::{write_candidates_to_file, CommandTemplate};
use crate::config::FinderConfig;
use crate::error::{FinderError, Result};
use crate::filter::{filter_candidates, FilterOptions};
use crate::logging;
use crate::scanner::{scan_recipes, RecipeSource};
use crate::source::{filter_cmake_candidates, SourceInspector};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FindSummary {
    pub scanned: usize,
    pub scan_failures: usize,
    pub cmake_candidates: usize,
    pub built: usize,
    pub written: usize,
    pub output: Option<PathBuf>,
}

/// Scan, CMake filter, sanity build, write commands.
pub struct FindCommand {
    config: FinderConfig,
    verbose: bool,
    assume_yes: bool,
    skip_cmake_check: bool,
    dry_run: bool,
    revert_failed: bool,
    output: Option<PathBuf>,
    builder: Option<Box<dyn PackageBuilder>>,
}

impl FindCommand {
    pub fn new(config: FinderConfig, verbose: bool) -> Self {
        Self {
            config,
            verbose,
            assume_yes: false,
            skip_cmake_check: false,
            dry_run: false,
            revert_failed: false,
            output: None,
            builder: None,
        }
    }

    pub fn with_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    pub fn with_skip_cmake_check(mut self, skip: bool) -> Self {
        self.skip_cmake_check = skip;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_revert_failed(mut self, revert: bool) -> Self {
        self.revert_failed = revert;
        self
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Replace the `bioconda-utils` builder.
    pub fn with_builder(mut self, builder: Box<dyn PackageBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.config.output_file.clone())
    }

    pub fn execute(&self, recipes_path: &Path) -> Result<FindSummary> {
        let started = Instant::now();
        let mut summary = FindSummary::default();

        println!(
            "{} Scanning recipes in {}",
            "→".green(),
            recipes_path.display().to_string().cyan()
        );
        let report = scan_recipes(recipes_path, self.config.scan_depth)?;
        summary.scanned = report.sources.len();
        summary.scan_failures = report.failures.len();
        println!(
            "  {} {} recipes with a source URL ({} skipped)",
            "✓".green(),
            summary.scanned,
            summary.scan_failures
        );

        let candidates = self.cmake_filter(&report.sources)?;
        summary.cmake_candidates = candidates.len();

        if self.dry_run {
            println!("\n{}", "Dry run, stopping before any recipe is modified:".yellow());
            for candidate in &candidates {
                println!("  {} {} ({})", "•".blue(), candidate.name, candidate.url);
            }
            return Ok(summary);
        }

        if candidates.is_empty() {
            println!("{} No candidates left to build", "ℹ".blue());
        } else if !self.confirm_build(candidates.len())? {
            return Err(FinderError::Other(anyhow::anyhow!(
                "Aborted before bumping build numbers"
            )));
        }

        let built = self.sanity_filter(recipes_path, &candidates);
        summary.built = built.len();

        let output = self.output_path();
        let template = CommandTemplate::new(recipes_path, &self.config);
        let written = write_candidates_to_file(&built, &template, &output)?;
        summary.written = written.lines.len();
        summary.output = Some(output.clone());

        println!(
            "\n{} Wrote {} command(s) to {}",
            "✓".green().bold(),
            summary.written,
            output.display().to_string().cyan()
        );

        logging::log_performance("find", started.elapsed().as_millis() as u64);
        Ok(summary)
    }

    fn cmake_filter(&self, sources: &[RecipeSource]) -> Result<Vec<RecipeSource>> {
        if self.skip_cmake_check {
            println!("{} Skipping CMake source check", "ℹ".blue());
            return Ok(sources.to_vec());
        }

        println!("{} Checking sources for a root CMakeLists.txt...", "🔍".blue());
        let inspector = SourceInspector::new(&self.config)?.with_progress(!self.verbose);
        let candidates = filter_cmake_candidates(&inspector, sources);
        println!(
            "  {} {} CMake based candidate(s)",
            "✓".green(),
            candidates.len()
        );
        Ok(candidates)
    }

    fn confirm_build(&self, count: usize) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        if !std::io::stdin().is_terminal() {
            return Err(FinderError::Other(anyhow::anyhow!(
                "Refusing to modify recipes without confirmation; pass --yes in non-interactive use"
            )));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Bump build numbers and build {count} recipe(s) in place?"
            ))
            .default(false)
            .interact()?;
        Ok(confirmed)
    }

    fn sanity_filter(&self, recipes_path: &Path, candidates: &[RecipeSource]) -> Vec<RecipeSource> {
        if candidates.is_empty() {
            return Vec::new();
        }
        println!("{} Running sanity builds...", "🔨".blue());

        let options = FilterOptions {
            revert_failed: self.revert_failed,
            show_progress: !self.verbose,
        };
        let default_builder;
        let builder: &dyn PackageBuilder = match &self.builder {
            Some(builder) => &**builder,
            None => {
                default_builder = BiocondaUtilsBuilder::new(recipes_path, &self.config, self.verbose);
                &default_builder
            }
        };

        let report = filter_candidates(candidates, recipes_path, builder, options);
        for recipe in &report.failed {
            println!("  {} {} failed to build", "✗".red(), recipe);
        }
        for (recipe, reason) in &report.skipped {
            println!("  {} {} skipped: {}", "⚠".yellow(), recipe, reason);
        }
        println!(
            "  {} {} of {} candidate(s) built",
            "✓".green(),
            report.passed.len(),
            candidates.len()
        );
        report.passed
    }
}
