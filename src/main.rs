use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use recipe_candidate_finder::builder::{BiocondaUtilsBuilder, PackageBuilder};
use recipe_candidate_finder::cache::DownloadCache;
use recipe_candidate_finder::commands::{write_candidates_to_file, CommandTemplate};
use recipe_candidate_finder::config::FinderConfig;
use recipe_candidate_finder::error::FinderError;
use recipe_candidate_finder::filter::increment_build_number;
use recipe_candidate_finder::logging;
use recipe_candidate_finder::scanner::{load_sources, scan_recipes};
use recipe_candidate_finder::source::SourceInspector;
use recipe_candidate_finder::workflow::FindCommand;

#[derive(Parser)]
#[command(name = "candidate-finder")]
#[command(author = "Recipe Candidate Finder Contributors")]
#[command(version = "0.1.0")]
#[command(
    about = "Find bioconda packages built with CMake whose recipe still builds itself",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose output", global = true)]
    verbose: bool,

    #[arg(long, help = "Path to a JSON configuration file", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List the name and source URL of every recipe")]
    Scan {
        #[arg(help = "Path to bioconda-recipes/recipes folder")]
        recipes_path: PathBuf,

        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    #[command(about = "Run the full search and write bioconda-recipe-gen commands")]
    Find {
        #[arg(help = "Path to bioconda-recipes/recipes folder")]
        recipes_path: PathBuf,

        #[arg(short, long, help = "File receiving the generated commands")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Do not ask before bumping build numbers")]
        yes: bool,

        #[arg(long, help = "Do not download sources to look for CMakeLists.txt")]
        skip_cmake_check: bool,

        #[arg(long, help = "Stop after selecting candidates, without building")]
        dry_run: bool,

        #[arg(long, help = "Restore the build number of recipes that fail to build")]
        revert_failed: bool,
    },

    #[command(about = "Run a sanity build of a single recipe")]
    Build {
        #[arg(help = "Path to bioconda-recipes/recipes folder")]
        recipes_path: PathBuf,

        #[arg(help = "Recipe directory, relative to the recipes folder")]
        recipe: String,

        #[arg(long, help = "Increment build/number before building")]
        bump: bool,
    },

    #[command(about = "Write bioconda-recipe-gen commands for the given recipes")]
    Commands {
        #[arg(help = "Path to bioconda-recipes/recipes folder")]
        recipes_path: PathBuf,

        #[arg(required = true, help = "Recipe directories, relative to the recipes folder")]
        recipes: Vec<String>,

        #[arg(short, long, help = "File receiving the generated commands")]
        output: Option<PathBuf>,
    },

    #[command(about = "Check whether recipe sources have a CMakeLists.txt at their root")]
    Cmake {
        #[arg(help = "Path to bioconda-recipes/recipes folder")]
        recipes_path: PathBuf,

        #[arg(required = true, help = "Recipe directories, relative to the recipes folder")]
        recipes: Vec<String>,
    },

    #[command(about = "Manage the source download cache")]
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    #[command(about = "Show the cache location")]
    Path,
    #[command(about = "Delete all cached source archives")]
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("{}", "Verbose mode enabled".dimmed());
    }
    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("{} {}", "⚠".yellow(), e);
    }
    logging::log_system_info();

    let config = FinderConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { recipes_path, json } => scan(&recipes_path, json, &config)?,
        Commands::Find {
            recipes_path,
            output,
            yes,
            skip_cmake_check,
            dry_run,
            revert_failed,
        } => {
            FindCommand::new(config, cli.verbose)
                .with_output(output)
                .with_yes(yes)
                .with_skip_cmake_check(skip_cmake_check)
                .with_dry_run(dry_run)
                .with_revert_failed(revert_failed)
                .execute(&recipes_path)?;
        }
        Commands::Build {
            recipes_path,
            recipe,
            bump,
        } => build(&recipes_path, &recipe, bump, &config, cli.verbose)?,
        Commands::Commands {
            recipes_path,
            recipes,
            output,
        } => {
            let sources = load_sources(&recipes_path, &recipes)?;
            let output = output.unwrap_or_else(|| config.output_file.clone());
            let template = CommandTemplate::new(&recipes_path, &config);
            let report = write_candidates_to_file(&sources, &template, &output)?;
            println!(
                "{} Wrote {} command(s) to {}",
                "✓".green(),
                report.lines.len(),
                output.display().to_string().cyan()
            );
        }
        Commands::Cmake {
            recipes_path,
            recipes,
        } => cmake(&recipes_path, &recipes, &config)?,
        Commands::Cache { action } => {
            let cache = DownloadCache::new(&config)?;
            match action {
                CacheAction::Path => println!("{}", cache.dir().display()),
                CacheAction::Clear => {
                    let removed = cache.clear()?;
                    println!("{} Removed {} cached archive(s)", "✓".green(), removed);
                }
            }
        }
    }

    Ok(())
}

fn scan(recipes_path: &Path, json: bool, config: &FinderConfig) -> Result<()> {
    let report = scan_recipes(recipes_path, config.scan_depth)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.sources)?);
    } else {
        for source in &report.sources {
            println!("{}\t{}", source.name, source.url);
        }
    }

    if !report.failures.is_empty() {
        eprintln!(
            "{} {} recipe(s) raised an error",
            "⚠".yellow(),
            report.failures.len()
        );
    }
    Ok(())
}

fn build(
    recipes_path: &Path,
    recipe: &str,
    bump: bool,
    config: &FinderConfig,
    verbose: bool,
) -> Result<()> {
    if bump {
        let (old, new) = increment_build_number(recipes_path, recipe)?;
        println!(
            "{} Build number of {}: {} → {}",
            "→".green(),
            recipe.cyan(),
            old,
            new
        );
    }

    println!("{} Building {}", "🔨".blue(), recipe.cyan().bold());
    let builder = BiocondaUtilsBuilder::new(recipes_path, config, verbose);
    let outcome = builder.build(recipe)?;

    if verbose {
        print!("{}", outcome.stdout);
    }

    if outcome.success {
        println!(
            "{} {} built in {}s",
            "✓".green().bold(),
            recipe,
            outcome.duration.as_secs()
        );
        Ok(())
    } else {
        let message = if outcome.timed_out {
            format!("timed out after {}s", config.build_timeout_secs)
        } else {
            outcome
                .stderr
                .lines()
                .last()
                .unwrap_or_default()
                .to_string()
        };
        Err(FinderError::build_failed(recipe, outcome.exit_code, message).into())
    }
}

fn cmake(recipes_path: &Path, recipes: &[String], config: &FinderConfig) -> Result<()> {
    let sources = load_sources(recipes_path, recipes)?;
    let inspector = SourceInspector::new(config)?.with_progress(true);

    for source in &sources {
        match inspector.has_cmakelists_in_root(source) {
            Ok(true) => println!("  {} {}", "✓".green(), source.recipe),
            Ok(false) => println!("  {} {} (no root CMakeLists.txt)", "✗".red(), source.recipe),
            Err(e) => println!("  {} {}: {}", "⚠".yellow(), source.recipe, e.to_string().trim()),
        }
    }
    Ok(())
}
