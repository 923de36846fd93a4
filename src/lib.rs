pub mod builder;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod recipe;
pub mod scanner;
pub mod source;
pub mod utils;
pub mod workflow;

#[cfg(any(test, debug_assertions))]
pub mod test_utils;

pub use builder::{BiocondaUtilsBuilder, BuildOutcome, PackageBuilder};
pub use config::FinderConfig;
pub use error::{FinderError, Result};
pub use recipe::Recipe;
pub use scanner::{RecipeSource, ScanReport};
pub use workflow::{FindCommand, FindSummary};
