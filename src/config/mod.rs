//! Tool configuration.
//!
//! Settings are read from a JSON file. When no file is given explicitly the
//! platform config directory is consulted, and a missing file there simply
//! yields the defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FinderError, Result};

pub const BUILD_TOOL_ENV: &str = "CANDIDATE_FINDER_BUILD_TOOL";
pub const GENERATOR_ENV: &str = "CANDIDATE_FINDER_GENERATOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Executable used for sanity builds.
    pub build_tool: String,
    /// Build configuration passed to the build tool, relative to the bioconda-recipes root.
    pub build_config: String,
    pub build_timeout_secs: u64,
    /// Executable name written at the start of every generated command.
    pub generator: String,
    /// Appended to the package name in generated commands.
    pub name_suffix: String,
    pub output_file: PathBuf,
    pub download_timeout_secs: u64,
    pub scan_depth: usize,
    pub cache_dir: Option<PathBuf>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            build_tool: "bioconda-utils".to_string(),
            build_config: "config.yml".to_string(),
            build_timeout_secs: 3600,
            generator: "bioconda-recipe-gen".to_string(),
            name_suffix: "2".to_string(),
            output_file: PathBuf::from("bioconda_recipe_gen_commands.txt"),
            download_timeout_secs: 120,
            scan_depth: 2,
            cache_dir: None,
        }
    }
}

impl FinderConfig {
    /// Load the configuration from `path`, or from the default location when `None`.
    ///
    /// An explicitly named file must exist. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FinderError::io_error("read config", Some(path.display().to_string()), e)
        })?;
        serde_json::from_str(&content)
            .map_err(|e| FinderError::config_error(path.display().to_string(), e.to_string()))
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "candidate-finder")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(tool) = std::env::var(BUILD_TOOL_ENV) {
            if !tool.trim().is_empty() {
                self.build_tool = tool;
            }
        }
        if let Ok(generator) = std::env::var(GENERATOR_ENV) {
            if !generator.trim().is_empty() {
                self.generator = generator;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let origin = "<config>";
        if self.build_tool.trim().is_empty() {
            return Err(FinderError::config_error(origin, "build_tool must not be empty"));
        }
        if self.generator.trim().is_empty() {
            return Err(FinderError::config_error(origin, "generator must not be empty"));
        }
        if self.build_timeout_secs == 0 {
            return Err(FinderError::config_error(
                origin,
                "build_timeout_secs must be greater than zero",
            ));
        }
        if self.scan_depth == 0 {
            return Err(FinderError::config_error(
                origin,
                "scan_depth must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_bioconda_layout() {
        let config = FinderConfig::default();
        assert_eq!(config.build_tool, "bioconda-utils");
        assert_eq!(config.build_config, "config.yml");
        assert_eq!(config.name_suffix, "2");
        assert_eq!(
            config.output_file,
            PathBuf::from("bioconda_recipe_gen_commands.txt")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"name_suffix": "_gen", "build_timeout_secs": 60}"#).unwrap();

        let config = FinderConfig::from_file(&path).unwrap();
        assert_eq!(config.name_suffix, "_gen");
        assert_eq!(config.build_timeout(), Duration::from_secs(60));
        assert_eq!(config.generator, "bioconda-recipe-gen");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FinderConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, FinderError::ConfigError { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = FinderConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, FinderError::IoError { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = FinderConfig {
            build_timeout_secs: 0,
            ..FinderConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
