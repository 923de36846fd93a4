use colored::Colorize;
use std::fmt;

#[derive(Debug)]
pub enum FinderError {
    RecipeDirNotFound {
        path: String,
    },
    RecipeParse {
        recipe: String,
        message: String,
    },
    Template {
        recipe: String,
        line: usize,
        message: String,
    },
    MissingKey {
        recipe: String,
        key: String,
    },
    ToolNotFound {
        tool: String,
        install_guidance: String,
    },
    BuildFailed {
        package: String,
        exit_code: Option<i32>,
        message: String,
    },
    Download {
        url: String,
        message: String,
    },
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },
    UnsupportedArchive {
        file_name: String,
    },
    ConfigError {
        path: String,
        message: String,
    },
    IoError {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
    },
    Other(anyhow::Error),
}

impl FinderError {
    pub fn recipe_dir_not_found(path: impl Into<String>) -> Self {
        Self::RecipeDirNotFound { path: path.into() }
    }

    pub fn recipe_parse(recipe: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecipeParse {
            recipe: recipe.into(),
            message: message.into(),
        }
    }

    pub fn template(recipe: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Template {
            recipe: recipe.into(),
            line,
            message: message.into(),
        }
    }

    pub fn missing_key(recipe: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey {
            recipe: recipe.into(),
            key: key.into(),
        }
    }

    pub fn tool_not_found(tool: impl Into<String>, install_guidance: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            install_guidance: install_guidance.into(),
        }
    }

    pub fn build_failed(
        package: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Self::BuildFailed {
            package: package.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn checksum_mismatch(
        url: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            url: url.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn unsupported_archive(file_name: impl Into<String>) -> Self {
        Self::UnsupportedArchive {
            file_name: file_name.into(),
        }
    }

    pub fn config_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io_error(
        operation: impl Into<String>,
        path: Option<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoError {
            operation: operation.into(),
            path,
            source,
        }
    }
}

impl fmt::Display for FinderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecipeDirNotFound { path } => {
                writeln!(
                    f,
                    "{} Recipe directory not found: {}",
                    "✗".red().bold(),
                    path.yellow()
                )?;
                writeln!(
                    f,
                    "  {} Pass the path to the bioconda-recipes/recipes folder",
                    "→".blue()
                )?;
                Ok(())
            }
            Self::RecipeParse { recipe, message } => {
                writeln!(
                    f,
                    "{} Failed to parse recipe: {}",
                    "✗".red().bold(),
                    recipe.yellow()
                )?;
                writeln!(f, "  {} {}", "→".blue(), message)?;
                Ok(())
            }
            Self::Template {
                recipe,
                line,
                message,
            } => {
                writeln!(
                    f,
                    "{} Template error in {} (line {})",
                    "✗".red().bold(),
                    recipe.yellow(),
                    line
                )?;
                writeln!(f, "  {} {}", "→".blue(), message)?;
                Ok(())
            }
            Self::MissingKey { recipe, key } => {
                write!(
                    f,
                    "{} Missing key '{}' in recipe {}",
                    "✗".red().bold(),
                    key.cyan(),
                    recipe.yellow()
                )
            }
            Self::ToolNotFound {
                tool,
                install_guidance,
            } => {
                writeln!(
                    f,
                    "{} Required tool not found: {}",
                    "✗".red().bold(),
                    tool.yellow()
                )?;
                writeln!(f)?;
                writeln!(f, "{}", "How to install:".green().bold())?;
                writeln!(f, "  {install_guidance}")?;
                Ok(())
            }
            Self::BuildFailed {
                package,
                exit_code,
                message,
            } => {
                writeln!(
                    f,
                    "{} Build failed for: {}",
                    "✗".red().bold(),
                    package.yellow()
                )?;
                if let Some(code) = exit_code {
                    writeln!(f, "  {} Exit code: {}", "→".blue(), code)?;
                }
                if !message.is_empty() {
                    writeln!(f, "  {} {}", "→".blue(), message)?;
                }
                Ok(())
            }
            Self::Download { url, message } => {
                writeln!(f, "{} Download failed", "✗".red().bold())?;
                writeln!(f, "  {} URL: {}", "→".blue(), url.yellow())?;
                writeln!(f, "  {} Error: {}", "→".blue(), message)?;
                Ok(())
            }
            Self::ChecksumMismatch {
                url,
                expected,
                actual,
            } => {
                writeln!(
                    f,
                    "{} Checksum mismatch for: {}",
                    "✗".red().bold(),
                    url.yellow()
                )?;
                writeln!(f, "  {} Expected: {}", "→".blue(), expected.green())?;
                writeln!(f, "  {} Actual:   {}", "→".blue(), actual.red())?;
                Ok(())
            }
            Self::UnsupportedArchive { file_name } => {
                write!(
                    f,
                    "{} Unsupported source archive: {}",
                    "✗".red().bold(),
                    file_name.yellow()
                )
            }
            Self::ConfigError { path, message } => {
                writeln!(f, "{} Configuration error", "✗".red().bold())?;
                writeln!(f, "  {} Path: {}", "→".blue(), path.yellow())?;
                writeln!(f, "  {} Error: {}", "→".blue(), message)?;
                Ok(())
            }
            Self::IoError {
                operation,
                path,
                source,
            } => {
                writeln!(
                    f,
                    "{} I/O error during: {}",
                    "✗".red().bold(),
                    operation.yellow()
                )?;
                if let Some(path) = path {
                    writeln!(f, "  {} Path: {}", "→".blue(), path)?;
                }
                writeln!(f, "  {} Error: {}", "→".blue(), source)?;
                Ok(())
            }
            Self::Other(err) => write!(f, "{} {}", "✗".red().bold(), err),
        }
    }
}

impl std::error::Error for FinderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError { source, .. } => Some(source),
            Self::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FinderError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            operation: "unknown".to_string(),
            path: None,
            source: err,
        }
    }
}

impl From<anyhow::Error> for FinderError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err)
    }
}

impl From<dialoguer::Error> for FinderError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Other(anyhow::anyhow!("Dialog error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, FinderError>;
