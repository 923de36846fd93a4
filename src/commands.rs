//! Generation of `bioconda-recipe-gen` command lines for candidates.

use std::path::{Path, PathBuf};

use crate::builder::bioconda_root;
use crate::config::FinderConfig;
use crate::error::{FinderError, Result};
use crate::logging;
use crate::recipe::Recipe;
use crate::scanner::RecipeSource;
use crate::utils::atomic_file;

/// Everything that goes into a generated command besides the recipe itself.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    pub generator: String,
    pub name_suffix: String,
    pub bioconda_recipes_path: PathBuf,
    pub recipes_path: PathBuf,
}

impl CommandTemplate {
    pub fn new(recipes_path: &Path, config: &FinderConfig) -> Self {
        Self {
            generator: config.generator.clone(),
            name_suffix: config.name_suffix.clone(),
            bioconda_recipes_path: bioconda_root(recipes_path),
            recipes_path: recipes_path.to_path_buf(),
        }
    }

    /// Command line regenerating `recipe` under a new name.
    ///
    /// `--test-commands` and `--tests` are only added when the recipe has
    /// `test/commands` and a non-empty `test/files` respectively.
    pub fn command_for(&self, recipe: &Recipe) -> Result<String> {
        let name = recipe.name()?;
        let version = recipe.version()?;
        let url = recipe.get_str("source/url")?;

        let mut cmd = format!(
            "{} {} -n {} -v {} -u {}",
            self.generator,
            quote_arg(&self.bioconda_recipes_path.display().to_string()),
            quote_arg(&format!("{}{}", name, self.name_suffix)),
            quote_arg(&version),
            quote_arg(&url),
        );

        match recipe.get_list("test/commands") {
            Ok(commands) if !commands.is_empty() => {
                cmd.push_str(" --test-commands");
                for test_cmd in &commands {
                    cmd.push(' ');
                    cmd.push_str(&double_quote(test_cmd));
                }
            }
            Ok(_) => tracing::debug!(recipe = recipe.reldir(), "test/commands is empty"),
            Err(e) => tracing::info!(recipe = recipe.reldir(), "{}", e.to_string().trim()),
        }

        match recipe.is_truthy("test/files") {
            Ok(true) => {
                let tests_dir = self.recipes_path.join(recipe.reldir());
                cmd.push_str(" --tests ");
                cmd.push_str(&quote_arg(&tests_dir.display().to_string()));
            }
            Ok(false) => {}
            Err(e) => tracing::debug!(recipe = recipe.reldir(), "{}", e.to_string().trim()),
        }

        Ok(cmd)
    }
}

#[derive(Debug, Default)]
pub struct CommandsReport {
    pub lines: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

/// Build one command per candidate. Recipes that fail to load are skipped.
pub fn render_commands(
    candidates: &[RecipeSource],
    template: &CommandTemplate,
) -> CommandsReport {
    let mut report = CommandsReport::default();
    for candidate in candidates {
        let line = Recipe::load(&template.recipes_path, &candidate.recipe)
            .and_then(|recipe| template.command_for(&recipe));
        match line {
            Ok(line) => report.lines.push(line),
            Err(e) => {
                let message = e.to_string().trim().to_string();
                logging::log_recipe_error(&candidate.recipe, &message);
                report.skipped.push((candidate.recipe.clone(), message));
            }
        }
    }
    report
}

/// Write the generator commands for `candidates` to `output`, one per line.
pub fn write_candidates_to_file(
    candidates: &[RecipeSource],
    template: &CommandTemplate,
    output: &Path,
) -> Result<CommandsReport> {
    let report = render_commands(candidates, template);
    atomic_file::write_lines_atomic(output, &report.lines).map_err(|e| {
        FinderError::Other(e.context(format!("Failed to write {}", output.display())))
    })?;
    tracing::info!(
        path = %output.display(),
        commands = report.lines.len(),
        "Generator commands written"
    );
    Ok(report)
}

/// Wrap in double quotes, escaping what the shell would still expand.
pub fn double_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Quote only when the value contains characters the shell treats specially.
pub fn quote_arg(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c));
    if plain {
        value.to_string()
    } else {
        double_quote(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::RecipeTree;

    fn template(tree: &RecipeTree) -> CommandTemplate {
        CommandTemplate::new(&tree.recipes_path(), &FinderConfig::default())
    }

    #[test]
    fn test_double_quote_escapes() {
        assert_eq!(double_quote("samtools --help"), "\"samtools --help\"");
        assert_eq!(double_quote(r#"echo "$HOME""#), r#""echo \"\$HOME\"""#);
        assert_eq!(double_quote("a`b`\\"), "\"a\\`b\\`\\\\\"");
    }

    #[test]
    fn test_quote_arg() {
        assert_eq!(quote_arg("https://example.org/a-1.0.tar.gz"), "https://example.org/a-1.0.tar.gz");
        assert_eq!(quote_arg("https://x.org/get?id=1&v=2"), "\"https://x.org/get?id=1&v=2\"");
        assert_eq!(quote_arg("/path with space"), "\"/path with space\"");
        assert_eq!(quote_arg(""), "\"\"");
    }

    #[test]
    fn test_command_with_tests() {
        let tree = RecipeTree::new();
        tree.add_raw(
            "kallisto",
            r#"{% set version = "0.46.1" %}
package:
  name: kallisto
  version: {{ version }}
source:
  url: https://github.com/pachterlab/kallisto/archive/v{{ version }}.tar.gz
build:
  number: 0
test:
  files:
    - test.fa
  commands:
    - kallisto version
    - kallisto index -i idx test.fa
"#,
        );
        let recipe = Recipe::load(&tree.recipes_path(), "kallisto").unwrap();
        let cmd = template(&tree).command_for(&recipe).unwrap();

        let root = tree.root().display().to_string();
        let recipes = tree.recipes_path().join("kallisto").display().to_string();
        assert_eq!(
            cmd,
            format!(
                "bioconda-recipe-gen {root} -n kallisto2 -v 0.46.1 -u https://github.com/pachterlab/kallisto/archive/v0.46.1.tar.gz --test-commands \"kallisto version\" \"kallisto index -i idx test.fa\" --tests {recipes}"
            )
        );
    }

    #[test]
    fn test_command_without_test_section() {
        let tree = RecipeTree::new();
        tree.add_simple("bwa", "0.7.17", "https://example.org/bwa-0.7.17.tar.bz2");
        let recipe = Recipe::load(&tree.recipes_path(), "bwa").unwrap();

        let cmd = template(&tree).command_for(&recipe).unwrap();
        assert!(cmd.ends_with("-n bwa2 -v 0.7.17 -u https://example.org/bwa-0.7.17.tar.bz2"));
        assert!(!cmd.contains("--test-commands"));
        assert!(!cmd.contains("--tests"));
    }

    #[test]
    fn test_empty_test_commands_omit_flag() {
        let tree = RecipeTree::new();
        tree.add_raw(
            "bwa",
            "package:\n  name: bwa\n  version: 0.7.17\nsource:\n  url: https://example.org/bwa.tar.gz\nbuild:\n  number: 0\ntest:\n  commands: []\n  files: []\n",
        );
        let recipe = Recipe::load(&tree.recipes_path(), "bwa").unwrap();

        let cmd = template(&tree).command_for(&recipe).unwrap();
        assert!(cmd.ends_with("-u https://example.org/bwa.tar.gz"));
        assert!(!cmd.contains("--test-commands"));
        assert!(!cmd.contains("--tests"));
    }

    #[test]
    fn test_custom_generator_and_suffix() {
        let tree = RecipeTree::new();
        tree.add_simple("bwa", "0.7.17", "https://example.org/bwa.tar.gz");
        let config = FinderConfig {
            generator: "/opt/gen".to_string(),
            name_suffix: "-regen".to_string(),
            ..FinderConfig::default()
        };
        let recipe = Recipe::load(&tree.recipes_path(), "bwa").unwrap();

        let cmd = CommandTemplate::new(&tree.recipes_path(), &config)
            .command_for(&recipe)
            .unwrap();
        assert!(cmd.starts_with("/opt/gen "));
        assert!(cmd.contains(" -n bwa-regen "));
    }

    #[test]
    fn test_write_candidates_to_file_skips_missing() {
        let tree = RecipeTree::new();
        tree.add_simple("bwa", "0.7.17", "https://example.org/bwa.tar.gz");
        tree.add_simple("hisat2", "2.1.0", "https://example.org/hisat2.zip");

        let candidates = vec![
            RecipeSource {
                recipe: "bwa".into(),
                name: "bwa".into(),
                version: None,
                url: String::new(),
                sha256: None,
            },
            RecipeSource {
                recipe: "vanished".into(),
                name: "vanished".into(),
                version: None,
                url: String::new(),
                sha256: None,
            },
            RecipeSource {
                recipe: "hisat2".into(),
                name: "hisat2".into(),
                version: None,
                url: String::new(),
                sha256: None,
            },
        ];
        let output = tree.root().join("bioconda_recipe_gen_commands.txt");
        let report = write_candidates_to_file(&candidates, &template(&tree), &output).unwrap();

        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.skipped[0].0, "vanished");

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-n bwa2"));
        assert!(lines[1].contains("-n hisat22"));
    }

    mod quoting {
        use super::super::*;
        use proptest::prelude::*;

        /// Undo `double_quote` the way a POSIX shell reads a double quoted word.
        fn shell_unquote(quoted: &str) -> Option<String> {
            let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
            let mut out = String::new();
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => out.push(chars.next()?),
                    '"' | '$' | '`' => return None,
                    other => out.push(other),
                }
            }
            Some(out)
        }

        proptest! {
            #[test]
            fn prop_double_quote_round_trips_through_shell(value in ".{0,80}") {
                prop_assert_eq!(shell_unquote(&double_quote(&value)), Some(value));
            }

            #[test]
            fn prop_plain_args_stay_bare(value in "[a-zA-Z0-9_./:-]{1,60}") {
                prop_assert_eq!(quote_arg(&value), value);
            }

            #[test]
            fn prop_args_with_spaces_are_quoted(a in "[a-z]{1,10}", b in "[a-z]{1,10}") {
                let quoted = quote_arg(&format!("{a} {b}"));
                prop_assert!(quoted.starts_with('"'));
                prop_assert!(quoted.ends_with('"'));
            }
        }
    }
}
