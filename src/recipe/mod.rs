//! Loading, querying and editing bioconda `meta.yaml` recipes.

pub mod lexer;
pub mod selector;
pub mod template;

#[cfg(test)]
mod recipe_proptest;

use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FinderError, Result};
use crate::utils::atomic_file;

pub const META_FILE: &str = "meta.yaml";

/// A parsed recipe together with the raw text it was rendered from.
///
/// Edits operate on the raw text so that formatting, comments and template
/// expressions survive a save.
#[derive(Debug, Clone)]
pub struct Recipe {
    reldir: String,
    path: PathBuf,
    raw: String,
    meta: Value,
    vars: template::Context,
}

impl Recipe {
    /// Load `meta_yaml_path`, naming the recipe by its directory relative to `recipes_path`.
    pub fn from_file(recipes_path: &Path, meta_yaml_path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(meta_yaml_path).map_err(|e| {
            FinderError::io_error(
                "read recipe",
                Some(meta_yaml_path.display().to_string()),
                e,
            )
        })?;
        let reldir = relative_dir(recipes_path, meta_yaml_path);
        Self::from_text(reldir, meta_yaml_path.to_path_buf(), raw)
    }

    /// Load the recipe stored in `recipes_path/<reldir>/meta.yaml`.
    pub fn load(recipes_path: &Path, reldir: &str) -> Result<Self> {
        let meta_path = recipes_path.join(reldir).join(META_FILE);
        if !meta_path.is_file() {
            return Err(FinderError::recipe_parse(
                reldir,
                format!("no {} at {}", META_FILE, meta_path.display()),
            ));
        }
        Self::from_file(recipes_path, &meta_path)
    }

    pub fn from_text(reldir: impl Into<String>, path: PathBuf, raw: String) -> Result<Self> {
        let reldir = reldir.into();
        let (meta, vars) = parse_meta(&reldir, &raw)?;
        Ok(Self {
            reldir,
            path,
            raw,
            meta,
            vars,
        })
    }

    /// Directory of the recipe relative to the recipes folder, e.g. `samtools` or `blast/2.2.31`.
    pub fn reldir(&self) -> &str {
        &self.reldir
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn name(&self) -> Result<String> {
        self.get_str("package/name")
    }

    /// `package/version`. YAML reads `1.10` as a float, so when the template
    /// bound a `version` variable with the same numeric value its text wins.
    pub fn version(&self) -> Result<String> {
        let version = self.get_str("package/version")?;
        if let Some(template::Value::Str(text)) = self.vars.get("version") {
            let same_number = matches!(
                (text.parse::<f64>(), version.parse::<f64>()),
                (Ok(a), Ok(b)) if a == b
            );
            if same_number {
                return Ok(text.clone());
            }
        }
        Ok(version)
    }

    /// Look up a slash separated key path.
    ///
    /// A sequence met on the way resolves to its first element, so
    /// `source/url` works for recipes declaring several sources.
    pub fn get(&self, key_path: &str) -> Result<&Value> {
        self.get_opt(key_path)
            .ok_or_else(|| FinderError::missing_key(&self.reldir, key_path))
    }

    pub fn get_opt(&self, key_path: &str) -> Option<&Value> {
        let mut current = &self.meta;
        for key in key_path.split('/') {
            if let Value::Sequence(items) = current {
                current = items.first()?;
            }
            current = match current {
                Value::Mapping(map) => map.get(key)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Scalar value at `key_path`; lists (e.g. mirror URLs) yield their first entry.
    pub fn get_str(&self, key_path: &str) -> Result<String> {
        let value = self.get(key_path)?;
        scalar_to_string(value).ok_or_else(|| FinderError::missing_key(&self.reldir, key_path))
    }

    /// List of scalars at `key_path`. A single scalar is a one element list and null is empty.
    pub fn get_list(&self, key_path: &str) -> Result<Vec<String>> {
        let value = self.get(key_path)?;
        Ok(match value {
            Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
            Value::Null => Vec::new(),
            other => scalar_to_string(other).into_iter().collect(),
        })
    }

    /// True when `key_path` exists and holds something other than null, false,
    /// an empty string or an empty collection.
    pub fn is_truthy(&self, key_path: &str) -> Result<bool> {
        let value = self.get(key_path)?;
        Ok(match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Sequence(items) => !items.is_empty(),
            Value::Mapping(map) => !map.is_empty(),
            _ => true,
        })
    }

    pub fn build_number(&self) -> Result<u64> {
        let raw = self.get_str("build/number")?;
        raw.trim().parse::<u64>().map_err(|_| {
            FinderError::recipe_parse(
                &self.reldir,
                format!("build/number is not a non-negative integer: '{raw}'"),
            )
        })
    }

    /// Rewrite `build/number` in the raw text and re-parse.
    pub fn set_build_number(&mut self, number: u64) -> Result<()> {
        let updated = rewrite_build_number(&self.raw, number)
            .ok_or_else(|| FinderError::missing_key(&self.reldir, "build/number"))?;
        let (meta, vars) = parse_meta(&self.reldir, &updated)?;
        self.raw = updated;
        self.meta = meta;
        self.vars = vars;

        let current = self.build_number()?;
        if current != number {
            return Err(FinderError::recipe_parse(
                &self.reldir,
                format!("build/number is computed by the template and stayed at {current}"),
            ));
        }
        Ok(())
    }

    /// Bump `build/number` by one, returning the old and new numbers.
    pub fn increment_build_number(&mut self) -> Result<(u64, u64)> {
        let old = self.build_number()?;
        let new = old.checked_add(1).ok_or_else(|| {
            FinderError::recipe_parse(&self.reldir, format!("build/number {old} cannot be incremented"))
        })?;
        self.set_build_number(new)?;
        Ok((old, new))
    }

    pub fn save(&self) -> Result<()> {
        atomic_file::write_atomic(&self.path, self.raw.as_bytes()).map_err(|e| {
            FinderError::Other(e.context(format!("Failed to save {}", self.path.display())))
        })
    }
}

fn relative_dir(recipes_path: &Path, meta_yaml_path: &Path) -> String {
    let dir = meta_yaml_path.parent().unwrap_or(meta_yaml_path);
    let joined = match dir.strip_prefix(recipes_path) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => String::new(),
    };
    if joined.is_empty() {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        joined
    }
}

fn parse_meta(reldir: &str, raw: &str) -> Result<(Value, template::Context)> {
    let (rendered, vars) = template::render(raw)
        .map_err(|e| FinderError::template(reldir, e.line, e.message))?;
    let selected = selector::apply_selectors(&rendered);
    let meta: Value = serde_yaml::from_str(&selected)
        .map_err(|e| FinderError::recipe_parse(reldir, e.to_string()))?;
    match meta {
        Value::Mapping(_) => Ok((meta, vars)),
        Value::Null => Err(FinderError::recipe_parse(reldir, "recipe is empty")),
        _ => Err(FinderError::recipe_parse(
            reldir,
            "recipe top level is not a mapping",
        )),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(items) => items.first().and_then(scalar_to_string),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Mapping(_) => None,
    }
}

/// Replace the value of every `number:` line inside the top level `build:`
/// block. When the value is a `{{ var }}` expression the matching
/// `{% set var = ... %}` statement is rewritten instead.
///
/// Returns `None` when the block has no `number:` line.
pub fn rewrite_build_number(raw: &str, number: u64) -> Option<String> {
    let mut lines: Vec<String> = raw.split_inclusive('\n').map(str::to_string).collect();
    let mut in_build = false;
    let mut found = false;
    let mut template_vars = Vec::new();

    for line in lines.iter_mut() {
        let first = line.chars().next();
        if let Some(c) = first {
            if !c.is_whitespace() && c != '#' && c != '{' {
                in_build = line.trim_end().starts_with("build:");
                continue;
            }
        }
        if !in_build {
            continue;
        }

        let stripped = line.trim_start();
        let Some(after_key) = stripped.strip_prefix("number:") else {
            continue;
        };
        found = true;

        let indent = &line[..line.len() - stripped.len()];
        let (body, newline) = match after_key.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (after_key, ""),
        };
        let comment_at = body.find('#').unwrap_or(body.len());
        let (value, comment) = body.split_at(comment_at);

        if let Some(var) = template_var(value) {
            template_vars.push(var);
            continue;
        }

        let trailing = &value[value.trim_end().len()..];
        let trailing = if comment.is_empty() { "" } else { trailing };
        *line = format!("{indent}number: {number}{trailing}{comment}{newline}");
    }

    if !found {
        return None;
    }

    for var in template_vars {
        for line in lines.iter_mut() {
            if let Some(updated) = rewrite_set_statement(line, &var, number) {
                *line = updated;
            }
        }
    }

    Some(lines.concat())
}

fn template_var(value: &str) -> Option<String> {
    let start = value.find("{{")? + 2;
    let end = value[start..].find("}}")? + start;
    let name: String = value[start..end]
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

fn rewrite_set_statement(line: &str, var: &str, number: u64) -> Option<String> {
    let open = line.find("{%")?;
    let close = line[open..].find("%}")? + open;
    let inner = &line[open + 2..close];
    let statement = inner.trim_start_matches('-').trim_start();
    let binding = statement.strip_prefix("set")?;
    if !binding.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, _) = binding.split_once('=')?;
    if name.trim() != var {
        return None;
    }
    let trim_right = if inner.ends_with('-') { " -" } else { " " };
    let trim_left = if inner.starts_with('-') { "- " } else { " " };
    Some(format!(
        "{}{{%{}set {} = {}{}%}}{}",
        &line[..open],
        trim_left,
        var,
        number,
        trim_right,
        &line[close + 2..]
    ))
}
