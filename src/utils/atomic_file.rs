//! Atomic file replacement.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path` through a temporary file in the same directory.
///
/// Readers never observe a half-written file. When `path` already exists its
/// permissions are carried over to the replacement, so recipe files keep
/// their mode after an edit.
///
/// # Example
/// ```rust,no_run
/// use recipe_candidate_finder::utils::atomic_file;
/// use std::path::Path;
///
/// atomic_file::write_atomic(Path::new("commands.txt"), b"bioconda-recipe-gen ...\n")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file =
        NamedTempFile::new_in(parent).context("Failed to create temporary file")?;

    temp_file
        .write_all(contents)
        .context("Failed to write to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to flush temporary file")?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp_file.path(), metadata.permissions())
            .context("Failed to copy file permissions")?;
    }

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file to {}", path.display()))?;

    Ok(())
}

/// Write lines, each terminated by a newline.
pub fn write_lines_atomic(path: &Path, lines: &[String]) -> Result<()> {
    let mut buffer = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        buffer.push_str(line);
        buffer.push('\n');
    }
    write_atomic(path, buffer.as_bytes())
}
