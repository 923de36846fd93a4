//! Download cache for source archives.
//!
//! Archives are stored once per URL so repeated runs over the same recipe
//! tree do not fetch every tarball again.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::FinderConfig;
use crate::utils::atomic_file;

#[derive(Debug, Clone)]
pub struct DownloadCache {
    dir: PathBuf,
}

impl DownloadCache {
    /// Cache rooted at the configured directory or the platform cache dir.
    pub fn new(config: &FinderConfig) -> Result<Self> {
        let dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => Self::default_cache_dir()?,
        };
        Self::at(dir)
    }

    pub fn at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn default_cache_dir() -> Result<PathBuf> {
        let base = directories::ProjectDirs::from("", "", "candidate-finder")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine cache directory"))?;
        Ok(base.cache_dir().join("downloads"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::url_to_filename(url))
    }

    /// Cached archive for `url`, if present.
    pub fn get(&self, url: &str) -> Option<PathBuf> {
        let path = self.path_for(url);
        path.is_file().then_some(path)
    }

    pub fn store(&self, url: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(url);
        atomic_file::write_atomic(&path, contents)?;
        Ok(path)
    }

    pub fn remove(&self, url: &str) -> Result<()> {
        let path = self.path_for(url);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Delete every cached archive, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Convert a URL to a stable, filesystem safe name that keeps the archive extension.
    pub fn url_to_filename(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let hash = hex::encode(&digest[..8]);

        let filename = url
            .split('/')
            .next_back()
            .and_then(|s| {
                let s = s.split(['?', '#']).next().unwrap_or(s);
                if s.is_empty() || s == "download" {
                    None
                } else {
                    Some(s)
                }
            })
            .unwrap_or("download");
        let safe: String = filename
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        format!("{hash}_{safe}")
    }
}
