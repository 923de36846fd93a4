//! Inspection of upstream source archives.
//!
//! Candidates are recipes whose source tree has a `CMakeLists.txt` at its
//! root. Archives are listed, never extracted.

use anyhow::Context;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use url::Url;
use xz2::read::XzDecoder;

use crate::cache::DownloadCache;
use crate::config::FinderConfig;
use crate::error::{FinderError, Result};
use crate::logging;
use crate::scanner::RecipeSource;

pub const CMAKE_LISTS: &str = "CMakeLists.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
}

impl ArchiveKind {
    /// Detect the archive format from a file name or URL.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name
            .split(['?', '#'])
            .next()
            .unwrap_or(name)
            .to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Paths of all entries in the archive at `path`.
pub fn archive_entries(path: &Path, kind: ArchiveKind) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| {
        FinderError::io_error("open archive", Some(path.display().to_string()), e)
    })?;
    let reader = BufReader::new(file);

    let listing = match kind {
        ArchiveKind::TarGz => tar_entries(GzDecoder::new(reader)),
        ArchiveKind::TarBz2 => tar_entries(bzip2::read::BzDecoder::new(reader)),
        ArchiveKind::TarXz => tar_entries(XzDecoder::new(reader)),
        ArchiveKind::Tar => tar_entries(reader),
        ArchiveKind::Zip => zip_entries(reader),
    };

    listing.map_err(|e| {
        FinderError::Other(e.context(format!("Failed to list archive {}", path.display())))
    })
}

fn tar_entries<R: Read>(reader: R) -> anyhow::Result<Vec<String>> {
    let mut archive = Archive::new(reader);
    let mut names = Vec::new();
    for entry in archive.entries().context("Failed to read archive entries")? {
        let entry = entry.context("Failed to read archive entry")?;
        let path = entry.path().context("Failed to get entry path")?;
        names.push(path.to_string_lossy().into_owned());
    }
    Ok(names)
}

fn zip_entries<R: Read + std::io::Seek>(reader: R) -> anyhow::Result<Vec<String>> {
    let archive = zip::ZipArchive::new(reader).context("Failed to open zip archive")?;
    Ok(archive.file_names().map(str::to_string).collect())
}

fn normalize_entry(entry: &str) -> Option<String> {
    let trimmed = entry.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." || trimmed == "pax_global_header" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Directory that holds the source tree: the single top level directory
/// shared by every entry, or the archive root (`""`) otherwise.
pub fn source_root(entries: &[String]) -> String {
    let normalized: Vec<String> = entries.iter().filter_map(|e| normalize_entry(e)).collect();
    let Some(first) = normalized.first() else {
        return String::new();
    };
    let top = first.split('/').next().unwrap_or_default();

    let shared = normalized
        .iter()
        .all(|e| e.split('/').next() == Some(top));
    let is_directory = normalized.iter().any(|e| e.contains('/'));

    if shared && is_directory {
        top.to_string()
    } else {
        String::new()
    }
}

/// True when `file_name` sits directly in the source root.
pub fn has_root_file(entries: &[String], file_name: &str) -> bool {
    let root = source_root(entries);
    let wanted = if root.is_empty() {
        file_name.to_string()
    } else {
        format!("{root}/{file_name}")
    };
    entries
        .iter()
        .filter_map(|e| normalize_entry(e))
        .any(|e| e == wanted)
}

fn sha256_file(path: &Path) -> Result<String> {
    let contents = fs::read(path)
        .map_err(|e| FinderError::io_error("hash archive", Some(path.display().to_string()), e))?;
    Ok(hex::encode(Sha256::digest(&contents)))
}

/// Downloads source archives into the cache and inspects their layout.
pub struct SourceInspector {
    client: Client,
    cache: DownloadCache,
    show_progress: bool,
}

impl SourceInspector {
    pub fn new(config: &FinderConfig) -> Result<Self> {
        let cache = DownloadCache::new(config)?;
        Self::with_cache(cache, config.download_timeout())
    }

    pub fn with_cache(cache: DownloadCache, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("candidate-finder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FinderError::Other(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            cache,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Local path of the archive behind `url`, downloading it when needed.
    ///
    /// `file://` URLs are read in place. When `sha256` is given the archive
    /// must match it; a stale cached copy is fetched again once.
    pub fn fetch(&self, url: &str, sha256: Option<&str>) -> Result<PathBuf> {
        let parsed =
            Url::parse(url).map_err(|e| FinderError::download(url, format!("invalid URL: {e}")))?;

        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| FinderError::download(url, "not a local file path"))?;
            if let Some(expected) = sha256 {
                self.verify(url, &path, expected)?;
            }
            return Ok(path);
        }

        if let Some(cached) = self.cache.get(url) {
            logging::log_download(url, true, None);
            match sha256 {
                Some(expected) if self.verify(url, &cached, expected).is_err() => {
                    tracing::warn!(url = url, "Cached archive failed verification, fetching again");
                    self.cache.remove(url)?;
                }
                _ => return Ok(cached),
            }
        }

        let bytes = self.download(url)?;
        let path = self.cache.store(url, &bytes)?;
        if let Some(expected) = sha256 {
            if let Err(e) = self.verify(url, &path, expected) {
                self.cache.remove(url)?;
                return Err(e);
            }
        }
        Ok(path)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        logging::log_download(url, false, None);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FinderError::download(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(FinderError::download(
                url,
                format!("server responded with status {}", response.status()),
            ));
        }

        let spinner = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("Downloading {url}"));
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let body = response.bytes();
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        let body = body.map_err(|e| FinderError::download(url, e.to_string()))?;

        logging::log_download(url, false, Some(body.len() as u64));
        Ok(body.to_vec())
    }

    fn verify(&self, url: &str, path: &Path, expected: &str) -> Result<()> {
        let actual = sha256_file(path)?;
        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(FinderError::checksum_mismatch(url, expected.trim(), actual))
        }
    }

    /// Whether the source archive of `source` has `CMakeLists.txt` in its root.
    pub fn has_cmakelists_in_root(&self, source: &RecipeSource) -> Result<bool> {
        let kind = ArchiveKind::from_name(&source.url)
            .ok_or_else(|| FinderError::unsupported_archive(&source.url))?;
        let archive = self.fetch(&source.url, source.sha256.as_deref())?;
        let entries = archive_entries(&archive, kind)?;
        Ok(has_root_file(&entries, CMAKE_LISTS))
    }
}

/// Keep the sources whose archive root contains `CMakeLists.txt`.
///
/// Download or archive errors drop the candidate.
pub fn filter_cmake_candidates(
    inspector: &SourceInspector,
    sources: &[RecipeSource],
) -> Vec<RecipeSource> {
    let mut candidates = Vec::new();
    for source in sources {
        match inspector.has_cmakelists_in_root(source) {
            Ok(true) => {
                tracing::info!(recipe = %source.recipe, "Source tree has a root CMakeLists.txt");
                candidates.push(source.clone());
            }
            Ok(false) => {
                tracing::debug!(recipe = %source.recipe, "No CMakeLists.txt in source root");
            }
            Err(e) => {
                logging::log_recipe_error(&source.recipe, e.to_string().trim());
            }
        }
    }
    candidates
}
