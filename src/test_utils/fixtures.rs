//! Test fixtures for recipe trees, archives and fake executables.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary `bioconda-recipes` checkout with a `recipes/` folder.
pub struct RecipeTree {
    dir: TempDir,
}

impl RecipeTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("recipes")).expect("create recipes dir");
        Self { dir }
    }

    /// Root of the checkout (parent of `recipes/`).
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.dir.path().join("recipes")
    }

    pub fn add_dir(&self, reldir: &str) -> PathBuf {
        let path = self.recipes_path().join(reldir);
        fs::create_dir_all(&path).expect("create recipe dir");
        path
    }

    /// Write `contents` as `recipes/<reldir>/meta.yaml`.
    pub fn add_raw(&self, reldir: &str, contents: &str) -> PathBuf {
        let path = self.add_dir(reldir).join("meta.yaml");
        fs::write(&path, contents).expect("write meta.yaml");
        path
    }

    /// A minimal recipe named after the first path component of `reldir`, build number 0.
    pub fn add_simple(&self, reldir: &str, version: &str, url: &str) -> PathBuf {
        let name = reldir.split('/').next().unwrap_or(reldir);
        self.add_raw(reldir, &simple_meta(name, version, url))
    }

    pub fn read(&self, reldir: &str) -> String {
        fs::read_to_string(self.recipes_path().join(reldir).join("meta.yaml"))
            .expect("read meta.yaml")
    }
}

impl Default for RecipeTree {
    fn default() -> Self {
        Self::new()
    }
}

pub fn simple_meta(name: &str, version: &str, url: &str) -> String {
    format!(
        "{{% set name = \"{name}\" %}}\n{{% set version = \"{version}\" %}}\n\npackage:\n  name: {{{{ name|lower }}}}\n  version: {{{{ version }}}}\n\nsource:\n  url: {url}\n\nbuild:\n  number: 0\n"
    )
}

/// Write an executable shell script and return its path.
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write fake tool");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("make fake tool executable");
    }
    path
}

/// Write a gzip compressed tarball holding `files` as `(path, contents)` pairs.
pub fn write_tar_gz(path: &Path, files: &[(&str, &str)]) {
    let file = fs::File::create(path).expect("create tarball");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

pub fn write_zip(path: &Path, files: &[(&str, &str)]) {
    let file = fs::File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(file);
    for (name, contents) in files {
        zip.start_file::<_, ()>(*name, zip::write::FileOptions::default())
            .expect("start zip entry");
        zip.write_all(contents.as_bytes()).expect("write zip entry");
    }
    zip.finish().expect("finish zip");
}
