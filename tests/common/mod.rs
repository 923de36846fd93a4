#![allow(dead_code)]

use assert_cmd::Command;
use recipe_candidate_finder::test_utils::fixtures::{write_fake_tool, write_tar_gz, RecipeTree};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub fn candidate_finder() -> Command {
    Command::cargo_bin("candidate-finder").unwrap()
}

/// Write a config file under the tree root, keeping the cache inside the tree.
pub fn write_config(tree: &RecipeTree, extra: serde_json::Value) -> PathBuf {
    let mut config = serde_json::json!({
        "cache_dir": tree.root().join("cache"),
        "output_file": tree.root().join("bioconda_recipe_gen_commands.txt"),
    });
    if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    let path = tree.root().join("candidate-finder.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

/// A fake `bioconda-utils` succeeding only for the listed packages.
///
/// The package name is the sixth argument: `build --force recipes/ config.yml --packages <pkg>`.
pub fn fake_build_tool(tree: &RecipeTree, succeeding: &[&str]) -> PathBuf {
    let cases = if succeeding.is_empty() {
        String::new()
    } else {
        format!("  {}) exit 0 ;;\n", succeeding.join("|"))
    };
    let body = format!("case \"$6\" in\n{cases}  *) echo \"build of $6 failed\" >&2; exit 1 ;;\nesac\n");
    write_fake_tool(tree.root(), "fake-bioconda-utils", &body)
}

/// A recipe whose source is a local tarball, with or without a root CMakeLists.txt.
pub fn add_local_source_recipe(tree: &RecipeTree, name: &str, with_cmake: bool) -> PathBuf {
    let archive = tree.root().join(format!("{name}-1.0.tar.gz"));
    let prefix = format!("{name}-1.0");
    let readme = format!("{prefix}/README");
    let cmake = format!("{prefix}/CMakeLists.txt");
    let mut files = vec![(readme.as_str(), "hello\n")];
    if with_cmake {
        files.push((cmake.as_str(), "cmake_minimum_required(VERSION 3.5)\n"));
    }
    write_tar_gz(&archive, &files);
    tree.add_simple(name, "1.0", &file_url(&archive));
    archive
}

pub fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}
