//! Recipe loading and editing against realistic bioconda recipes

use recipe_candidate_finder::recipe::Recipe;
use recipe_candidate_finder::scanner::{load_sources, scan_recipes};
use recipe_candidate_finder::test_utils::fixtures::RecipeTree;

const SAMTOOLS: &str = r#"{% set version = "1.10" %}
{% set sha256 = "7b9ec5f05d61ec17bd9a82927e45d8ef37f813f79eb03fe06c88377f1bd03585" %}

package:
  name: samtools
  version: {{ version }}

source:
  url: https://github.com/samtools/samtools/releases/download/{{ version }}/samtools-{{ version }}.tar.bz2
  sha256: {{ sha256 }}

build:
  number: 3  # bumped for htslib
  run_exports:
    - {{ pin_subpackage('samtools', max_pin='x.x') }}

requirements:
  build:
    - {{ compiler('c') }}
  host:
    - htslib {{ version }}
    - ncurses  # [not win]
  run:
    - ncurses  # [not win]

test:
  commands:
    - samtools --help

about:
  home: https://github.com/samtools/samtools
  license: MIT
"#;

#[test]
fn test_samtools_style_recipe() {
    let tree = RecipeTree::new();
    tree.add_raw("samtools", SAMTOOLS);

    let recipe = Recipe::load(&tree.recipes_path(), "samtools").unwrap();
    assert_eq!(recipe.name().unwrap(), "samtools");
    assert_eq!(recipe.version().unwrap(), "1.10");
    assert_eq!(
        recipe.get_str("source/url").unwrap(),
        "https://github.com/samtools/samtools/releases/download/1.10/samtools-1.10.tar.bz2"
    );
    assert_eq!(recipe.build_number().unwrap(), 3);
    assert_eq!(recipe.get_list("test/commands").unwrap(), vec!["samtools --help"]);
}

#[test]
fn test_bump_preserves_comments_and_templates() {
    let tree = RecipeTree::new();
    tree.add_raw("samtools", SAMTOOLS);

    let mut recipe = Recipe::load(&tree.recipes_path(), "samtools").unwrap();
    assert_eq!(recipe.increment_build_number().unwrap(), (3, 4));
    recipe.save().unwrap();

    let saved = tree.read("samtools");
    assert!(saved.contains("  number: 4  # bumped for htslib"));
    assert!(saved.contains("{{ pin_subpackage('samtools', max_pin='x.x') }}"));
    assert!(saved.contains("- ncurses  # [not win]"));

    let reloaded = Recipe::load(&tree.recipes_path(), "samtools").unwrap();
    assert_eq!(reloaded.build_number().unwrap(), 4);
}

#[test]
fn test_nested_recipe_directories() {
    let tree = RecipeTree::new();
    tree.add_simple("blast", "2.9.0", "https://example.org/blast-2.9.0.tar.gz");
    tree.add_simple("blast/2.2.31", "2.2.31", "https://example.org/blast-2.2.31.tar.gz");

    let report = scan_recipes(&tree.recipes_path(), 2).unwrap();
    let recipes: Vec<&str> = report.sources.iter().map(|s| s.recipe.as_str()).collect();
    assert_eq!(recipes, vec!["blast", "blast/2.2.31"]);
    assert!(report.sources.iter().all(|s| s.name == "blast"));

    let shallow = scan_recipes(&tree.recipes_path(), 1).unwrap();
    assert_eq!(shallow.len(), 1);
}

#[test]
fn test_load_sources_by_reldir() {
    let tree = RecipeTree::new();
    tree.add_simple("bwa", "0.7.17", "https://example.org/bwa.tar.gz");
    tree.add_simple("hisat2", "2.1.0", "https://example.org/hisat2.zip");

    let sources = load_sources(&tree.recipes_path(), &["hisat2".to_string()]).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].url, "https://example.org/hisat2.zip");

    assert!(load_sources(&tree.recipes_path(), &["missing".to_string()]).is_err());
}

#[test]
fn test_recipe_without_source_is_not_listed() {
    let tree = RecipeTree::new();
    tree.add_raw(
        "meta-package",
        "package:\n  name: meta-package\n  version: \"1.0\"\nbuild:\n  number: 0\n",
    );
    tree.add_simple("bwa", "0.7.17", "https://example.org/bwa.tar.gz");

    let report = scan_recipes(&tree.recipes_path(), 2).unwrap();
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].recipe, "meta-package");
}
