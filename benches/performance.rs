//! Performance benchmarks for recipe processing
//!
//! Covers the hot paths of a full run over bioconda-recipes:
//! - Template rendering and selector evaluation
//! - Recipe parsing and build number rewriting
//! - Scanning a recipes folder

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use recipe_candidate_finder::recipe::selector::apply_selectors;
use recipe_candidate_finder::recipe::template::render;
use recipe_candidate_finder::recipe::{rewrite_build_number, Recipe};
use recipe_candidate_finder::scanner::scan_recipes;
use std::hint::black_box as hint_black_box;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const RECIPE: &str = r#"{% set name = "Kallisto" %}
{% set version = "0.46.1" %}
{% set sha256 = "492ef081395e8858fcd9832aceb8b61c79358f00afb45e6709146c0fb51dd231" %}

package:
  name: {{ name|lower }}
  version: {{ version }}

source:
  url: https://github.com/pachterlab/{{ name|lower }}/archive/v{{ version }}.tar.gz
  sha256: {{ sha256 }}

build:
  number: 2
  skip: True  # [osx and py < 36]

requirements:
  build:
    - {{ compiler('cxx') }}
    - cmake
    - make
  host:
    - hdf5
    - zlib
  run:
    - hdf5

test:
  commands:
    - kallisto version
"#;

fn bench_template(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");

    group.bench_function("render", |b| {
        b.iter(|| {
            let rendered = render(black_box(RECIPE));
            hint_black_box(rendered)
        });
    });

    let (rendered, _) = render(RECIPE).expect("recipe renders");
    group.bench_function("apply_selectors", |b| {
        b.iter(|| hint_black_box(apply_selectors(black_box(&rendered))));
    });

    group.finish();
}

fn bench_recipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("recipe");

    group.bench_function("parse", |b| {
        b.iter(|| {
            let recipe = Recipe::from_text("kallisto", PathBuf::from("meta.yaml"), RECIPE.to_string());
            hint_black_box(recipe)
        });
    });

    group.bench_function("rewrite_build_number", |b| {
        b.iter(|| hint_black_box(rewrite_build_number(black_box(RECIPE), 3)));
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_recipes");
    group.sample_size(20);

    for count in [10usize, 100] {
        let dir = TempDir::new().expect("create temp dir");
        let recipes = dir.path().join("recipes");
        for i in 0..count {
            let recipe_dir = recipes.join(format!("pkg{i}"));
            fs::create_dir_all(&recipe_dir).expect("create recipe dir");
            fs::write(
                recipe_dir.join("meta.yaml"),
                RECIPE.replace("Kallisto", &format!("Pkg{i}")),
            )
            .expect("write meta.yaml");
        }
        group.bench_with_input(BenchmarkId::from_parameter(count), &recipes, |b, recipes| {
            b.iter(|| hint_black_box(scan_recipes(recipes, 2)));
        });
    }

    group.finish();
}

fn performance_benches(c: &mut Criterion) {
    bench_template(c);
    bench_recipe(c);
    bench_scan(c);
}

criterion_group!(benches, performance_benches);
criterion_main!(benches);
