//! Property-based tests for template rendering and build number edits

#[cfg(test)]
mod tests {
    use crate::recipe::selector::apply_selectors;
    use crate::recipe::template::render;
    use crate::recipe::{rewrite_build_number, Recipe};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn version() -> impl Strategy<Value = String> {
        "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}"
    }

    fn package_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,20}"
    }

    fn meta(name: &str, version: &str, number: u64, comment: bool) -> String {
        let comment = if comment { "  # keep" } else { "" };
        format!(
            "{{% set version = \"{version}\" %}}\npackage:\n  name: {name}\n  version: {{{{ version }}}}\nsource:\n  url: https://example.org/{name}-{{{{ version }}}}.tar.gz\nbuild:\n  number: {number}{comment}\n  skip: True  # [win]\n"
        )
    }

    proptest! {
        #[test]
        fn prop_text_without_tags_renders_unchanged(text in "[a-zA-Z0-9 :#\\-\n]{0,200}") {
            let (rendered, vars) = render(&text).unwrap();
            prop_assert_eq!(rendered, text);
            prop_assert!(vars.is_empty());
        }

        #[test]
        fn prop_set_variable_substitutes(value in "[a-zA-Z0-9._-]{0,30}") {
            let source = format!("{{% set v = \"{value}\" %}}x{{{{ v }}}}y");
            let (rendered, _) = render(&source).unwrap();
            prop_assert_eq!(rendered, format!("x{value}y"));
        }

        #[test]
        fn prop_lines_without_selector_survive(text in "[a-zA-Z0-9 :\\-\n]{0,200}") {
            prop_assert_eq!(apply_selectors(&text), text);
        }

        #[test]
        fn prop_version_text_is_kept(name in package_name(), version in version()) {
            let recipe = Recipe::from_text(
                name.clone(),
                PathBuf::from("meta.yaml"),
                meta(&name, &version, 0, false),
            ).unwrap();
            prop_assert_eq!(recipe.version().unwrap(), version.clone());
            prop_assert_eq!(
                recipe.get_str("source/url").unwrap(),
                format!("https://example.org/{name}-{version}.tar.gz")
            );
        }

        #[test]
        fn prop_increment_changes_only_build_number(
            name in package_name(),
            version in version(),
            number in 0u64..1000,
            comment in any::<bool>(),
        ) {
            let raw = meta(&name, &version, number, comment);
            let mut recipe = Recipe::from_text(name.clone(), PathBuf::from("meta.yaml"), raw.clone()).unwrap();
            prop_assert_eq!(recipe.increment_build_number().unwrap(), (number, number + 1));

            let expected = meta(&name, &version, number + 1, comment);
            prop_assert_eq!(recipe.raw(), expected.as_str());
        }

        #[test]
        fn prop_rewrite_is_idempotent(number in 0u64..10_000) {
            let raw = meta("pkg", "1.0", 7, true);
            let once = rewrite_build_number(&raw, number).unwrap();
            let twice = rewrite_build_number(&once, number).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
