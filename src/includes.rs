//! Discovery of the templates a template source declares it depends on.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// `{% include "x" %}`, `{% extends 'x' %}`, `{% import "x" as y %}` and
/// `{% from "x" import y %}` with optional whitespace control. The third
/// group catches `ignore missing`.
static DEPENDENCY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{%[-+]?\s*(?:include|extends|import|from)\s+(?:"([^"]+)"|'([^']+)')(\s+ignore\s+missing\b)?"#,
    )
    .expect("dependency tag pattern is valid")
});

/// Returns the template names referenced by literal include-like tags, in
/// order of first appearance, each with whether the tag tolerates the
/// template being absent (`ignore missing`).
///
/// Dynamic references (`{% include page_name %}`) cannot be known before
/// expansion and are not reported. A name referenced both ways is required.
pub fn declared(source: &str) -> Vec<(String, bool)> {
    let mut found: Vec<(String, bool)> = Vec::new();
    for caps in DEPENDENCY_TAG.captures_iter(source) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let name = name.as_str().trim();
        if name.is_empty() {
            continue;
        }
        let optional = caps.get(3).is_some();
        match found.iter_mut().find(|(known, _)| known == name) {
            Some((_, known_optional)) => *known_optional &= optional,
            None => found.push((name.to_string(), optional)),
        }
    }
    found
}

/// Maps a template name onto a source path under `root`.
///
/// Names are relative to the source root, use `/` as separator and may not
/// escape the root.
pub fn resolve_name(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return None;
    }
    Some(relative.components().fold(root.to_path_buf(), |path, c| match c {
        Component::Normal(part) => path.join(part),
        _ => path,
    }))
}

/// Source paths a template depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Every referenced path.
    pub all: BTreeSet<PathBuf>,
    /// The subset referenced with `ignore missing`; their absence is fine.
    pub optional: BTreeSet<PathBuf>,
}

/// Source paths `source` depends on.
pub fn dependencies(root: &Path, source: &str) -> Dependencies {
    let mut dependencies = Dependencies::default();
    for (name, optional) in declared(source) {
        let Some(path) = resolve_name(root, &name) else {
            continue;
        };
        if optional {
            dependencies.optional.insert(path.clone());
        }
        dependencies.all.insert(path);
    }
    dependencies
}

/// Template name of `path`: its `/`-separated location relative to `root`.
pub fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    parts.map(|parts| parts.join("/")).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared_names(source: &str) -> Vec<String> {
        declared(source).into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn finds_every_tag_kind() {
        let source = r#"
{% extends "base.tpl" %}
{% include 'partials/header.tpl' %}
{%- import "macros.tpl" as m -%}
{% from "forms.tpl" import input %}
"#;
        assert_eq!(
            declared_names(source),
            vec!["base.tpl", "partials/header.tpl", "macros.tpl", "forms.tpl"]
        );
    }

    #[test]
    fn only_literal_tag_names_count() {
        let source = r#"
{% include page_name %}
include "not-a-tag.tpl"
{{ "{% include 'escaped.tpl' %}" }}
"#;
        // The string inside an expression still looks like a tag, which is
        // an acceptable over-approximation for a dependency edge.
        assert_eq!(declared_names(source), vec!["escaped.tpl"]);
    }

    #[test]
    fn repeated_names_are_reported_once() {
        let source = r#"{% include "a.tpl" %}{% include "a.tpl" %}"#;
        assert_eq!(declared_names(source), vec!["a.tpl"]);
    }

    #[test]
    fn resolves_names_under_root() {
        let root = Path::new("/t/src");
        assert_eq!(
            resolve_name(root, "partials/header.tpl"),
            Some(PathBuf::from("/t/src/partials/header.tpl"))
        );
        assert_eq!(resolve_name(root, "./a.tpl"), Some(PathBuf::from("/t/src/a.tpl")));
        assert_eq!(resolve_name(root, "../secret.tpl"), None);
        assert_eq!(resolve_name(root, "/etc/passwd"), None);
    }

    #[test]
    fn dependencies_resolve_against_root() {
        let deps = dependencies(Path::new("/t/src"), r#"{% include "a.tpl" %}"#);
        assert_eq!(deps.all.into_iter().collect::<Vec<_>>(), vec![PathBuf::from("/t/src/a.tpl")]);
        assert!(deps.optional.is_empty());
    }

    #[test]
    fn ignore_missing_marks_a_dependency_optional() {
        let source = r#"
{% include "banner.html" ignore missing %}
{%- include 'ads.tpl' ignore   missing -%}
{% include "footer.tpl" %}
"#;
        assert_eq!(
            declared(source),
            vec![
                ("banner.html".to_string(), true),
                ("ads.tpl".to_string(), true),
                ("footer.tpl".to_string(), false),
            ]
        );

        let deps = dependencies(Path::new("/t/src"), source);
        assert_eq!(deps.all.len(), 3);
        assert_eq!(
            deps.optional,
            BTreeSet::from([PathBuf::from("/t/src/banner.html"), PathBuf::from("/t/src/ads.tpl")])
        );
    }

    #[test]
    fn a_required_reference_wins_over_an_optional_one() {
        let source = r#"{% include "a.tpl" ignore missing %}{% include "a.tpl" %}"#;
        assert_eq!(declared(source), vec![("a.tpl".to_string(), false)]);
    }

    #[test]
    fn template_names_use_forward_slashes() {
        let root = Path::new("/t/src");
        assert_eq!(
            template_name(root, &root.join("pages").join("index.tpl")),
            Some("pages/index.tpl".to_string())
        );
        assert_eq!(template_name(root, Path::new("/elsewhere/a.tpl")), None);
        assert_eq!(template_name(root, root), None);
    }
}
