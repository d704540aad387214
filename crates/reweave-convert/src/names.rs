//! Passage names across a conversion.

use std::collections::{HashMap, HashSet};

use reweave_core::pipeline::PassageNames;
use reweave_core::{Dialect, Story};
use reweave_dialect_ink::ident;

/// Output names for a story's passages.
///
/// Toward Ink every name becomes an identifier path, with collisions and
/// the `END` / `DONE` keywords avoided; from Ink, a divert to a bare stitch
/// name resolves against the knot it is written in.
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    renamed: HashMap<String, String>,
    order: Vec<String>,
    known: HashSet<String>,
    relative_stitches: bool,
    sanitize: bool,
}

impl NameMap {
    pub fn new(story: &Story, target: Dialect) -> Self {
        let mut map = Self {
            known: story.passage_names().map(str::to_string).collect(),
            relative_stitches: story.format == Dialect::Ink,
            sanitize: target == Dialect::Ink && story.format != Dialect::Ink,
            ..Self::default()
        };
        if map.sanitize {
            let mut used = HashSet::new();
            for name in story.passage_names() {
                let mut candidate = ident::sanitize_path(name);
                if matches!(candidate.as_str(), "END" | "DONE") {
                    candidate.push('_');
                }
                let base = candidate.clone();
                let mut n = 2;
                while used.contains(&candidate) {
                    candidate = format!("{base}_{n}");
                    n += 1;
                }
                used.insert(candidate.clone());
                if candidate != name {
                    map.order.push(name.to_string());
                    map.renamed.insert(name.to_string(), candidate);
                }
            }
        }
        map
    }

    /// Output name of the passage called `original`.
    pub fn name(&self, original: &str) -> String {
        match self.renamed.get(original) {
            Some(name) => name.clone(),
            None if self.sanitize => ident::sanitize_path(original),
            None => original.to_string(),
        }
    }

    /// `(original, new)` for every passage whose name changed, in story
    /// order.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.order
            .iter()
            .filter_map(|o| self.renamed.get(o).map(|n| (o.as_str(), n.as_str())))
    }

    fn qualify(&self, target: &str, from: &str) -> String {
        if self.relative_stitches && !target.contains('.') {
            let knot = from.split('.').next().unwrap_or(from);
            let stitch = format!("{knot}.{target}");
            if self.known.contains(&stitch) {
                return stitch;
            }
        }
        target.to_string()
    }
}

impl PassageNames for NameMap {
    fn resolve(&self, target: &str, from: &str) -> String {
        self.name(&self.qualify(target, from))
    }
}

#[cfg(test)]
mod tests {
    use reweave_core::Passage;

    use super::*;

    fn story(format: Dialect, names: &[&str]) -> Story {
        let mut story = Story::new("T", format);
        story.passages = names.iter().map(|n| Passage::new(*n, "")).collect();
        story
    }

    #[test]
    fn test_names_sanitized_for_ink() {
        let s = story(Dialect::Harlowe, &["Town Square", "Town-Square", "END", "ok"]);
        let names = NameMap::new(&s, Dialect::Ink);
        assert_eq!(names.name("Town Square"), "Town_Square");
        assert_eq!(names.name("Town-Square"), "Town_Square_2");
        assert_eq!(names.name("END"), "END_");
        assert_eq!(names.name("ok"), "ok");
        assert_eq!(names.renames().count(), 3);
        assert_eq!(names.resolve("Town Square", "ok"), "Town_Square");
    }

    #[test]
    fn test_twine_names_kept_between_twine_formats() {
        let s = story(Dialect::Harlowe, &["Town Square"]);
        let names = NameMap::new(&s, Dialect::SugarCube);
        assert_eq!(names.resolve("Town Square", "x"), "Town Square");
        assert_eq!(names.renames().count(), 0);
    }

    #[test]
    fn test_relative_stitch_diverts() {
        let s = story(Dialect::Ink, &["vault", "vault.inside", "inside"]);
        let names = NameMap::new(&s, Dialect::Harlowe);
        assert_eq!(names.resolve("inside", "vault"), "vault.inside");
        assert_eq!(names.resolve("inside", "vault.inside"), "vault.inside");
        assert_eq!(names.resolve("inside", "Start"), "inside");
        assert_eq!(names.resolve("vault", "vault.inside"), "vault");
    }
}
