//! Dialect-neutral story model shared by the format adapters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// A named unit of story text.
///
/// For Twine dialects this is a Twee passage; for Ink it is a knot, a
/// stitch (named `Knot.stitch`) or the implicit `Start` passage holding
/// content that precedes the first knot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Header metadata carried through untouched: the Twee `{...}` block,
    /// or the parameter list of an Ink knot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl Passage {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            tags: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Twine story JavaScript or stylesheet, carried through without
    /// rewriting.
    pub fn is_script_or_style(&self) -> bool {
        self.has_tag("script") || self.has_tag("stylesheet")
    }

    /// Passage run once before the story starts (`StoryInit` in SugarCube,
    /// any `startup`-tagged passage in Harlowe).
    pub fn is_init(&self) -> bool {
        self.name == "StoryInit" || self.has_tag("startup")
    }
}

/// A whole story in one dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub format: Dialect,
    pub passages: Vec<Passage>,
    /// Global variables declared outside passages (Ink `VAR`/`CONST`),
    /// values in the story's own expression syntax.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Name of the first passage shown, when it is not the first one listed.
    #[serde(default)]
    pub start: Option<String>,
    /// Twine `StoryData` block, kept so it can be rewritten on output.
    #[serde(default)]
    pub story_data: Option<serde_json::Value>,
}

impl Story {
    pub fn new(title: impl Into<String>, format: Dialect) -> Self {
        Self {
            title: title.into(),
            format,
            passages: Vec::new(),
            variables: BTreeMap::new(),
            start: None,
            story_data: None,
        }
    }

    pub fn passage(&self, name: &str) -> Option<&Passage> {
        self.passages.iter().find(|p| p.name == name)
    }

    /// The passage the story begins at: the explicit start, else the first
    /// non-script passage.
    pub fn start_passage(&self) -> Option<&str> {
        if let Some(start) = self.start.as_deref() {
            return Some(start);
        }
        self.passages
            .iter()
            .find(|p| !p.is_script_or_style() && !p.is_init())
            .map(|p| p.name.as_str())
    }

    pub fn passage_names(&self) -> impl Iterator<Item = &str> {
        self.passages.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_skips_init_and_script_passages() {
        let mut story = Story::new("T", Dialect::SugarCube);
        story.passages.push(Passage::new("StoryInit", "<<set $x to 1>>"));
        story.passages.push(Passage::new("Script", "x").with_tags(["script"]));
        story.passages.push(Passage::new("Intro", "Hello"));
        assert_eq!(story.start_passage(), Some("Intro"));

        story.start = Some("Other".into());
        assert_eq!(story.start_passage(), Some("Other"));
    }

    #[test]
    fn passage_tags() {
        let p = Passage::new("Setup", "").with_tags(["startup", "nobr"]);
        assert!(p.is_init());
        assert!(p.has_tag("nobr"));
        assert!(!p.is_script_or_style());
    }
}
