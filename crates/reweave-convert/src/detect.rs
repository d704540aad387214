//! Source dialect detection from story text.

use std::sync::LazyLock;

use regex::Regex;
use reweave_core::Dialect;
use tracing::debug;

static STORY_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""format"\s*:\s*"([^"]+)""#).expect("valid regex"));

/// Characteristic syntax per dialect, with a weight per hit.
static SIGNALS: LazyLock<Vec<(Dialect, Regex, usize)>> = LazyLock::new(|| {
    let table: &[(Dialect, &str, usize)] = &[
        (Dialect::Harlowe, r"\((?:set|put|if|else-if|unless|link-goto|go-to|display|print|either|a|dm|dropdown|cycling-link|live|click):", 3),
        (Dialect::Harlowe, r"\|[A-Za-z_]\w*>\[|\]<[A-Za-z_]\w*\||\?[A-Za-z_]\w*", 1),
        (Dialect::SugarCube, r"<<\s*(?:set|if|elseif|else|print|goto|include|link|linkreplace|textbox|checkbox|listbox|cycle|widget|timed|repeat)\b", 3),
        (Dialect::SugarCube, r"<</\w+>>", 2),
        (Dialect::Snowman, r"<%[=-]?", 3),
        (Dialect::Snowman, r"\bs\.[A-Za-z_]\w*", 1),
        (Dialect::Chapbook, r"(?m)^\[(?:if|unless|else|after|continue|note)\b[^\]]*\]\s*$", 3),
        (Dialect::Chapbook, r"\{(?:embed passage|reveal link|cycling link|dropdown menu|text input|back link|restart link)\b", 3),
        (Dialect::Chapbook, r"(?m)^--\s*$", 1),
        (Dialect::Ink, r"(?m)^\s*={2,}\s*(?:function\s+)?[A-Za-z_]\w*", 3),
        (Dialect::Ink, r"(?m)^\s*[*+]+\s*\[", 3),
        (Dialect::Ink, r"(?m)^\s*(?:VAR|CONST|LIST)\s+[A-Za-z_]\w*\s*=", 3),
        (Dialect::Ink, r"(?m)^\s*~\s", 2),
        (Dialect::Ink, r"->\s*(?:END|DONE)\b", 2),
    ];
    table
        .iter()
        .map(|(dialect, pattern, weight)| {
            (*dialect, Regex::new(pattern).expect("valid regex"), *weight)
        })
        .collect()
});

static TWEE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^::\s*\S").expect("valid regex"));

/// Guess the dialect a story is written in.
///
/// A Twee `StoryData` format name wins outright. Otherwise each dialect's
/// characteristic syntax is counted and the heaviest total wins; a Twee
/// file with no recognizable syntax reads as Harlowe, Twine's default.
pub fn detect_dialect(text: &str) -> Option<Dialect> {
    if let Some(dialect) = STORY_FORMAT
        .captures(text)
        .and_then(|c| Dialect::from_format_name(&c[1]))
    {
        return Some(dialect);
    }

    let is_twee = TWEE_HEADER.is_match(text);
    let mut scores = [0usize; Dialect::ALL.len()];
    for (dialect, pattern, weight) in SIGNALS.iter() {
        // Ink structure never appears in a Twee file.
        if is_twee && *dialect == Dialect::Ink {
            continue;
        }
        let i = Dialect::ALL.iter().position(|d| d == dialect).unwrap_or(0);
        scores[i] += pattern.find_iter(text).count() * weight;
    }
    debug!(?scores, "dialect scores");

    let best = Dialect::ALL
        .iter()
        .zip(scores)
        .filter(|(_, score)| *score > 0)
        .max_by_key(|(_, score)| *score)
        .map(|(dialect, _)| *dialect);
    match best {
        Some(dialect) => Some(dialect),
        None if is_twee => Some(Dialect::Harlowe),
        None => None,
    }
}
