//! The seam between the dialect-agnostic pipeline and a concrete dialect.

use std::collections::HashSet;

use crate::construct::{Assign, Construct, ConstructKind, Occurrence};
use crate::dialect::Dialect;
use crate::expr::{ExprPrinter, Token};

/// One entry of a dialect's source vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: ConstructKind,
    /// Regex that finds the feature in raw text; becomes the matrix rule's
    /// match pattern.
    pub pattern: &'static str,
}

impl FeatureSpec {
    pub const fn new(name: &'static str, kind: ConstructKind, pattern: &'static str) -> Self {
        Self {
            name,
            kind,
            pattern,
        }
    }
}

/// Story context available while lexing a passage.
#[derive(Debug, Clone, Default)]
pub struct LexContext<'a> {
    /// All passage names in the story (Ink bare knot names read as visit
    /// counts).
    pub passage_names: Option<&'a HashSet<String>>,
    /// Temporary variables declared in the current passage.
    pub temps: HashSet<String>,
}

impl<'a> LexContext<'a> {
    pub fn new(passage_names: &'a HashSet<String>) -> Self {
        Self {
            passage_names: Some(passage_names),
            temps: HashSet::new(),
        }
    }

    pub fn is_passage(&self, name: &str) -> bool {
        self.passage_names.is_some_and(|names| names.contains(name))
    }
}

/// How an emitted piece sits in the surrounding text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Inline,
    /// Must occupy whole lines; the renderer inserts line breaks around it.
    Line,
}

/// Target-dialect rendering of one lowered construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Text(String, Layout),
    /// Fixed parts interleaved with the construct's bodies:
    /// `parts[0] body[0] parts[1] ... body[n-1] parts[n]`.
    Block(Vec<(String, Layout)>),
    /// Assignments the target can only state at the top of a passage,
    /// plus text left in place.
    Hoist { assigns: Vec<Assign>, text: String },
}

impl Emission {
    pub fn inline(text: impl Into<String>) -> Self {
        Emission::Text(text.into(), Layout::Inline)
    }

    pub fn line(text: impl Into<String>) -> Self {
        Emission::Text(text.into(), Layout::Line)
    }

    pub fn block_inline<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Emission::Block(parts.into_iter().map(|p| (p.into(), Layout::Inline)).collect())
    }
}

/// A dialect, seen from both sides of a conversion.
///
/// As a source it recognizes constructs and lexes expressions; as a target
/// it prints expressions (via [`ExprPrinter`]) and emits lowered
/// constructs.
pub trait Syntax: ExprPrinter + Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Source vocabulary: every feature name `extract` can produce.
    fn features(&self) -> &'static [FeatureSpec];

    /// Non-overlapping occurrences of `kind` in `text`, in position order.
    fn extract(&self, kind: ConstructKind, text: &str, cx: &LexContext<'_>) -> Vec<Occurrence>;

    fn lex(&self, expr: &str, cx: &LexContext<'_>) -> Vec<Token>;

    /// Temporary variables declared in a passage, for dialects whose temps
    /// carry no sigil.
    fn temporaries(&self, _content: &str) -> HashSet<String> {
        HashSet::new()
    }

    /// Render a construct whose expressions are already in this dialect's
    /// syntax. `None` when the dialect has no way to express it.
    fn emit(&self, construct: &Construct) -> Option<Emission>;

    fn comment(&self, text: &str) -> String;

    fn negate(&self, cond: &str) -> String;

    fn conjoin(&self, a: &str, b: &str) -> String;

    /// Place hoisted assignments (with their guards) into a rewritten
    /// passage body.
    fn finish_passage(&self, body: String, hoisted: Vec<(Assign, Option<String>)>) -> String {
        debug_assert!(hoisted.is_empty(), "{} does not hoist", self.dialect());
        body
    }
}
