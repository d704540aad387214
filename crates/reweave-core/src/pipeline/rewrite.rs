//! Segment-based passage rewriting.
//!
//! A passage starts as one [`Segment::Source`]. Rules run in a fixed order;
//! each rule only scans `Source` segments and splits them around the
//! occurrences it finds, replacing each occurrence with frozen
//! [`Segment::Emitted`] target text plus any bodies, which go back in as
//! `Source` for the same rule and every later one. Text no rule claims is
//! passed through verbatim, so rewriting is total and plain prose is left
//! byte-identical.
//!
//! Because emitted text is frozen, rule order decides which of two
//! overlapping constructs wins: a rule claims its span before any later
//! rule can see inside it.

use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, warn};

use crate::construct::{Assign, ConstructKind, Occurrence};
use crate::matrix::{Classification, CompatibilityMatrix, Severity};
use crate::report::{ConversionReportEntry, EntryDetail, EntryType, ReportSink};
use crate::scan::line_of;
use crate::story::Passage;
use crate::syntax::{Emission, Layout, LexContext, Syntax};

use super::config::{ConvertOptions, LossPolicy};
use super::lower::{body_guards, sub_features, Lowering};

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Text not yet claimed by any rule.
    Source {
        text: String,
        /// Byte offset in the passage content, when known.
        offset: Option<usize>,
        /// Target-syntax conditions under which this text runs.
        guards: Vec<String>,
    },
    Emitted {
        text: String,
        layout: Layout,
    },
}

/// Output of one rule application.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Emit(String, Layout),
    /// Source text to be rewritten further, optionally under a new guard.
    Nested { text: String, guard: Option<String> },
}

/// Where an occurrence sits.
#[derive(Debug, Clone, Copy)]
pub struct Site<'g> {
    pub guards: &'g [String],
    pub line: Option<u32>,
}

/// How passage names are written in the output.
pub trait PassageNames: Send + Sync {
    /// Output name for a reference to `target` made from passage `from`.
    fn resolve(&self, target: &str, from: &str) -> String;
}

/// Names carried through unchanged.
pub struct SameNames;

impl PassageNames for SameNames {
    fn resolve(&self, target: &str, _from: &str) -> String {
        target.to_string()
    }
}

/// Everything a conversion shares across passages.
#[derive(Clone, Copy)]
pub struct RewriteEnv<'a> {
    pub source: &'a dyn Syntax,
    pub target: &'a dyn Syntax,
    pub matrix: &'a CompatibilityMatrix,
    pub options: &'a ConvertOptions,
    pub names: &'a dyn PassageNames,
    pub passage_names: &'a HashSet<String>,
}

/// Per-passage rewriting state.
pub struct RewriteContext<'a> {
    pub env: RewriteEnv<'a>,
    pub passage: &'a str,
    pub content: &'a str,
    pub lex: LexContext<'a>,
    sink: Option<&'a mut dyn ReportSink>,
    hoisted: Vec<(Assign, Option<String>)>,
}

impl<'a> RewriteContext<'a> {
    pub fn new(
        env: RewriteEnv<'a>,
        passage: &'a Passage,
        sink: Option<&'a mut dyn ReportSink>,
    ) -> Self {
        let mut lex = LexContext::new(env.passage_names);
        lex.temps = env.source.temporaries(&passage.content);
        Self {
            env,
            passage: &passage.name,
            content: &passage.content,
            lex,
            sink,
            hoisted: Vec::new(),
        }
    }

    /// Assignments placed ahead of anything the passage itself hoists.
    pub fn with_hoisted(mut self, hoisted: Vec<(Assign, Option<String>)>) -> Self {
        self.hoisted = hoisted;
        self
    }

    pub fn record(&mut self, entry_type: EntryType, feature: &str, detail: EntryDetail) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.record(ConversionReportEntry::new(
                entry_type,
                feature,
                self.passage,
                detail,
            ));
        }
    }

    /// Record a feature whose classification comes straight from the
    /// matrix (sub-features, expression-level features).
    fn record_feature(&mut self, feature: &str, line: Option<u32>) {
        let detail = EntryDetail::default().line(line);
        let matrix = self.env.matrix;
        match matrix.lookup(feature) {
            Some(rule) => {
                let (entry_type, detail) = match rule.classification {
                    Classification::Converted => (EntryType::Converted, detail),
                    Classification::Approximated => (
                        EntryType::Approximated,
                        detail.notes(rule.notes.clone()).severity(rule.severity),
                    ),
                    Classification::Incompatible => (
                        EntryType::Lost,
                        detail.notes(rule.notes.clone()).severity(rule.severity),
                    ),
                };
                self.record(entry_type, feature, detail);
            }
            None => self.record_unknown(feature, detail),
        }
    }

    fn record_unknown(&mut self, feature: &str, detail: EntryDetail) {
        warn!(
            feature,
            source = %self.env.source.dialect(),
            target = %self.env.target.dialect(),
            "feature missing from compatibility matrix"
        );
        self.record(
            EntryType::Lost,
            feature,
            detail
                .notes(Some("feature not covered by the compatibility matrix".into()))
                .severity(Some(Severity::Warning)),
        );
    }

    fn hoist(&mut self, assigns: Vec<Assign>, guards: &[String]) {
        let target = self.env.target;
        let guard = guards
            .iter()
            .cloned()
            .reduce(|a, b| target.conjoin(&a, &b));
        self.hoisted
            .extend(assigns.into_iter().map(|a| (a, guard.clone())));
    }

    fn lost_pieces(&self, feature: &str, original: &str) -> Vec<Piece> {
        let text = match self.env.options.loss_policy {
            LossPolicy::Comment => self
                .env
                .target
                .comment(&format!("reweave: lost {feature}: {original}")),
            LossPolicy::Verbatim => original.to_string(),
        };
        vec![Piece::Emit(text, Layout::Inline)]
    }
}

/// One step of a rewrite pipeline.
pub trait RewriteRule: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ConstructKind;

    fn find(&self, text: &str, cx: &RewriteContext<'_>) -> Vec<Occurrence>;

    fn rewrite(
        &self,
        occ: Occurrence,
        original: &str,
        site: Site<'_>,
        cx: &mut RewriteContext<'_>,
    ) -> Vec<Piece>;
}

/// The rule for one construct kind: extract with the source dialect, look
/// the feature up in the pair's matrix, lower and emit with the target.
pub struct ConstructRule {
    kind: ConstructKind,
}

impl ConstructRule {
    pub fn new(kind: ConstructKind) -> Self {
        Self { kind }
    }
}

impl RewriteRule for ConstructRule {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn kind(&self) -> ConstructKind {
        self.kind
    }

    fn find(&self, text: &str, cx: &RewriteContext<'_>) -> Vec<Occurrence> {
        cx.env.source.extract(self.kind, text, &cx.lex)
    }

    fn rewrite(
        &self,
        occ: Occurrence,
        original: &str,
        site: Site<'_>,
        cx: &mut RewriteContext<'_>,
    ) -> Vec<Piece> {
        let env = cx.env;
        let feature = occ.feature;
        let detail = EntryDetail::default().line(site.line).original(original);

        let Some(rule) = env.matrix.lookup(feature) else {
            cx.record_unknown(feature, detail);
            return cx.lost_pieces(feature, original);
        };
        if rule.classification == Classification::Incompatible {
            debug!(passage = cx.passage, feature, "construct lost");
            cx.record(
                EntryType::Lost,
                feature,
                detail.notes(rule.notes.clone()).severity(rule.severity),
            );
            return cx.lost_pieces(feature, original);
        }

        let (construct, expr_features) = {
            let mut lowering = Lowering::new(cx);
            let construct = lowering.lower(occ.construct);
            (construct, lowering.features)
        };
        let Some(emission) = env.target.emit(&construct) else {
            debug!(passage = cx.passage, feature, "no target syntax");
            cx.record(
                EntryType::Lost,
                feature,
                detail
                    .notes(Some(format!("{} has no syntax for this construct", env.target.dialect())))
                    .severity(Some(Severity::Warning)),
            );
            return cx.lost_pieces(feature, original);
        };

        let detail = detail.result(preview(&emission));
        match rule.classification {
            Classification::Converted => cx.record(EntryType::Converted, feature, detail),
            _ => cx.record(
                EntryType::Approximated,
                feature,
                detail.notes(rule.notes.clone()).severity(rule.severity),
            ),
        }
        for sub in sub_features(&construct).into_iter().chain(expr_features) {
            cx.record_feature(sub, site.line);
        }

        match emission {
            Emission::Text(text, layout) => vec![Piece::Emit(text, layout)],
            Emission::Hoist { assigns, text } => {
                cx.hoist(assigns, site.guards);
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Piece::Emit(text, Layout::Inline)]
                }
            }
            Emission::Block(parts) => {
                let guards = body_guards(&construct, env.target);
                let bodies = construct.bodies();
                let mut parts = parts.into_iter();
                let mut pieces = Vec::new();
                for (body, guard) in bodies.into_iter().zip(guards) {
                    if let Some((text, layout)) = parts.next() {
                        pieces.push(Piece::Emit(text, layout));
                    }
                    pieces.push(Piece::Nested {
                        text: body.to_string(),
                        guard,
                    });
                }
                pieces.extend(parts.map(|(text, layout)| Piece::Emit(text, layout)));
                pieces
            }
        }
    }
}

fn preview(emission: &Emission) -> String {
    match emission {
        Emission::Text(text, _) => text.clone(),
        Emission::Block(parts) => parts
            .iter()
            .map(|(p, _)| p.trim())
            .collect::<Vec<_>>()
            .join(" … "),
        Emission::Hoist { assigns, text } => {
            let mut out: Vec<String> = assigns
                .iter()
                .map(|a| format!("{}: {}", a.target, a.value))
                .collect();
            if !text.is_empty() {
                out.push(text.clone());
            }
            out.join("; ")
        }
    }
}

/// An ordered sequence of rewrite rules for one dialect pair.
#[derive(Default)]
pub struct RewritePipeline {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl RewritePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline of [`ConstructRule`]s in the given order.
    pub fn with_order(order: &[ConstructKind]) -> Self {
        let mut pipeline = Self::new();
        for kind in order {
            pipeline.add(Box::new(ConstructRule::new(*kind)));
        }
        pipeline
    }

    pub fn add(&mut self, rule: Box<dyn RewriteRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn kinds(&self) -> Vec<ConstructKind> {
        self.rules.iter().map(|r| r.kind()).collect()
    }

    /// Rewrite the context's passage.
    pub fn rewrite(&self, cx: &mut RewriteContext<'_>) -> String {
        let mut segments = vec![Segment::Source {
            text: cx.content.to_string(),
            offset: Some(0),
            guards: Vec::new(),
        }];
        for rule in &self.rules {
            if !cx.env.options.rules.is_enabled(rule.kind()) {
                continue;
            }
            let mut next = Vec::with_capacity(segments.len());
            for seg in segments {
                self.apply(rule.as_ref(), seg, cx, &mut next);
            }
            segments = next;
        }
        debug!(passage = cx.passage, segments = segments.len(), "passage rewritten");
        let body = render(&segments);
        let hoisted = std::mem::take(&mut cx.hoisted);
        cx.env.target.finish_passage(body, hoisted)
    }

    fn apply(
        &self,
        rule: &dyn RewriteRule,
        seg: Segment,
        cx: &mut RewriteContext<'_>,
        out: &mut Vec<Segment>,
    ) {
        let Segment::Source {
            text,
            offset,
            guards,
        } = seg
        else {
            out.push(seg);
            return;
        };
        let occurrences = rule.find(&text, cx);
        if occurrences.is_empty() {
            out.push(Segment::Source {
                text,
                offset,
                guards,
            });
            return;
        }

        let mut cursor = 0;
        for occ in occurrences {
            let range = occ.range.clone();
            if range.start < cursor || range.end > text.len() || range.is_empty() {
                continue;
            }
            let original = &text[range.clone()];
            let site = Site {
                guards: &guards,
                line: offset.map(|o| line_of(cx.content, o + range.start)),
            };
            let pieces = rule.rewrite(occ, original, site, cx);
            // A construct that leaves nothing behind takes its line with it.
            let span = if pieces.is_empty() {
                own_line(&text, &range)
                    .filter(|line| line.start >= cursor)
                    .unwrap_or(range.clone())
            } else {
                range.clone()
            };
            if span.start > cursor {
                out.push(Segment::Source {
                    text: text[cursor..span.start].to_string(),
                    offset: offset.map(|o| o + cursor),
                    guards: guards.clone(),
                });
            }
            for piece in pieces {
                match piece {
                    Piece::Emit(text, layout) => out.push(Segment::Emitted { text, layout }),
                    Piece::Nested { text: body, guard } => {
                        let body_offset = offset.and_then(|o| {
                            original
                                .find(body.as_str())
                                .filter(|_| !body.is_empty())
                                .map(|i| o + range.start + i)
                        });
                        let mut body_guards = guards.clone();
                        body_guards.extend(guard);
                        self.apply(
                            rule,
                            Segment::Source {
                                text: body,
                                offset: body_offset,
                                guards: body_guards,
                            },
                            cx,
                            out,
                        );
                    }
                }
            }
            cursor = span.end;
        }
        if cursor < text.len() {
            out.push(Segment::Source {
                text: text[cursor..].to_string(),
                offset: offset.map(|o| o + cursor),
                guards,
            });
        }
    }
}

/// The whole line holding `range`, line break included, when nothing else
/// is on it.
fn own_line(text: &str, range: &Range<usize>) -> Option<Range<usize>> {
    let start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let end = range.end + text[range.end..].find('\n')? + 1;
    let blank = |s: &str| s.trim().is_empty();
    (blank(&text[start..range.start]) && blank(&text[range.end..end - 1])).then_some(start..end)
}

/// Concatenate segments, putting [`Layout::Line`] pieces on lines of their
/// own.
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut break_pending = false;
    for seg in segments {
        let (text, layout) = match seg {
            Segment::Source { text, .. } => (text.as_str(), Layout::Inline),
            Segment::Emitted { text, layout } => (text.as_str(), *layout),
        };
        if text.is_empty() {
            continue;
        }
        match layout {
            Layout::Inline if break_pending => {
                let trimmed = text.trim_start_matches([' ', '\t']);
                if trimmed.is_empty() {
                    continue;
                }
                if !trimmed.starts_with('\n') {
                    out.push('\n');
                }
                out.push_str(trimmed);
                break_pending = false;
            }
            Layout::Inline => out.push_str(text),
            Layout::Line => {
                if !out.is_empty() && !out.ends_with('\n') {
                    let kept = out.trim_end_matches([' ', '\t']).len();
                    out.truncate(kept);
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                out.push_str(text);
                break_pending = true;
            }
        }
    }
    out
}

/// Every top-level occurrence in `content`, found by running `syntax`'s
/// extractors in `order` over the text not yet claimed. Ranges are absolute
/// and the result is sorted by position.
pub fn extract_all(
    syntax: &dyn Syntax,
    content: &str,
    order: &[ConstructKind],
    cx: &LexContext<'_>,
) -> Vec<Occurrence> {
    let mut spans: Vec<(usize, &str)> = vec![(0, content)];
    let mut found = Vec::new();
    for kind in order {
        let mut next = Vec::with_capacity(spans.len());
        for (offset, text) in spans {
            let mut cursor = 0;
            for mut occ in syntax.extract(*kind, text, cx) {
                let range = occ.range.clone();
                if range.start < cursor || range.end > text.len() || range.is_empty() {
                    continue;
                }
                if range.start > cursor {
                    next.push((offset + cursor, &text[cursor..range.start]));
                }
                cursor = range.end;
                occ.range = offset + range.start..offset + range.end;
                found.push(occ);
            }
            if cursor < text.len() {
                next.push((offset + cursor, &text[cursor..]));
            }
        }
        spans = next;
    }
    found.sort_by_key(|o| o.range.start);
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(text: &str) -> Segment {
        Segment::Source {
            text: text.into(),
            offset: None,
            guards: Vec::new(),
        }
    }

    fn emitted(text: &str, layout: Layout) -> Segment {
        Segment::Emitted {
            text: text.into(),
            layout,
        }
    }

    #[test]
    fn own_line_covers_a_lone_construct_and_its_break() {
        let text = "Hi.\n  ~ x = 1\nBye.";
        let start = text.find('~').unwrap();
        let range = start..start + "~ x = 1".len();
        assert_eq!(own_line(text, &range), Some(4..text.len() - 4));
    }

    #[test]
    fn own_line_rejects_shared_or_last_lines() {
        let text = "Hi. ~ x = 1\nBye. ~ y = 2";
        let first = text.find('~').unwrap();
        assert_eq!(own_line(text, &(first..first + 7)), None);
        let last = text.rfind('~').unwrap();
        assert_eq!(own_line(text, &(last..text.len())), None);
    }

    #[test]
    fn render_passes_inline_text_through() {
        let segs = vec![src("Hello "), emitted("$name", Layout::Inline), src("!")];
        assert_eq!(render(&segs), "Hello $name!");
    }

    #[test]
    fn render_puts_line_pieces_on_their_own_line() {
        let segs = vec![
            src("You find gold. "),
            emitted("~ gold = gold + 1", Layout::Line),
            src(" Then you leave."),
        ];
        assert_eq!(render(&segs), "You find gold.\n~ gold = gold + 1\nThen you leave.");
    }

    #[test]
    fn render_does_not_double_existing_breaks() {
        let segs = vec![
            src("a\n"),
            emitted("[if x]", Layout::Line),
            src("\nb\n"),
            emitted("[continue]", Layout::Line),
        ];
        assert_eq!(render(&segs), "a\n[if x]\nb\n[continue]");
    }
}
