//! Whole-story conversion.

use std::collections::{BTreeMap, HashSet};
use std::thread;

use reweave_core::expr::simple_var;
use reweave_core::pipeline::{extract_all, RewriteContext, RewriteEnv};
use reweave_core::{
    Assign, Classification, CompatibilityMatrix, Construct, ConversionReport,
    ConversionReportEntry, ConvertOptions, CoreError, Dialect, Emission, EntryDetail, EntryType,
    LexContext, LossPolicy, Passage, ReportSink, RewritePipeline, Story, Syntax,
};
use reweave_inkfile::{parse_ink, write_ink};
use reweave_twee::{parse_twee, write_twee};
use tracing::{debug, info};

use crate::names::NameMap;
use crate::orders::rule_order;
use crate::registry::{PairRewriter, RewriterRegistry};

/// Name of the passage global variables are set in, per Twine target that
/// has one.
fn init_passage(target: Dialect) -> Option<(&'static str, Option<&'static str>)> {
    match target {
        Dialect::Harlowe => Some(("Startup", Some("startup"))),
        Dialect::SugarCube => Some(("StoryInit", None)),
        _ => None,
    }
}

/// Result of converting one story.
#[derive(Debug)]
pub struct Conversion {
    /// The converted story in the target's file format.
    pub text: String,
    pub story: Story,
    pub report: Option<ConversionReport>,
    /// Problems found while reading the source text. None of them stop a
    /// conversion.
    pub issues: Vec<CoreError>,
}

/// Read a story file written in `dialect`: Twee for the Twine formats,
/// an `.ink` file for Ink.
pub fn parse_story(text: &str, dialect: Dialect) -> (Story, Vec<CoreError>) {
    if dialect.is_twine() {
        let parsed = parse_twee(text, dialect);
        let mut story = parsed.story;
        if story.format != dialect {
            debug!(declared = %story.format, used = %dialect, "story format overridden");
        }
        story.format = dialect;
        (story, parsed.issues)
    } else {
        (parse_ink(text), Vec::new())
    }
}

pub fn write_story(story: &Story) -> String {
    if story.format.is_twine() {
        write_twee(story)
    } else {
        write_ink(story)
    }
}

pub fn convert_text(
    registry: &RewriterRegistry,
    text: &str,
    source: Dialect,
    target: Dialect,
    options: &ConvertOptions,
) -> Result<Conversion, CoreError> {
    let (story, issues) = parse_story(text, source);
    let mut conversion = convert_story(registry, &story, target, options)?;
    conversion.issues = issues;
    Ok(conversion)
}

/// Convert `story` into `target`.
///
/// Converting a story into its own dialect returns it unchanged with an
/// empty report. Any other pair needs a rewriter in `registry`.
pub fn convert_story(
    registry: &RewriterRegistry,
    story: &Story,
    target: Dialect,
    options: &ConvertOptions,
) -> Result<Conversion, CoreError> {
    let source = story.format;
    if source == target {
        let report = options.with_report.then(|| {
            let mut report = ConversionReport::new(source, target);
            report.passage_count = story.passages.len();
            report
        });
        return Ok(Conversion {
            text: write_story(story),
            story: story.clone(),
            report,
            issues: Vec::new(),
        });
    }

    let pair = registry.get(source, target)?;
    let out = StoryConversion::new(pair, story, options).run();

    let report = options.with_report.then(|| {
        let mut report = ConversionReport::new(source, target);
        report.passage_count = out.passages.len();
        for entry in out.entries {
            report.record(entry);
        }
        report
    });
    let quality = report.as_ref().map(ConversionReport::quality_score);
    info!(
        source = %source,
        target = %target,
        passages = out.passages.len(),
        quality = ?quality,
        "story converted"
    );

    let story = Story {
        title: story.title.clone(),
        format: target,
        passages: out.passages,
        variables: out.variables,
        start: out.start,
        story_data: if target.is_twine() {
            story.story_data.clone()
        } else {
            None
        },
    };
    Ok(Conversion {
        text: write_story(&story),
        story,
        report,
        issues: Vec::new(),
    })
}

/// What happens to one source passage.
enum Plan<'s> {
    Rewrite(&'s Passage),
    /// Twine story JavaScript or stylesheet.
    Script(&'s Passage),
    /// An init passage folded into Ink `VAR` declarations.
    Declarations,
}

type Hoisted = Vec<(Assign, Option<String>)>;

#[derive(Default)]
struct Globals {
    /// Statements for targets that assign in passage text.
    lines: Vec<String>,
    /// Assignments for targets that state them at the top of a passage.
    hoisted: Hoisted,
    /// `(original, result)` per declaration.
    entries: Vec<(String, String)>,
}

struct Converted {
    passages: Vec<Passage>,
    variables: BTreeMap<String, String>,
    start: Option<String>,
    entries: Vec<ConversionReportEntry>,
}

struct StoryConversion<'a> {
    pair: &'a PairRewriter,
    story: &'a Story,
    options: &'a ConvertOptions,
    names: NameMap,
    passage_names: HashSet<String>,
}

impl<'a> StoryConversion<'a> {
    fn new(pair: &'a PairRewriter, story: &'a Story, options: &'a ConvertOptions) -> Self {
        Self {
            pair,
            story,
            options,
            names: NameMap::new(story, pair.target),
            passage_names: story.passage_names().map(str::to_string).collect(),
        }
    }

    fn source(&self) -> &'static dyn Syntax {
        self.pair.source_syntax()
    }

    fn target(&self) -> &'static dyn Syntax {
        self.pair.target_syntax()
    }

    fn env(&self) -> RewriteEnv<'_> {
        RewriteEnv {
            source: self.source(),
            target: self.target(),
            matrix: &self.pair.matrix,
            options: self.options,
            names: &self.names,
            passage_names: &self.passage_names,
        }
    }

    fn run(self) -> Converted {
        let source = self.pair.source;
        let target = self.pair.target;
        let mut out = Converted {
            passages: Vec::with_capacity(self.story.passages.len()),
            variables: BTreeMap::new(),
            start: None,
            entries: Vec::new(),
        };

        // Per-passage story-level entries, emitted ahead of the passage's
        // rewrite entries.
        let mut story_entries: Vec<Vec<ConversionReportEntry>> =
            vec![Vec::new(); self.story.passages.len()];
        let mut plans = Vec::with_capacity(self.story.passages.len());
        for (i, passage) in self.story.passages.iter().enumerate() {
            let plan = if passage.is_script_or_style() && source.is_twine() {
                Plan::Script(passage)
            } else if passage.is_init() && source.is_twine() && target == Dialect::Ink {
                match self.declarations(passage) {
                    Some(decls) => {
                        for (name, value, original) in decls {
                            story_entries[i].push(self.entry(
                                "global-variable",
                                &passage.name,
                                EntryDetail::default()
                                    .original(original)
                                    .result(format!("VAR {name} = {value}")),
                            ));
                            out.variables.insert(name, value);
                        }
                        Plan::Declarations
                    }
                    None => Plan::Rewrite(passage),
                }
            } else {
                Plan::Rewrite(passage)
            };
            if passage.is_init() && source.is_twine() && target.is_twine() {
                story_entries[i].push(self.entry(
                    "global-variable",
                    &passage.name,
                    EntryDetail::default().original(passage.name.as_str()),
                ));
            }
            plans.push(plan);
        }
        for (original, renamed) in self.names.renames() {
            if let Some(i) = self.story.passages.iter().position(|p| p.name == original) {
                story_entries[i].insert(
                    0,
                    self.entry(
                        "passage-name",
                        original,
                        EntryDetail::default().original(original).result(renamed),
                    ),
                );
            }
        }

        let jobs: Vec<&Passage> = plans
            .iter()
            .filter_map(|plan| match plan {
                Plan::Rewrite(p) => Some(*p),
                _ => None,
            })
            .collect();
        let mut globals = if source == Dialect::Ink && target.is_twine() {
            self.globals()
        } else {
            Globals::default()
        };
        let prelude = self
            .story
            .start_passage()
            .map(|start| (start, std::mem::take(&mut globals.hoisted)));
        let mut rewritten = self.rewrite_all(&jobs, prelude).into_iter();

        let keep_metadata = source.is_twine() && target.is_twine();
        let has_story_init = self.story.passage("StoryInit").is_some();
        let mut renamed_startup = false;
        for (plan, entries) in plans.into_iter().zip(story_entries) {
            out.entries.extend(entries);
            let passage = match plan {
                Plan::Declarations => continue,
                Plan::Script(passage) => {
                    let (content, entry) = self.script(passage);
                    out.entries.push(entry);
                    Passage {
                        name: self.names.name(&passage.name),
                        content,
                        tags: passage.tags.clone(),
                        metadata: passage.metadata.clone().filter(|_| keep_metadata),
                    }
                }
                Plan::Rewrite(passage) => {
                    let (content, entries) = rewritten.next().unwrap_or_default();
                    out.entries.extend(entries);
                    let mut converted = Passage {
                        name: self.names.name(&passage.name),
                        content,
                        tags: passage.tags.clone(),
                        metadata: passage.metadata.clone().filter(|_| keep_metadata),
                    };
                    if source.is_twine() && target.is_twine() && passage.is_init() {
                        // Harlowe runs every startup passage, SugarCube only
                        // the one named StoryInit.
                        if target == Dialect::SugarCube
                            && !has_story_init
                            && !renamed_startup
                            && converted.has_tag("startup")
                        {
                            converted.name = "StoryInit".into();
                            converted.tags.retain(|t| t != "startup");
                            renamed_startup = true;
                        } else if target == Dialect::Harlowe && !converted.has_tag("startup") {
                            converted.tags.push("startup".into());
                        }
                    }
                    converted
                }
            };
            out.passages.push(passage);
        }

        out.start = self
            .story
            .start
            .as_deref()
            .map(|start| self.names.name(start));
        if source == Dialect::Ink && target.is_twine() {
            out.start = self.story.start_passage().map(|s| self.names.name(s));
            self.place_globals(&mut out, globals);
        }
        out
    }

    /// An init passage as `(name, value, original)` declarations, when it
    /// holds nothing but plain global assignments.
    fn declarations(&self, passage: &Passage) -> Option<Vec<(String, String, String)>> {
        let source = self.source();
        let target = self.target();
        let lex = LexContext::new(&self.passage_names);
        let content = passage.content.as_str();
        let occurrences = extract_all(source, content, rule_order(self.pair.source), &lex);

        let mut covered = 0;
        let mut rest = String::new();
        for occ in &occurrences {
            rest.push_str(&content[covered..occ.range.start]);
            covered = occ.range.end;
        }
        rest.push_str(&content[covered..]);
        if occurrences.is_empty() || !rest.trim().is_empty() {
            return None;
        }

        let mut decls = Vec::new();
        for occ in &occurrences {
            let assigns: Vec<&Assign> = match &occ.construct {
                Construct::Assignment { assigns } => assigns.iter().collect(),
                Construct::VarsSection { entries } => {
                    if entries.iter().any(|e| e.guard.is_some()) {
                        return None;
                    }
                    entries.iter().map(|e| &e.assign).collect()
                }
                Construct::Comment { .. } => continue,
                _ => return None,
            };
            let original = &content[occ.range.clone()];
            for assign in assigns {
                let tokens = source.lex(&assign.target, &lex);
                let (name, temp) = simple_var(&tokens)?;
                if temp || assign.temp {
                    return None;
                }
                let value = target.print(&source.lex(&assign.value, &lex));
                decls.push((name.to_string(), value, original.to_string()));
            }
        }
        Some(decls)
    }

    fn script(&self, passage: &Passage) -> (String, ConversionReportEntry) {
        let original = passage.content.clone();
        let content = if self.pair.target.is_twine() || self.options.loss_policy == LossPolicy::Verbatim
        {
            original.clone()
        } else {
            self.target()
                .comment(&format!("reweave: lost story-script: {original}"))
        };
        let entry = self.entry(
            "story-script",
            &passage.name,
            EntryDetail::default().original(original),
        );
        (content, entry)
    }

    /// Ink globals lowered into the target's assignments.
    fn globals(&self) -> Globals {
        let mut globals = Globals::default();
        let source = self.source();
        let target = self.target();
        let lex = LexContext::new(&self.passage_names);
        for (name, value) in &self.story.variables {
            let assign = Assign::new(
                target.var(name, false),
                target.print(&source.lex(value, &lex)),
            );
            let result = match target.emit(&Construct::Assignment {
                assigns: vec![assign.clone()],
            }) {
                Some(Emission::Text(text, _)) => {
                    globals.lines.push(text.clone());
                    text
                }
                Some(Emission::Hoist { assigns, .. }) => {
                    globals
                        .hoisted
                        .extend(assigns.into_iter().map(|a| (a, None)));
                    format!("{}: {}", assign.target, assign.value)
                }
                Some(Emission::Block(_)) | None => continue,
            };
            globals
                .entries
                .push((format!("VAR {name} = {value}"), result));
        }
        globals
    }

    /// Put global statements where the Twine target runs them. Hoisted
    /// globals already went into the start passage's rewrite.
    fn place_globals(&self, out: &mut Converted, globals: Globals) {
        let holder = match init_passage(self.pair.target) {
            Some((name, tag)) => {
                if !globals.lines.is_empty() {
                    let content = globals.lines.join("\n");
                    match out.passages.iter().position(|p| p.name == name) {
                        Some(i) => {
                            let passage = &mut out.passages[i];
                            passage.content = format!("{content}\n{}", passage.content);
                        }
                        None => {
                            let mut passage = Passage::new(name, content);
                            if let Some(tag) = tag {
                                passage = passage.with_tags([tag]);
                            }
                            out.passages.insert(0, passage);
                        }
                    }
                }
                name.to_string()
            }
            None => {
                let Some(start) = out.start.clone() else {
                    return;
                };
                if !globals.lines.is_empty() {
                    if let Some(passage) = out.passages.iter_mut().find(|p| p.name == start) {
                        passage.content =
                            format!("{}\n{}", globals.lines.join("\n"), passage.content);
                    }
                }
                start
            }
        };

        let story_level: Vec<_> = globals
            .entries
            .into_iter()
            .map(|(original, result)| {
                self.entry(
                    "global-variable",
                    &holder,
                    EntryDetail::default().original(original).result(result),
                )
            })
            .collect();
        out.entries.splice(0..0, story_level);
    }

    /// Rewrite `jobs` in order. `prelude` seeds one passage's hoisted
    /// assignments.
    fn rewrite_all(
        &self,
        jobs: &[&Passage],
        prelude: Option<(&str, Hoisted)>,
    ) -> Vec<(String, Vec<ConversionReportEntry>)> {
        let env = self.env();
        let prelude = prelude.as_ref();
        let seed = move |p: &Passage| -> Hoisted {
            match prelude {
                Some((name, hoisted)) if *name == p.name => hoisted.clone(),
                _ => Vec::new(),
            }
        };
        let pipeline = &self.pair.pipeline;
        let with_report = self.options.with_report;
        let workers = thread::available_parallelism().map_or(1, |n| n.get());
        if !self.options.parallel || jobs.len() < 2 || workers < 2 {
            return jobs
                .iter()
                .map(|p| rewrite_passage(env, pipeline, p, seed(p), with_report))
                .collect();
        }
        let chunk = jobs.len().div_ceil(workers.min(jobs.len()));
        debug!(passages = jobs.len(), chunk, "rewriting in parallel");
        thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|p| rewrite_passage(env, pipeline, p, seed(p), with_report))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }

    /// A story-level entry classified by the pair's matrix.
    fn entry(&self, feature: &str, passage: &str, detail: EntryDetail) -> ConversionReportEntry {
        matrix_entry(&self.pair.matrix, feature, passage, detail)
    }
}

fn matrix_entry(
    matrix: &CompatibilityMatrix,
    feature: &str,
    passage: &str,
    detail: EntryDetail,
) -> ConversionReportEntry {
    let (entry_type, detail) = match matrix.lookup(feature) {
        Some(rule) => {
            let entry_type = match rule.classification {
                Classification::Converted => EntryType::Converted,
                Classification::Approximated => EntryType::Approximated,
                Classification::Incompatible => EntryType::Lost,
            };
            let detail = match entry_type {
                EntryType::Converted => detail,
                _ => detail.notes(rule.notes.clone()).severity(rule.severity),
            };
            (entry_type, detail)
        }
        None => (
            EntryType::Lost,
            detail.notes(Some("feature not covered by the compatibility matrix".into())),
        ),
    };
    ConversionReportEntry::new(entry_type, feature, passage, detail)
}

fn rewrite_passage(
    env: RewriteEnv<'_>,
    pipeline: &RewritePipeline,
    passage: &Passage,
    hoisted: Hoisted,
    with_report: bool,
) -> (String, Vec<ConversionReportEntry>) {
    let mut entries = Vec::new();
    let content = {
        let sink: Option<&mut dyn ReportSink> = if with_report {
            Some(&mut entries)
        } else {
            None
        };
        let mut cx = RewriteContext::new(env, passage, sink).with_hoisted(hoisted);
        pipeline.rewrite(&mut cx)
    };
    (content, entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RewriterRegistry {
        RewriterRegistry::standard().unwrap()
    }

    fn convert(text: &str, source: Dialect, target: Dialect) -> Conversion {
        convert_text(&registry(), text, source, target, &ConvertOptions::default()).unwrap()
    }

    fn features(conversion: &Conversion, entry_type: EntryType) -> Vec<String> {
        conversion
            .report
            .as_ref()
            .unwrap()
            .entries()
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .map(|e| e.feature.clone())
            .collect()
    }

    #[test]
    fn test_same_dialect_is_identity() {
        let mut story = Story::new("T", Dialect::Harlowe);
        story.passages.push(Passage::new("Start", "(set: $x to 1)"));
        let conversion =
            convert_story(&registry(), &story, Dialect::Harlowe, &ConvertOptions::default())
                .unwrap();
        assert_eq!(conversion.story, story);
        let report = conversion.report.unwrap();
        assert!(report.entries().is_empty());
        assert_eq!(report.quality_score(), 100.0);
    }

    #[test]
    fn test_missing_pair_is_an_error() {
        let story = Story::new("T", Dialect::Harlowe);
        let err = convert_story(
            &RewriterRegistry::empty(),
            &story,
            Dialect::Snowman,
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedPair { .. }));
    }

    #[test]
    fn test_script_passage_copied_between_twine_formats() {
        let text = ":: Start\nHi\n\n:: Code [script]\nwindow.x = 1;\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Snowman);
        let code = conversion.story.passage("Code").unwrap();
        assert_eq!(code.content, "window.x = 1;");
        assert!(features(&conversion, EntryType::Approximated).contains(&"story-script".into()));
    }

    #[test]
    fn test_script_passage_lost_toward_ink() {
        let text = ":: Start\nHi\n\n:: Code [script]\nwindow.x = 1;\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Ink);
        let code = conversion.story.passage("Code").unwrap();
        assert!(code.content.starts_with("/*"));
        assert!(code.content.contains("window.x = 1;"));
        assert!(features(&conversion, EntryType::Lost).contains(&"story-script".into()));
    }

    #[test]
    fn test_init_passage_becomes_ink_vars() {
        let text = ":: StoryInit\n<<set $gold to 10>>\n<<set $name to \"Hero\">>\n\n:: Start\nYou have $gold.\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Ink);
        assert!(conversion.story.passage("StoryInit").is_none());
        assert_eq!(conversion.story.variables["gold"], "10");
        assert_eq!(conversion.story.variables["name"], "\"Hero\"");
        assert!(conversion.text.contains("VAR gold = 10"));
    }

    #[test]
    fn test_init_passage_with_prose_is_rewritten() {
        let text = ":: StoryInit\n<<set $gold to 10>>\nWelcome!\n\n:: Start\nHi\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Ink);
        assert!(conversion.story.variables.is_empty());
        assert!(conversion.story.passage("StoryInit").is_some());
    }

    #[test]
    fn test_ink_globals_go_to_story_init() {
        let text = "VAR gold = 10\nHello.\n-> shop\n\n=== shop ===\nGold: {gold}\n-> END\n";
        let conversion = convert(text, Dialect::Ink, Dialect::SugarCube);
        let init = conversion.story.passage("StoryInit").unwrap();
        assert_eq!(init.content, "<<set $gold to 10>>");
        assert_eq!(conversion.story.start.as_deref(), Some("Start"));
        let report = conversion.report.unwrap();
        assert_eq!(report.entries()[0].feature, "global-variable");
    }

    #[test]
    fn test_ink_globals_go_to_harlowe_startup() {
        let text = "VAR gold = 10\nHello.\n";
        let conversion = convert(text, Dialect::Ink, Dialect::Harlowe);
        let init = conversion.story.passage("Startup").unwrap();
        assert!(init.has_tag("startup"));
        assert!(init.content.contains("(set: $gold to 10)"));
    }

    #[test]
    fn test_ink_globals_go_to_chapbook_vars_section() {
        let text = "VAR gold = 10\nHello.\n";
        let conversion = convert(text, Dialect::Ink, Dialect::Chapbook);
        let start = conversion.story.passage("Start").unwrap();
        assert!(start.content.starts_with("gold: 10\n--\n"));
        assert!(start.content.ends_with("Hello."));
    }

    #[test]
    fn test_chapbook_globals_precede_passage_assignments() {
        let text = "VAR gold = 10\n~ gold = gold + 5\nYou have {gold}.\n";
        let conversion = convert(text, Dialect::Ink, Dialect::Chapbook);
        let start = conversion.story.passage("Start").unwrap();
        let init = start.content.find("gold: 10").unwrap();
        let add = start.content.find("gold: gold + 5").unwrap();
        assert!(init < add, "{}", start.content);
        assert_eq!(start.content, "gold: 10\ngold: gold + 5\n--\nYou have {gold}.");
    }

    #[test]
    fn test_hoisted_lines_leave_no_gap() {
        let text = "Start text {gold}.\n~ gold = 1\n~ met = true\n{gold > 0: Rich.}\n";
        let conversion = convert(text, Dialect::Ink, Dialect::Chapbook);
        let start = conversion.story.passage("Start").unwrap();
        assert!(!start.content.contains("\n\n"), "{}", start.content);
        assert!(start.content.contains("Start text {gold}.\n[if gold > 0]"));
    }

    #[test]
    fn test_knot_visit_count_stays_a_count() {
        let text = "Hello.\n-> shop\n\n=== shop ===\nShop {shop}.\n-> END\n";
        let conversion = convert(text, Dialect::Ink, Dialect::Harlowe);
        let shop = conversion.story.passage("shop").unwrap();
        assert!(shop.content.contains("(count: (history:), \"shop\")"), "{}", shop.content);
        assert!(!shop.content.contains("(visited:"));
        assert!(features(&conversion, EntryType::Approximated).contains(&"visited".into()));

        let conversion = convert(text, Dialect::Ink, Dialect::Snowman);
        let shop = conversion.story.passage("shop").unwrap();
        assert!(shop.content.contains("story.history.filter(p => p === 'shop').length"));
    }

    #[test]
    fn test_chapbook_visits_is_the_current_passage_count() {
        let text = ":: Start\ngold (visits > 1): 5\n--\nHi {gold}.\n";
        let sugarcube = convert(text, Dialect::Chapbook, Dialect::SugarCube);
        let start = &sugarcube.story.passage("Start").unwrap().content;
        assert!(start.contains("visited() > 1"), "{start}");
        assert!(!start.contains("$visits"));
        assert!(features(&sugarcube, EntryType::Converted).contains(&"visits".into()));

        let harlowe = convert(text, Dialect::Chapbook, Dialect::Harlowe);
        let start = &harlowe.story.passage("Start").unwrap().content;
        assert!(start.contains("visits > 1"), "{start}");
        assert!(!start.contains("$visits"));

        let snowman = convert(text, Dialect::Chapbook, Dialect::Snowman);
        let start = &snowman.story.passage("Start").unwrap().content;
        assert!(start.contains("story.history.filter(p => p === passage.name).length > 1"));
        assert!(!start.contains("s.visits"));
    }

    #[test]
    fn test_link_body_runs_on_click() {
        let text = ":: Start\n<<link \"Buy\" \"End\">><<set $b to true>><</link>>\n\n:: End\nDone.\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Harlowe);
        let start = &conversion.story.passage("Start").unwrap().content;
        assert!(start.contains("(link: \"Buy\")[(set: $b to true)(go-to: \"End\")]"), "{start}");
        assert!(!start.contains("lost"));
        assert!(features(&conversion, EntryType::Converted).contains(&"link-macro".into()));
    }

    #[test]
    fn test_loop_is_lost_whole() {
        let text = ":: Start\n<<for _i to 0; _i lt 3; _i++>><<set $n += 1>><</for>>Done.\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Harlowe);
        let start = &conversion.story.passage("Start").unwrap().content;
        assert!(start.contains("reweave: lost block-macro: <<for"), "{start}");
        assert!(!start.contains("(set:"));
        assert!(features(&conversion, EntryType::Lost).contains(&"block-macro".into()));
        assert!(!features(&conversion, EntryType::Converted).contains(&"set".into()));
    }

    #[test]
    fn test_harlowe_startup_becomes_story_init() {
        let text = ":: Setup [startup]\n(set: $gold to 10)\n\n:: Start\nHi\n";
        let conversion = convert(text, Dialect::Harlowe, Dialect::SugarCube);
        let init = conversion.story.passage("StoryInit").unwrap();
        assert!(init.tags.is_empty());
        assert_eq!(init.content, "<<set $gold to 10>>");
    }

    #[test]
    fn test_story_init_tagged_for_harlowe() {
        let text = ":: StoryInit\n<<set $gold to 10>>\n\n:: Start\nHi\n";
        let conversion = convert(text, Dialect::SugarCube, Dialect::Harlowe);
        assert!(conversion.story.passage("StoryInit").unwrap().has_tag("startup"));
    }

    #[test]
    fn test_renames_toward_ink_are_reported() {
        let text = ":: Town Square\nGo [[Old Mill]]\n\n:: Old Mill\nDusty.\n";
        let conversion = convert(text, Dialect::Harlowe, Dialect::Ink);
        assert!(conversion.story.passage("Old_Mill").is_some());
        let renames: Vec<_> = conversion
            .report
            .unwrap()
            .entries()
            .iter()
            .filter(|e| e.feature == "passage-name")
            .map(|e| e.result.clone().unwrap())
            .collect();
        assert_eq!(renames, ["Town_Square", "Old_Mill"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!(
                ":: P{i}\n(set: $v{i} to {i})(if: $v{i} > 3)[big]\n[[P{}]]\n\n",
                i + 1
            ));
        }
        let sequential = convert(&text, Dialect::Harlowe, Dialect::SugarCube);
        let options = ConvertOptions {
            parallel: true,
            ..ConvertOptions::default()
        };
        let parallel =
            convert_text(&registry(), &text, Dialect::Harlowe, Dialect::SugarCube, &options)
                .unwrap();
        assert_eq!(parallel.text, sequential.text);
        let strip = |c: &Conversion| -> Vec<(String, String, EntryType)> {
            c.report
                .as_ref()
                .unwrap()
                .entries()
                .iter()
                .map(|e| (e.passage.clone(), e.feature.clone(), e.entry_type))
                .collect()
        };
        assert_eq!(strip(&parallel), strip(&sequential));
    }

    #[test]
    fn test_without_report() {
        let conversion = convert_text(
            &registry(),
            ":: Start\n(set: $x to 1)",
            Dialect::Harlowe,
            Dialect::SugarCube,
            &ConvertOptions::without_report(),
        )
        .unwrap();
        assert!(conversion.report.is_none());
        assert!(conversion.text.contains("<<set $x to 1>>"));
    }
}
