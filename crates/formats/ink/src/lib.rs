//! Ink source files split into passages.
//!
//! Each knot (`=== name ===`) and stitch (`= name`, named `knot.name`)
//! becomes a passage. Content before the first knot is the implicit
//! [`START_PASSAGE`]; `VAR`/`CONST` declarations are lifted into the story's
//! variables wherever they appear.

use reweave_core::{Dialect, Passage, Story};
use tracing::debug;

/// Name given to the content that precedes the first knot.
pub const START_PASSAGE: &str = "Start";

/// Tag marking a knot declared with `=== function name ===`.
pub const FUNCTION_TAG: &str = "function";

enum Line<'a> {
    Knot {
        name: &'a str,
        params: Option<&'a str>,
        function: bool,
    },
    Stitch {
        name: &'a str,
        params: Option<&'a str>,
    },
    Var {
        name: &'a str,
        value: &'a str,
    },
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("==") {
        let rest = rest.trim_start_matches('=').trim_end_matches('=').trim();
        let (function, rest) = match rest.strip_prefix("function ") {
            Some(r) => (true, r.trim_start()),
            None => (false, rest),
        };
        let (name, params) = split_params(rest);
        if !name.is_empty() {
            return Line::Knot {
                name,
                params,
                function,
            };
        }
    } else if let Some(rest) = trimmed.strip_prefix('=') {
        let (name, params) = split_params(rest.trim());
        if !name.is_empty() && !name.contains(char::is_whitespace) {
            return Line::Stitch { name, params };
        }
    }
    for keyword in ["VAR ", "CONST "] {
        if let Some(rest) = trimmed.strip_prefix(keyword) {
            if let Some((name, value)) = rest.split_once('=') {
                return Line::Var {
                    name: name.trim(),
                    value: value.trim(),
                };
            }
        }
    }
    Line::Text(line)
}

/// `name(a, b)` into `name` and `(a, b)`.
fn split_params(s: &str) -> (&str, Option<&str>) {
    match s.find('(') {
        Some(open) => (s[..open].trim(), Some(s[open..].trim())),
        None => (s.trim(), None),
    }
}

struct Builder {
    name: String,
    params: Option<String>,
    tags: Vec<String>,
    lines: Vec<String>,
    in_header: bool,
}

impl Builder {
    fn new(name: String, params: Option<&str>, tags: Vec<String>) -> Self {
        Self {
            name,
            params: params.map(str::to_string),
            tags,
            lines: Vec::new(),
            in_header: true,
        }
    }

    fn push(&mut self, line: &str) {
        if self.in_header {
            if let Some(tags) = line.trim().strip_prefix('#') {
                self.tags.extend(
                    tags.split('#')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                );
                return;
            }
            self.in_header = false;
        }
        self.lines.push(line.to_string());
    }

    fn finish(self) -> Passage {
        let content = self.lines.join("\n");
        let content = content.trim_matches(['\n', '\r']).trim_end().to_string();
        let mut passage = Passage::new(self.name, content).with_tags(self.tags);
        passage.metadata = self.params;
        passage
    }
}

/// Parse Ink source into a [`Story`].
pub fn parse_ink(text: &str) -> Story {
    let mut story = Story::new("Untitled", Dialect::Ink);
    let mut top: Vec<&str> = Vec::new();
    let mut knot: Option<String> = None;
    let mut current: Option<Builder> = None;
    let mut passages = Vec::new();

    for line in text.lines() {
        match classify(line) {
            Line::Var { name, value } => {
                story.variables.insert(name.to_string(), value.to_string());
            }
            Line::Knot {
                name,
                params,
                function,
            } => {
                passages.extend(current.take().map(Builder::finish));
                let tags = if function {
                    vec![FUNCTION_TAG.to_string()]
                } else {
                    Vec::new()
                };
                knot = Some(name.to_string());
                current = Some(Builder::new(name.to_string(), params, tags));
            }
            Line::Stitch { name, params } => {
                passages.extend(current.take().map(Builder::finish));
                let full = match &knot {
                    Some(k) => format!("{k}.{name}"),
                    None => name.to_string(),
                };
                current = Some(Builder::new(full, params, Vec::new()));
            }
            Line::Text(line) => match current.as_mut() {
                Some(builder) => builder.push(line),
                None => top.push(line),
            },
        }
    }
    passages.extend(current.map(Builder::finish));

    let mut top_lines = Vec::new();
    for line in top {
        match line.trim().strip_prefix("# title:") {
            Some(title) => story.title = title.trim().to_string(),
            None => top_lines.push(line),
        }
    }
    let top = top_lines.join("\n").trim().to_string();
    match top.strip_prefix("->").map(str::trim) {
        Some(target) if !target.is_empty() && !target.contains(char::is_whitespace) => {
            story.start = Some(target.to_string());
        }
        _ if top.is_empty() => {}
        _ => story.passages.push(Passage::new(START_PASSAGE, top)),
    }

    enter_first_stitch(&mut passages);
    story.passages.extend(passages);
    debug!(
        title = story.title.as_str(),
        passages = story.passages.len(),
        variables = story.variables.len(),
        "parsed ink"
    );
    story
}

/// A knot with no content of its own runs its first stitch.
fn enter_first_stitch(passages: &mut [Passage]) {
    for i in 0..passages.len().saturating_sub(1) {
        let prefix = format!("{}.", passages[i].name);
        if passages[i].content.is_empty() && passages[i + 1].name.starts_with(&prefix) {
            passages[i].content = format!("-> {}", passages[i + 1].name);
        }
    }
}

/// Whether `content` diverts to `name` anywhere.
fn diverts_to(content: &str, name: &str) -> bool {
    content.match_indices("->").any(|(i, _)| {
        let rest = content[i + 2..].trim_start();
        rest.strip_prefix(name).is_some_and(|after| {
            !after
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        })
    })
}

/// Write `story` as Ink source.
///
/// A first passage named [`START_PASSAGE`] that nothing diverts to is
/// written as top-level content; otherwise the top level diverts to the
/// start passage.
pub fn write_ink(story: &Story) -> String {
    let mut out = String::new();
    if !story.title.is_empty() {
        out.push_str(&format!("# title: {}\n", story.title));
    }
    for (name, value) in &story.variables {
        out.push_str(&format!("VAR {name} = {value}\n"));
    }
    if !out.is_empty() {
        out.push('\n');
    }

    let mut passages = story.passages.iter().peekable();
    let top_level = passages.peek().is_some_and(|first| {
        first.name == START_PASSAGE
            && story.start.as_deref().map_or(true, |s| s == START_PASSAGE)
            && !story
                .passages
                .iter()
                .any(|p| diverts_to(&p.content, START_PASSAGE))
    });
    if top_level {
        if let Some(first) = passages.next() {
            out.push_str(&first.content);
            out.push_str("\n\n");
        }
    } else if let Some(start) = story.start_passage() {
        out.push_str(&format!("-> {start}\n\n"));
    }

    let mut knot: Option<&str> = None;
    for passage in passages {
        let params = passage.metadata.as_deref().unwrap_or_default();
        match passage.name.split_once('.') {
            Some((k, stitch)) => {
                if knot != Some(k) {
                    out.push_str(&format!("=== {k} ===\n"));
                    knot = Some(k);
                }
                out.push_str(&format!("= {stitch}{params}\n"));
            }
            None => {
                let function = if passage.has_tag(FUNCTION_TAG) {
                    "function "
                } else {
                    ""
                };
                out.push_str(&format!("=== {function}{}{params} ===\n", passage.name));
                knot = Some(passage.name.as_str());
            }
        }
        for tag in passage.tags.iter().filter(|t| *t != FUNCTION_TAG) {
            out.push_str(&format!("# {tag}\n"));
        }
        if !passage.content.is_empty() {
            out.push_str(&passage.content);
            out.push('\n');
        }
        out.push('\n');
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}
