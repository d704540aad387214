//! Chapbook construct extraction: the vars section, `[modifier]` lines and
//! `{insert}` braces.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use reweave_core::scan::{lines_with_offsets, matching_close, parse_delay, split_top_level, unquote};
use reweave_core::{
    Assign, Branch, Construct, ConstructKind, Occurrence, VarsEntry, WidgetKind,
};

use crate::markup::{find_links, html_comments, is_ident_path, non_overlapping};

static VARS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_$][\w$.]*)\s*(?:\((.*)\))?\s*:\s*(.*?)\s*$").expect("valid regex")
});

/// Modifier words that end a conditional body but belong to the chain.
const CHAIN: &[&str] = &["else"];
const CONTINUE: &[&str] = &["continue", "cont", "cont'd"];
const NOTE: &[&str] = &["note", "notes", "todo", "fixme"];
/// Modifiers handled by a dedicated rule.
const KNOWN: &[&str] = &[
    "if", "unless", "else", "continue", "cont", "cont'd", "after", "note", "notes", "todo",
    "fixme", "javascript",
];

/// Inserts handled by a dedicated rule.
const KNOWN_INSERTS: &[&str] = &[
    "reveal link",
    "dropdown menu for",
    "cycling link for",
    "text input for",
    "embed passage",
    "embed passage named",
    "link to",
    "back link",
    "restart link",
];

/// The vars section at the top of a passage.
pub(crate) struct VarsSection {
    pub entries: Vec<VarsEntry>,
    /// Offset of the `--` line.
    pub dashes: usize,
    /// End of the section, past the `--` line's newline.
    pub end: usize,
}

pub(crate) fn vars_section(text: &str) -> Option<VarsSection> {
    let mut entries = Vec::new();
    for (offset, line) in lines_with_offsets(text) {
        if line.trim_end() == "--" {
            if entries.is_empty() {
                return None;
            }
            let end = (offset + line.len() + 1).min(text.len());
            return Some(VarsSection {
                entries,
                dashes: offset,
                end,
            });
        }
        if line.trim().is_empty() {
            continue;
        }
        let caps = VARS_LINE.captures(line)?;
        let name = caps.get(1)?.as_str();
        let value = caps.get(3)?.as_str();
        if value.is_empty() {
            return None;
        }
        let mut assign = Assign::new(name, value);
        assign.temp = name.starts_with('_');
        entries.push(VarsEntry {
            assign,
            guard: caps.get(2).map(|g| g.as_str().trim().to_string()),
        });
    }
    None
}

/// One `[modifier]` line.
#[derive(Debug)]
struct Modifier<'a> {
    start: usize,
    /// End of the line, before its newline.
    end: usize,
    /// Start of the next line.
    next: usize,
    word: String,
    arg: &'a str,
}

fn modifiers(text: &str) -> Vec<Modifier<'_>> {
    let mut out = Vec::new();
    for (offset, line) in lines_with_offsets(text) {
        let t = line.trim();
        let Some(inner) = t.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
            continue;
        };
        if inner.is_empty() || inner.starts_with('[') || inner.contains(['[', ']']) {
            continue;
        }
        let inner = inner.trim();
        let word_len = inner.find(char::is_whitespace).unwrap_or(inner.len());
        let end = offset + line.len();
        out.push(Modifier {
            start: offset,
            end,
            next: (end + 1).min(text.len()),
            word: inner[..word_len].to_lowercase(),
            arg: inner[word_len..].trim(),
        });
    }
    out
}

/// End of the body following `mods[i]`: the next modifier line or the end
/// of text, less one trailing newline.
fn body_end(text: &str, mods: &[Modifier<'_>], i: usize) -> usize {
    let mut end = mods.get(i + 1).map_or(text.len(), |m| m.start);
    if end > mods[i].end && text[..end].ends_with('\n') {
        end -= 1;
    }
    end.max(mods[i].end)
}

/// A modifier section starting at `mods[i]`, continuing through any `chain`
/// modifiers and swallowing a closing `[continue]`. Returns the covered
/// range and each member's modifier index with its body range.
fn section(
    text: &str,
    mods: &[Modifier<'_>],
    i: usize,
    chain: &[&str],
) -> (Range<usize>, Vec<(usize, Range<usize>)>) {
    let mut bodies = Vec::new();
    let mut j = i;
    loop {
        let end = body_end(text, mods, j);
        bodies.push((j, mods[j].next.min(end)..end));
        let mut range_end = end;
        match mods.get(j + 1) {
            Some(m) if chain.contains(&m.word.as_str()) => {
                j += 1;
                continue;
            }
            Some(m) if CONTINUE.contains(&m.word.as_str()) => range_end = m.end,
            _ => {}
        }
        return (mods[i].start..range_end, bodies);
    }
}

/// `[JavaScript]` sections; inserts inside them are code, not markup.
fn script_spans(text: &str, mods: &[Modifier<'_>]) -> Vec<Range<usize>> {
    mods.iter()
        .enumerate()
        .filter(|(_, m)| m.word == "javascript")
        .map(|(i, _)| section(text, mods, i, &[]).0)
        .collect()
}

/// A parsed `{insert}`: its name words, the value after the first colon,
/// and further `key: value` properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Insert<'a> {
    pub name: String,
    pub first: Option<&'a str>,
    pub props: Vec<(&'a str, &'a str)>,
}

impl<'a> Insert<'a> {
    pub fn prop(&self, key: &str) -> Option<&'a str> {
        self.props.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

pub(crate) fn parse_insert(content: &str) -> Option<Insert<'_>> {
    let mut parts = split_top_level(content, ',').into_iter();
    let head = parts.next()?;
    let (name, first) = match split_top_level(head, ':').as_slice() {
        [name] => (*name, None),
        [name, ..] => (*name, Some(head[name.len() + 1..].trim())),
        [] => return None,
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
        return None;
    }
    let mut props = Vec::new();
    for part in parts {
        let key = split_top_level(part, ':')[0];
        let value = part.get(key.len() + 1..)?;
        props.push((key.trim(), value.trim()));
    }
    Some(Insert {
        name: name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
        first,
        props,
    })
}

/// Every `{...}` outside script sections: its range and trimmed content.
fn braces<'a>(text: &'a str, skip: &[Range<usize>]) -> Vec<(Range<usize>, &'a str)> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find('{') {
        let start = from + rel;
        if let Some(span) = skip.iter().find(|s| s.contains(&start)) {
            from = span.end;
            continue;
        }
        match matching_close(text, start, true) {
            Some(end) => {
                out.push((start..end, text[start + 1..end - 1].trim()));
                from = end;
            }
            None => from = start + 1,
        }
    }
    out
}

/// Items of an array literal argument such as `['a', 'b']`.
fn array_items(arg: &str) -> Vec<String> {
    let arg = arg.trim();
    let Some(inner) = arg.strip_prefix('[').and_then(|a| a.strip_suffix(']')) else {
        return Vec::new();
    };
    split_top_level(inner, ',')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn extract(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    match kind {
        ConstructKind::VarsSection => vars_section(text)
            .map(|section| {
                let construct = Construct::VarsSection {
                    entries: section.entries,
                };
                Occurrence::new(kind, "vars-section", construct, 0..section.end)
            })
            .into_iter()
            .collect(),
        ConstructKind::Comment => {
            let mut found: Vec<Occurrence> = html_comments(text)
                .into_iter()
                .map(|(range, inner)| {
                    let construct = Construct::Comment {
                        text: inner.trim().to_string(),
                    };
                    Occurrence::new(kind, "comment", construct, range)
                })
                .collect();
            found.extend(from_modifiers(kind, text));
            non_overlapping(found)
        }
        ConstructKind::Conditional | ConstructKind::Timed => from_modifiers(kind, text),
        ConstructKind::Unsupported => {
            let mut found = from_modifiers(kind, text);
            found.extend(from_inserts(kind, text));
            non_overlapping(found)
        }
        ConstructKind::Link => {
            let mut found: Vec<Occurrence> = find_links(text)
                .into_iter()
                .map(|link| {
                    let construct = Construct::Link {
                        text: link.text.map(str::to_string),
                        target: link.target.to_string(),
                        setter: Vec::new(),
                    };
                    Occurrence::new(kind, "link", construct, link.range)
                })
                .collect();
            found.extend(from_inserts(kind, text));
            non_overlapping(found)
        }
        _ => from_inserts(kind, text),
    }
}

fn from_modifiers(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    let mods = modifiers(text);
    let mut out = Vec::new();
    let mut claimed = 0;
    for i in 0..mods.len() {
        if mods[i].start < claimed {
            continue;
        }
        if let Some(occ) = classify_modifier(kind, text, &mods, i) {
            claimed = occ.range.end;
            out.push(occ);
        }
    }
    out
}

fn classify_modifier(
    kind: ConstructKind,
    text: &str,
    mods: &[Modifier<'_>],
    i: usize,
) -> Option<Occurrence> {
    let m = &mods[i];
    let body = |r: &Range<usize>| text[r.clone()].to_string();
    match (kind, m.word.as_str()) {
        (ConstructKind::Conditional, "if" | "unless") => {
            let (range, members) = section(text, mods, i, CHAIN);
            let branches = members
                .iter()
                .map(|(j, r)| {
                    let member = &mods[*j];
                    match member.word.as_str() {
                        "else" => Branch::otherwise(body(r)),
                        word => Branch {
                            cond: Some(member.arg.to_string()),
                            negated: word == "unless",
                            body: body(r),
                        },
                    }
                })
                .collect();
            let feature = if m.word == "unless" { "unless" } else { "if" };
            Some(Occurrence::new(kind, feature, Construct::Conditional { branches }, range))
        }
        (ConstructKind::Timed, "after") => {
            let delay = parse_delay(m.arg)?;
            let (range, members) = section(text, mods, i, &[]);
            let construct = Construct::Timed {
                delay,
                repeat: false,
                body: body(&members[0].1),
            };
            Some(Occurrence::new(kind, "after", construct, range))
        }
        (ConstructKind::Comment, word) if NOTE.contains(&word) => {
            let (range, members) = section(text, mods, i, &[]);
            let construct = Construct::Comment {
                text: text[members[0].1.clone()].trim().to_string(),
            };
            Some(Occurrence::new(kind, "note", construct, range))
        }
        (ConstructKind::Unsupported, "javascript") => {
            let (range, _) = section(text, mods, i, &[]);
            let construct = Construct::Unsupported {
                original: text[range.clone()].to_string(),
            };
            Some(Occurrence::new(kind, "javascript", construct, range))
        }
        (ConstructKind::Unsupported, word) if !KNOWN.contains(&word) => {
            let construct = Construct::Unsupported {
                original: text[m.start..m.end].to_string(),
            };
            Some(Occurrence::new(kind, "modifier", construct, m.start..m.end))
        }
        _ => None,
    }
}

fn from_inserts(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    let mods = modifiers(text);
    let scripts = script_spans(text, &mods);
    braces(text, &scripts)
        .into_iter()
        .filter_map(|(range, content)| classify_insert(kind, content, range))
        .collect()
}

fn classify_insert(kind: ConstructKind, content: &str, range: Range<usize>) -> Option<Occurrence> {
    if is_ident_path(content) {
        if kind != ConstructKind::Variable {
            return None;
        }
        let construct = Construct::Variable {
            expr: content.to_string(),
            temp: content.starts_with('_'),
        };
        return Some(Occurrence::new(kind, "variable", construct, range));
    }
    let insert = parse_insert(content)?;
    let label = |key: &str| insert.prop(key).and_then(unquote);
    let occ = |feature: &'static str, construct: Construct| {
        Some(Occurrence::new(kind, feature, construct, range.clone()))
    };
    match (kind, insert.name.as_str()) {
        (ConstructKind::Reveal, "reveal link") => {
            let label_text = unquote(insert.first?)?;
            let body = match (label("text"), insert.prop("passage")) {
                (Some(text), _) => text,
                (None, Some(passage)) => format!("{{embed passage: {passage}}}"),
                (None, None) => return None,
            };
            occ(
                "reveal-link",
                Construct::Reveal {
                    label: label_text,
                    body,
                },
            )
        }
        (ConstructKind::Widget, name @ ("dropdown menu for" | "cycling link for" | "text input for")) => {
            let var = unquote(insert.first?)?;
            let (widget, feature) = match name {
                "dropdown menu for" => (WidgetKind::Dropdown, "dropdown-menu"),
                "cycling link for" => (WidgetKind::Cycling, "cycling-link"),
                _ => (WidgetKind::TextInput, "text-input"),
            };
            let options = insert.prop("choices").map(array_items).unwrap_or_default();
            occ(
                feature,
                Construct::Widget {
                    widget,
                    var,
                    options,
                    label: None,
                },
            )
        }
        (ConstructKind::Navigation, "embed passage" | "embed passage named") => {
            let target = unquote(insert.first?)?;
            occ("embed-passage", Construct::Include { target })
        }
        (ConstructKind::Link, "link to") => {
            let target = unquote(insert.first?)?;
            occ(
                "link",
                Construct::Link {
                    text: label("label"),
                    target,
                    setter: Vec::new(),
                },
            )
        }
        (ConstructKind::Markup, "back link") => occ("back-link", Construct::Back { label: label("label") }),
        (ConstructKind::Markup, "restart link") => {
            occ("restart-link", Construct::Restart { label: label("label") })
        }
        (ConstructKind::Unsupported, name) if !KNOWN_INSERTS.contains(&name) => occ(
            "insert",
            Construct::Unsupported {
                original: format!("{{{content}}}"),
            },
        ),
        _ => None,
    }
}
