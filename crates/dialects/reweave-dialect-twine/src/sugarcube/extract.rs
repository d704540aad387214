//! SugarCube construct extraction over `<<macro args>>` tags.

use std::ops::Range;

use reweave_core::expr::is_ident_start;
use reweave_core::scan::{parse_delay, split_top_level, unquote};
use reweave_core::{
    Assign, Branch, Construct, ConstructKind, HookOp, Occurrence, WidgetKind,
};

use crate::js::parse_assign;
use crate::markup::{find_delimited, find_links, non_overlapping, sigil_vars};

/// One `<<...>>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    pub start: usize,
    pub end: usize,
    pub name: &'a str,
    pub args: &'a str,
    /// `<</name>>` or legacy `<<endname>>`.
    pub closing: bool,
}

/// Containers whose legacy `<<endname>>` close form is recognized.
const CONTAINERS: &[&str] = &[
    "if", "for", "link", "button", "linkreplace", "linkappend", "linkprepend", "timed",
    "repeat", "replace", "append", "prepend", "listbox", "cycle", "script", "widget", "nobr",
    "silently", "switch", "capture", "type", "createplaylist", "createaudiogroup", "done",
];

/// Containers lost as a whole: their bodies run in a loop, later or under
/// altered output, never as plain passage text. They are claimed with the
/// conditionals, before anything inside them is rewritten.
const WHOLE_CONTAINERS: &[&str] = &[
    "script", "widget", "for", "switch", "nobr", "silently", "capture", "type", "done",
];

/// The tag opening at `pos`, if any.
pub(crate) fn tag_at(text: &str, pos: usize) -> Option<Tag<'_>> {
    let rest = text.get(pos..)?.strip_prefix("<<")?;
    let (closing_slash, rest) = match rest.strip_prefix('/') {
        Some(r) => (true, r),
        None => (false, rest),
    };
    let name_len = match rest.chars().next()? {
        '=' | '-' => 1,
        c if is_ident_start(c) => rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '-'))
            .map_or(rest.len(), |(i, _)| i),
        _ => return None,
    };
    let name_start = pos + 2 + usize::from(closing_slash);
    let name = &text[name_start..name_start + name_len];
    let args_start = name_start + name_len;
    let close = find_tag_end(&text[args_start..])? + args_start;
    let legacy_close = !closing_slash
        && name
            .strip_prefix("end")
            .is_some_and(|base| CONTAINERS.contains(&base));
    Some(Tag {
        start: pos,
        end: close + 2,
        name: if legacy_close { &name[3..] } else { name },
        args: text[args_start..close].trim(),
        closing: closing_slash || legacy_close,
    })
}

/// Offset of the `>>` ending a tag, skipping quoted strings.
fn find_tag_end(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' && bytes.get(i + 1) == Some(&b'>') => return Some(i),
            None if b == b'\n' && s[i..].starts_with("\n\n") => return None,
            None => {}
        }
        i += 1;
    }
    None
}

pub(crate) fn scan_tags(text: &str) -> Vec<Tag<'_>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find("<<") {
        let pos = from + rel;
        match tag_at(text, pos) {
            Some(tag) => {
                from = tag.end;
                out.push(tag);
            }
            None => from = pos + 2,
        }
    }
    out
}

/// The closing tag index for the container opened at `tags[open]`, plus
/// the `<<elseif>>` / `<<else>>` separators at its own depth.
fn container(tags: &[Tag<'_>], open: usize) -> Option<(usize, Vec<usize>)> {
    let name = tags[open].name;
    let mut depth = 0usize;
    let mut separators = Vec::new();
    for (j, tag) in tags.iter().enumerate().skip(open + 1) {
        if tag.name == name {
            if !tag.closing {
                depth += 1;
            } else if depth == 0 {
                return Some((j, separators));
            } else {
                depth -= 1;
            }
        } else if depth == 0 && name == "if" && !tag.closing && matches!(tag.name, "elseif" | "else")
        {
            separators.push(j);
        }
    }
    None
}

/// Whitespace-separated macro arguments; quotes, brackets and `[[links]]`
/// stay whole.
pub(crate) fn split_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = args.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'[' | b'(' | b'{' => depth += 1,
                b']' | b')' | b'}' => depth -= 1,
                b' ' | b'\t' | b'\n' if depth == 0 => {
                    if let Some(s) = start.take() {
                        out.push(&args[s..i]);
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }
        }
        start.get_or_insert(i);
        i += 1;
    }
    if let Some(s) = start {
        out.push(&args[s..]);
    }
    out
}

/// Passage name from a `"name"` or `[[link]]` argument.
fn passage_arg(arg: &str) -> Option<(Option<String>, String)> {
    if let Some(link) = find_links(arg).into_iter().next() {
        return Some((link.text.map(str::to_string), link.target.to_string()));
    }
    unquote(arg).map(|t| (None, t))
}

/// `<<set>>` body: statements split on `;` and `,`.
pub(crate) fn set_clauses(args: &str) -> Option<Vec<Assign>> {
    let mut out = Vec::new();
    for stmt in split_top_level(args, ';') {
        for clause in split_top_level(stmt, ',') {
            if clause.trim().is_empty() {
                continue;
            }
            let mut assign = parse_assign(clause, true)?;
            assign.temp = assign.target.starts_with('_');
            out.push(assign);
        }
    }
    (!out.is_empty()).then_some(out)
}

pub(crate) fn extract(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    match kind {
        ConstructKind::Comment => comments(text),
        ConstructKind::Variable => sigil_vars(text, true)
            .into_iter()
            .map(|v| {
                let feature = if v.temp { "temp-variable" } else { "variable" };
                let construct = Construct::Variable {
                    expr: text[v.range.clone()].to_string(),
                    temp: v.temp,
                };
                Occurrence::new(kind, feature, construct, v.range)
            })
            .collect(),
        ConstructKind::Link => {
            let mut found = markup_links(text);
            found.extend(from_tags(kind, text));
            non_overlapping(found)
        }
        ConstructKind::Hook => {
            let mut found = custom_styles(text);
            found.extend(from_tags(kind, text));
            non_overlapping(found)
        }
        ConstructKind::VarsSection | ConstructKind::Alternatives => Vec::new(),
        _ => from_tags(kind, text),
    }
}

fn comments(text: &str) -> Vec<Occurrence> {
    let found = [("/*", "*/"), ("<!--", "-->"), ("/%", "%/")]
        .into_iter()
        .flat_map(|(open, close)| find_delimited(text, open, close))
        .map(|(range, inner)| {
            Occurrence::new(
                ConstructKind::Comment,
                "comment",
                Construct::Comment {
                    text: inner.trim().to_string(),
                },
                range,
            )
        })
        .collect();
    non_overlapping(found)
}

fn markup_links(text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for link in find_links(text) {
        let setter = match link.setter {
            Some(s) => match set_clauses(s) {
                Some(assigns) => assigns,
                None => continue,
            },
            None => Vec::new(),
        };
        let feature = if setter.is_empty() { "link" } else { "setter-link" };
        out.push(Occurrence::new(
            ConstructKind::Link,
            feature,
            Construct::Link {
                text: link.text.map(str::to_string),
                target: link.target.to_string(),
                setter,
            },
            link.range,
        ));
    }
    out
}

/// `@@style;text@@`
fn custom_styles(text: &str) -> Vec<Occurrence> {
    find_delimited(text, "@@", "@@")
        .into_iter()
        .filter_map(|(range, inner)| {
            let (css, body) = inner.rsplit_once(';')?;
            Some(Occurrence::new(
                ConstructKind::Hook,
                "custom-style",
                Construct::Style {
                    css: css.trim().to_string(),
                    body: body.to_string(),
                },
                range,
            ))
        })
        .collect()
}

fn from_tags(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    let tags = scan_tags(text);
    let mut out = Vec::new();
    let mut cursor = 0;
    for i in 0..tags.len() {
        if tags[i].start < cursor {
            continue;
        }
        if let Some(occ) = classify(kind, text, &tags, i) {
            cursor = occ.range.end;
            out.push(occ);
        }
    }
    out
}

fn inner(text: &str, tags: &[Tag<'_>], open: usize, close: usize) -> String {
    text[tags[open].end..tags[close].start].to_string()
}

fn classify(kind: ConstructKind, text: &str, tags: &[Tag<'_>], i: usize) -> Option<Occurrence> {
    let tag = &tags[i];
    if tag.closing {
        return (kind == ConstructKind::Unsupported).then(|| unsupported(text, tag, "macro"));
    }
    let args = split_args(tag.args);
    let whole = |close: usize| -> Range<usize> { tag.start..tags[close].end };
    let occ = |feature: &'static str, construct: Construct, range: Range<usize>| {
        Some(Occurrence::new(kind, feature, construct, range))
    };
    match (kind, tag.name) {
        (ConstructKind::Conditional | ConstructKind::Unsupported, name)
            if WHOLE_CONTAINERS.contains(&name) =>
        {
            let feature = match name {
                "script" => "script",
                "widget" => "widget",
                _ => "block-macro",
            };
            let Some((close, _)) = container(tags, i) else {
                return (kind == ConstructKind::Unsupported).then(|| unsupported(text, tag, "macro"));
            };
            let range = whole(close);
            let construct = Construct::Unsupported {
                original: text[range.clone()].to_string(),
            };
            occ(feature, construct, range)
        }
        (ConstructKind::Conditional, "if") => {
            let (close, seps) = container(tags, i)?;
            let mut branches = Vec::with_capacity(seps.len() + 1);
            let mut cond = Some(tag.args.to_string());
            let mut from = i;
            for &sep in seps.iter().chain(std::iter::once(&close)) {
                let body = inner(text, tags, from, sep);
                branches.push(match cond.take() {
                    Some(c) => Branch::when(c, body),
                    None => Branch::otherwise(body),
                });
                if sep != close {
                    let s = &tags[sep];
                    cond = match (s.name, s.args.strip_prefix("if ")) {
                        ("elseif", _) => Some(s.args.to_string()),
                        ("else", Some(c)) => Some(c.trim().to_string()),
                        _ => None,
                    };
                }
                from = sep;
            }
            occ("if", Construct::Conditional { branches }, whole(close))
        }
        (ConstructKind::Timed, "timed" | "repeat") => {
            let delay = parse_delay(args.first()?)?;
            let (close, _) = container(tags, i)?;
            let construct = Construct::Timed {
                delay,
                repeat: tag.name == "repeat",
                body: inner(text, tags, i, close),
            };
            occ(if tag.name == "repeat" { "repeat" } else { "timed" }, construct, whole(close))
        }
        (ConstructKind::Reveal, "linkreplace" | "linkappend" | "linkprepend") => {
            let label = unquote(args.first()?)?;
            let (close, _) = container(tags, i)?;
            let construct = Construct::Reveal {
                label,
                body: inner(text, tags, i, close),
            };
            occ("linkreplace", construct, whole(close))
        }
        (ConstructKind::Reveal, "link" | "button") => {
            let (close, _) = container(tags, i)?;
            let body = inner(text, tags, i, close);
            if body.trim().is_empty() {
                return None;
            }
            let (label, passage) = match args.as_slice() {
                [single] if single.starts_with("[[") => {
                    let (label, target) = passage_arg(single)?;
                    (label.unwrap_or_else(|| target.clone()), Some(target))
                }
                [single] => (unquote(single)?, None),
                [label, target, ..] => (unquote(label)?, Some(passage_arg(target)?.1)),
                _ => return None,
            };
            // The body runs on click, before the link is followed.
            let body = match passage {
                Some(p) => format!("{body}<<goto \"{}\">>", p.replace('"', "\\\"")),
                None => body,
            };
            occ("link-macro", Construct::Reveal { label, body }, whole(close))
        }
        (ConstructKind::Hook, "replace" | "append" | "prepend") => {
            let selector = unquote(args.first()?)?;
            let name = selector.strip_prefix('#')?.to_string();
            let op = match tag.name {
                "replace" => HookOp::Replace,
                "append" => HookOp::Append,
                _ => HookOp::Prepend,
            };
            let (close, _) = container(tags, i)?;
            let construct = Construct::HookEdit {
                op,
                name,
                body: inner(text, tags, i, close),
            };
            occ(op.as_str(), construct, whole(close))
        }
        (ConstructKind::Assignment, "set") => {
            let assigns = set_clauses(tag.args)?;
            occ("set", Construct::Assignment { assigns }, tag.start..tag.end)
        }
        (ConstructKind::Widget, "listbox" | "cycle") => {
            let var = unquote(args.first()?)?;
            let (close, _) = container(tags, i)?;
            let options = tags[i + 1..close]
                .iter()
                .filter(|t| t.name == "option" && !t.closing)
                .filter_map(|t| split_args(t.args).first().map(|a| a.to_string()))
                .collect();
            let (widget, feature) = if tag.name == "listbox" {
                (WidgetKind::Dropdown, "listbox")
            } else {
                (WidgetKind::Cycling, "cycle")
            };
            let construct = Construct::Widget {
                widget,
                var,
                options,
                label: None,
            };
            occ(feature, construct, whole(close))
        }
        (ConstructKind::Widget, "textbox" | "checkbox") => {
            let var = unquote(args.first()?)?;
            let (widget, feature) = if tag.name == "textbox" {
                (WidgetKind::TextInput, "textbox")
            } else {
                (WidgetKind::Checkbox, "checkbox")
            };
            let construct = Construct::Widget {
                widget,
                var,
                options: Vec::new(),
                label: None,
            };
            occ(feature, construct, tag.start..tag.end)
        }
        (ConstructKind::Navigation, "goto") => {
            let (_, target) = passage_arg(args.first()?)?;
            occ("goto", Construct::Goto { target }, tag.start..tag.end)
        }
        (ConstructKind::Navigation, "include" | "display") => {
            let (_, target) = passage_arg(args.first()?)?;
            occ("include", Construct::Include { target }, tag.start..tag.end)
        }
        (ConstructKind::Print, "print" | "=" | "-") => {
            let construct = Construct::Print {
                expr: tag.args.to_string(),
            };
            occ("print", construct, tag.start..tag.end)
        }
        (ConstructKind::Link, "link" | "button") => {
            let (close, _) = container(tags, i)?;
            if !inner(text, tags, i, close).trim().is_empty() {
                return None;
            }
            let (label, target) = match args.as_slice() {
                [single] => passage_arg(single)?,
                [label, target, ..] => (unquote(label), unquote(target)?),
                _ => return None,
            };
            let construct = Construct::Link {
                text: label,
                target,
                setter: Vec::new(),
            };
            occ("link", construct, whole(close))
        }
        (ConstructKind::Markup, "back" | "return") => {
            let label = args.first().and_then(|a| unquote(a));
            occ("back", Construct::Back { label }, tag.start..tag.end)
        }
        (ConstructKind::Unsupported, name) => {
            let feature = match name {
                "audio" | "cacheaudio" | "playlist" | "createplaylist" | "masteraudio"
                | "waitforaudio" | "createaudiogroup" | "removeaudiogroup" | "removeplaylist"
                | "track" => "audio",
                _ => "macro",
            };
            Some(unsupported(text, tag, feature))
        }
        _ => None,
    }
}

fn unsupported(text: &str, tag: &Tag<'_>, feature: &'static str) -> Occurrence {
    Occurrence::new(
        ConstructKind::Unsupported,
        feature,
        Construct::Unsupported {
            original: text[tag.start..tag.end].to_string(),
        },
        tag.start..tag.end,
    )
}
