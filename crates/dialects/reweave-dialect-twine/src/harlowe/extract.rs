//! Harlowe construct extraction.
//!
//! Macro calls are found with a flat scan: every `(name:` whose parentheses
//! balance, at any hook depth but never inside another macro's arguments.
//! Per-kind extractors walk that list and claim non-overlapping spans, so a
//! construct nested in a claimed hook is left for the re-scan of the body.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use reweave_core::expr::is_ident_start;
use reweave_core::scan::{
    find_word_top_level, matching_close, parse_delay, split_top_level, unquote,
};
use reweave_core::{
    Assign, Branch, Construct, ConstructKind, HookOp, Occurrence, WidgetKind,
};

use super::expr::replace_word;
use super::macros::{
    changer_css, expects_hook, is_if_clause, macro_kind, normalize_macro_name,
    unsupported_feature, MacroKind,
};
use crate::markup::{find_links, html_comments, non_overlapping, sigil_vars};

static NAMED_HOOK_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|([A-Za-z_][\w-]*)>\[").expect("valid regex"));
static NAMED_HOOK_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]<([A-Za-z_][\w-]*)\|").expect("valid regex"));

/// A macro call, with the hook attached to it if any.
#[derive(Debug, Clone)]
pub(crate) struct MacroCall<'a> {
    pub start: usize,
    /// Just past the closing `)`.
    pub end: usize,
    /// Normalized name.
    pub name: String,
    pub args: &'a str,
    /// Inner range of an attached `[hook]`.
    pub hook: Option<Range<usize>>,
}

impl MacroCall<'_> {
    /// End of the call including its hook.
    pub fn full_end(&self) -> usize {
        self.hook.as_ref().map_or(self.end, |h| h.end + 1)
    }
}

/// The macro call opening at `pos`, if `text[pos..]` starts one.
pub(crate) fn macro_at(text: &str, pos: usize) -> Option<MacroCall<'_>> {
    let rest = text.get(pos..)?.strip_prefix('(')?;
    if !rest.chars().next().is_some_and(is_ident_start) {
        return None;
    }
    let name_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '-' || *c == '_'))
        .map_or(rest.len(), |(i, _)| i);
    if !rest[name_len..].starts_with(':') {
        return None;
    }
    let end = matching_close(text, pos, true)?;
    let args_start = pos + 1 + name_len + 1;
    Some(MacroCall {
        start: pos,
        end,
        name: normalize_macro_name(&rest[..name_len]),
        args: text.get(args_start..end - 1).unwrap_or(""),
        hook: attached_hook(text, end),
    })
}

/// Inner range of a hook directly after `at` (spaces allowed between).
fn attached_hook(text: &str, at: usize) -> Option<Range<usize>> {
    let gap = text[at..]
        .char_indices()
        .find(|(_, c)| *c != ' ' && *c != '\t')
        .map_or(text.len() - at, |(i, _)| i);
    let open = at + gap;
    // `[[link]]` right after a macro is a link, `[[[link]]]` a hook.
    let rest = &text[open..];
    if !rest.starts_with('[') || (rest.starts_with("[[") && !rest.starts_with("[[[")) {
        return None;
    }
    let close = matching_close(text, open, false)?;
    Some(open + 1..close - 1)
}

/// Every macro call in `text` outside other macros' arguments.
pub(crate) fn scan_macros(text: &str) -> Vec<MacroCall<'_>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find('(') {
        let pos = from + rel;
        match macro_at(text, pos) {
            Some(call) => {
                from = call.end;
                out.push(call);
            }
            None => from = pos + 1,
        }
    }
    out
}

pub(crate) fn extract(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    match kind {
        ConstructKind::Comment => html_comments(text)
            .into_iter()
            .map(|(range, inner)| {
                Occurrence::new(
                    kind,
                    "comment",
                    Construct::Comment {
                        text: inner.trim().to_string(),
                    },
                    range,
                )
            })
            .collect(),
        ConstructKind::Link => links(text),
        ConstructKind::Variable => sigil_vars(text, false)
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
        ConstructKind::Hook => {
            let mut found = named_hooks(text);
            found.extend(from_macros(kind, text));
            non_overlapping(found)
        }
        ConstructKind::VarsSection | ConstructKind::Alternatives => Vec::new(),
        _ => from_macros(kind, text),
    }
}

fn from_macros(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for call in scan_macros(text) {
        if call.start < cursor {
            continue;
        }
        if let Some(occ) = classify(kind, text, &call) {
            cursor = occ.range.end;
            out.push(occ);
        }
    }
    out
}

fn classify(kind: ConstructKind, text: &str, call: &MacroCall<'_>) -> Option<Occurrence> {
    let name = call.name.as_str();
    let span = call.start..call.end;
    let hooked = |c: Construct, feature: &'static str| {
        Some(Occurrence::new(kind, feature, c, call.start..call.full_end()))
    };
    let body = || call.hook.clone().map(|h| text[h].to_string());
    match kind {
        ConstructKind::Conditional if matches!(name, "if" | "unless") => if_chain(text, call),
        ConstructKind::Timed if matches!(name, "live" | "after") => {
            let delay = match parse_delay(call.args) {
                Some(d) => d,
                None if name == "live" && call.args.trim().is_empty() => {
                    std::time::Duration::from_millis(20)
                }
                None => return None,
            };
            let construct = Construct::Timed {
                delay,
                repeat: name == "live",
                body: body()?,
            };
            hooked(construct, if name == "live" { "live" } else { "after" })
        }
        ConstructKind::Reveal if matches!(name, "link" | "linkreveal") => {
            let label = unquote(call.args)?;
            hooked(
                Construct::Reveal {
                    label,
                    body: body()?,
                },
                "link-reveal",
            )
        }
        ConstructKind::Hook => {
            let op = match name {
                "replace" => Some(HookOp::Replace),
                "append" => Some(HookOp::Append),
                "prepend" => Some(HookOp::Prepend),
                _ => None,
            };
            if let Some(op) = op {
                let target = call.args.trim().strip_prefix('?')?;
                if !target.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                    return None;
                }
                let construct = Construct::HookEdit {
                    op,
                    name: target.to_string(),
                    body: body()?,
                };
                return hooked(construct, op.as_str());
            }
            if macro_kind(name) != MacroKind::Changer {
                return None;
            }
            let body = body()?;
            match changer_css(name, call.args) {
                Some(css) => hooked(Construct::Style { css, body }, "text-style"),
                None => hooked(
                    Construct::Style {
                        css: String::new(),
                        body,
                    },
                    "changer",
                ),
            }
        }
        ConstructKind::Assignment if matches!(name, "set" | "put") => {
            let assigns = assignments(call.args, name == "put");
            if assigns.is_empty() {
                return None;
            }
            Some(Occurrence::new(
                kind,
                "set",
                Construct::Assignment { assigns },
                span,
            ))
        }
        ConstructKind::Widget => {
            let (widget, feature) = match name {
                "dropdown" | "forcedropdown" => (WidgetKind::Dropdown, "dropdown"),
                "cyclinglink" => (WidgetKind::Cycling, "cycling-link"),
                "inputbox" | "input" | "forceinput" => (WidgetKind::TextInput, "input-box"),
                "checkbox" | "forcecheckbox" => (WidgetKind::Checkbox, "checkbox"),
                _ => return None,
            };
            let mut args = split_top_level(call.args, ',').into_iter().map(str::trim);
            let first = args.next()?;
            let var = first
                .strip_prefix("2bind")
                .or_else(|| first.strip_prefix("bind"))?
                .trim()
                .to_string();
            let rest: Vec<String> = args.map(str::to_string).collect();
            let (options, label) = match widget {
                WidgetKind::Checkbox => (Vec::new(), rest.first().and_then(|l| unquote(l))),
                WidgetKind::TextInput => (Vec::new(), None),
                _ => (rest, None),
            };
            Some(Occurrence::new(
                kind,
                feature,
                Construct::Widget {
                    widget,
                    var,
                    options,
                    label,
                },
                span,
            ))
        }
        ConstructKind::Navigation => {
            let (feature, target) = match name {
                "goto" => ("goto", unquote(call.args)?),
                "display" => ("display", unquote(call.args)?),
                _ => return None,
            };
            let construct = if feature == "goto" {
                Construct::Goto { target }
            } else {
                Construct::Include { target }
            };
            Some(Occurrence::new(kind, feature, construct, span))
        }
        ConstructKind::Print => {
            let expr = if name == "print" {
                call.args.trim().to_string()
            } else if macro_kind(name) == MacroKind::Value && call.hook.is_none() {
                text[span.clone()].to_string()
            } else {
                return None;
            };
            Some(Occurrence::new(kind, "print", Construct::Print { expr }, span))
        }
        ConstructKind::Link if name == "linkgoto" => {
            let args: Vec<String> = split_top_level(call.args, ',')
                .into_iter()
                .map(unquote)
                .collect::<Option<_>>()?;
            let (text, target) = match args.as_slice() {
                [target] => (None, target.clone()),
                [text, target] => (Some(text.clone()), target.clone()),
                _ => return None,
            };
            Some(Occurrence::new(
                kind,
                "link",
                Construct::Link {
                    text,
                    target,
                    setter: Vec::new(),
                },
                span,
            ))
        }
        ConstructKind::Markup => {
            let (feature, construct) = match name {
                "linkundo" => (
                    "link-undo",
                    Construct::Back {
                        label: unquote(call.args),
                    },
                ),
                "restart" | "reload" => ("restart", Construct::Restart { label: None }),
                _ => return None,
            };
            Some(Occurrence::new(kind, feature, construct, span))
        }
        ConstructKind::Unsupported => {
            if (is_if_clause(name) && call.hook.is_none()) || name == "linkgoto" {
                return None;
            }
            let end = if call.hook.is_some() && (expects_hook(name) || is_if_clause(name)) {
                call.full_end()
            } else {
                call.end
            };
            Some(Occurrence::new(
                kind,
                unsupported_feature(name),
                Construct::Unsupported {
                    original: text[call.start..end].to_string(),
                },
                call.start..end,
            ))
        }
        _ => None,
    }
}

/// `(if:)[..]` followed by any `(else-if:)[..]` / `(else:)[..]` clauses,
/// which may be separated from it by whitespace.
fn if_chain(text: &str, first: &MacroCall<'_>) -> Option<Occurrence> {
    let hook = first.hook.clone()?;
    let mut branches = vec![Branch {
        cond: Some(first.args.trim().to_string()),
        negated: first.name == "unless",
        body: text[hook].to_string(),
    }];
    let mut end = first.full_end();
    loop {
        let next = end
            + text[end..]
                .char_indices()
                .find(|(_, c)| !c.is_whitespace())
                .map_or(text.len() - end, |(i, _)| i);
        let Some(clause) = macro_at(text, next) else { break };
        let Some(clause_hook) = clause.hook.clone() else { break };
        let body = text[clause_hook].to_string();
        match clause.name.as_str() {
            "elseif" => branches.push(Branch::when(clause.args.trim(), body)),
            "else" => {
                branches.push(Branch::otherwise(body));
                end = clause.full_end();
                break;
            }
            _ => break,
        }
        end = clause.full_end();
    }
    let feature = if first.name == "unless" { "unless" } else { "if" };
    Some(Occurrence::new(
        ConstructKind::Conditional,
        feature,
        Construct::Conditional { branches },
        first.start..end,
    ))
}

/// Clauses of `(set:)` / `(put:)`, with `it` resolved to the target.
pub(crate) fn assignments(args: &str, put: bool) -> Vec<Assign> {
    let mut out = Vec::new();
    for clause in split_top_level(args, ',') {
        let keyword = if put { "into" } else { "to" };
        let Some(at) = find_word_top_level(clause, keyword) else {
            continue;
        };
        let (left, right) = (clause[..at].trim(), clause[at + keyword.len()..].trim());
        let (target, value) = if put { (right, left) } else { (left, right) };
        if target.is_empty() || value.is_empty() {
            continue;
        }
        let mut assign = Assign::new(target, replace_word(value, "it", target));
        assign.temp = target.starts_with('_');
        out.push(assign);
    }
    out
}

fn links(text: &str) -> Vec<Occurrence> {
    let mut found: Vec<Occurrence> = find_links(text)
        .into_iter()
        .map(|l| {
            Occurrence::new(
                ConstructKind::Link,
                "link",
                Construct::Link {
                    text: l.text.map(str::to_string),
                    target: l.target.to_string(),
                    setter: Vec::new(),
                },
                l.range,
            )
        })
        .collect();
    found.extend(from_macros(ConstructKind::Link, text));
    non_overlapping(found)
}

/// `|name>[body]` and `[body]<name|`.
fn named_hooks(text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for caps in NAMED_HOOK_OPEN.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = whole.end() - 1;
        let Some(close) = matching_close(text, open, false) else {
            continue;
        };
        out.push(Occurrence::new(
            ConstructKind::Hook,
            "named-hook",
            Construct::Hook {
                name: name.as_str().to_string(),
                body: text[open + 1..close - 1].to_string(),
            },
            whole.start()..close,
        ));
    }
    for caps in NAMED_HOOK_CLOSE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(open) = matching_open(text, whole.start()) else {
            continue;
        };
        out.push(Occurrence::new(
            ConstructKind::Hook,
            "named-hook",
            Construct::Hook {
                name: name.as_str().to_string(),
                body: text[open + 1..whole.start()].to_string(),
            },
            open..whole.end(),
        ));
    }
    out
}

/// Index of the `[` matching the `]` at `close_at`.
fn matching_open(text: &str, close_at: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for i in (0..=close_at).rev() {
        match bytes[i] {
            b']' => depth += 1,
            b'[' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
