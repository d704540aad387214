//! Ink construct extraction.
//!
//! Ink has no macro syntax: logic lives in `{...}` braces (conditionals,
//! alternatives, printed expressions), on `~` lines, in choice bullets and
//! in `->` diverts. Everything here works on line structure plus balanced
//! braces, and never fails: what it cannot classify is left as text.

use std::ops::Range;

use reweave_core::scan::{lines_with_offsets, matching_close};
use reweave_core::{AltMode, Assign, Branch, Construct, ConstructKind, Occurrence};

use crate::ident::{is_ident_path, path_len};

pub(crate) fn extract(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    let found = match kind {
        ConstructKind::Comment => comments(text),
        ConstructKind::Conditional => {
            let mut found = guarded_choices(text);
            found.extend(brace_occurrences(kind, text));
            found
        }
        ConstructKind::Alternatives | ConstructKind::Print | ConstructKind::Variable => {
            brace_occurrences(kind, text)
        }
        ConstructKind::Link => choice_links(text),
        ConstructKind::Assignment => tilde_lines(text, true),
        ConstructKind::Navigation => diverts(text),
        ConstructKind::Markup => markup(text),
        ConstructKind::Unsupported => {
            let mut found = tilde_lines(text, false);
            found.extend(statements(text));
            found.extend(tags(text));
            found.extend(brace_occurrences(kind, text));
            found
        }
        _ => Vec::new(),
    };
    non_overlapping(found)
}

fn non_overlapping(mut found: Vec<Occurrence>) -> Vec<Occurrence> {
    found.sort_by_key(|o| (o.range.start, std::cmp::Reverse(o.range.end)));
    let mut out: Vec<Occurrence> = Vec::with_capacity(found.len());
    for occ in found {
        if out.last().is_some_and(|prev| occ.range.start < prev.range.end) {
            continue;
        }
        out.push(occ);
    }
    out
}

/// End of the line containing `pos`, before its newline.
fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i)
}

// ── Comments ───────────────────────────────────────────────────────────

fn comments(text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("/*") {
            let Some(close) = rest[2..].find("*/") else {
                break;
            };
            let end = i + 2 + close + 2;
            let construct = Construct::Comment {
                text: text[i + 2..end - 2].trim().to_string(),
            };
            out.push(Occurrence::new(ConstructKind::Comment, "comment", construct, i..end));
            i = end;
            continue;
        }
        let preceded_by_space = text[..i]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        if rest.starts_with("//") && preceded_by_space {
            let end = line_end(text, i);
            let construct = Construct::Comment {
                text: text[i + 2..end].trim().to_string(),
            };
            out.push(Occurrence::new(ConstructKind::Comment, "comment", construct, i..end));
            i = end;
            continue;
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    out
}

// ── Braces ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Brace {
    Conditional(Vec<Branch>),
    Alternatives(AltMode, Vec<String>),
    /// Switch blocks and other brace logic with no neutral form.
    Logic,
    Expr(String),
}

/// Top-level `{...}` spans in `text` with their classification. Nested
/// braces are left inside their parent.
fn braces(text: &str) -> Vec<(Range<usize>, Brace)> {
    let mut out = Vec::new();
    let mut i = 0;
    while let Some(rel) = text[i..].find('{') {
        let start = i + rel;
        let Some(end) = matching_close(text, start, false) else {
            i = start + 1;
            continue;
        };
        out.push((start..end, classify(&text[start + 1..end - 1])));
        i = end;
    }
    out
}

fn brace_occurrences(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    braces(text)
        .into_iter()
        .filter_map(|(range, brace)| {
            let (feature, construct) = match (kind, brace) {
                (ConstructKind::Conditional, Brace::Conditional(branches)) => {
                    ("if", Construct::Conditional { branches })
                }
                (ConstructKind::Alternatives, Brace::Alternatives(mode, items)) => {
                    let feature = match mode {
                        AltMode::Shuffle => "shuffle",
                        AltMode::Cycle => "cycle",
                        AltMode::Once => "once",
                        AltMode::Sequence => "sequence",
                    };
                    (feature, Construct::Alternatives { mode, items })
                }
                (ConstructKind::Variable, Brace::Expr(expr)) if is_ident_path(&expr) => {
                    ("variable", Construct::Variable { expr, temp: false })
                }
                (ConstructKind::Print, Brace::Expr(expr))
                    if !expr.is_empty() && !is_ident_path(&expr) =>
                {
                    ("print", Construct::Print { expr })
                }
                (ConstructKind::Unsupported, Brace::Logic) => (
                    "logic",
                    Construct::Unsupported {
                        original: text[range.clone()].to_string(),
                    },
                ),
                _ => return None,
            };
            Some(Occurrence::new(kind, feature, construct, range))
        })
        .collect()
}

fn classify(inner: &str) -> Brace {
    if inner.contains('\n') {
        return classify_block(inner);
    }
    let t = inner.trim();
    if let Some(mode) = alt_prefix(t) {
        return Brace::Alternatives(mode, split_prose(&t[1..], '|'));
    }
    if let Some(colon) = top_level_colon(t) {
        let cond = t[..colon].trim();
        let arms: Vec<String> = split_prose(&t[colon + 1..], '|')
            .iter()
            .map(|a| a.trim().to_string())
            .collect();
        if cond.is_empty() || arms.len() > 2 {
            return Brace::Logic;
        }
        let mut branches = vec![Branch::when(cond, arms[0].clone())];
        if let Some(other) = arms.get(1) {
            branches.push(Branch::otherwise(other.clone()));
        }
        return Brace::Conditional(branches);
    }
    let items = split_prose(t, '|');
    if items.len() > 1 {
        return Brace::Alternatives(AltMode::Sequence, items);
    }
    Brace::Expr(t.to_string())
}

/// `{~a|b}` shuffle, `{&a|b}` cycle, `{!a|b}` once.
fn alt_prefix(t: &str) -> Option<AltMode> {
    let mode = match t.chars().next()? {
        '~' => AltMode::Shuffle,
        '&' => AltMode::Cycle,
        '!' => AltMode::Once,
        _ => return None,
    };
    (split_prose(&t[1..], '|').len() > 1).then_some(mode)
}

/// Multi-line brace: `{ - c: .. - else: .. }`, `{c: .. - else: .. }`,
/// `{stopping: - a - b}` or a switch.
fn classify_block(inner: &str) -> Brace {
    let (header, rest) = inner.split_once('\n').unwrap_or((inner, ""));
    let header = header.trim();
    let (preface, arms) = block_arms(rest);

    if header.is_empty() {
        if !preface.trim().is_empty() || arms.is_empty() {
            return Brace::Logic;
        }
        let mut branches = Vec::with_capacity(arms.len());
        for (i, arm) in arms.iter().enumerate() {
            let Some(colon) = top_level_colon(arm) else {
                return Brace::Logic;
            };
            let cond = arm[..colon].trim();
            let body = arm[colon + 1..].trim();
            if cond == "else" {
                if i + 1 != arms.len() {
                    return Brace::Logic;
                }
                branches.push(Branch::otherwise(body));
            } else {
                branches.push(Branch::when(cond, body));
            }
        }
        return Brace::Conditional(branches);
    }

    let Some(head) = header.strip_suffix(':') else {
        return Brace::Logic;
    };
    if let Some(mode) = sequence_keyword(head) {
        if !preface.trim().is_empty() {
            return Brace::Logic;
        }
        return Brace::Alternatives(mode, arms.iter().map(|a| a.trim().to_string()).collect());
    }
    // `{cond:` with an optional `- else:` arm; any other arm makes it a
    // switch on the header's value.
    let mut branches = vec![Branch::when(head.trim(), preface.trim())];
    match arms.as_slice() {
        [] => {}
        [only] => match only.trim_start().strip_prefix("else") {
            Some(after) if after.trim_start().starts_with(':') => {
                let body = after.trim_start()[1..].trim();
                branches.push(Branch::otherwise(body));
            }
            _ => return Brace::Logic,
        },
        _ => return Brace::Logic,
    }
    Brace::Conditional(branches)
}

fn sequence_keyword(head: &str) -> Option<AltMode> {
    let words: Vec<&str> = head.split_whitespace().collect();
    match words.as_slice() {
        ["stopping"] | ["sequence"] => Some(AltMode::Sequence),
        ["cycle"] => Some(AltMode::Cycle),
        ["once"] => Some(AltMode::Once),
        ["shuffle"] | ["shuffle", _] => Some(AltMode::Shuffle),
        _ => None,
    }
}

/// Split a block body into the text before the first `- ` arm and the arms
/// (without their dash). Arms of nested blocks stay in their parent arm.
fn block_arms(rest: &str) -> (&str, Vec<&str>) {
    let mut starts = Vec::new();
    let mut depth = 0i32;
    for (offset, line) in lines_with_offsets(rest) {
        let trimmed = line.trim_start();
        if depth == 0 && trimmed.starts_with('-') && !trimmed.starts_with("->") {
            let dash = offset + (line.len() - trimmed.len());
            starts.push(dash);
        }
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
    }
    let Some(&first) = starts.first() else {
        return (rest, Vec::new());
    };
    let mut arms = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(rest.len());
        arms.push(&rest[start + 1..end]);
    }
    (&rest[..first], arms)
}

/// Split on `sep` outside `"` strings and brackets. Apostrophes are prose.
fn split_prose(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' | '[' | '{' if !quoted => depth += 1,
            ')' | ']' | '}' if !quoted => depth -= 1,
            _ if c == sep && depth == 0 && !quoted => {
                parts.push(text[start..i].to_string());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].to_string());
    parts
}

fn top_level_colon(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' | '[' | '{' if !quoted => depth += 1,
            ')' | ']' | '}' if !quoted => depth -= 1,
            '|' if depth == 0 && !quoted => return None,
            ':' if depth == 0 && !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

// ── Choices ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Choice {
    /// Bullet through the divert, including setter lines below it.
    range: Range<usize>,
    sticky: bool,
    /// `{guard}` span(s) and their conjoined condition.
    guard: Option<(Range<usize>, String)>,
    text: String,
    target: Option<String>,
    setter: Vec<Assign>,
}

fn choices(text: &str) -> Vec<Choice> {
    let lines: Vec<(usize, &str)> = lines_with_offsets(text).collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (offset, line) = lines[i];
        i += 1;
        let trimmed = line.trim_start();
        let Some(first) = trimmed.chars().next().filter(|c| matches!(*c, '*' | '+')) else {
            continue;
        };
        let start = offset + (line.len() - trimmed.len());
        let end = offset + line.len();
        let mut pos = start + trimmed.len() - trimmed.trim_start_matches(['*', '+', ' ', '\t']).len();

        if text[pos..end].starts_with('(') {
            match matching_close(&text[..end], pos, false) {
                Some(close) => pos = close,
                None => continue,
            }
            pos = skip_blank(text, pos, end);
        }

        let mut guard: Option<(Range<usize>, String)> = None;
        while text[pos..end].starts_with('{') {
            let Some(close) = matching_close(&text[..end], pos, false) else {
                break;
            };
            let cond = text[pos + 1..close - 1].trim().to_string();
            guard = Some(match guard {
                Some((range, prev)) => (range.start..close, format!("{prev} and {cond}")),
                None => (pos..close, cond),
            });
            pos = skip_blank(text, close, end);
        }

        let body = &text[pos..end];
        let (shown, divert) = match body.find("->") {
            Some(arrow) => (&body[..arrow], Some(&body[arrow + 2..])),
            None => (body, None),
        };
        let mut target = divert.and_then(divert_target);
        let mut setter = Vec::new();
        let mut range_end = end;

        if divert.is_none() {
            let mut j = i;
            while let Some(&(next_offset, next)) = lines.get(j) {
                let t = next.trim();
                if let Some(stmt) = t.strip_prefix('~') {
                    match parse_assign(stmt) {
                        Some(assign) => setter.push(assign),
                        None => break,
                    }
                } else if let Some(rest) = t.strip_prefix("->") {
                    if let Some(found) = divert_target(rest) {
                        target = Some(found);
                        range_end = next_offset + next.len();
                        i = j + 1;
                    }
                    break;
                } else {
                    break;
                }
                j += 1;
            }
        }
        if target.is_none() {
            setter.clear();
        }

        out.push(Choice {
            range: start..range_end,
            sticky: first == '+',
            guard,
            text: choice_text(shown),
            target,
            setter,
        });
    }
    out
}

fn skip_blank(text: &str, pos: usize, end: usize) -> usize {
    let rest = &text[pos..end];
    pos + rest.len() - rest.trim_start_matches([' ', '\t']).len()
}

/// Text shown in the choice list: `a [b] c` shows `ab`; bracketless
/// choices show the whole line.
fn choice_text(shown: &str) -> String {
    match (shown.find('['), shown.rfind(']')) {
        (Some(open), Some(close)) if open < close => {
            format!("{}{}", &shown[..open], &shown[open + 1..close]).trim().to_string()
        }
        _ => shown.trim().to_string(),
    }
}

/// `-> target`'s target, when it is a plain passage reference.
fn divert_target(after_arrow: &str) -> Option<String> {
    let s = after_arrow.trim_start();
    let len = path_len(s);
    let target = &s[..len];
    if len == 0 || matches!(target, "END" | "DONE") || s[len..].starts_with('(') {
        return None;
    }
    Some(target.to_string())
}

fn guarded_choices(text: &str) -> Vec<Occurrence> {
    choices(text)
        .into_iter()
        .filter(|c| c.target.is_some())
        .filter_map(|c| {
            let (guard, cond) = c.guard?;
            let mut body = text[c.range.start..guard.start].to_string();
            body.push_str(text[guard.end..c.range.end].trim_start_matches([' ', '\t']));
            let construct = Construct::Conditional {
                branches: vec![Branch::when(cond, body)],
            };
            Some(Occurrence::new(ConstructKind::Conditional, "if", construct, c.range))
        })
        .collect()
}

fn choice_links(text: &str) -> Vec<Occurrence> {
    choices(text)
        .into_iter()
        .filter_map(|c| {
            let Some(target) = c.target else {
                let construct = Construct::Unsupported {
                    original: text[c.range.clone()].to_string(),
                };
                return Some(Occurrence::new(ConstructKind::Link, "choice-branch", construct, c.range));
            };
            if c.guard.is_some() {
                return None;
            }
            let feature = if c.sticky { "sticky-choice" } else { "choice" };
            let construct = Construct::Link {
                text: (!c.text.is_empty()).then_some(c.text),
                target,
                setter: c.setter,
            };
            Some(Occurrence::new(ConstructKind::Link, feature, construct, c.range))
        })
        .collect()
}

// ── Logic lines ────────────────────────────────────────────────────────

/// `x = v`, `temp x = v`, `x += v`, `x++` after the `~`.
pub(crate) fn parse_assign(stmt: &str) -> Option<Assign> {
    let s = stmt.trim();
    let (temp, s) = match s.strip_prefix("temp") {
        Some(rest) if rest.starts_with([' ', '\t']) => (true, rest.trim_start()),
        _ => (false, s),
    };
    let len = path_len(s);
    if len == 0 {
        return None;
    }
    let target = &s[..len];
    let rest = s[len..].trim();
    let value = match rest {
        "++" => format!("{target} + 1"),
        "--" => format!("{target} - 1"),
        _ => {
            let compound = ["+=", "-=", "*=", "/="]
                .into_iter()
                .find_map(|op| rest.strip_prefix(op).map(|v| (&op[..1], v.trim())));
            match compound {
                Some((op, v)) if !v.is_empty() => format!("{target} {op} {v}"),
                Some(_) => return None,
                None => {
                    let v = rest.strip_prefix('=').filter(|v| !v.starts_with('='))?.trim();
                    if v.is_empty() {
                        return None;
                    }
                    v.to_string()
                }
            }
        }
    };
    Some(Assign {
        target: target.to_string(),
        value,
        temp,
    })
}

/// `~` lines: assignments when `assigns`, everything else otherwise.
fn tilde_lines(text: &str, assigns: bool) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for (offset, line) in lines_with_offsets(text) {
        let trimmed = line.trim_start();
        let Some(stmt) = trimmed.strip_prefix('~') else {
            continue;
        };
        let start = offset + (line.len() - trimmed.len());
        let range = start..offset + line.trim_end().len();
        match (parse_assign(stmt), assigns) {
            (Some(assign), true) => {
                let feature = if assign.temp { "temp-variable" } else { "set" };
                let construct = Construct::Assignment {
                    assigns: vec![assign],
                };
                out.push(Occurrence::new(ConstructKind::Assignment, feature, construct, range));
            }
            (None, false) => {
                let construct = Construct::Unsupported {
                    original: text[range.clone()].to_string(),
                };
                out.push(Occurrence::new(ConstructKind::Unsupported, "logic", construct, range));
            }
            _ => {}
        }
    }
    out
}

/// `LIST` and `INCLUDE` lines.
fn statements(text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for (offset, line) in lines_with_offsets(text) {
        let trimmed = line.trim_start();
        let feature = if trimmed.starts_with("LIST ") {
            "list"
        } else if trimmed.starts_with("INCLUDE ") {
            "include-file"
        } else {
            continue;
        };
        let range = offset + (line.len() - trimmed.len())..offset + line.trim_end().len();
        let construct = Construct::Unsupported {
            original: text[range.clone()].to_string(),
        };
        out.push(Occurrence::new(ConstructKind::Unsupported, feature, construct, range));
    }
    out
}

/// `# tag` to the end of the line.
fn tags(text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find('#') {
        let start = from + rel;
        let end = line_end(text, start);
        from = start + 1;
        let spaced = text[..start].chars().next_back().is_none_or(char::is_whitespace);
        if !spaced || text[start + 1..end].trim().is_empty() {
            continue;
        }
        let range = start..start + text[start..end].trim_end().len();
        let construct = Construct::Unsupported {
            original: text[range.clone()].to_string(),
        };
        out.push(Occurrence::new(ConstructKind::Unsupported, "tag", construct, range));
        from = end;
    }
    out
}

// ── Diverts and markup ─────────────────────────────────────────────────

fn diverts(text: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find("->") {
        let start = from + rel;
        let after = start + 2;
        from = after;
        if text[after..].starts_with("->") {
            let construct = Construct::Unsupported {
                original: "->->".to_string(),
            };
            out.push(Occurrence::new(ConstructKind::Navigation, "logic", construct, start..after + 2));
            from = after + 2;
            continue;
        }
        let Some((target, target_end)) = target_at(text, after) else {
            continue;
        };
        let tail = skip_blank(text, target_end, line_end(text, target_end));
        let (feature, construct, end) = if text[tail..].starts_with("->") {
            ("tunnel", Construct::Include { target }, tail + 2)
        } else if matches!(target.as_str(), "END" | "DONE") {
            ("end", Construct::End, target_end)
        } else {
            ("divert", Construct::Goto { target }, target_end)
        };
        out.push(Occurrence::new(ConstructKind::Navigation, feature, construct, start..end));
        from = end;
    }

    let mut from = 0;
    while let Some(rel) = text[from..].find("<-") {
        let start = from + rel;
        from = start + 2;
        if let Some((target, end)) = target_at(text, start + 2) {
            let construct = Construct::Include { target };
            out.push(Occurrence::new(ConstructKind::Navigation, "thread", construct, start..end));
            from = end;
        }
    }
    out
}

/// Divert target starting at `pos` (after optional blanks) and the index
/// past it. Diverts with arguments are left alone.
fn target_at(text: &str, pos: usize) -> Option<(String, usize)> {
    let start = skip_blank(text, pos, line_end(text, pos));
    let len = path_len(&text[start..]);
    let end = start + len;
    if len == 0 || text[end..].starts_with('(') {
        return None;
    }
    Some((text[start..end].to_string(), end))
}

/// Glue and gather bullets.
fn markup(text: &str) -> Vec<Occurrence> {
    let mut out: Vec<Occurrence> = text
        .match_indices("<>")
        .map(|(i, _)| Occurrence::new(ConstructKind::Markup, "glue", Construct::Glue, i..i + 2))
        .collect();
    for (offset, line) in lines_with_offsets(text) {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('-') || trimmed.starts_with("->") {
            continue;
        }
        let start = offset + (line.len() - trimmed.len());
        let mut end = start + trimmed.len() - trimmed.trim_start_matches(['-', ' ', '\t']).len();
        if text[end..].starts_with('(') {
            if let Some(close) = matching_close(&text[..offset + line.len()], end, false) {
                end = skip_blank(text, close, offset + line.len());
            }
        }
        out.push(Occurrence::new(ConstructKind::Markup, "gather", Construct::Gather, start..end));
    }
    out
}
