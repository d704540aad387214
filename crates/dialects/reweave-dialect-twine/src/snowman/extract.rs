//! Snowman construct extraction over `<% %>` template blocks.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use reweave_core::scan::{matching_close, split_top_level, unquote};
use reweave_core::{Assign, Branch, Construct, ConstructKind, Occurrence};

use crate::js::parse_assign;
use crate::markup::{find_links, html_comments, is_ident_path, non_overlapping};

static SHOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:window\.)?story\.show\(\s*('[^']*'|\x22[^\x22]*\x22)\s*\)\s*;?$")
        .expect("valid regex")
});

static RENDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:window\.)?story\.render\(\s*('[^']*'|\x22[^\x22]*\x22)\s*\)\s*;?$")
        .expect("valid regex")
});

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]\n]+)\]\(([^()\s]+)\)").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    /// `<% %>`
    Code,
    /// `<%= %>`
    Print,
    /// `<%- %>`
    Escape,
}

/// One template block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block<'a> {
    pub range: Range<usize>,
    pub kind: BlockKind,
    pub code: &'a str,
}

pub(crate) fn blocks(text: &str) -> Vec<Block<'_>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find("<%") {
        let start = from + rel;
        let Some(close) = text[start + 2..].find("%>") else {
            break;
        };
        let end = start + 2 + close + 2;
        let inner = &text[start + 2..end - 2];
        let (kind, code) = match inner.as_bytes().first() {
            Some(b'=') => (BlockKind::Print, &inner[1..]),
            Some(b'-') => (BlockKind::Escape, &inner[1..]),
            _ => (BlockKind::Code, inner),
        };
        out.push(Block {
            range: start..end,
            kind,
            code: code.trim(),
        });
        from = end;
    }
    out
}

/// Where a code block sits in an `if` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arm {
    /// `if (c) {`
    If(String),
    /// `} else if (c) {`
    ElseIf(String),
    /// `} else {`
    Else,
    /// `}`
    Close,
}

fn arm(code: &str) -> Option<Arm> {
    let code = code.trim();
    if code == "}" {
        return Some(Arm::Close);
    }
    let (rest, prefixed) = match code.strip_prefix('}') {
        Some(rest) => (rest.trim_start(), true),
        None => (code, false),
    };
    let rest = match rest.strip_prefix("else") {
        Some(after) if prefixed => {
            let after = after.trim_start();
            if after == "{" {
                return Some(Arm::Else);
            }
            return condition(after.strip_prefix("if")?).map(Arm::ElseIf);
        }
        Some(_) => return None,
        None if !prefixed => rest,
        None => return None,
    };
    condition(rest.strip_prefix("if")?).map(Arm::If)
}

/// `(cond) {` → `cond`
fn condition(s: &str) -> Option<String> {
    let s = s.trim_start();
    if !s.starts_with('(') {
        return None;
    }
    let end = matching_close(s, 0, true)?;
    (s[end..].trim() == "{").then(|| s[1..end - 1].trim().to_string())
}

/// Net `{` minus `}` outside strings.
fn brace_delta(code: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in code.chars() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '{' => delta += 1,
                '}' => delta -= 1,
                _ => {}
            },
        }
    }
    delta
}

/// `s.x`, `story.state.x` or `window.story.state.x`, with properties.
pub(crate) fn is_state_path(s: &str) -> bool {
    let s = s.trim();
    ["s.", "story.state.", "window.story.state."]
        .iter()
        .any(|prefix| s.strip_prefix(prefix).is_some_and(is_ident_path))
}

pub(crate) fn extract(kind: ConstructKind, text: &str) -> Vec<Occurrence> {
    match kind {
        ConstructKind::Comment => html_comments(text)
            .into_iter()
            .map(|(range, inner)| {
                let construct = Construct::Comment {
                    text: inner.trim().to_string(),
                };
                Occurrence::new(kind, "comment", construct, range)
            })
            .collect(),
        ConstructKind::Conditional => conditionals(text),
        ConstructKind::Link => non_overlapping(links(text)),
        ConstructKind::Assignment
        | ConstructKind::Navigation
        | ConstructKind::Print
        | ConstructKind::Unsupported
        | ConstructKind::Variable => blocks(text)
            .into_iter()
            .filter_map(|block| classify(kind, text, block))
            .collect(),
        _ => Vec::new(),
    }
}

fn conditionals(text: &str) -> Vec<Occurrence> {
    let blocks = blocks(text);
    let mut out = Vec::new();
    let mut i = 0;
    while i < blocks.len() {
        let Some(found) = chain(text, &blocks, i) else {
            i += 1;
            continue;
        };
        let (occ, next) = found;
        out.push(occ);
        i = next;
    }
    out
}

/// The `if` chain opened by `blocks[open]`, and the index after its close.
fn chain(text: &str, blocks: &[Block<'_>], open: usize) -> Option<(Occurrence, usize)> {
    if blocks[open].kind != BlockKind::Code {
        return None;
    }
    let Some(Arm::If(first)) = arm(blocks[open].code) else {
        return None;
    };
    let mut branches = Vec::new();
    let mut cond = Some(first);
    let mut body_start = blocks[open].range.end;
    let mut depth = 1;
    for (j, block) in blocks.iter().enumerate().skip(open + 1) {
        if block.kind != BlockKind::Code {
            continue;
        }
        let at_chain_level = depth == 1;
        match arm(block.code) {
            Some(next @ (Arm::ElseIf(_) | Arm::Else | Arm::Close)) if at_chain_level => {
                let body = text[body_start..block.range.start].to_string();
                branches.push(match cond.take() {
                    Some(c) => Branch::when(c, body),
                    None => Branch::otherwise(body),
                });
                body_start = block.range.end;
                match next {
                    Arm::ElseIf(c) => cond = Some(c),
                    Arm::Else => {}
                    _ => {
                        let range = blocks[open].range.start..block.range.end;
                        let construct = Construct::Conditional { branches };
                        return Some((
                            Occurrence::new(ConstructKind::Conditional, "if", construct, range),
                            j + 1,
                        ));
                    }
                }
            }
            _ => depth += brace_delta(block.code),
        }
        if depth < 1 {
            return None;
        }
    }
    None
}

fn links(text: &str) -> Vec<Occurrence> {
    let mut out: Vec<Occurrence> = find_links(text)
        .into_iter()
        .map(|link| {
            let construct = Construct::Link {
                text: link.text.map(str::to_string),
                target: link.target.to_string(),
                setter: Vec::new(),
            };
            Occurrence::new(ConstructKind::Link, "link", construct, link.range)
        })
        .collect();
    for caps in MARKDOWN_LINK.captures_iter(text) {
        let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        // Real URLs stay ordinary markdown.
        if target.as_str().contains([':', '#', '/', '.']) {
            continue;
        }
        let construct = Construct::Link {
            text: Some(label.as_str().to_string()),
            target: target.as_str().to_string(),
            setter: Vec::new(),
        };
        out.push(Occurrence::new(ConstructKind::Link, "link", construct, whole.range()));
    }
    out
}

fn classify(kind: ConstructKind, text: &str, block: Block<'_>) -> Option<Occurrence> {
    let code = block.code;
    let printing = block.kind != BlockKind::Code;
    let occ = |feature: &'static str, construct: Construct| {
        Some(Occurrence::new(kind, feature, construct, block.range.clone()))
    };
    match kind {
        ConstructKind::Navigation if !printing => {
            let caps = SHOW.captures(code)?;
            let target = unquote(caps.get(1)?.as_str())?;
            occ("goto", Construct::Goto { target })
        }
        ConstructKind::Navigation => {
            let caps = RENDER.captures(code)?;
            let target = unquote(caps.get(1)?.as_str())?;
            occ("include", Construct::Include { target })
        }
        ConstructKind::Assignment if !printing => {
            let assigns = assignments(code)?;
            occ("set", Construct::Assignment { assigns })
        }
        ConstructKind::Print if printing => {
            if is_state_path(code) || RENDER.is_match(code) || code.is_empty() {
                return None;
            }
            occ(
                "print",
                Construct::Print {
                    expr: code.to_string(),
                },
            )
        }
        ConstructKind::Variable if printing && is_state_path(code) => occ(
            "variable",
            Construct::Variable {
                expr: code.to_string(),
                temp: false,
            },
        ),
        ConstructKind::Unsupported if !printing => occ(
            "script",
            Construct::Unsupported {
                original: text[block.range.clone()].to_string(),
            },
        ),
        _ => None,
    }
}

/// A code block made only of story-variable assignments.
fn assignments(code: &str) -> Option<Vec<Assign>> {
    let mut out = Vec::new();
    for stmt in split_top_level(code, ';') {
        if stmt.trim().is_empty() {
            continue;
        }
        let assign = parse_assign(stmt, false)?;
        if !is_state_path(&assign.target) {
            return None;
        }
        out.push(assign);
    }
    (!out.is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(kind: ConstructKind, text: &str) -> Occurrence {
        let mut found = extract(kind, text);
        assert_eq!(found.len(), 1, "{found:?}");
        found.remove(0)
    }

    #[test]
    fn test_blocks() {
        let found = blocks("<% s.a = 1; %> <%= s.a %> <%- s.b %>");
        let kinds: Vec<BlockKind> = found.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlockKind::Code, BlockKind::Print, BlockKind::Escape]);
        assert_eq!(found[0].code, "s.a = 1;");
    }

    #[test]
    fn test_if_chain() {
        let text = "<% if (s.gold > 5) { %>Rich<% } else if (s.gold > 0) { %>Some<% } else { %>None<% } %>!";
        let occ = one(ConstructKind::Conditional, text);
        let Construct::Conditional { branches } = &occ.construct else {
            panic!("not a conditional");
        };
        assert_eq!(
            branches,
            &vec![
                Branch::when("s.gold > 5", "Rich"),
                Branch::when("s.gold > 0", "Some"),
                Branch::otherwise("None"),
            ]
        );
        assert_eq!(&text[occ.range.end..], "!");
    }

    #[test]
    fn test_nested_if_stays_in_body() {
        let text = "<% if (s.a) { %>A<% if (s.b) { %>B<% } %><% } %>";
        let occ = one(ConstructKind::Conditional, text);
        let Construct::Conditional { branches } = occ.construct else {
            panic!("not a conditional");
        };
        assert_eq!(branches[0].body, "A<% if (s.b) { %>B<% } %>");
    }

    #[test]
    fn test_code_block_kinds() {
        let text = "<% s.gold += 5; s.seen = true %><% story.show('End'); %><%= story.render(\"Map\") %><% alert(1) %>";
        let set = one(ConstructKind::Assignment, text);
        assert_eq!(
            set.construct,
            Construct::Assignment {
                assigns: vec![Assign::new("s.gold", "s.gold + 5"), Assign::new("s.seen", "true")]
            }
        );
        let nav: Vec<Construct> = extract(ConstructKind::Navigation, text)
            .into_iter()
            .map(|o| o.construct)
            .collect();
        assert_eq!(
            nav,
            vec![
                Construct::Goto { target: "End".into() },
                Construct::Include { target: "Map".into() }
            ]
        );
        assert!(extract(ConstructKind::Print, text).is_empty());
    }

    #[test]
    fn test_print_versus_variable() {
        let text = "<%= s.name %> <%= s.gold * 2 %>";
        assert_eq!(one(ConstructKind::Variable, text).feature, "variable");
        assert_eq!(
            one(ConstructKind::Print, text).construct,
            Construct::Print {
                expr: "s.gold * 2".into()
            }
        );
    }

    #[test]
    fn test_markdown_links() {
        let found = extract(ConstructKind::Link, "[Go](Shop) [site](https://example.com) [[Home]]");
        let targets: Vec<&str> = found
            .iter()
            .map(|o| match &o.construct {
                Construct::Link { target, .. } => target.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(targets, vec!["Shop", "Home"]);
    }
}
