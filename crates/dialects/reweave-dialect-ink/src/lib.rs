//! Ink: knots and stitches of prose with `{...}` logic, `~` statements,
//! `*`/`+` choices and `->` diverts.
//!
//! Variables are bare identifiers, temporaries are declared with
//! `~ temp`, and a bare knot name in an expression is its visit count.

mod expr;
mod extract;
pub mod ident;

use std::collections::HashSet;

use reweave_core::construct::{AltMode, Assign, Construct, ConstructKind};
use reweave_core::expr::{ExprPrinter, Op, Token};
use reweave_core::scan::lines_with_offsets;
use reweave_core::{Dialect, Emission, FeatureSpec, Layout, LexContext, Occurrence, Syntax};

use ConstructKind as K;

use extract::parse_assign;

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("variable", K::Variable, r"\{\s*[A-Za-z_][\w.]*\s*\}"),
    FeatureSpec::new("temp-variable", K::Assignment, r"(?m)^\s*~\s*temp\s"),
    FeatureSpec::new("set", K::Assignment, r"(?m)^\s*~\s*[A-Za-z_][\w.]*\s*(?:[-+*/]?=|\+\+|--)"),
    FeatureSpec::new("if", K::Conditional, r"\{[^{}|\n]*:|\*\s*\{"),
    FeatureSpec::new("else-if", K::Conditional, r"(?m)^\s*-\s*[^\s>\-][^\n:]*:"),
    FeatureSpec::new("choice", K::Link, r"(?m)^\s*\*[^\n]*->"),
    FeatureSpec::new("sticky-choice", K::Link, r"(?m)^\s*\+[^\n]*->"),
    FeatureSpec::new("choice-branch", K::Link, r"(?m)^\s*[*+][^\n>]*$"),
    FeatureSpec::new("divert", K::Navigation, r"->\s*[A-Za-z_][\w.]*"),
    FeatureSpec::new("end", K::Navigation, r"->\s*(?:END|DONE)\b"),
    FeatureSpec::new("tunnel", K::Navigation, r"->\s*[A-Za-z_][\w.]*\s*->"),
    FeatureSpec::new("thread", K::Navigation, r"<-\s*[A-Za-z_]"),
    FeatureSpec::new("print", K::Print, r"\{[^{}|:]+\}"),
    FeatureSpec::new("shuffle", K::Alternatives, r"\{~|\{\s*shuffle[^:\n]*:"),
    FeatureSpec::new("cycle", K::Alternatives, r"\{&|\{\s*cycle:"),
    FeatureSpec::new("once", K::Alternatives, r"\{!|\{\s*once:"),
    FeatureSpec::new("sequence", K::Alternatives, r"\{[^{}~&!:]*\||\{\s*(?:stopping|sequence):"),
    FeatureSpec::new("glue", K::Markup, r"<>"),
    FeatureSpec::new("gather", K::Markup, r"(?m)^\s*-(?:\s|\()"),
    FeatureSpec::new("tag", K::Unsupported, r"(?m)(?:^|\s)#\s*\S"),
    FeatureSpec::new("list", K::Unsupported, r"(?m)^\s*LIST\s"),
    FeatureSpec::new("include-file", K::Unsupported, r"(?m)^\s*INCLUDE\s"),
    FeatureSpec::new("logic", K::Unsupported, r"(?m)^\s*~|->->"),
    FeatureSpec::new("comment", K::Comment, r"(?m)/\*[\s\S]*?\*/|//.*$"),
    FeatureSpec::new("random", K::Print, r"\bRANDOM\("),
    FeatureSpec::new("visited", K::Print, r"\b(?:TURNS_SINCE|READ_COUNT)\("),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Ink;

impl ExprPrinter for Ink {
    /// Ink names carry no sigil; temporaries are told apart by their
    /// `~ temp` declaration.
    fn var(&self, name: &str, _temp: bool) -> String {
        name.to_string()
    }

    fn op(&self, op: Op) -> &'static str {
        match op {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::And => "&&",
            Op::Or => "||",
            Op::Not => "not",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Contains | Op::In => "?",
            Op::Question => "?",
        }
    }

    fn call(&self, name: &str, args: Vec<String>) -> String {
        match name {
            "random" => format!("RANDOM({})", args.join(", ")),
            "visited" => match args.as_slice() {
                [target] => ident::sanitize_path(target.trim_matches('"')),
                _ => format!("TURNS_SINCE({})", args.join(", ")),
            },
            _ => format!("{name}({})", args.join(", ")),
        }
    }

    fn names_current_passage(&self) -> bool {
        true
    }

    /// List literal.
    fn array(&self, items: Vec<String>) -> String {
        format!("({})", items.join(", "))
    }

    fn map(&self, pairs: Vec<(String, String)>) -> String {
        let pairs: Vec<String> = pairs.into_iter().map(|(k, v)| format!("{k}: {v}")).collect();
        format!("({})", pairs.join(", "))
    }
}

impl Syntax for Ink {
    fn dialect(&self) -> Dialect {
        Dialect::Ink
    }

    fn features(&self) -> &'static [FeatureSpec] {
        FEATURES
    }

    fn extract(&self, kind: ConstructKind, text: &str, _cx: &LexContext<'_>) -> Vec<Occurrence> {
        extract::extract(kind, text)
    }

    fn lex(&self, src: &str, cx: &LexContext<'_>) -> Vec<Token> {
        expr::lex(src, cx)
    }

    fn temporaries(&self, content: &str) -> HashSet<String> {
        lines_with_offsets(content)
            .filter_map(|(_, line)| line.trim_start().strip_prefix('~'))
            .filter_map(parse_assign)
            .filter(|a| a.temp)
            .map(|a| a.target)
            .collect()
    }

    fn emit(&self, construct: &Construct) -> Option<Emission> {
        let emission = match construct {
            Construct::VarsSection { entries } => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|e| {
                        let stmt = statement(&e.assign);
                        match &e.guard {
                            Some(g) => format!("{{{g}:\n    {stmt}\n}}"),
                            None => stmt,
                        }
                    })
                    .collect();
                Emission::line(lines.join("\n"))
            }
            Construct::Comment { text } => Emission::inline(self.comment(text)),
            Construct::Conditional { branches } => {
                let inline = branches.len() <= 2
                    && branches.iter().skip(1).all(|b| b.cond.is_none())
                    && branches.iter().all(|b| is_plain_prose(&b.body));
                if inline {
                    let cond = branches[0].cond.as_deref().unwrap_or("true");
                    let mut parts = vec![format!("{{{cond}:")];
                    if branches.len() == 2 {
                        parts.push("|".to_string());
                    }
                    parts.push("}".to_string());
                    Emission::block_inline(parts)
                } else {
                    let mut parts = Vec::with_capacity(branches.len() + 1);
                    for (i, branch) in branches.iter().enumerate() {
                        let head = match &branch.cond {
                            Some(c) if i == 0 => format!("{{\n- {c}:"),
                            Some(c) => format!("- {c}:"),
                            None if i == 0 => "{\n- else:".to_string(),
                            None => "- else:".to_string(),
                        };
                        parts.push((head, Layout::Line));
                    }
                    parts.push(("}".to_string(), Layout::Line));
                    Emission::Block(parts)
                }
            }
            Construct::Hook { .. } | Construct::Style { .. } => Emission::block_inline(["", ""]),
            Construct::Assignment { assigns } => Emission::line(
                assigns.iter().map(statement).collect::<Vec<_>>().join("\n"),
            ),
            Construct::Goto { target } => Emission::inline(format!("-> {target}")),
            Construct::Include { target } => Emission::line(format!("-> {target} ->")),
            Construct::Print { expr } | Construct::Variable { expr, .. } => {
                Emission::inline(format!("{{{expr}}}"))
            }
            Construct::Alternatives { mode, items } => {
                let prefix = match mode {
                    AltMode::Shuffle => "~",
                    AltMode::Cycle => "&",
                    AltMode::Once => "!",
                    AltMode::Sequence => "",
                };
                Emission::inline(format!("{{{prefix}{}}}", items.join("|")))
            }
            Construct::Link {
                text,
                target,
                setter,
            } => {
                let label = text.as_deref().unwrap_or(target);
                let mut out = format!("+ [{label}]");
                if setter.is_empty() {
                    out.push_str(&format!(" -> {target}"));
                } else {
                    for assign in setter {
                        out.push_str(&format!("\n    {}", statement(assign)));
                    }
                    out.push_str(&format!("\n    -> {target}"));
                }
                Emission::line(out)
            }
            Construct::Glue => Emission::inline("<>"),
            Construct::Gather => Emission::inline("- "),
            Construct::End => Emission::inline("-> END"),
            Construct::Timed { .. }
            | Construct::Reveal { .. }
            | Construct::HookEdit { .. }
            | Construct::Widget { .. }
            | Construct::Back { .. }
            | Construct::Restart { .. }
            | Construct::Unsupported { .. } => return None,
        };
        Some(emission)
    }

    fn comment(&self, text: &str) -> String {
        format!("/* {} */", text.replace("*/", "* /"))
    }

    fn negate(&self, cond: &str) -> String {
        if is_atom(cond) {
            format!("not {cond}")
        } else {
            format!("not ({cond})")
        }
    }

    fn conjoin(&self, a: &str, b: &str) -> String {
        let wrap = |c: &str| {
            if c.contains("||") {
                format!("({c})")
            } else {
                c.to_string()
            }
        };
        format!("{} && {}", wrap(a), wrap(b))
    }
}

fn statement(assign: &Assign) -> String {
    if assign.temp {
        format!("~ temp {} = {}", assign.target, assign.value)
    } else {
        format!("~ {} = {}", assign.target, assign.value)
    }
}

fn is_atom(cond: &str) -> bool {
    ident::is_ident_path(cond)
        || (cond.starts_with('(') && reweave_core::scan::matching_close(cond, 0, true) == Some(cond.len()))
}

/// Single-line text that needs no logic of its own, safe inside an inline
/// `{cond: a|b}`.
fn is_plain_prose(body: &str) -> bool {
    !body.contains(['\n', '|', '{', '}', '[', ']', '(', '<', '~', '$', '@', '#'])
}

#[cfg(test)]
mod tests {
    use reweave_core::construct::{Branch, VarsEntry};

    use super::*;

    fn inline(e: Option<Emission>) -> String {
        match e {
            Some(Emission::Text(text, Layout::Inline)) => text,
            other => panic!("expected inline text, got {other:?}"),
        }
    }

    fn line(e: Option<Emission>) -> String {
        match e {
            Some(Emission::Text(text, Layout::Line)) => text,
            other => panic!("expected line text, got {other:?}"),
        }
    }

    #[test]
    fn test_print_expressions() {
        let cx = LexContext::default();
        let toks = Ink.lex("gold >= 5 and not (bag ? key)", &cx);
        assert_eq!(Ink.print(&toks), "gold >= 5 && not (bag ? key)");
    }

    #[test]
    fn test_visit_counts_print_as_knot_names() {
        let names: HashSet<String> = ["Dark Forest".to_string()].into();
        let cx = LexContext::new(&names);
        let toks = vec![Token::Call {
            name: "visited".into(),
            args: vec![vec![Token::Str("Dark Forest".into())]],
        }];
        assert_eq!(Ink.print(&toks), "Dark_Forest");
        let toks = Ink.lex("RANDOM(1, 6) > 3", &cx);
        assert_eq!(Ink.print(&toks), "RANDOM(1, 6) > 3");
    }

    #[test]
    fn test_temporaries() {
        let content = "~ temp roll = RANDOM(1, 6)\n~ gold = 5\n  ~ temp name = \"x\"";
        let temps = Ink.temporaries(content);
        assert_eq!(temps, HashSet::from(["roll".to_string(), "name".to_string()]));
    }

    #[test]
    fn test_emit_inline_conditional() {
        let c = Construct::Conditional {
            branches: vec![Branch::when("gold > 5", "rich"), Branch::otherwise("poor")],
        };
        let Some(Emission::Block(parts)) = Ink.emit(&c) else {
            panic!("expected block");
        };
        let parts: Vec<&str> = parts.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(parts, vec!["{gold > 5:", "|", "}"]);
    }

    #[test]
    fn test_emit_multiline_conditional() {
        let c = Construct::Conditional {
            branches: vec![
                Branch::when("a", "(set: $x to 1)"),
                Branch::when("b", "two"),
                Branch::otherwise("three"),
            ],
        };
        let Some(Emission::Block(parts)) = Ink.emit(&c) else {
            panic!("expected block");
        };
        assert!(parts.iter().all(|(_, layout)| *layout == Layout::Line));
        let parts: Vec<&str> = parts.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(parts, vec!["{\n- a:", "- b:", "- else:", "}"]);
    }

    #[test]
    fn test_emit_assignments() {
        let mut temp = Assign::new("roll", "RANDOM(1, 6)");
        temp.temp = true;
        let c = Construct::Assignment {
            assigns: vec![Assign::new("gold", "10"), temp],
        };
        assert_eq!(line(Ink.emit(&c)), "~ gold = 10\n~ temp roll = RANDOM(1, 6)");
    }

    #[test]
    fn test_emit_guarded_vars_entry() {
        let c = Construct::VarsSection {
            entries: vec![VarsEntry {
                assign: Assign::new("met", "true"),
                guard: Some("visits > 1".into()),
            }],
        };
        assert_eq!(line(Ink.emit(&c)), "{visits > 1:\n    ~ met = true\n}");
    }

    #[test]
    fn test_emit_links() {
        let plain = Construct::Link {
            text: Some("Go north".into()),
            target: "north".into(),
            setter: Vec::new(),
        };
        assert_eq!(line(Ink.emit(&plain)), "+ [Go north] -> north");
        let setter = Construct::Link {
            text: None,
            target: "shop".into(),
            setter: vec![Assign::new("gold", "gold - 5")],
        };
        assert_eq!(line(Ink.emit(&setter)), "+ [shop]\n    ~ gold = gold - 5\n    -> shop");
    }

    #[test]
    fn test_emit_navigation_and_print() {
        assert_eq!(inline(Ink.emit(&Construct::Goto { target: "End".into() })), "-> End");
        assert_eq!(line(Ink.emit(&Construct::Include { target: "Map".into() })), "-> Map ->");
        assert_eq!(inline(Ink.emit(&Construct::Print { expr: "gold * 2".into() })), "{gold * 2}");
        let alt = Construct::Alternatives {
            mode: AltMode::Shuffle,
            items: vec!["Heads".into(), "Tails".into()],
        };
        assert_eq!(inline(Ink.emit(&alt)), "{~Heads|Tails}");
    }

    #[test]
    fn test_no_timers_or_widgets() {
        let c = Construct::Timed {
            delay: std::time::Duration::from_secs(2),
            repeat: false,
            body: "x".into(),
        };
        assert!(Ink.emit(&c).is_none());
        assert!(Ink.emit(&Construct::Back { label: None }).is_none());
    }

    #[test]
    fn test_negate_and_conjoin() {
        assert_eq!(Ink.negate("met"), "not met");
        assert_eq!(Ink.negate("a && b"), "not (a && b)");
        assert_eq!(Ink.conjoin("a || b", "c"), "(a || b) && c");
        assert_eq!(Ink.comment("x */ y"), "/* x * / y */");
    }
}
