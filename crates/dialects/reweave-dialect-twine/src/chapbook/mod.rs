//! Chapbook: a vars section above `--`, `[modifier]` lines and `{insert}`
//! braces. Expressions are plain JavaScript over bare variable names.

pub(crate) mod extract;

use reweave_core::construct::{Assign, Construct, ConstructKind, WidgetKind};
use reweave_core::expr::{ExprPrinter, Op, Token};
use reweave_core::scan::{format_delay, single_quoted};
use reweave_core::{Dialect, Emission, FeatureSpec, Layout, LexContext, Occurrence, Syntax};

use crate::js::{self, Flavor};
use crate::markup::is_ident_path;

use ConstructKind as K;

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("vars-section", K::VarsSection, r"(?m)^--\s*$"),
    FeatureSpec::new("set", K::VarsSection, r"(?m)^[A-Za-z_$][\w$.]*\s*:"),
    FeatureSpec::new("conditional-var", K::VarsSection, r"(?m)^[A-Za-z_$][\w$.]*\s*\([^)]*\)\s*:"),
    FeatureSpec::new("variable", K::Variable, r"\{\s*[A-Za-z_$][\w$.]*\s*\}"),
    FeatureSpec::new("if", K::Conditional, r"(?im)^\[if\s"),
    FeatureSpec::new("unless", K::Conditional, r"(?im)^\[unless\s"),
    FeatureSpec::new("link", K::Link, r"\[\[[^\]]+\]\]|\{link to:"),
    FeatureSpec::new("embed-passage", K::Navigation, r"\{embed passage(?: named)?:"),
    FeatureSpec::new("reveal-link", K::Reveal, r"\{reveal link:"),
    FeatureSpec::new("dropdown-menu", K::Widget, r"\{dropdown menu for:"),
    FeatureSpec::new("cycling-link", K::Widget, r"\{cycling link for:"),
    FeatureSpec::new("text-input", K::Widget, r"\{text input for:"),
    FeatureSpec::new("after", K::Timed, r"(?im)^\[after\s"),
    FeatureSpec::new("back-link", K::Markup, r"\{back link"),
    FeatureSpec::new("restart-link", K::Markup, r"\{restart link"),
    FeatureSpec::new("note", K::Comment, r"(?im)^\[(?:note|notes|todo|fixme)\]"),
    FeatureSpec::new("javascript", K::Unsupported, r"(?im)^\[javascript\]"),
    FeatureSpec::new("comment", K::Comment, r"<!--[\s\S]*?-->"),
    FeatureSpec::new("modifier", K::Unsupported, r"(?m)^\[[A-Za-z][^\[\]]*\]\s*$"),
    FeatureSpec::new("insert", K::Unsupported, r"\{[a-z][a-z ]*[,:}]"),
    FeatureSpec::new("array", K::Print, r"\[[^\[\]]*,"),
    FeatureSpec::new("datamap", K::Print, r"\{\s*[\w\x22']+\s*:"),
    FeatureSpec::new("random", K::Print, r"\brandom\.|Math\.random\("),
    FeatureSpec::new("either", K::Print, r"\[[^\]]*\]\[Math\.floor\("),
    FeatureSpec::new("visits", K::Print, r"passage\.visits\b|\bvisits\s*[<>=!]"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Chapbook;

impl ExprPrinter for Chapbook {
    fn var(&self, name: &str, temp: bool) -> String {
        if temp {
            format!("_{name}")
        } else {
            name.to_string()
        }
    }

    fn op(&self, op: Op) -> &'static str {
        js::op(op)
    }

    fn call(&self, name: &str, args: Vec<String>) -> String {
        if name == "visited" && args.is_empty() {
            return "passage.visits".to_string();
        }
        js::math_random(name, &args).unwrap_or_else(|| format!("{name}({})", args.join(", ")))
    }

    fn array(&self, items: Vec<String>) -> String {
        js::array(items)
    }

    fn map(&self, pairs: Vec<(String, String)>) -> String {
        js::object(pairs)
    }

    fn string(&self, s: &str) -> String {
        single_quoted(s)
    }

    fn contains(&self, haystack: String, needle: String) -> String {
        js::includes(haystack, needle)
    }
}

impl Syntax for Chapbook {
    fn dialect(&self) -> Dialect {
        Dialect::Chapbook
    }

    fn features(&self) -> &'static [FeatureSpec] {
        FEATURES
    }

    fn extract(&self, kind: ConstructKind, text: &str, _cx: &LexContext<'_>) -> Vec<Occurrence> {
        extract::extract(kind, text)
    }

    fn lex(&self, src: &str, _cx: &LexContext<'_>) -> Vec<Token> {
        js::lex(src, Flavor::Chapbook)
    }

    fn emit(&self, construct: &Construct) -> Option<Emission> {
        let emission = match construct {
            Construct::VarsSection { entries } => {
                let mut lines: Vec<String> = entries
                    .iter()
                    .map(|e| vars_line(&e.assign, e.guard.as_deref()))
                    .collect();
                lines.push("--".to_string());
                Emission::line(lines.join("\n"))
            }
            Construct::Comment { text } => Emission::inline(self.comment(text)),
            Construct::Conditional { branches } => {
                // Modifiers cannot chain, so each arm tests its own full
                // guard; a lone trailing else can stay `[else]`.
                let plain_else = branches.len() == 2 && branches[1].cond.is_none();
                let mut prior: Vec<String> = Vec::new();
                let mut parts = Vec::with_capacity(branches.len() + 1);
                for (i, branch) in branches.iter().enumerate() {
                    let modifier = match &branch.cond {
                        Some(c) if i == 0 => format!("[if {c}]"),
                        None if plain_else => "[else]".to_string(),
                        cond => {
                            let mut terms: Vec<String> = prior.iter().map(|p| self.negate(p)).collect();
                            terms.extend(cond.iter().cloned());
                            let guard = terms
                                .into_iter()
                                .reduce(|a, b| self.conjoin(&a, &b))
                                .unwrap_or_else(|| "true".to_string());
                            format!("[if {guard}]")
                        }
                    };
                    prior.extend(branch.cond.iter().cloned());
                    parts.push((modifier, Layout::Line));
                }
                parts.push(("[continue]".to_string(), Layout::Line));
                Emission::Block(parts)
            }
            Construct::Timed { delay, .. } => Emission::Block(vec![
                (format!("[after {}]", format_delay(*delay)), Layout::Line),
                ("[continue]".to_string(), Layout::Line),
            ]),
            Construct::Reveal { label, .. } => Emission::block_inline([
                format!("{{reveal link: {}, text: '", single_quoted(label)),
                "'}".to_string(),
            ]),
            Construct::Hook { name, .. } => {
                Emission::block_inline([format!("<span id=\"{name}\">"), "</span>".to_string()])
            }
            Construct::HookEdit { .. } => return None,
            Construct::Style { css, .. } if css.is_empty() => Emission::block_inline(["", ""]),
            Construct::Style { css, .. } => Emission::block_inline([
                format!("<span style=\"{}\">", css.replace('"', "'")),
                "</span>".to_string(),
            ]),
            Construct::Assignment { assigns } => Emission::Hoist {
                assigns: assigns.clone(),
                text: String::new(),
            },
            Construct::Widget {
                widget,
                var,
                options,
                ..
            } => {
                let var = single_quoted(var);
                let choices = js::array(options.clone());
                Emission::inline(match widget {
                    WidgetKind::Dropdown => format!("{{dropdown menu for: {var}, choices: {choices}}}"),
                    WidgetKind::Cycling => format!("{{cycling link for: {var}, choices: {choices}}}"),
                    WidgetKind::TextInput => format!("{{text input for: {var}}}"),
                    WidgetKind::Checkbox => return None,
                })
            }
            Construct::Goto { target } => {
                let target = single_quoted(target);
                Emission::inline(format!("{{link to: {target}, label: {target}}}"))
            }
            Construct::Include { target } => {
                Emission::inline(format!("{{embed passage: {}}}", single_quoted(target)))
            }
            Construct::Print { expr } => self.show(expr),
            Construct::Alternatives { .. } => return None,
            Construct::Link {
                text,
                target,
                setter,
            } => {
                if !setter.is_empty() {
                    return None;
                }
                Emission::inline(match text {
                    Some(t) if t != target => format!("[[{t}->{target}]]"),
                    _ => format!("[[{target}]]"),
                })
            }
            Construct::Back { label } => Emission::inline(labelled("back link", label.as_deref())),
            Construct::Restart { label } => {
                Emission::inline(labelled("restart link", label.as_deref()))
            }
            Construct::Glue | Construct::Gather | Construct::End => Emission::inline(""),
            Construct::Variable { expr, .. } => self.show(expr),
            Construct::Unsupported { .. } => return None,
        };
        Some(emission)
    }

    fn comment(&self, text: &str) -> String {
        format!("<!-- {} -->", text.replace("-->", "--&gt;"))
    }

    fn negate(&self, cond: &str) -> String {
        js::negate(cond)
    }

    fn conjoin(&self, a: &str, b: &str) -> String {
        js::conjoin(a, b)
    }

    fn finish_passage(&self, body: String, hoisted: Vec<(Assign, Option<String>)>) -> String {
        if hoisted.is_empty() {
            return body;
        }
        let lines: Vec<String> = hoisted
            .iter()
            .map(|(assign, guard)| vars_line(assign, guard.as_deref()))
            .collect();
        let lines = lines.join("\n");
        match extract::vars_section(&body) {
            Some(section) => format!(
                "{}{lines}\n{}",
                &body[..section.dashes],
                &body[section.dashes..]
            ),
            None => format!("{lines}\n--\n{body}"),
        }
    }
}

impl Chapbook {
    /// Inserts only read variables, so anything more involved is computed
    /// in the vars section and shown through a generated name.
    fn show(&self, expr: &str) -> Emission {
        if is_ident_path(expr) {
            return Emission::inline(format!("{{{expr}}}"));
        }
        let name = format!("print_{}", sanitize(expr));
        Emission::Hoist {
            text: format!("{{{name}}}"),
            assigns: vec![Assign::new(name, expr)],
        }
    }
}

fn vars_line(assign: &Assign, guard: Option<&str>) -> String {
    match guard {
        Some(g) => format!("{} ({g}): {}", assign.target, assign.value),
        None => format!("{}: {}", assign.target, assign.value),
    }
}

fn labelled(insert: &str, label: Option<&str>) -> String {
    match label {
        Some(l) => format!("{{{insert}, label: {}}}", single_quoted(l)),
        None => format!("{{{insert}}}"),
    }
}

/// Identifier fragment derived from an expression.
fn sanitize(expr: &str) -> String {
    let mut out = String::new();
    for c in expr.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out: String = out.trim_matches('_').chars().take(32).collect();
    if out.is_empty() {
        "value".to_string()
    } else {
        out.trim_end_matches('_').to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reweave_core::construct::{Branch, VarsEntry};

    use super::*;

    fn inline(e: Option<Emission>) -> String {
        match e {
            Some(Emission::Text(text, Layout::Inline)) => text,
            other => panic!("expected inline text, got {other:?}"),
        }
    }

    #[test]
    fn test_print_expressions() {
        let cx = LexContext::default();
        let toks = crate::SugarCube.lex("$gold gte 5 and either(\"a\", \"b\")", &cx);
        assert_eq!(
            Chapbook.print(&toks),
            "gold >= 5 && ['a', 'b'][Math.floor(Math.random() * 2)]"
        );
    }

    #[test]
    fn test_conditional_chain_is_flattened() {
        let c = Construct::Conditional {
            branches: vec![
                Branch::when("a", "x"),
                Branch::when("b", "y"),
                Branch::otherwise("z"),
            ],
        };
        let Some(Emission::Block(parts)) = Chapbook.emit(&c) else {
            panic!("expected block");
        };
        let parts: Vec<&str> = parts.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            parts,
            vec!["[if a]", "[if !a && b]", "[if !a && !b]", "[continue]"]
        );
    }

    #[test]
    fn test_if_else_keeps_else() {
        let c = Construct::Conditional {
            branches: vec![Branch::when("a", "x"), Branch::otherwise("y")],
        };
        let Some(Emission::Block(parts)) = Chapbook.emit(&c) else {
            panic!("expected block");
        };
        assert_eq!(parts[1].0, "[else]");
        assert!(parts.iter().all(|(_, layout)| *layout == Layout::Line));
    }

    #[test]
    fn test_timed_is_after_modifier() {
        let c = Construct::Timed {
            delay: Duration::from_millis(2000),
            repeat: true,
            body: String::new(),
        };
        let Some(Emission::Block(parts)) = Chapbook.emit(&c) else {
            panic!("expected block");
        };
        assert_eq!(parts[0].0, "[after 2s]");
    }

    #[test]
    fn test_assignment_hoists() {
        let c = Construct::Assignment {
            assigns: vec![Assign::new("gold", "gold + 1")],
        };
        assert_eq!(
            Chapbook.emit(&c),
            Some(Emission::Hoist {
                assigns: vec![Assign::new("gold", "gold + 1")],
                text: String::new()
            })
        );
    }

    #[test]
    fn test_complex_print_hoists_named_value() {
        let c = Construct::Print {
            expr: "gold * 2".into(),
        };
        assert_eq!(
            Chapbook.emit(&c),
            Some(Emission::Hoist {
                assigns: vec![Assign::new("print_gold_2", "gold * 2")],
                text: "{print_gold_2}".into()
            })
        );
        let v = Construct::Variable {
            expr: "hero.name".into(),
            temp: false,
        };
        assert_eq!(inline(Chapbook.emit(&v)), "{hero.name}");
    }

    #[test]
    fn test_finish_passage_builds_vars_section() {
        let hoisted = vec![
            (Assign::new("gold", "1"), None),
            (Assign::new("key", "true"), Some("gold > 0".to_string())),
        ];
        assert_eq!(
            Chapbook.finish_passage("Text.".into(), hoisted),
            "gold: 1\nkey (gold > 0): true\n--\nText."
        );
    }

    #[test]
    fn test_finish_passage_merges_existing_section() {
        let section = Construct::VarsSection {
            entries: vec![VarsEntry {
                assign: Assign::new("a", "1"),
                guard: None,
            }],
        };
        let Some(Emission::Text(head, Layout::Line)) = Chapbook.emit(&section) else {
            panic!("expected line");
        };
        let body = format!("{head}\nText.");
        assert_eq!(
            Chapbook.finish_passage(body, vec![(Assign::new("b", "2"), None)]),
            "a: 1\nb: 2\n--\nText."
        );
    }

    #[test]
    fn test_widgets() {
        let c = Construct::Widget {
            widget: WidgetKind::Cycling,
            var: "mood".into(),
            options: vec!["'Happy'".into(), "'Sad'".into()],
            label: None,
        };
        assert_eq!(
            inline(Chapbook.emit(&c)),
            "{cycling link for: 'mood', choices: ['Happy', 'Sad']}"
        );
        let check = Construct::Widget {
            widget: WidgetKind::Checkbox,
            var: "ok".into(),
            options: vec![],
            label: None,
        };
        assert!(Chapbook.emit(&check).is_none());
    }
}
