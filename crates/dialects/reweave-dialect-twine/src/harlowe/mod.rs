//! Harlowe: `(macro: args)[hook]` syntax, `$` / `_` sigils.

mod expr;
pub(crate) mod extract;
pub mod macros;

use reweave_core::construct::{AltMode, Assign, Construct, ConstructKind, WidgetKind};
use reweave_core::expr::{ExprPrinter, Op, Token};
use reweave_core::scan::{double_quoted, format_delay};
use reweave_core::{Dialect, Emission, FeatureSpec, LexContext, Occurrence, Syntax};

use crate::markup::is_ident_path;

use ConstructKind as K;

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("variable", K::Variable, r"\$[A-Za-z_]\w*"),
    FeatureSpec::new("temp-variable", K::Variable, r"(?:^|\W)_[A-Za-z]\w*"),
    FeatureSpec::new("set", K::Assignment, r"\((?i:set|put):"),
    FeatureSpec::new("if", K::Conditional, r"\((?i:if):"),
    FeatureSpec::new("unless", K::Conditional, r"\((?i:unless):"),
    FeatureSpec::new("else-if", K::Conditional, r"\((?i:else-?if):"),
    FeatureSpec::new("link", K::Link, r"\[\[[^\]]+\]\]|\((?i:link-?goto):"),
    FeatureSpec::new("goto", K::Navigation, r"\((?i:go-?to):"),
    FeatureSpec::new("display", K::Navigation, r"\((?i:display):"),
    FeatureSpec::new("print", K::Print, r"\((?i:print):"),
    FeatureSpec::new("dropdown", K::Widget, r"\((?i:(?:force-?)?dropdown):"),
    FeatureSpec::new("cycling-link", K::Widget, r"\((?i:cycling-?link):"),
    FeatureSpec::new("input-box", K::Widget, r"\((?i:(?:force-?)?input(?:-?box)?):"),
    FeatureSpec::new("checkbox", K::Widget, r"\((?i:(?:force-?)?checkbox):"),
    FeatureSpec::new("live", K::Timed, r"\((?i:live):"),
    FeatureSpec::new("after", K::Timed, r"\((?i:after):"),
    FeatureSpec::new("link-reveal", K::Reveal, r"\((?i:link|link-?reveal):"),
    FeatureSpec::new("named-hook", K::Hook, r"\|[A-Za-z_][\w-]*>\[|\]<[A-Za-z_][\w-]*\|"),
    FeatureSpec::new("replace", K::Hook, r"\((?i:replace):\s*\?"),
    FeatureSpec::new("append", K::Hook, r"\((?i:append):\s*\?"),
    FeatureSpec::new("prepend", K::Hook, r"\((?i:prepend):\s*\?"),
    FeatureSpec::new(
        "text-style",
        K::Hook,
        r"\((?i:colou?r|text-?colou?r|background|bg|text-?style|font|css):",
    ),
    FeatureSpec::new(
        "changer",
        K::Hook,
        r"\((?i:transition|t8n|align|hover-?style|box|float-?box|opacity|text-?size|text-?rotate|collapse|nobr|verbatim|hidden)[\w-]*:",
    ),
    FeatureSpec::new("click", K::Unsupported, r"\((?i:click)[\w-]*:"),
    FeatureSpec::new("mouseover", K::Unsupported, r"\((?i:mouse-?(?:over|out))[\w-]*:"),
    FeatureSpec::new("enchant", K::Unsupported, r"\((?i:enchant(?:-?in)?):"),
    FeatureSpec::new("event", K::Unsupported, r"\((?i:event):"),
    FeatureSpec::new("link-undo", K::Markup, r"\((?i:link-?undo):"),
    FeatureSpec::new("restart", K::Markup, r"\((?i:restart|reload):"),
    FeatureSpec::new("comment", K::Comment, r"<!--[\s\S]*?-->"),
    FeatureSpec::new("macro", K::Unsupported, r"\([A-Za-z][\w-]*:"),
    FeatureSpec::new("array", K::Print, r"\((?i:a|array):"),
    FeatureSpec::new("datamap", K::Print, r"\((?i:dm|datamap):"),
    FeatureSpec::new("random", K::Print, r"\((?i:random):"),
    FeatureSpec::new("either", K::Print, r"\((?i:either):"),
    FeatureSpec::new("visited", K::Print, r"\((?i:visited|visits):"),
    FeatureSpec::new("visits", K::Print, r"\bvisits?\s*(?:[<>=!]|is\b)"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Harlowe;

impl ExprPrinter for Harlowe {
    fn var(&self, name: &str, temp: bool) -> String {
        if temp {
            format!("_{name}")
        } else {
            format!("${name}")
        }
    }

    fn op(&self, op: Op) -> &'static str {
        match op {
            Op::Eq => "is",
            Op::Ne => "is not",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::And => "and",
            Op::Or => "or",
            Op::Not => "not",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Contains => "contains",
            Op::In => "is in",
            Op::Question => "?",
        }
    }

    fn call(&self, name: &str, args: Vec<String>) -> String {
        match (name, args.as_slice()) {
            ("visited", []) => return "visits".to_string(),
            ("visited", [passage]) => return format!("(count: (history:), {passage})"),
            _ => {}
        }
        let name = match name {
            "String" => "str",
            "Number" => "num",
            other => other,
        };
        if args.is_empty() {
            format!("({name}:)")
        } else {
            format!("({name}: {})", args.join(", "))
        }
    }

    fn array(&self, items: Vec<String>) -> String {
        self.call("a", items)
    }

    fn map(&self, pairs: Vec<(String, String)>) -> String {
        self.call("dm", pairs.into_iter().flat_map(|(k, v)| [k, v]).collect())
    }

    fn dot(&self) -> (&'static str, bool) {
        ("'s", true)
    }
}

impl Syntax for Harlowe {
    fn dialect(&self) -> Dialect {
        Dialect::Harlowe
    }

    fn features(&self) -> &'static [FeatureSpec] {
        FEATURES
    }

    fn extract(&self, kind: ConstructKind, text: &str, _cx: &LexContext<'_>) -> Vec<Occurrence> {
        extract::extract(kind, text)
    }

    fn lex(&self, src: &str, _cx: &LexContext<'_>) -> Vec<Token> {
        expr::lex(src)
    }

    fn emit(&self, construct: &Construct) -> Option<Emission> {
        let emission = match construct {
            Construct::VarsSection { entries } => Emission::line(
                entries
                    .iter()
                    .map(|e| {
                        let set = self.set(std::slice::from_ref(&e.assign));
                        match &e.guard {
                            Some(g) => format!("(if: {g})[{set}]"),
                            None => set,
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Construct::Comment { text } => Emission::inline(self.comment(text)),
            Construct::Conditional { branches } => {
                let mut parts = Vec::with_capacity(branches.len() + 1);
                for (i, branch) in branches.iter().enumerate() {
                    let close = if i == 0 { "" } else { "]" };
                    parts.push(match (&branch.cond, i) {
                        (Some(c), 0) => format!("(if: {c})["),
                        (Some(c), _) => format!("{close}(else-if: {c})["),
                        (None, _) => format!("{close}(else:)["),
                    });
                }
                parts.push("]".to_string());
                Emission::block_inline(parts)
            }
            Construct::Timed { delay, repeat, .. } => {
                let name = if *repeat { "live" } else { "after" };
                Emission::block_inline([format!("({name}: {})[", format_delay(*delay)), "]".into()])
            }
            Construct::Reveal { label, .. } => Emission::block_inline([
                format!("(link: {})[", double_quoted(label)),
                "]".into(),
            ]),
            Construct::Hook { name, .. } => {
                Emission::block_inline([format!("|{name}>["), "]".into()])
            }
            Construct::HookEdit { op, name, .. } => {
                Emission::block_inline([format!("({}: ?{name})[", op.as_str()), "]".into()])
            }
            Construct::Style { css, .. } if css.is_empty() => Emission::block_inline(["", ""]),
            Construct::Style { css, .. } => {
                Emission::block_inline([format!("(css: {})[", double_quoted(css)), "]".into()])
            }
            Construct::Assignment { assigns } => Emission::inline(self.set(assigns)),
            Construct::Widget {
                widget,
                var,
                options,
                label,
            } => {
                let mut args = vec![format!("bind {var}")];
                let name = match widget {
                    WidgetKind::Dropdown => {
                        args.extend(options.iter().cloned());
                        "dropdown"
                    }
                    WidgetKind::Cycling => {
                        args.extend(options.iter().cloned());
                        "cycling-link"
                    }
                    WidgetKind::TextInput => "input-box",
                    WidgetKind::Checkbox => {
                        args.push(double_quoted(label.as_deref().unwrap_or("")));
                        "checkbox"
                    }
                };
                Emission::inline(format!("({name}: {})", args.join(", ")))
            }
            Construct::Goto { target } => Emission::inline(format!("(go-to: {})", double_quoted(target))),
            Construct::Include { target } => {
                Emission::inline(format!("(display: {})", double_quoted(target)))
            }
            Construct::Print { expr } => Emission::inline(format!("(print: {expr})")),
            Construct::Alternatives {
                mode: AltMode::Shuffle,
                items,
            } => Emission::inline(self.call(
                "either",
                items.iter().map(|i| double_quoted(i)).collect(),
            )),
            Construct::Alternatives { .. } => return None,
            Construct::Link {
                text,
                target,
                setter,
            } => {
                if setter.is_empty() {
                    Emission::inline(match text {
                        Some(t) if t != target => format!("[[{t}->{target}]]"),
                        _ => format!("[[{target}]]"),
                    })
                } else {
                    let label = text.as_deref().unwrap_or(target);
                    Emission::inline(format!(
                        "(link: {})[{}(go-to: {})]",
                        double_quoted(label),
                        self.set(setter),
                        double_quoted(target)
                    ))
                }
            }
            Construct::Back { label } => Emission::inline(format!(
                "(link-undo: {})",
                double_quoted(label.as_deref().unwrap_or("Back"))
            )),
            Construct::Restart { label } => Emission::inline(format!(
                "(link: {})[(restart:)]",
                double_quoted(label.as_deref().unwrap_or("Restart"))
            )),
            Construct::Glue | Construct::Gather | Construct::End => Emission::inline(""),
            Construct::Variable { expr, .. } => {
                let bare = expr
                    .strip_prefix('$')
                    .or_else(|| expr.strip_prefix('_'))
                    .is_some_and(|rest| is_ident_path(rest) && !rest.contains('.'));
                if bare {
                    Emission::inline(expr.clone())
                } else {
                    Emission::inline(format!("(print: {expr})"))
                }
            }
            Construct::Unsupported { .. } => return None,
        };
        Some(emission)
    }

    fn comment(&self, text: &str) -> String {
        format!("<!-- {} -->", text.replace("-->", "--&gt;"))
    }

    fn negate(&self, cond: &str) -> String {
        if crate::js::is_atom(cond) {
            format!("not {cond}")
        } else {
            format!("not ({cond})")
        }
    }

    fn conjoin(&self, a: &str, b: &str) -> String {
        format!("{} and {}", crate::js::paren_if(a, " or "), crate::js::paren_if(b, " or "))
    }
}

impl Harlowe {
    fn set(&self, assigns: &[Assign]) -> String {
        let clauses: Vec<String> = assigns
            .iter()
            .map(|a| format!("{} to {}", a.target, a.value))
            .collect();
        format!("(set: {})", clauses.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reweave_core::construct::Branch;
    use reweave_core::Layout;

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
        let toks = Harlowe.lex("$a's name is \"x\" and (either: 1, 2) > 0", &cx);
        assert_eq!(Harlowe.print(&toks), "$a's name is \"x\" and (either: 1, 2) > 0");
    }

    #[test]
    fn test_emit_assignment() {
        let c = Construct::Assignment {
            assigns: vec![Assign::new("$a", "1"), Assign::new("$b", "\"x\"")],
        };
        assert_eq!(inline(Harlowe.emit(&c)), "(set: $a to 1, $b to \"x\")");
    }

    #[test]
    fn test_emit_conditional_chain() {
        let c = Construct::Conditional {
            branches: vec![
                Branch::when("$a", "x"),
                Branch::when("$b", "y"),
                Branch::otherwise("z"),
            ],
        };
        let Some(Emission::Block(parts)) = Harlowe.emit(&c) else {
            panic!("expected block");
        };
        let parts: Vec<&str> = parts.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(parts, vec!["(if: $a)[", "](else-if: $b)[", "](else:)[", "]"]);
    }

    #[test]
    fn test_emit_links() {
        let link = |text: Option<&str>, setter: Vec<Assign>| Construct::Link {
            text: text.map(str::to_string),
            target: "Shop".into(),
            setter,
        };
        assert_eq!(inline(Harlowe.emit(&link(Some("Go"), vec![]))), "[[Go->Shop]]");
        assert_eq!(inline(Harlowe.emit(&link(None, vec![]))), "[[Shop]]");
        assert_eq!(
            inline(Harlowe.emit(&link(Some("Buy"), vec![Assign::new("$n", "1")]))),
            "(link: \"Buy\")[(set: $n to 1)(go-to: \"Shop\")]"
        );
    }

    #[test]
    fn test_emit_timed() {
        let c = Construct::Timed {
            delay: Duration::from_millis(1500),
            repeat: false,
            body: String::new(),
        };
        let Some(Emission::Block(parts)) = Harlowe.emit(&c) else {
            panic!("expected block");
        };
        assert_eq!(parts[0].0, "(after: 1500ms)[");
    }

    #[test]
    fn test_emit_variable() {
        let var = |e: &str| Construct::Variable {
            expr: e.into(),
            temp: false,
        };
        assert_eq!(inline(Harlowe.emit(&var("$gold"))), "$gold");
        assert_eq!(inline(Harlowe.emit(&var("$a's b"))), "(print: $a's b)");
    }

    #[test]
    fn test_negate_and_conjoin() {
        assert_eq!(Harlowe.negate("$a"), "not $a");
        assert_eq!(Harlowe.negate("$a is 1"), "not ($a is 1)");
        assert_eq!(Harlowe.conjoin("$a or $b", "$c"), "($a or $b) and $c");
    }

    #[test]
    fn test_no_alternatives_cycle() {
        let c = Construct::Alternatives {
            mode: AltMode::Cycle,
            items: vec!["a".into()],
        };
        assert!(Harlowe.emit(&c).is_none());
    }
}
