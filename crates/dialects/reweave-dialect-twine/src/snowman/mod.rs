//! Snowman: `<% %>` template blocks over plain JavaScript, story state in
//! `s` / `window.story.state`, lodash for randomness.

pub(crate) mod extract;

use reweave_core::construct::{AltMode, Assign, Construct, ConstructKind};
use reweave_core::expr::{ExprPrinter, Op, Token};
use reweave_core::scan::single_quoted;
use reweave_core::{Dialect, Emission, FeatureSpec, LexContext, Occurrence, Syntax};

use crate::js::{self, Flavor};

use ConstructKind as K;

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("variable", K::Variable, r"<%[=-]\s*(?:window\.story\.state|story\.state|s)\.\w+\s*%>"),
    FeatureSpec::new("set", K::Assignment, r"<%[^=-][^%]*\b(?:s|state)\.\w+\s*[-+*/]?=[^=]"),
    FeatureSpec::new("if", K::Conditional, r"<%\s*if\s*\("),
    FeatureSpec::new("else-if", K::Conditional, r"<%\s*\}\s*else\s+if\s*\("),
    FeatureSpec::new("link", K::Link, r"\[\[[^\]]+\]\]|\[[^\[\]\n]+\]\([^()\s:#/.]+\)"),
    FeatureSpec::new("goto", K::Navigation, r"story\.show\("),
    FeatureSpec::new("include", K::Navigation, r"story\.render\("),
    FeatureSpec::new("print", K::Print, r"<%[=-]"),
    FeatureSpec::new("script", K::Unsupported, r"<%[^=-]"),
    FeatureSpec::new("comment", K::Comment, r"<!--[\s\S]*?-->"),
    FeatureSpec::new("array", K::Print, r"\[[^\[\]]*,"),
    FeatureSpec::new("datamap", K::Print, r"\{\s*[\w\x22']+\s*:"),
    FeatureSpec::new("random", K::Print, r"_\.random\("),
    FeatureSpec::new("either", K::Print, r"_\.sample\("),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Snowman;

impl ExprPrinter for Snowman {
    /// Snowman has no passage-scoped variables; temporaries live in state
    /// too.
    fn var(&self, name: &str, _temp: bool) -> String {
        format!("s.{name}")
    }

    fn op(&self, op: Op) -> &'static str {
        js::op(op)
    }

    fn call(&self, name: &str, args: Vec<String>) -> String {
        match name {
            "random" => format!("_.random({})", args.join(", ")),
            "either" => format!("_.sample({})", js::array(args)),
            "visited" => {
                let passage = args.first().map_or("passage.name", String::as_str);
                format!("story.history.filter(p => p === {passage}).length")
            }
            _ => format!("{name}({})", args.join(", ")),
        }
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

impl Syntax for Snowman {
    fn dialect(&self) -> Dialect {
        Dialect::Snowman
    }

    fn features(&self) -> &'static [FeatureSpec] {
        FEATURES
    }

    fn extract(&self, kind: ConstructKind, text: &str, _cx: &LexContext<'_>) -> Vec<Occurrence> {
        extract::extract(kind, text)
    }

    fn lex(&self, src: &str, _cx: &LexContext<'_>) -> Vec<Token> {
        js::lex(src, Flavor::Snowman)
    }

    fn emit(&self, construct: &Construct) -> Option<Emission> {
        let emission = match construct {
            Construct::VarsSection { entries } => {
                let stmts: Vec<String> = entries
                    .iter()
                    .map(|e| {
                        let stmt = statements(std::slice::from_ref(&e.assign));
                        match &e.guard {
                            Some(g) => format!("if ({g}) {{ {stmt} }}"),
                            None => stmt,
                        }
                    })
                    .collect();
                Emission::line(format!("<% {} %>", stmts.join(" ")))
            }
            Construct::Comment { text } => Emission::inline(self.comment(text)),
            Construct::Conditional { branches } => {
                let mut parts: Vec<String> = branches
                    .iter()
                    .enumerate()
                    .map(|(i, branch)| match (&branch.cond, i) {
                        (Some(c), 0) => format!("<% if ({c}) {{ %>"),
                        (Some(c), _) => format!("<% }} else if ({c}) {{ %>"),
                        (None, _) => "<% } else { %>".to_string(),
                    })
                    .collect();
                parts.push("<% } %>".to_string());
                Emission::block_inline(parts)
            }
            Construct::Hook { name, .. } => {
                Emission::block_inline([format!("<span id=\"{name}\">"), "</span>".to_string()])
            }
            Construct::Style { css, .. } if css.is_empty() => Emission::block_inline(["", ""]),
            Construct::Style { css, .. } => Emission::block_inline([
                format!("<span style=\"{}\">", css.replace('"', "'")),
                "</span>".to_string(),
            ]),
            Construct::Assignment { assigns } => {
                Emission::inline(format!("<% {} %>", statements(assigns)))
            }
            Construct::Goto { target } => {
                Emission::inline(format!("<% story.show({}); %>", single_quoted(target)))
            }
            Construct::Include { target } => {
                Emission::inline(format!("<%= story.render({}) %>", single_quoted(target)))
            }
            Construct::Print { expr } | Construct::Variable { expr, .. } => {
                Emission::inline(format!("<%= {expr} %>"))
            }
            Construct::Alternatives {
                mode: AltMode::Shuffle,
                items,
            } => Emission::inline(format!(
                "<%= {} %>",
                self.call("either", items.iter().map(|i| single_quoted(i)).collect())
            )),
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
                    let onclick = format!(
                        "var s = window.story.state; {} window.story.show({})",
                        statements(setter),
                        single_quoted(target)
                    );
                    Emission::inline(format!(
                        "<a href=\"javascript:void(0)\" onclick=\"{}\">{}</a>",
                        onclick.replace('"', "&quot;"),
                        text.as_deref().unwrap_or(target)
                    ))
                }
            }
            Construct::Glue | Construct::Gather | Construct::End => Emission::inline(""),
            Construct::Timed { .. }
            | Construct::Reveal { .. }
            | Construct::HookEdit { .. }
            | Construct::Widget { .. }
            | Construct::Alternatives { .. }
            | Construct::Back { .. }
            | Construct::Restart { .. }
            | Construct::Unsupported { .. } => return None,
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
}

fn statements(assigns: &[Assign]) -> String {
    assigns
        .iter()
        .map(|a| format!("{} = {};", a.target, a.value))
        .collect::<Vec<_>>()
        .join(" ")
}
