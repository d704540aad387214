//! SugarCube: `<<macro>>` tags, `$` / `_` sigils, JavaScript expressions
//! with word-operator aliases.

pub(crate) mod extract;

use reweave_core::construct::{AltMode, Assign, Construct, ConstructKind, WidgetKind};
use reweave_core::expr::{ExprPrinter, Op, Token};
use reweave_core::scan::{double_quoted, format_delay};
use reweave_core::{Dialect, Emission, FeatureSpec, LexContext, Occurrence, Syntax};

use crate::js::{self, Flavor};
use crate::markup::is_ident_path;

use ConstructKind as K;

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("variable", K::Variable, r"\$[A-Za-z_]\w*"),
    FeatureSpec::new("temp-variable", K::Variable, r"(?:^|\W)_[A-Za-z]\w*"),
    FeatureSpec::new("set", K::Assignment, r"<<set\s"),
    FeatureSpec::new("if", K::Conditional, r"<<if\s"),
    FeatureSpec::new("else-if", K::Conditional, r"<<else\s*if\s"),
    FeatureSpec::new("link", K::Link, r"\[\[[^\]]+\]\]|<<(?:link|button)\s"),
    FeatureSpec::new("setter-link", K::Link, r"\[\[[^\]]+\]\[[^\]]+\]\]"),
    FeatureSpec::new("goto", K::Navigation, r"<<goto\s"),
    FeatureSpec::new("include", K::Navigation, r"<<(?:include|display)\s"),
    FeatureSpec::new("print", K::Print, r"<<(?:print\s|=|-)"),
    FeatureSpec::new("listbox", K::Widget, r"<<listbox\s"),
    FeatureSpec::new("cycle", K::Widget, r"<<cycle\s"),
    FeatureSpec::new("textbox", K::Widget, r"<<textbox\s"),
    FeatureSpec::new("checkbox", K::Widget, r"<<checkbox\s"),
    FeatureSpec::new("timed", K::Timed, r"<<timed\s"),
    FeatureSpec::new("repeat", K::Timed, r"<<repeat\s"),
    FeatureSpec::new("linkreplace", K::Reveal, r"<<link(?:replace|append|prepend)\s"),
    FeatureSpec::new("replace", K::Hook, r"<<replace\s"),
    FeatureSpec::new("append", K::Hook, r"<<append\s"),
    FeatureSpec::new("prepend", K::Hook, r"<<prepend\s"),
    FeatureSpec::new("custom-style", K::Hook, r"@@[^;@]*;"),
    FeatureSpec::new("back", K::Markup, r"<<(?:back|return)\b"),
    FeatureSpec::new("script", K::Unsupported, r"<<script>>"),
    FeatureSpec::new("widget", K::Unsupported, r"<<widget\s"),
    FeatureSpec::new("link-macro", K::Reveal, r"<<(?:link|button)\s[^>]*>>\s*(?:[^<\s]|<<[^/])"),
    FeatureSpec::new("block-macro", K::Unsupported, r"<<(?:for|switch|nobr|silently|capture|type|done)\b"),
    FeatureSpec::new(
        "audio",
        K::Unsupported,
        r"<<(?:audio|cacheaudio|playlist|createplaylist|masteraudio|waitforaudio|createaudiogroup|removeaudiogroup|removeplaylist|track)\b",
    ),
    FeatureSpec::new("comment", K::Comment, r"/\*[\s\S]*?\*/|<!--[\s\S]*?-->|/%[\s\S]*?%/"),
    FeatureSpec::new("macro", K::Unsupported, r"<</?[A-Za-z][\w-]*"),
    FeatureSpec::new("array", K::Print, r"\[[^\[\]]*,"),
    FeatureSpec::new("datamap", K::Print, r"\{\s*[\w\x22']+\s*:"),
    FeatureSpec::new("random", K::Print, r"\brandom\("),
    FeatureSpec::new("either", K::Print, r"\beither\("),
    FeatureSpec::new("visited", K::Print, r"\bvisited\(\s*[^\s)]"),
    FeatureSpec::new("visits", K::Print, r"\bvisited\(\s*\)"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SugarCube;

impl ExprPrinter for SugarCube {
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
            Op::Ne => "isnot",
            Op::And => "and",
            Op::Or => "or",
            Op::Not => "not",
            other => js::op(other),
        }
    }

    fn call(&self, name: &str, args: Vec<String>) -> String {
        format!("{name}({})", args.join(", "))
    }

    fn array(&self, items: Vec<String>) -> String {
        js::array(items)
    }

    fn map(&self, pairs: Vec<(String, String)>) -> String {
        js::object(pairs)
    }

    fn contains(&self, haystack: String, needle: String) -> String {
        js::includes(haystack, needle)
    }
}

impl Syntax for SugarCube {
    fn dialect(&self) -> Dialect {
        Dialect::SugarCube
    }

    fn features(&self) -> &'static [FeatureSpec] {
        FEATURES
    }

    fn extract(&self, kind: ConstructKind, text: &str, _cx: &LexContext<'_>) -> Vec<Occurrence> {
        extract::extract(kind, text)
    }

    fn lex(&self, src: &str, _cx: &LexContext<'_>) -> Vec<Token> {
        js::lex(src, Flavor::SugarCube)
    }

    fn emit(&self, construct: &Construct) -> Option<Emission> {
        let emission = match construct {
            Construct::VarsSection { entries } => Emission::line(
                entries
                    .iter()
                    .map(|e| {
                        let set = set(std::slice::from_ref(&e.assign));
                        match &e.guard {
                            Some(g) => format!("<<if {g}>>{set}<</if>>"),
                            None => set,
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Construct::Comment { text } => Emission::inline(self.comment(text)),
            Construct::Conditional { branches } => {
                let mut parts: Vec<String> = branches
                    .iter()
                    .enumerate()
                    .map(|(i, branch)| match (&branch.cond, i) {
                        (Some(c), 0) => format!("<<if {c}>>"),
                        (Some(c), _) => format!("<<elseif {c}>>"),
                        (None, _) => "<<else>>".to_string(),
                    })
                    .collect();
                parts.push("<</if>>".to_string());
                Emission::block_inline(parts)
            }
            Construct::Timed { delay, repeat, .. } => {
                let name = if *repeat { "repeat" } else { "timed" };
                Emission::block_inline([
                    format!("<<{name} {}>>", format_delay(*delay)),
                    format!("<</{name}>>"),
                ])
            }
            Construct::Reveal { label, .. } => Emission::block_inline([
                format!("<<linkreplace {}>>", double_quoted(label)),
                "<</linkreplace>>".into(),
            ]),
            Construct::Hook { name, .. } => Emission::block_inline([
                format!("<span id={}>", double_quoted(name)),
                "</span>".into(),
            ]),
            Construct::HookEdit { op, name, .. } => {
                let op = op.as_str();
                Emission::block_inline([
                    format!("<<{op} {}>>", double_quoted(&format!("#{name}"))),
                    format!("<</{op}>>"),
                ])
            }
            Construct::Style { css, .. } if css.is_empty() => Emission::block_inline(["", ""]),
            Construct::Style { css, .. } => {
                Emission::block_inline([format!("@@{css};"), "@@".into()])
            }
            Construct::Assignment { assigns } => Emission::inline(set(assigns)),
            Construct::Widget {
                widget,
                var,
                options,
                label,
            } => {
                let var = double_quoted(var);
                let options: String = options.iter().map(|o| format!("<<option {o}>>")).collect();
                let text = match widget {
                    WidgetKind::Dropdown => format!("<<listbox {var}>>{options}<</listbox>>"),
                    WidgetKind::Cycling => format!("<<cycle {var}>>{options}<</cycle>>"),
                    WidgetKind::TextInput => format!("<<textbox {var} \"\">>"),
                    WidgetKind::Checkbox => {
                        let prefix = label.as_deref().map(|l| format!("{l} ")).unwrap_or_default();
                        format!("{prefix}<<checkbox {var} false true>>")
                    }
                };
                Emission::inline(text)
            }
            Construct::Goto { target } => {
                Emission::inline(format!("<<goto {}>>", double_quoted(target)))
            }
            Construct::Include { target } => {
                Emission::inline(format!("<<include {}>>", double_quoted(target)))
            }
            Construct::Print { expr } => Emission::inline(format!("<<print {expr}>>")),
            Construct::Alternatives {
                mode: AltMode::Shuffle,
                items,
            } => Emission::inline(format!(
                "<<print {}>>",
                self.call("either", items.iter().map(|i| double_quoted(i)).collect())
            )),
            Construct::Alternatives { .. } => return None,
            Construct::Link {
                text,
                target,
                setter,
            } => {
                let link = match text {
                    Some(t) if t != target => format!("{t}|{target}"),
                    _ => target.clone(),
                };
                if setter.is_empty() {
                    Emission::inline(format!("[[{link}]]"))
                } else {
                    Emission::inline(format!("[[{link}][{}]]", clauses(setter).join("; ")))
                }
            }
            Construct::Back { label } => Emission::inline(match label {
                Some(l) => format!("<<back {}>>", double_quoted(l)),
                None => "<<back>>".to_string(),
            }),
            Construct::Restart { label } => Emission::inline(format!(
                "<<link {}>><<run Engine.restart()>><</link>>",
                double_quoted(label.as_deref().unwrap_or("Restart"))
            )),
            Construct::Glue | Construct::Gather | Construct::End => Emission::inline(""),
            Construct::Variable { expr, .. } => {
                let naked = expr
                    .strip_prefix('$')
                    .or_else(|| expr.strip_prefix('_'))
                    .is_some_and(is_ident_path);
                if naked {
                    Emission::inline(expr.clone())
                } else {
                    Emission::inline(format!("<<print {expr}>>"))
                }
            }
            Construct::Unsupported { .. } => return None,
        };
        Some(emission)
    }

    fn comment(&self, text: &str) -> String {
        format!("/* {} */", text.replace("*/", "* /"))
    }

    fn negate(&self, cond: &str) -> String {
        if js::is_atom(cond) {
            format!("not {cond}")
        } else {
            format!("not ({cond})")
        }
    }

    fn conjoin(&self, a: &str, b: &str) -> String {
        format!("{} and {}", js::paren_if(a, " or "), js::paren_if(b, " or "))
    }
}

fn clauses(assigns: &[Assign]) -> Vec<String> {
    assigns
        .iter()
        .map(|a| format!("{} to {}", a.target, a.value))
        .collect()
}

fn set(assigns: &[Assign]) -> String {
    format!("<<set {}>>", clauses(assigns).join(", "))
}
