//! Translate a source construct's expressions and passage references into
//! target syntax, leaving bodies as source text.

use crate::construct::{Assign, Branch, Construct, VarsEntry};
use crate::expr::{expression_features, name_current_passage, simple_var};
use crate::syntax::Syntax;

use super::rewrite::RewriteContext;

pub(crate) struct Lowering<'c, 'a> {
    cx: &'c RewriteContext<'a>,
    /// Expression-level features met while lowering, in source order.
    pub features: Vec<&'static str>,
}

impl<'c, 'a> Lowering<'c, 'a> {
    pub fn new(cx: &'c RewriteContext<'a>) -> Self {
        Self {
            cx,
            features: Vec::new(),
        }
    }

    fn expr(&mut self, src: &str) -> String {
        let mut tokens = self.cx.env.source.lex(src, &self.cx.lex);
        self.features.extend(expression_features(&tokens));
        let target = self.cx.env.target;
        if target.names_current_passage() {
            name_current_passage(&mut tokens, self.cx.passage);
        }
        target.print(&tokens)
    }

    fn assign(&mut self, a: Assign) -> Assign {
        let tokens = self.cx.env.source.lex(&a.target, &self.cx.lex);
        let temp = a.temp || simple_var(&tokens).is_some_and(|(_, temp)| temp);
        Assign {
            target: self.cx.env.target.print(&tokens),
            value: self.expr(&a.value),
            temp,
        }
    }

    fn passage(&self, name: &str) -> String {
        self.cx.env.names.resolve(name, self.cx.passage)
    }

    fn cond(&mut self, cond: &str, negated: bool) -> String {
        let lowered = self.expr(cond);
        if negated {
            self.cx.env.target.negate(&lowered)
        } else {
            lowered
        }
    }

    pub fn lower(&mut self, construct: Construct) -> Construct {
        match construct {
            Construct::VarsSection { entries } => Construct::VarsSection {
                entries: entries
                    .into_iter()
                    .map(|e| VarsEntry {
                        guard: e.guard.map(|g| self.expr(&g)),
                        assign: self.assign(e.assign),
                    })
                    .collect(),
            },
            Construct::Conditional { branches } => Construct::Conditional {
                branches: branches
                    .into_iter()
                    .map(|b| Branch {
                        cond: b.cond.map(|c| self.cond(&c, b.negated)),
                        negated: false,
                        body: b.body,
                    })
                    .collect(),
            },
            Construct::Assignment { assigns } => Construct::Assignment {
                assigns: assigns.into_iter().map(|a| self.assign(a)).collect(),
            },
            Construct::Widget {
                widget,
                var,
                options,
                label,
            } => Construct::Widget {
                widget,
                var: self.expr(&var),
                options: options.iter().map(|o| self.expr(o)).collect(),
                label,
            },
            Construct::Goto { target } => Construct::Goto {
                target: self.passage(&target),
            },
            Construct::Include { target } => Construct::Include {
                target: self.passage(&target),
            },
            Construct::Print { expr } => Construct::Print {
                expr: self.expr(&expr),
            },
            Construct::Link {
                text,
                target,
                setter,
            } => Construct::Link {
                text,
                target: self.passage(&target),
                setter: setter.into_iter().map(|a| self.assign(a)).collect(),
            },
            Construct::Variable { expr, temp } => {
                let tokens = self.cx.env.source.lex(&expr, &self.cx.lex);
                let temp = temp || simple_var(&tokens).is_some_and(|(_, t)| t);
                self.features.extend(expression_features(&tokens));
                Construct::Variable {
                    expr: self.cx.env.target.print(&tokens),
                    temp,
                }
            }
            other => other,
        }
    }
}

/// Guard under which each body of a lowered construct runs, aligned with
/// [`Construct::bodies`].
pub(crate) fn body_guards(construct: &Construct, target: &dyn Syntax) -> Vec<Option<String>> {
    let Construct::Conditional { branches } = construct else {
        return vec![None; construct.bodies().len()];
    };
    let mut prior: Vec<String> = Vec::new();
    let mut guards = Vec::with_capacity(branches.len());
    for branch in branches {
        let mut terms: Vec<String> = prior.iter().map(|c| target.negate(c)).collect();
        if let Some(cond) = &branch.cond {
            terms.push(cond.clone());
            prior.push(cond.clone());
        }
        guards.push(terms.into_iter().reduce(|a, b| target.conjoin(&a, &b)));
    }
    guards
}

/// Features a construct carries beyond its own occurrence feature.
pub(crate) fn sub_features(construct: &Construct) -> Vec<&'static str> {
    match construct {
        Construct::Conditional { branches } => branches
            .iter()
            .skip(1)
            .filter(|b| b.cond.is_some())
            .map(|_| "else-if")
            .collect(),
        Construct::VarsSection { entries } => entries
            .iter()
            .map(|e| if e.guard.is_some() { "conditional-var" } else { "set" })
            .collect(),
        _ => Vec::new(),
    }
}
