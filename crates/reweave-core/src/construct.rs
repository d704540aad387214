//! The tokenizer contract: what a dialect reports when it recognizes a
//! construct in passage text.
//!
//! A [`Construct`] is the typed capture set of one recognized piece of
//! syntax. Expression-bearing fields hold source-dialect text when an
//! extractor produces them and target-dialect text once the rewriter has
//! lowered them; bodies of block constructs always hold unconverted source
//! text, which the pipeline feeds back through later rules.

use std::fmt;
use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Class of construct. Each kind is handled by exactly one rewrite rule, and
/// the kebab-case name doubles as the rule name accepted by skip lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructKind {
    VarsSection,
    Comment,
    Conditional,
    Timed,
    Reveal,
    Hook,
    Assignment,
    Widget,
    Navigation,
    Print,
    Alternatives,
    Link,
    Markup,
    Unsupported,
    Variable,
}

impl ConstructKind {
    pub const ALL: [ConstructKind; 15] = [
        ConstructKind::VarsSection,
        ConstructKind::Comment,
        ConstructKind::Conditional,
        ConstructKind::Timed,
        ConstructKind::Reveal,
        ConstructKind::Hook,
        ConstructKind::Assignment,
        ConstructKind::Widget,
        ConstructKind::Navigation,
        ConstructKind::Print,
        ConstructKind::Alternatives,
        ConstructKind::Link,
        ConstructKind::Markup,
        ConstructKind::Unsupported,
        ConstructKind::Variable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConstructKind::VarsSection => "vars-section",
            ConstructKind::Comment => "comment",
            ConstructKind::Conditional => "conditional",
            ConstructKind::Timed => "timed",
            ConstructKind::Reveal => "reveal",
            ConstructKind::Hook => "hook",
            ConstructKind::Assignment => "assignment",
            ConstructKind::Widget => "widget",
            ConstructKind::Navigation => "navigation",
            ConstructKind::Print => "print",
            ConstructKind::Alternatives => "alternatives",
            ConstructKind::Link => "link",
            ConstructKind::Markup => "markup",
            ConstructKind::Unsupported => "unsupported",
            ConstructKind::Variable => "variable",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ConstructKind::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognized construct in a scanned text.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub kind: ConstructKind,
    /// Source-dialect feature name, the key into the compatibility matrix.
    pub feature: &'static str,
    pub construct: Construct,
    /// Byte range of the whole construct in the scanned text.
    pub range: Range<usize>,
}

impl Occurrence {
    pub fn new(
        kind: ConstructKind,
        feature: &'static str,
        construct: Construct,
        range: Range<usize>,
    ) -> Self {
        Self {
            kind,
            feature,
            construct,
            range,
        }
    }
}

/// `target = value`, both expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    pub target: String,
    pub value: String,
    /// Whether `target` is a temporary (passage-scoped) variable.
    pub temp: bool,
}

impl Assign {
    pub fn new(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            value: value.into(),
            temp: false,
        }
    }
}

/// One arm of a conditional. `cond == None` is the else arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub cond: Option<String>,
    /// Arm runs when `cond` is false (`unless`).
    pub negated: bool,
    pub body: String,
}

impl Branch {
    pub fn when(cond: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            cond: Some(cond.into()),
            negated: false,
            body: body.into(),
        }
    }

    pub fn otherwise(body: impl Into<String>) -> Self {
        Self {
            cond: None,
            negated: false,
            body: body.into(),
        }
    }
}

/// Entry of a Chapbook-style vars section: `name (guard): value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarsEntry {
    pub assign: Assign,
    pub guard: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Dropdown,
    Cycling,
    TextInput,
    Checkbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    Replace,
    Append,
    Prepend,
}

impl HookOp {
    pub fn as_str(self) -> &'static str {
        match self {
            HookOp::Replace => "replace",
            HookOp::Append => "append",
            HookOp::Prepend => "prepend",
        }
    }
}

/// How a text alternative picks its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltMode {
    Shuffle,
    Cycle,
    Once,
    Sequence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Construct {
    VarsSection {
        entries: Vec<VarsEntry>,
    },
    Comment {
        text: String,
    },
    Conditional {
        branches: Vec<Branch>,
    },
    Timed {
        delay: Duration,
        repeat: bool,
        body: String,
    },
    /// Link that reveals its body in place when clicked.
    Reveal {
        label: String,
        body: String,
    },
    /// Named region of text other constructs can target.
    Hook {
        name: String,
        body: String,
    },
    HookEdit {
        op: HookOp,
        name: String,
        body: String,
    },
    Style {
        css: String,
        body: String,
    },
    Assignment {
        assigns: Vec<Assign>,
    },
    Widget {
        widget: WidgetKind,
        var: String,
        options: Vec<String>,
        label: Option<String>,
    },
    Goto {
        target: String,
    },
    Include {
        target: String,
    },
    Print {
        expr: String,
    },
    Alternatives {
        mode: AltMode,
        items: Vec<String>,
    },
    Link {
        text: Option<String>,
        target: String,
        setter: Vec<Assign>,
    },
    Back {
        label: Option<String>,
    },
    Restart {
        label: Option<String>,
    },
    Glue,
    Gather,
    End,
    Variable {
        expr: String,
        temp: bool,
    },
    /// Recognized, but with no dialect-neutral meaning.
    Unsupported {
        original: String,
    },
}

impl Construct {
    /// Source-text bodies nested inside this construct, in output order.
    pub fn bodies(&self) -> Vec<&str> {
        match self {
            Construct::Conditional { branches } => branches.iter().map(|b| b.body.as_str()).collect(),
            Construct::Timed { body, .. }
            | Construct::Reveal { body, .. }
            | Construct::Hook { body, .. }
            | Construct::HookEdit { body, .. }
            | Construct::Style { body, .. } => vec![body.as_str()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in ConstructKind::ALL {
            assert_eq!(ConstructKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ConstructKind::from_name("nope"), None);
    }

    #[test]
    fn conditional_bodies_in_branch_order() {
        let c = Construct::Conditional {
            branches: vec![Branch::when("$x", "a"), Branch::otherwise("b")],
        };
        assert_eq!(c.bodies(), vec!["a", "b"]);
        assert!(Construct::Glue.bodies().is_empty());
    }
}
