//! Compatibility matrices for every ordered dialect pair.
//!
//! Classifications come from the dialects themselves. A construct feature
//! is incompatible when the target emitter has no syntax for a
//! representative construct of it, approximated when the target can only
//! say it differently (a noted approximation, a hoisted assignment, or
//! markup that is dropped), and converted otherwise. Expression-level and
//! story-level features have small tables of their own.

use std::time::Duration;

use reweave_core::construct::{
    AltMode, Assign, Branch, Construct, ConstructKind, HookOp, VarsEntry, WidgetKind,
};
use reweave_core::{
    Classification, CompatibilityMatrix, CoreError, Dialect, Emission, FeatureRule,
    MatchPattern, MatrixRegistry, Severity, Syntax,
};

use crate::syntax_for;

use ConstructKind as K;

/// Features found inside expressions rather than as constructs.
pub const EXPRESSION_FEATURES: &[&str] =
    &["array", "datamap", "random", "either", "visited", "visits"];

/// Features of a story as a whole: declarations outside passages, passage
/// naming and story scripts.
pub const STORY_FEATURES: &[&str] = &["global-variable", "passage-name", "story-script"];

/// Build the matrix for one ordered pair.
pub fn build_matrix(source: Dialect, target: Dialect) -> Result<CompatibilityMatrix, CoreError> {
    let src = syntax_for(source);
    let tgt = syntax_for(target);
    let mut rules = Vec::new();
    for spec in src.features() {
        let (classification, equivalent, notes) = if EXPRESSION_FEATURES.contains(&spec.name) {
            expression_rule(spec.name, tgt)
        } else {
            construct_rule(spec.name, spec.kind, tgt)
        };
        rules.push(rule(spec.pattern, spec.name, classification, equivalent, notes)?);
    }
    for (feature, pattern, classification, notes) in story_rules(source, target) {
        rules.push(rule(pattern, feature, classification, None, notes.map(str::to_string))?);
    }
    Ok(CompatibilityMatrix::new(source, target, rules))
}

/// Matrices for all twenty ordered pairs of distinct dialects.
pub fn standard_matrices() -> Result<MatrixRegistry, CoreError> {
    let mut registry = MatrixRegistry::new();
    for source in Dialect::ALL {
        for target in Dialect::ALL {
            if source != target {
                registry.insert(build_matrix(source, target)?);
            }
        }
    }
    Ok(registry)
}

fn rule(
    pattern: &str,
    feature: &str,
    classification: Classification,
    equivalent_syntax: Option<String>,
    notes: Option<String>,
) -> Result<FeatureRule, CoreError> {
    let severity = match classification {
        Classification::Converted => None,
        Classification::Approximated => Some(Severity::Info),
        Classification::Incompatible if matches!(feature, "script" | "javascript") => {
            Some(Severity::Error)
        }
        Classification::Incompatible => Some(Severity::Warning),
    };
    Ok(FeatureRule {
        pattern: MatchPattern::new(pattern)?,
        feature: feature.to_string(),
        classification,
        equivalent_syntax,
        notes,
        severity,
    })
}

type Classified = (Classification, Option<String>, Option<String>);

fn construct_rule(feature: &str, kind: ConstructKind, target: &dyn Syntax) -> Classified {
    let construct = representative(feature, kind, target);
    if let Construct::Unsupported { .. } = construct {
        return (
            Classification::Incompatible,
            None,
            Some("no dialect-neutral meaning; kept as a marker".to_string()),
        );
    }
    let Some(emission) = target.emit(&construct) else {
        return (
            Classification::Incompatible,
            None,
            Some(format!("{} has no equivalent", target.dialect())),
        );
    };
    let equivalent = Some(preview(&emission)).filter(|p| !p.is_empty());
    let note = approximation(feature, kind, target.dialect())
        .map(str::to_string)
        .or_else(|| implicit_approximation(&emission));
    match note {
        Some(note) => (Classification::Approximated, equivalent, Some(note)),
        None => (Classification::Converted, equivalent, None),
    }
}

/// Approximations visible in the emission itself.
fn implicit_approximation(emission: &Emission) -> Option<String> {
    match emission {
        Emission::Hoist { .. } => Some("moved to the passage's vars section".to_string()),
        Emission::Text(text, _) if text.is_empty() => {
            Some("no equivalent syntax; removed".to_string())
        }
        Emission::Block(parts) if parts.iter().all(|(p, _)| p.is_empty()) => {
            Some("markup dropped, text kept".to_string())
        }
        _ => None,
    }
}

/// Known lossy mappings, keyed by source feature and target dialect.
fn approximation(feature: &str, kind: ConstructKind, target: Dialect) -> Option<&'static str> {
    use Dialect::*;
    let note = match (feature, kind, target) {
        ("live" | "repeat", _, Chapbook) => "[after] fires once; the repetition is lost",
        ("goto" | "divert", _, Chapbook) => "Chapbook cannot navigate by itself; becomes a link",
        ("display" | "include" | "embed-passage", _, Ink) => {
            "becomes a tunnel; the included knot must return with ->->"
        }
        ("tunnel", _, _) => "the tunnel's return is implicit in an included passage",
        ("thread", _, _) => "threaded choices are shown through an included passage",
        ("link", _, Ink) => "becomes a sticky choice; prose around the link stays above it",
        ("setter-link", _, Ink) => "becomes a sticky choice that sets variables",
        ("setter-link", _, Harlowe) => "becomes a (link:) hook that sets, then navigates",
        ("setter-link", _, Snowman) => "becomes an HTML link with an onclick handler",
        ("choice", _, _) => "once-only choice becomes a link that can be followed again",
        ("named-hook", _, Chapbook | Snowman) => "becomes a <span id> nothing can address",
        ("link-macro", _, Chapbook) => {
            "the body shows as revealed text; assignments inside it run when the passage loads"
        }
        ("link-reveal" | "linkreplace", _, Chapbook) => "revealed text is plain text",
        ("else-if", _, Chapbook) => "chain flattened into independent [if] modifiers",
        ("temp-variable", _, Chapbook | Snowman) => "becomes a story variable",
        ("print", _, Chapbook) => "computed in the vars section and shown through an insert",
        ("shuffle", K::Alternatives, _) => "becomes a random pick from the items",
        ("glue", _, _) => "line joining has no equivalent; removed",
        ("gather", _, _) => "weave gather flattened; the following text always shows",
        ("end", _, _) => "a passage without links ends the story",
        _ => return None,
    };
    Some(note)
}

/// A lowered construct standing for `feature`, with expressions already in
/// the target's syntax.
fn representative(feature: &str, kind: ConstructKind, target: &dyn Syntax) -> Construct {
    let var = || target.var("x", false);
    let assign = |temp: bool| Assign {
        target: target.var("x", temp),
        value: "1".to_string(),
        temp,
    };
    match kind {
        K::VarsSection => Construct::VarsSection {
            entries: vec![VarsEntry {
                assign: assign(false),
                guard: (feature == "conditional-var").then(|| target.var("y", false)),
            }],
        },
        K::Comment => Construct::Comment {
            text: "note".to_string(),
        },
        K::Conditional => {
            let first = if feature == "unless" {
                Branch::when(target.negate(&var()), "a")
            } else {
                Branch::when(var(), "a")
            };
            let mut branches = vec![first];
            if feature == "else-if" {
                branches.push(Branch::when(target.var("y", false), "b"));
            }
            branches.push(Branch::otherwise("c"));
            Construct::Conditional { branches }
        }
        K::Timed => Construct::Timed {
            delay: Duration::from_secs(2),
            repeat: matches!(feature, "live" | "repeat"),
            body: "text".to_string(),
        },
        K::Reveal => Construct::Reveal {
            label: "More".to_string(),
            body: "text".to_string(),
        },
        K::Hook => match feature {
            "named-hook" => Construct::Hook {
                name: "n".to_string(),
                body: "text".to_string(),
            },
            "replace" | "append" | "prepend" => Construct::HookEdit {
                op: match feature {
                    "replace" => HookOp::Replace,
                    "append" => HookOp::Append,
                    _ => HookOp::Prepend,
                },
                name: "n".to_string(),
                body: "text".to_string(),
            },
            _ => Construct::Style {
                css: "color: red".to_string(),
                body: "text".to_string(),
            },
        },
        K::Assignment => Construct::Assignment {
            assigns: vec![assign(feature == "temp-variable")],
        },
        K::Widget => Construct::Widget {
            widget: match feature {
                "dropdown" | "dropdown-menu" | "listbox" => WidgetKind::Dropdown,
                "input-box" | "textbox" | "text-input" => WidgetKind::TextInput,
                "checkbox" => WidgetKind::Checkbox,
                _ => WidgetKind::Cycling,
            },
            var: var(),
            options: vec![target.string("a"), target.string("b")],
            label: None,
        },
        K::Navigation => match feature {
            "goto" | "divert" => Construct::Goto {
                target: "Shop".to_string(),
            },
            "end" => Construct::End,
            _ => Construct::Include {
                target: "Shop".to_string(),
            },
        },
        K::Print => Construct::Print { expr: var() },
        K::Alternatives => Construct::Alternatives {
            mode: match feature {
                "shuffle" => AltMode::Shuffle,
                "cycle" => AltMode::Cycle,
                "once" => AltMode::Once,
                _ => AltMode::Sequence,
            },
            items: vec!["a".to_string(), "b".to_string()],
        },
        K::Link if feature == "choice-branch" => Construct::Unsupported {
            original: String::new(),
        },
        K::Link => Construct::Link {
            text: Some("Go".to_string()),
            target: "Shop".to_string(),
            setter: if feature == "setter-link" {
                vec![assign(false)]
            } else {
                Vec::new()
            },
        },
        K::Markup => match feature {
            "glue" => Construct::Glue,
            "gather" => Construct::Gather,
            "restart" | "restart-link" => Construct::Restart { label: None },
            _ => Construct::Back { label: None },
        },
        K::Unsupported => Construct::Unsupported {
            original: String::new(),
        },
        K::Variable => Construct::Variable {
            expr: target.var("x", feature == "temp-variable"),
            temp: feature == "temp-variable",
        },
    }
}

fn expression_rule(feature: &str, target: &dyn Syntax) -> Classified {
    let equivalent = match feature {
        "array" => target.array(vec!["1".to_string(), "2".to_string()]),
        "datamap" => target.map(vec![(target.string("k"), "1".to_string())]),
        "random" => target.call("random", vec!["1".to_string(), "6".to_string()]),
        "either" => target.call("either", vec![target.string("a"), target.string("b")]),
        "visits" if !target.names_current_passage() => target.call("visited", Vec::new()),
        _ => target.call("visited", vec![target.string("Shop")]),
    };
    let (classification, notes) = match (feature, target.dialect()) {
        ("array", Dialect::Ink) => (Classification::Approximated, Some("printed as an Ink list literal")),
        ("datamap", Dialect::Ink) => (Classification::Incompatible, Some("Ink has no map type")),
        ("either", Dialect::Ink) => (
            Classification::Incompatible,
            Some("Ink expressions have no either(); a {~a|b} shuffle is the nearest"),
        ),
        ("visited", Dialect::Chapbook) => (
            Classification::Incompatible,
            Some("Chapbook cannot look up another passage's visits"),
        ),
        ("visited", Dialect::Ink) => (Classification::Approximated, Some("becomes the knot's visit count")),
        ("visited", Dialect::Harlowe) => (
            Classification::Approximated,
            Some("counted from (history:), which leaves out the visit in progress"),
        ),
        _ => (Classification::Converted, None),
    };
    let equivalent = (classification != Classification::Incompatible).then_some(equivalent);
    (classification, equivalent, notes.map(str::to_string))
}

type StoryRule = (&'static str, &'static str, Classification, Option<&'static str>);

fn story_rules(source: Dialect, target: Dialect) -> Vec<StoryRule> {
    use Classification::*;
    let mut rules = Vec::new();

    let globals = if source.is_twine() {
        r"(?m)^::[ \t]*StoryInit\b|^::[^\[\n]*\[[^\]\n]*\bstartup\b"
    } else {
        r"(?m)^[ \t]*(?:VAR|CONST)[ \t]+\w+[ \t]*="
    };
    let (class, note) = match (source, target) {
        (Dialect::Ink, Dialect::Chapbook) => (Approximated, Some("set in the start passage's vars section")),
        (Dialect::Ink, Dialect::Snowman) => (Approximated, Some("set at the top of the start passage")),
        (s, Dialect::Chapbook | Dialect::Snowman) if s.is_twine() => (
            Approximated,
            Some("the init passage is copied but the target does not run it at startup"),
        ),
        _ => (Converted, None),
    };
    rules.push(("global-variable", globals, class, note));

    let names = if source.is_twine() {
        r"(?m)^::[ \t]*\S+[ \t]+[^\s\[\{]"
    } else {
        r"(?m)^[ \t]*=+[ \t]*(?:function[ \t]+)?\w+"
    };
    let (class, note) = if source.is_twine() && target == Dialect::Ink {
        (Approximated, Some("names that are not Ink identifiers are rewritten"))
    } else {
        (Converted, None)
    };
    rules.push(("passage-name", names, class, note));

    if source.is_twine() {
        let (class, note) = if target.is_twine() {
            (Approximated, Some("copied verbatim; story JavaScript and CSS are format-specific"))
        } else {
            (Incompatible, Some("Ink has no story scripts; kept as a comment"))
        };
        rules.push((
            "story-script",
            r"(?m)^::[^\n]*\[[^\]\n]*\b(?:script|stylesheet)\b",
            class,
            note,
        ));
    }
    rules
}

fn preview(emission: &Emission) -> String {
    match emission {
        Emission::Text(text, _) => text.clone(),
        Emission::Block(parts) => parts
            .iter()
            .map(|(p, _)| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" … "),
        Emission::Hoist { assigns, text } => {
            let mut out: Vec<String> = assigns
                .iter()
                .map(|a| format!("{}: {}", a.target, a.value))
                .collect();
            if !text.is_empty() {
                out.push(text.clone());
            }
            out.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(source: Dialect, target: Dialect, feature: &str) -> Classification {
        build_matrix(source, target)
            .unwrap()
            .classify(feature)
            .unwrap_or_else(|| panic!("{feature} missing from {source}->{target}"))
    }

    #[test]
    fn test_all_twenty_pairs() {
        let registry = standard_matrices().unwrap();
        assert_eq!(registry.len(), 20);
        assert!(registry.get(Dialect::Ink, Dialect::Ink).is_err());
    }

    #[test]
    fn test_every_source_feature_has_a_rule() {
        for source in Dialect::ALL {
            for target in Dialect::ALL.into_iter().filter(|t| *t != source) {
                let matrix = build_matrix(source, target).unwrap();
                for spec in syntax_for(source).features() {
                    assert!(
                        matrix.lookup(spec.name).is_some(),
                        "{} missing from {source}->{target}",
                        spec.name
                    );
                }
                assert!(matrix.lookup("global-variable").is_some());
                assert!(matrix.lookup("passage-name").is_some());
            }
        }
    }

    #[test]
    fn test_live_is_asymmetric() {
        assert_eq!(
            class(Dialect::Harlowe, Dialect::Chapbook, "live"),
            Classification::Approximated
        );
        assert_eq!(
            class(Dialect::Chapbook, Dialect::Harlowe, "after"),
            Classification::Converted
        );
        assert_eq!(
            class(Dialect::Harlowe, Dialect::SugarCube, "live"),
            Classification::Converted
        );
    }

    #[test]
    fn test_set_asymmetry() {
        assert_eq!(
            class(Dialect::Harlowe, Dialect::Chapbook, "set"),
            Classification::Approximated
        );
        assert_eq!(
            class(Dialect::Chapbook, Dialect::Harlowe, "set"),
            Classification::Converted
        );
    }

    #[test]
    fn test_widgets_toward_code_dialects_are_lost() {
        assert_eq!(
            class(Dialect::Harlowe, Dialect::Snowman, "dropdown"),
            Classification::Incompatible
        );
        assert_eq!(
            class(Dialect::Harlowe, Dialect::Ink, "click"),
            Classification::Incompatible
        );
        assert_eq!(
            class(Dialect::Harlowe, Dialect::SugarCube, "dropdown"),
            Classification::Converted
        );
    }

    #[test]
    fn test_ink_features_toward_twine() {
        assert_eq!(class(Dialect::Ink, Dialect::Harlowe, "choice"), Classification::Approximated);
        assert_eq!(class(Dialect::Ink, Dialect::Harlowe, "sticky-choice"), Classification::Converted);
        assert_eq!(class(Dialect::Ink, Dialect::SugarCube, "sequence"), Classification::Incompatible);
        assert_eq!(class(Dialect::Ink, Dialect::Snowman, "glue"), Classification::Approximated);
        assert_eq!(class(Dialect::Ink, Dialect::Chapbook, "choice-branch"), Classification::Incompatible);
    }

    #[test]
    fn test_expression_features() {
        assert_eq!(class(Dialect::SugarCube, Dialect::Ink, "datamap"), Classification::Incompatible);
        assert_eq!(class(Dialect::SugarCube, Dialect::Harlowe, "datamap"), Classification::Converted);
        assert_eq!(class(Dialect::Harlowe, Dialect::Chapbook, "visited"), Classification::Incompatible);
    }

    #[test]
    fn test_visit_counts_stay_counts() {
        assert_eq!(class(Dialect::Ink, Dialect::Harlowe, "visited"), Classification::Approximated);
        assert_eq!(class(Dialect::Ink, Dialect::Snowman, "visited"), Classification::Converted);
        let matrix = build_matrix(Dialect::Ink, Dialect::Snowman).unwrap();
        assert_eq!(
            matrix.lookup("visited").unwrap().equivalent_syntax.as_deref(),
            Some("story.history.filter(p => p === 'Shop').length")
        );
        assert_eq!(class(Dialect::Chapbook, Dialect::Harlowe, "visits"), Classification::Converted);
    }

    #[test]
    fn test_lost_rules_carry_a_reason() {
        for (source, target) in standard_matrices().unwrap().pairs() {
            let matrix = build_matrix(source, target).unwrap();
            for rule in matrix.rules() {
                if rule.classification != Classification::Converted {
                    assert!(rule.notes.is_some(), "{} in {source}->{target}", rule.feature);
                    assert!(rule.severity.is_some());
                }
            }
        }
    }

    #[test]
    fn test_equivalent_syntax_uses_target() {
        let matrix = build_matrix(Dialect::Harlowe, Dialect::SugarCube).unwrap();
        let set = matrix.lookup("set").unwrap();
        assert_eq!(set.equivalent_syntax.as_deref(), Some("<<set $x to 1>>"));
    }
}
