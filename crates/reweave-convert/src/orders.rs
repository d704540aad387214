//! Rule order per source dialect.
//!
//! A rule claims its spans before any later rule can see inside them, so
//! the order decides which of two overlapping constructs wins. The orders
//! here are part of the converter's contract and are pinned by tests.

use reweave_core::{ConstructKind as K, Dialect};

/// SugarCube, Chapbook and Snowman.
///
/// - Block constructs come first so their bodies are rewritten as nested
///   text rather than claimed piecemeal.
/// - Chapbook's vars section must go before everything, since its `--`
///   divider and `name: value` lines look like prose to other rules.
/// - Assignments run before links: `<<set $m to [[1, 2]]>>` holds a nested
///   array literal that reads as a link.
/// - Unsupported runs after links and containers, so a closing tag owned by
///   a recognized container is never reported as a stray macro.
/// - SugarCube containers whose bodies never run as passage text
///   (`<<for>>`, `<<nobr>>`, `<<widget>>`...) are claimed whole by the
///   conditional rule, and `<<link>>` with a body by the reveal rule.
const TWINE: &[K] = &[
    K::VarsSection,
    K::Comment,
    K::Conditional,
    K::Timed,
    K::Reveal,
    K::Hook,
    K::Assignment,
    K::Widget,
    K::Navigation,
    K::Print,
    K::Alternatives,
    K::Link,
    K::Markup,
    K::Unsupported,
    K::Variable,
];

/// Harlowe claims unsupported macros before links: a `(click: ?a)[[[x]]]`
/// hook is lost as a whole instead of losing its macro but converting the
/// link inside. Markup goes first because `(link-undo:)` and `(restart:)`
/// would otherwise be claimed as unknown macros.
const HARLOWE: &[K] = &[
    K::Comment,
    K::Conditional,
    K::Timed,
    K::Reveal,
    K::Hook,
    K::Assignment,
    K::Widget,
    K::Navigation,
    K::Print,
    K::Markup,
    K::Unsupported,
    K::Link,
    K::Variable,
];

/// Choices run before assignments and diverts because a choice owns the
/// `~` setter lines and the `-> target` that follow it. Brace forms are
/// claimed as conditionals or alternatives before anything prints them.
const INK: &[K] = &[
    K::Comment,
    K::Conditional,
    K::Alternatives,
    K::Link,
    K::Assignment,
    K::Navigation,
    K::Markup,
    K::Print,
    K::Unsupported,
    K::Variable,
];

pub fn rule_order(source: Dialect) -> &'static [K] {
    match source {
        Dialect::Harlowe => HARLOWE,
        Dialect::Ink => INK,
        Dialect::SugarCube | Dialect::Chapbook | Dialect::Snowman => TWINE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_have_no_duplicates() {
        for dialect in Dialect::ALL {
            let order = rule_order(dialect);
            for (i, kind) in order.iter().enumerate() {
                assert!(!order[i + 1..].contains(kind), "{kind} twice for {dialect}");
            }
        }
    }

    #[test]
    fn test_variables_run_last() {
        for dialect in Dialect::ALL {
            assert_eq!(rule_order(dialect).last(), Some(&K::Variable));
        }
    }

    #[test]
    fn test_harlowe_unsupported_before_link() {
        let order = rule_order(Dialect::Harlowe);
        let pos = |k| order.iter().position(|x| *x == k);
        assert!(pos(K::Unsupported) < pos(K::Link));
        assert!(pos(K::Markup) < pos(K::Unsupported));
    }
}
