use std::collections::BTreeMap;

use reweave_core::{CompatibilityMatrix, CoreError, Dialect, RewritePipeline, Syntax};

use crate::matrices::build_matrix;
use crate::orders::rule_order;
use crate::syntax_for;

/// Everything needed to convert one ordered dialect pair.
pub struct PairRewriter {
    pub source: Dialect,
    pub target: Dialect,
    pub matrix: CompatibilityMatrix,
    pub pipeline: RewritePipeline,
}

impl PairRewriter {
    /// The built-in matrix and rule order for a pair.
    pub fn standard(source: Dialect, target: Dialect) -> Result<Self, CoreError> {
        Ok(Self {
            source,
            target,
            matrix: build_matrix(source, target)?,
            pipeline: RewritePipeline::with_order(rule_order(source)),
        })
    }

    pub fn source_syntax(&self) -> &'static dyn Syntax {
        syntax_for(self.source)
    }

    pub fn target_syntax(&self) -> &'static dyn Syntax {
        syntax_for(self.target)
    }
}

/// Pair rewriters keyed by ordered `(source, target)` pair, built once and
/// passed by reference to every conversion.
#[derive(Default)]
pub struct RewriterRegistry {
    pairs: BTreeMap<(Dialect, Dialect), PairRewriter>,
}

impl RewriterRegistry {
    /// A registry with no pairs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All twenty ordered pairs of distinct dialects.
    pub fn standard() -> Result<Self, CoreError> {
        let mut registry = Self::empty();
        for source in Dialect::ALL {
            for target in Dialect::ALL {
                if source != target {
                    registry.register(PairRewriter::standard(source, target)?);
                }
            }
        }
        Ok(registry)
    }

    /// Add or replace the rewriter for its pair.
    pub fn register(&mut self, rewriter: PairRewriter) {
        self.pairs.insert((rewriter.source, rewriter.target), rewriter);
    }

    pub fn get(&self, source: Dialect, target: Dialect) -> Result<&PairRewriter, CoreError> {
        self.pairs
            .get(&(source, target))
            .ok_or(CoreError::UnsupportedPair {
                from: source,
                to: target,
            })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Dialect, Dialect)> + '_ {
        self.pairs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_has_twenty_pairs() {
        let registry = RewriterRegistry::standard().unwrap();
        assert_eq!(registry.len(), 20);
        assert!(registry.pairs().all(|(s, t)| s != t));
    }

    #[test]
    fn test_unregistered_pair_is_an_error() {
        let mut registry = RewriterRegistry::empty();
        registry.register(PairRewriter::standard(Dialect::Harlowe, Dialect::SugarCube).unwrap());
        assert!(registry.get(Dialect::Harlowe, Dialect::SugarCube).is_ok());
        let err = registry
            .get(Dialect::SugarCube, Dialect::Harlowe)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CoreError::UnsupportedPair {
                from: Dialect::SugarCube,
                to: Dialect::Harlowe
            }
        ));
        assert_eq!(err.to_string(), "no rewriter registered for sugarcube -> harlowe");
    }

    #[test]
    fn test_pipeline_follows_rule_order() {
        let rewriter = PairRewriter::standard(Dialect::Ink, Dialect::Harlowe).unwrap();
        assert_eq!(rewriter.pipeline.kinds(), rule_order(Dialect::Ink));
    }
}
