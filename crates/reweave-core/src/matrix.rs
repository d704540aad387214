//! Per-pair feature compatibility tables.
//!
//! A [`CompatibilityMatrix`] answers, for one ordered `(source, target)`
//! pair, how each source feature survives conversion. The rewriter consults
//! it for every occurrence it touches, so the matrix is the single authority
//! on converted / approximated / lost.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::dialect::Dialect;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Converted,
    Approximated,
    Incompatible,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Converted => "converted",
            Classification::Approximated => "approximated",
            Classification::Incompatible => "incompatible",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A compiled feature-detection regex that serializes as its source text.
#[derive(Debug, Clone)]
pub struct MatchPattern(Regex);

impl MatchPattern {
    pub fn new(pattern: &str) -> Result<Self, CoreError> {
        Ok(Self(Regex::new(pattern)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        self.0.find_iter(text).map(|m| m.range()).collect()
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for MatchPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MatchPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Regex::new(&s).map(MatchPattern).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRule {
    pub pattern: MatchPattern,
    pub feature: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equivalent_syntax: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// Where a matrix rule's pattern occurs in a text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHit<'m> {
    pub rule: &'m FeatureRule,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityMatrix {
    pub source: Dialect,
    pub target: Dialect,
    rules: Vec<FeatureRule>,
}

impl CompatibilityMatrix {
    pub fn new(source: Dialect, target: Dialect, rules: Vec<FeatureRule>) -> Self {
        Self {
            source,
            target,
            rules,
        }
    }

    pub fn rules(&self) -> &[FeatureRule] {
        &self.rules
    }

    pub fn lookup(&self, feature: &str) -> Option<&FeatureRule> {
        self.rules.iter().find(|r| r.feature == feature)
    }

    pub fn classify(&self, feature: &str) -> Option<Classification> {
        self.lookup(feature).map(|r| r.classification)
    }

    /// Rules whose pattern matches somewhere in `content`, without
    /// rewriting anything. Hits are ordered by position, then rule order.
    pub fn scan(&self, content: &str) -> Vec<ScanHit<'_>> {
        let mut hits: Vec<ScanHit<'_>> = self
            .rules
            .iter()
            .flat_map(|rule| {
                rule.pattern
                    .find_ranges(content)
                    .into_iter()
                    .map(move |range| ScanHit { rule, range })
            })
            .collect();
        hits.sort_by_key(|h| h.range.start);
        hits
    }

    /// `(converted, approximated, incompatible)` rule counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.rules.iter().fold((0, 0, 0), |(c, a, i), r| match r.classification {
            Classification::Converted => (c + 1, a, i),
            Classification::Approximated => (c, a + 1, i),
            Classification::Incompatible => (c, a, i + 1),
        })
    }
}

/// All matrices, keyed by ordered dialect pair.
#[derive(Debug, Clone, Default)]
pub struct MatrixRegistry {
    matrices: BTreeMap<(Dialect, Dialect), CompatibilityMatrix>,
}

impl MatrixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, matrix: CompatibilityMatrix) {
        self.matrices.insert((matrix.source, matrix.target), matrix);
    }

    pub fn get(&self, source: Dialect, target: Dialect) -> Result<&CompatibilityMatrix, CoreError> {
        self.matrices
            .get(&(source, target))
            .ok_or(CoreError::UnsupportedPair {
                from: source,
                to: target,
            })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Dialect, Dialect)> + '_ {
        self.matrices.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(feature: &str, pattern: &str, classification: Classification) -> FeatureRule {
        FeatureRule {
            pattern: MatchPattern::new(pattern).unwrap(),
            feature: feature.into(),
            classification,
            equivalent_syntax: None,
            notes: None,
            severity: None,
        }
    }

    fn sample() -> CompatibilityMatrix {
        CompatibilityMatrix::new(
            Dialect::Harlowe,
            Dialect::SugarCube,
            vec![
                rule("set", r"\(set:", Classification::Converted),
                rule("dropdown", r"\(dropdown:", Classification::Approximated),
                rule("click", r"\(click:", Classification::Incompatible),
            ],
        )
    }

    #[test]
    fn lookup_and_classify() {
        let m = sample();
        assert_eq!(m.classify("dropdown"), Some(Classification::Approximated));
        assert_eq!(m.classify("missing"), None);
        assert_eq!(m.counts(), (1, 1, 1));
    }

    #[test]
    fn scan_orders_hits_by_position() {
        let m = sample();
        let hits = m.scan("(click: ?a)[x] then (set: $a to 1)");
        let features: Vec<_> = hits.iter().map(|h| h.rule.feature.as_str()).collect();
        assert_eq!(features, vec!["click", "set"]);
        assert_eq!(hits[1].range.start, 20);
    }

    #[test]
    fn registry_missing_pair_is_unsupported() {
        let mut reg = MatrixRegistry::new();
        reg.insert(sample());
        assert!(reg.get(Dialect::Harlowe, Dialect::SugarCube).is_ok());
        let err = reg.get(Dialect::SugarCube, Dialect::Harlowe).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsupportedPair {
                from: Dialect::SugarCube,
                to: Dialect::Harlowe
            }
        ));
    }

    #[test]
    fn rule_serializes_pattern_as_text() {
        let json = serde_json::to_value(rule("set", r"\(set:", Classification::Converted)).unwrap();
        assert_eq!(json["pattern"], r"\(set:");
        assert_eq!(json["classification"], "converted");
        let back: FeatureRule = serde_json::from_value(json).unwrap();
        assert_eq!(back.pattern.as_str(), r"\(set:");
    }
}
