//! Conversion fidelity report.
//!
//! The rewriter appends one entry per construct it touches; the report
//! derives counts, a 0–100 quality score and groupings from those entries.
//! Serialized reports carry the derived `summary` and `quality_score`
//! alongside the entries, and deserialization checks they still agree.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::CoreError;
use crate::matrix::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Converted,
    Approximated,
    Lost,
}

impl EntryType {
    /// Contribution of one entry to the quality score.
    fn weight(self) -> f64 {
        match self {
            EntryType::Converted => 1.0,
            EntryType::Approximated => 0.5,
            EntryType::Lost => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReportEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub feature: String,
    pub passage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Free text: the approximation note, or the reason a feature was lost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Optional fields of an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDetail {
    pub line: Option<u32>,
    pub original: Option<String>,
    pub result: Option<String>,
    pub notes: Option<String>,
    pub severity: Option<Severity>,
}

impl EntryDetail {
    pub fn line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn original(mut self, original: impl Into<String>) -> Self {
        self.original = Some(original.into());
        self
    }

    pub fn result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }
}

impl ConversionReportEntry {
    pub fn new(
        entry_type: EntryType,
        feature: impl Into<String>,
        passage: impl Into<String>,
        detail: EntryDetail,
    ) -> Self {
        Self {
            entry_type,
            feature: feature.into(),
            passage: passage.into(),
            line: detail.line,
            original: detail.original,
            result: detail.result,
            severity: detail.severity,
            notes: detail.notes,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Receiver for entries produced during rewriting. The rewriter holds an
/// `Option<&mut dyn ReportSink>`; `None` turns reporting off.
pub trait ReportSink {
    fn record(&mut self, entry: ConversionReportEntry);
}

impl ReportSink for Vec<ConversionReportEntry> {
    fn record(&mut self, entry: ConversionReportEntry) {
        self.push(entry);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub converted: usize,
    pub approximated: usize,
    pub lost: usize,
}

/// Per-feature tallies used to rank problem features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureStats {
    pub feature: String,
    pub converted: usize,
    pub approximated: usize,
    pub lost: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub source_format: Dialect,
    pub target_format: Dialect,
    pub created_at: DateTime<Utc>,
    pub passage_count: usize,
    entries: Vec<ConversionReportEntry>,
}

impl ConversionReport {
    pub fn new(source_format: Dialect, target_format: Dialect) -> Self {
        Self {
            source_format,
            target_format,
            created_at: Utc::now(),
            passage_count: 0,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[ConversionReportEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Recording ──────────────────────────────────────────────────────

    pub fn record_converted(
        &mut self,
        feature: impl Into<String>,
        passage: impl Into<String>,
        detail: EntryDetail,
    ) {
        self.record(ConversionReportEntry::new(
            EntryType::Converted,
            feature,
            passage,
            detail,
        ));
    }

    pub fn record_approximated(
        &mut self,
        feature: impl Into<String>,
        passage: impl Into<String>,
        original: impl Into<String>,
        approximation: impl Into<String>,
        detail: EntryDetail,
    ) {
        let detail = detail.original(original).result(approximation);
        self.record(ConversionReportEntry::new(
            EntryType::Approximated,
            feature,
            passage,
            detail,
        ));
    }

    pub fn record_lost(
        &mut self,
        feature: impl Into<String>,
        passage: impl Into<String>,
        reason: impl Into<String>,
        detail: EntryDetail,
    ) {
        let detail = detail.notes(Some(reason.into()));
        self.record(ConversionReportEntry::new(
            EntryType::Lost,
            feature,
            passage,
            detail,
        ));
    }

    // ── Derived views ──────────────────────────────────────────────────

    pub fn summary(&self) -> ReportSummary {
        let mut s = ReportSummary {
            total: self.entries.len(),
            ..ReportSummary::default()
        };
        for e in &self.entries {
            match e.entry_type {
                EntryType::Converted => s.converted += 1,
                EntryType::Approximated => s.approximated += 1,
                EntryType::Lost => s.lost += 1,
            }
        }
        s
    }

    /// Weighted fidelity: converted counts 1, approximated 0.5, lost 0,
    /// normalized to 0–100. An empty report scores 100.
    pub fn quality_score(&self) -> f64 {
        if self.entries.is_empty() {
            return 100.0;
        }
        let weight: f64 = self.entries.iter().map(|e| e.entry_type.weight()).sum();
        weight / self.entries.len() as f64 * 100.0
    }

    /// Entries grouped by passage, groups in first-occurrence order.
    pub fn group_by_passage(&self) -> Vec<(&str, Vec<&ConversionReportEntry>)> {
        group_by(&self.entries, |e| e.passage.as_str())
    }

    /// Entries grouped by feature, groups in first-occurrence order.
    pub fn group_by_feature(&self) -> Vec<(&str, Vec<&ConversionReportEntry>)> {
        group_by(&self.entries, |e| e.feature.as_str())
    }

    /// Features with at least one lost or approximated entry, most lost
    /// first, then most approximated, then by name; at most `limit`.
    pub fn problematic_features(&self, limit: usize) -> Vec<FeatureStats> {
        let mut stats: Vec<FeatureStats> = self
            .group_by_feature()
            .into_iter()
            .map(|(feature, entries)| {
                let count = |t: EntryType| entries.iter().filter(|e| e.entry_type == t).count();
                FeatureStats {
                    feature: feature.to_string(),
                    converted: count(EntryType::Converted),
                    approximated: count(EntryType::Approximated),
                    lost: count(EntryType::Lost),
                }
            })
            .filter(|s| s.lost + s.approximated > 0)
            .collect();
        stats.sort_by(|a, b| {
            b.lost
                .cmp(&a.lost)
                .then(b.approximated.cmp(&a.approximated))
                .then(a.feature.cmp(&b.feature))
        });
        stats.truncate(limit);
        stats
    }

    /// Fold another report into this one: entries are appended and
    /// passage counts added.
    pub fn merge(&mut self, other: ConversionReport) {
        self.passage_count += other.passage_count;
        self.entries.extend(other.entries);
    }

    // ── Serialization ──────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(&self.document())?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }

    /// Parse a serialized report. Stored `summary` / `quality_score`, when
    /// present, must agree with the entries.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let doc: ReportDocument = serde_json::from_str(json)?;
        let report = ConversionReport {
            source_format: doc.source_format,
            target_format: doc.target_format,
            created_at: doc.created_at,
            passage_count: doc.passage_count,
            entries: doc.entries,
        };
        if let Some(stored) = doc.summary {
            let actual = report.summary();
            if stored != actual {
                return Err(CoreError::ReportMismatch {
                    field: "summary",
                    expected: format!("{actual:?}"),
                    found: format!("{stored:?}"),
                });
            }
        }
        if let Some(stored) = doc.quality_score {
            let actual = report.quality_score();
            if (stored - actual).abs() > 1e-6 {
                return Err(CoreError::ReportMismatch {
                    field: "quality_score",
                    expected: actual.to_string(),
                    found: stored.to_string(),
                });
            }
        }
        Ok(report)
    }

    fn document(&self) -> ReportDocument {
        ReportDocument {
            source_format: self.source_format,
            target_format: self.target_format,
            created_at: self.created_at,
            passage_count: self.passage_count,
            summary: Some(self.summary()),
            quality_score: Some(self.quality_score()),
            entries: self.entries.clone(),
        }
    }

    /// Human-readable summary for terminals.
    pub fn render_text(&self) -> String {
        let s = self.summary();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Conversion report: {} -> {}",
            self.source_format, self.target_format
        );
        let _ = writeln!(
            out,
            "passages: {}  constructs: {}  quality: {:.1}",
            self.passage_count,
            s.total,
            self.quality_score()
        );
        let _ = writeln!(
            out,
            "converted: {}  approximated: {}  lost: {}",
            s.converted, s.approximated, s.lost
        );
        let problems = self.problematic_features(10);
        if !problems.is_empty() {
            let _ = writeln!(out, "\nproblem features:");
            for p in &problems {
                let _ = writeln!(
                    out,
                    "  {:<20} lost {:>3}  approximated {:>3}",
                    p.feature, p.lost, p.approximated
                );
            }
        }
        let lost: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Lost)
            .collect();
        if !lost.is_empty() {
            let _ = writeln!(out, "\nlost:");
            for e in lost {
                let location = match e.line {
                    Some(line) => format!("{}:{line}", e.passage),
                    None => e.passage.clone(),
                };
                let _ = writeln!(
                    out,
                    "  [{location}] {}: {}",
                    e.feature,
                    e.notes.as_deref().unwrap_or("no equivalent")
                );
            }
        }
        out
    }
}

impl ReportSink for ConversionReport {
    fn record(&mut self, entry: ConversionReportEntry) {
        self.entries.push(entry);
    }
}

#[derive(Serialize, Deserialize)]
struct ReportDocument {
    source_format: Dialect,
    target_format: Dialect,
    created_at: DateTime<Utc>,
    passage_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<ReportSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality_score: Option<f64>,
    entries: Vec<ConversionReportEntry>,
}

fn group_by<'a>(
    entries: &'a [ConversionReportEntry],
    key: impl Fn(&'a ConversionReportEntry) -> &'a str,
) -> Vec<(&'a str, Vec<&'a ConversionReportEntry>)> {
    let mut groups: Vec<(&str, Vec<&ConversionReportEntry>)> = Vec::new();
    for e in entries {
        let k = key(e);
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, members)) => members.push(e),
            None => groups.push((k, vec![e])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConversionReport {
        let mut r = ConversionReport::new(Dialect::Harlowe, Dialect::SugarCube);
        r.passage_count = 2;
        r.record_converted("set", "Start", EntryDetail::default().line(Some(1)));
        r.record_approximated(
            "dropdown",
            "Start",
            "(dropdown: bind $c, \"A\")",
            "<<listbox \"$c\">>",
            EntryDetail::default(),
        );
        r.record_lost(
            "click",
            "Shop",
            "no click handlers",
            EntryDetail::default().severity(Some(Severity::Warning)),
        );
        r.record_lost("click", "Shop", "no click handlers", EntryDetail::default());
        r
    }

    #[test]
    fn summary_counts() {
        let s = sample().summary();
        assert_eq!(
            s,
            ReportSummary {
                total: 4,
                converted: 1,
                approximated: 1,
                lost: 2
            }
        );
    }

    #[test]
    fn quality_score_weights() {
        // (1 + 0.5 + 0 + 0) / 4
        assert!((sample().quality_score() - 37.5).abs() < 1e-9);
        let empty = ConversionReport::new(Dialect::Ink, Dialect::Harlowe);
        assert_eq!(empty.quality_score(), 100.0);
    }

    #[test]
    fn quality_score_bounds() {
        let mut all_lost = ConversionReport::new(Dialect::Ink, Dialect::Chapbook);
        all_lost.record_lost("tunnel", "A", "none", EntryDetail::default());
        assert_eq!(all_lost.quality_score(), 0.0);

        let mut all_ok = ConversionReport::new(Dialect::Ink, Dialect::Chapbook);
        all_ok.record_converted("set", "A", EntryDetail::default());
        assert_eq!(all_ok.quality_score(), 100.0);
    }

    #[test]
    fn grouping_preserves_first_occurrence() {
        let r = sample();
        let by_passage = r.group_by_passage();
        let names: Vec<_> = by_passage.iter().map(|(p, _)| *p).collect();
        assert_eq!(names, vec!["Start", "Shop"]);
        assert_eq!(by_passage[1].1.len(), 2);

        let features: Vec<_> = r.group_by_feature().iter().map(|(f, _)| *f).collect();
        assert_eq!(features, vec!["set", "dropdown", "click"]);
    }

    #[test]
    fn problematic_features_ranked() {
        let top = sample().problematic_features(5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].feature, "click");
        assert_eq!(top[0].lost, 2);
        assert_eq!(top[1].feature, "dropdown");
        assert_eq!(sample().problematic_features(1).len(), 1);
    }

    #[test]
    fn lost_reason_lands_in_notes() {
        let r = sample();
        let lost = &r.entries()[2];
        assert_eq!(lost.entry_type, EntryType::Lost);
        assert_eq!(lost.notes.as_deref(), Some("no click handlers"));
        assert_eq!(lost.severity, Some(Severity::Warning));
    }

    #[test]
    fn json_round_trip_preserves_derived_values() {
        let r = sample();
        for json in [r.to_json().unwrap(), r.to_json_pretty().unwrap()] {
            let back = ConversionReport::from_json(&json).unwrap();
            assert_eq!(back, r);
            assert_eq!(back.summary(), r.summary());
            assert_eq!(back.quality_score(), r.quality_score());
        }
    }

    #[test]
    fn serialized_form_carries_summary_and_type_tags() {
        let v: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(v["summary"]["lost"], 2);
        assert_eq!(v["quality_score"], 37.5);
        assert_eq!(v["entries"][1]["type"], "approximated");
        assert_eq!(v["source_format"], "harlowe");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ConversionReport::from_json("{\"entries\": 3}").unwrap_err();
        assert!(matches!(err, CoreError::ReportParse(_)));
    }

    #[test]
    fn tampered_summary_is_rejected() {
        let mut v: serde_json::Value =
            serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        v["summary"]["lost"] = serde_json::json!(0);
        let err = ConversionReport::from_json(&v.to_string()).unwrap_err();
        assert!(matches!(err, CoreError::ReportMismatch { field: "summary", .. }));
    }

    #[test]
    fn merge_appends_entries_and_passages() {
        let mut a = sample();
        let mut b = ConversionReport::new(Dialect::Harlowe, Dialect::SugarCube);
        b.passage_count = 3;
        b.record_converted("link", "End", EntryDetail::default());
        a.merge(b);
        assert_eq!(a.passage_count, 5);
        assert_eq!(a.summary().total, 5);
        assert_eq!(a.entries().last().unwrap().feature, "link");
    }

    #[test]
    fn text_rendering_lists_lost_entries() {
        let text = sample().render_text();
        assert!(text.contains("harlowe -> sugarcube"));
        assert!(text.contains("quality: 37.5"));
        assert!(text.contains("[Shop] click: no click handlers"));
    }
}
