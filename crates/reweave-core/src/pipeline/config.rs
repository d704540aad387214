use std::collections::BTreeSet;

use crate::construct::ConstructKind;

/// What happens to a construct the target dialect cannot express.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LossPolicy {
    /// Replace it with a target-dialect comment naming the feature and
    /// quoting the original.
    #[default]
    Comment,
    /// Leave the original text untouched.
    Verbatim,
}

/// Which rewrite rules run.
///
/// All rules are enabled by default. Rule names are the kebab-case
/// [`ConstructKind`] names; a skipped rule leaves its constructs as plain
/// text and records nothing for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleConfig {
    skipped: BTreeSet<ConstructKind>,
}

impl RuleConfig {
    /// All rules enabled except those named in the skip list. Unknown names
    /// are ignored.
    pub fn from_skip_list(skip: &[&str]) -> Self {
        let mut config = Self::default();
        config.skip(skip);
        config
    }

    pub fn skip(&mut self, names: &[&str]) {
        self.skipped
            .extend(names.iter().filter_map(|n| ConstructKind::from_name(n)));
    }

    pub fn is_enabled(&self, kind: ConstructKind) -> bool {
        !self.skipped.contains(&kind)
    }
}

/// Options for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Build a [`crate::report::ConversionReport`] alongside the output.
    pub with_report: bool,
    pub loss_policy: LossPolicy,
    pub rules: RuleConfig,
    /// Rewrite passages on scoped worker threads. Output and report order
    /// are the same as the sequential run.
    pub parallel: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            with_report: true,
            loss_policy: LossPolicy::Comment,
            rules: RuleConfig::default(),
            parallel: false,
        }
    }
}

impl ConvertOptions {
    pub fn without_report() -> Self {
        Self {
            with_report: false,
            ..Self::default()
        }
    }
}

/// Named option sets.
///
/// - **`annotated`** (default): report on, lost constructs replaced by a
///   comment marker in the target dialect.
/// - **`verbatim`**: report on, lost constructs left as written.
/// - **`plain`**: no report, comment markers.
pub struct Preset;

impl Preset {
    pub const NAMES: &'static [&'static str] = &["annotated", "verbatim", "plain"];

    /// Resolve a preset name; `skip_rules` are applied on top.
    pub fn resolve(name: &str, skip_rules: &[&str]) -> Option<ConvertOptions> {
        let mut options = match name {
            "annotated" => ConvertOptions::default(),
            "verbatim" => ConvertOptions {
                loss_policy: LossPolicy::Verbatim,
                ..ConvertOptions::default()
            },
            "plain" => ConvertOptions::without_report(),
            _ => return None,
        };
        options.rules.skip(skip_rules);
        Some(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_all() {
        let config = RuleConfig::default();
        for kind in ConstructKind::ALL {
            assert!(config.is_enabled(kind));
        }
    }

    #[test]
    fn skip_list_disables_rules() {
        let config = RuleConfig::from_skip_list(&["link", "variable"]);
        assert!(!config.is_enabled(ConstructKind::Link));
        assert!(!config.is_enabled(ConstructKind::Variable));
        assert!(config.is_enabled(ConstructKind::Conditional));
    }

    #[test]
    fn skip_list_unknown_ignored() {
        let config = RuleConfig::from_skip_list(&["nonexistent"]);
        assert_eq!(config, RuleConfig::default());
    }

    #[test]
    fn preset_verbatim() {
        let options = Preset::resolve("verbatim", &[]).unwrap();
        assert!(options.with_report);
        assert_eq!(options.loss_policy, LossPolicy::Verbatim);
    }

    #[test]
    fn preset_plain_has_no_report() {
        let options = Preset::resolve("plain", &[]).unwrap();
        assert!(!options.with_report);
        assert_eq!(options.loss_policy, LossPolicy::Comment);
    }

    #[test]
    fn preset_with_skip_overrides() {
        let options = Preset::resolve("annotated", &["comment"]).unwrap();
        assert!(!options.rules.is_enabled(ConstructKind::Comment));
        assert!(options.rules.is_enabled(ConstructKind::Link));
    }

    #[test]
    fn preset_unknown_returns_none() {
        assert!(Preset::resolve("unknown", &[]).is_none());
    }
}
