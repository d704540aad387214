use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reweave_core::{ConvertOptions, Dialect, Preset};
use serde::Deserialize;

/// User defaults (`config.json`). Every field is optional; command-line
/// flags override what is set here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// One of [`Preset::NAMES`].
    pub preset: Option<String>,
    /// Construct kinds left untouched, e.g. `["markup", "comment"]`.
    pub skip_rules: Vec<String>,
    pub pretty_report: bool,
    pub parallel: bool,
    pub default_target: Option<String>,
}

/// Option values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub preset: Option<String>,
    pub skip_rules: Vec<String>,
    pub parallel: bool,
}

impl Config {
    /// `<config dir>/reweave/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reweave").join("config.json"))
    }

    /// Load `explicit` if given (it must exist), else the default path if
    /// a file is there, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Conversion options: the preset (flag, then file, then `annotated`)
    /// with file and flag skip lists applied on top.
    pub fn options(&self, overrides: &Overrides) -> Result<ConvertOptions> {
        let preset = overrides
            .preset
            .as_deref()
            .or(self.preset.as_deref())
            .unwrap_or("annotated");
        let skip: Vec<&str> = self
            .skip_rules
            .iter()
            .chain(&overrides.skip_rules)
            .map(String::as_str)
            .collect();
        let Some(mut options) = Preset::resolve(preset, &skip) else {
            bail!(
                "unknown preset `{preset}` (expected one of: {})",
                Preset::NAMES.join(", ")
            );
        };
        options.parallel = self.parallel || overrides.parallel;
        Ok(options)
    }

    pub fn default_target(&self) -> Result<Option<Dialect>> {
        self.default_target
            .as_deref()
            .map(|name| name.parse::<Dialect>())
            .transpose()
            .context("invalid default_target in config")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use reweave_core::{ConstructKind, LossPolicy};

    use super::*;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_explicit_file() {
        let file = write_config(
            r#"{"preset": "verbatim", "skip_rules": ["markup"], "pretty_report": true, "default_target": "SugarCube"}"#,
        );
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.preset.as_deref(), Some("verbatim"));
        assert!(config.pretty_report);
        assert!(!config.parallel);
        assert_eq!(config.default_target().unwrap(), Some(Dialect::SugarCube));

        let options = config.options(&Overrides::default()).unwrap();
        assert_eq!(options.loss_policy, LossPolicy::Verbatim);
        assert!(!options.rules.is_enabled(ConstructKind::Markup));
        assert!(options.rules.is_enabled(ConstructKind::Link));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let file = write_config("{}");
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config, Config::default());
        let options = config.options(&Overrides::default()).unwrap();
        assert_eq!(options, ConvertOptions::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let file = write_config("{preset: plain");
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_flags_override_file() {
        let file = write_config(r#"{"preset": "plain", "skip_rules": ["comment"]}"#);
        let config = Config::load(Some(file.path())).unwrap();
        let overrides = Overrides {
            preset: Some("annotated".into()),
            skip_rules: vec!["link".into()],
            parallel: true,
        };
        let options = config.options(&overrides).unwrap();
        assert!(options.with_report);
        assert!(options.parallel);
        assert!(!options.rules.is_enabled(ConstructKind::Comment));
        assert!(!options.rules.is_enabled(ConstructKind::Link));
    }

    #[test]
    fn test_unknown_preset() {
        let config = Config {
            preset: Some("loud".into()),
            ..Config::default()
        };
        let err = config.options(&Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("unknown preset `loud`"));
    }

    #[test]
    fn test_bad_default_target() {
        let config = Config {
            default_target: Some("twison".into()),
            ..Config::default()
        };
        assert!(config.default_target().is_err());
    }
}
