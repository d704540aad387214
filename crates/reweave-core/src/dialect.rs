//! The five authoring dialects the converter understands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An interactive-fiction authoring dialect.
///
/// Four are Twine story formats sharing the Twee passage container; Ink is
/// a standalone scripting language with its own knot/stitch structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Harlowe,
    SugarCube,
    Chapbook,
    Snowman,
    Ink,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Harlowe,
        Dialect::SugarCube,
        Dialect::Chapbook,
        Dialect::Snowman,
        Dialect::Ink,
    ];

    /// Lowercase tag used on the command line and in serialized reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Harlowe => "harlowe",
            Dialect::SugarCube => "sugarcube",
            Dialect::Chapbook => "chapbook",
            Dialect::Snowman => "snowman",
            Dialect::Ink => "ink",
        }
    }

    /// Name as written in a Twine `StoryData` `format` field.
    pub fn format_name(self) -> &'static str {
        match self {
            Dialect::Harlowe => "Harlowe",
            Dialect::SugarCube => "SugarCube",
            Dialect::Chapbook => "Chapbook",
            Dialect::Snowman => "Snowman",
            Dialect::Ink => "Ink",
        }
    }

    /// Whether the dialect is stored in the Twee passage container.
    pub fn is_twine(self) -> bool {
        !matches!(self, Dialect::Ink)
    }

    /// Match a story-format name case-insensitively (`"SugarCube"`,
    /// `"harlowe"`, `"Harlowe 3"`).
    pub fn from_format_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let head = lower.split_whitespace().next().unwrap_or_default();
        Dialect::ALL.into_iter().find(|d| d.as_str() == head)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::from_format_name(s).ok_or_else(|| CoreError::UnknownDialect(s.to_string()))
    }
}
