use crate::dialect::Dialect;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("no rewriter registered for {from} -> {to}")]
    UnsupportedPair { from: Dialect, to: Dialect },

    #[error("unknown dialect {0:?} (expected one of: harlowe, sugarcube, chapbook, snowman, ink)")]
    UnknownDialect(String),

    #[error("malformed conversion report: {0}")]
    ReportParse(#[from] serde_json::Error),

    #[error("conversion report {field} mismatch: stored {found}, entries give {expected}")]
    ReportMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("invalid feature pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid StoryData block: {0}")]
    StoryData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
