//! Story conversion between the five authoring dialects.
//!
//! This crate wires the dialect implementations into per-pair
//! [`PairRewriter`]s (a compatibility matrix plus an ordered rewrite
//! pipeline), keeps them in a [`RewriterRegistry`], and converts whole
//! stories with [`convert_story`] / [`convert_text`].

mod convert;
mod detect;
pub mod matrices;
mod names;
pub mod orders;
mod registry;

use reweave_core::{Dialect, Syntax};
use reweave_dialect_ink::Ink;
use reweave_dialect_twine::{Chapbook, Harlowe, Snowman, SugarCube};

pub use convert::{convert_story, convert_text, parse_story, write_story, Conversion};
pub use detect::detect_dialect;
pub use names::NameMap;
pub use registry::{PairRewriter, RewriterRegistry};

/// The [`Syntax`] implementation for a dialect.
pub fn syntax_for(dialect: Dialect) -> &'static dyn Syntax {
    match dialect {
        Dialect::Harlowe => &Harlowe,
        Dialect::SugarCube => &SugarCube,
        Dialect::Chapbook => &Chapbook,
        Dialect::Snowman => &Snowman,
        Dialect::Ink => &Ink,
    }
}
