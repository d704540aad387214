//! The Twine story formats: Harlowe, SugarCube, Chapbook and Snowman.
//!
//! Each format is a [`Syntax`](reweave_core::Syntax) implementation: a set
//! of construct extractors, an expression lexer, an expression printer and
//! an emitter. Link syntax, HTML comments and the JavaScript expression
//! grammar are shared between formats.

pub mod chapbook;
pub mod harlowe;
mod js;
mod markup;
pub mod snowman;
pub mod sugarcube;

pub use chapbook::Chapbook;
pub use harlowe::Harlowe;
pub use snowman::Snowman;
pub use sugarcube::SugarCube;
