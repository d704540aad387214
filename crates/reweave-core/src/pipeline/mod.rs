pub mod config;
mod lower;
pub mod rewrite;

pub use config::{ConvertOptions, LossPolicy, Preset, RuleConfig};
pub use rewrite::{
    extract_all, render, ConstructRule, PassageNames, Piece, RewriteContext, RewriteEnv,
    RewritePipeline, RewriteRule, SameNames, Segment, Site,
};
