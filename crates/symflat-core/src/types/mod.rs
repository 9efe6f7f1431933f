//! # Types
//!
//! Result types produced by address lookups on loaded modules.
//!
//! These are plain owned values, independent of whether the module behind
//! them is a parsed [`SymbolModule`](crate::module::SymbolModule) or a flat
//! buffer.

pub mod symbols;

pub use symbols::{CfiRules, InlineFrame, SourceLineInfo, SourceLocation, SymbolLanguage, SymbolName};
