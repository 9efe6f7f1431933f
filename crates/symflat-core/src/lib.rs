//! # symflat-core
//!
//! Flat-buffer serialization of symbol modules for symflat.
//!
//! This crate turns the map-based debug metadata of one binary (functions,
//! line tables, inline trees, public symbols, stack frame info, CFI rules)
//! into a single contiguous buffer that a consumer can load and query
//! without re-parsing. It provides:
//! - Two-phase (size, then write) binary codecs that compose over nested
//!   containers
//! - The module serializer and whole-database conversion
//! - A Breakpad text-format parser producing modules
//! - A flat-buffer consumer answering address lookups
//!
//! ## Buffer layout
//!
//! A corruption flag byte, a header of one `u64` size per section, the
//! section payloads in fixed order, and a trailing zero byte. See
//! [`serializer`] for details.

pub mod codec;
pub mod error;
pub mod module;
pub mod parser;
pub mod prelude;
pub mod resolver;
pub mod serializer;
pub mod types;

// Re-export commonly used types
pub use error::{SymflatError, SymflatResult};
pub use module::SymbolModule;
pub use resolver::{FastModule, FastResolver, SourceDatabase, StoredModule};
pub use serializer::{ModuleSerializer, SectionSizes, SerializerConfig};
