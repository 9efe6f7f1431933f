//! Common module for library exports

pub use crate::error::{SymflatError, SymflatResult};
pub use crate::module::{Function, Line, PublicSymbol, StackFrameInfo, StackInfoKind, SymbolModule};
pub use crate::parser::parse_text_to_module;
pub use crate::resolver::{FastModule, FastResolver, SourceDatabase, StoredModule};
pub use crate::serializer::{
    BufferHeader, CodeModuleDescriptor, ConversionReport, ModuleLoader, ModuleSerializer, Section, SectionSizes,
    SerializerConfig,
};
pub use crate::types::{CfiRules, SourceLineInfo, SourceLocation};
