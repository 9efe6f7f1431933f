//! # Module Serializer
//!
//! Converts a [`SymbolModule`] into one contiguous, self-describing buffer
//! that a flat consumer can load without re-parsing.
//!
//! Serialization runs in two passes over the same immutable module:
//!
//! 1. **Size pass** ([`ModuleSerializer::compute_size`]): computes the byte
//!    length of every section and returns them as a [`SectionSizes`] value.
//! 2. **Write pass** ([`ModuleSerializer::write`]): writes the corruption flag,
//!    the header built from that same `SectionSizes`, every section, and the
//!    sentinel.
//!
//! The header is only trustworthy if both passes agree, so the write pass
//! checks every section against its recorded size and fails with
//! [`SymflatError::SizeWriteMismatch`] on any disagreement.
//!
//! ## Usage
//!
//! ```rust
//! use symflat_core::module::{Function, SymbolModule};
//! use symflat_core::serializer::ModuleSerializer;
//!
//! let mut module = SymbolModule::new("app.pdb");
//! module.files.insert(1, "a.cc".to_string());
//! module.functions.store_range(0x1000, 0x10, Function::new("foo", 0x1000, 0x10, 0, false));
//!
//! let serializer = ModuleSerializer::new();
//! let sizes = serializer.compute_size(&module);
//! let buffer = serializer.serialize(&module).unwrap();
//! assert_eq!(buffer.len(), sizes.total());
//! ```

mod allocator;
mod convert;
mod layout;

pub use allocator::{BufferAllocator, HeapAllocator, LimitedAllocator, SerializerConfig, MAX_BUFFER_SIZE_ENV};
pub use convert::{CodeModuleDescriptor, ConversionReport, ModuleConversion, ModuleLoader};
pub use layout::{
    BufferHeader, Section, SectionSizes, FLAG_SIZE, HEADER_SIZE, MIN_BUFFER_SIZE, PAYLOAD_OFFSET, SECTION_COUNT,
    SENTINEL_SIZE,
};
use tracing::{debug, error};

use crate::codec::{
    BoolCodec, Codec, FunctionCodec, I32Codec, InlineOriginCodec, MapCodec, PublicSymbolCodec,
    RangeCodec, StackFrameInfoCodec, StrCodec, U64Codec, U8Codec,
};
use crate::error::{SymflatError, SymflatResult};
use crate::module::SymbolModule;
use crate::parser::parse_text_to_module;

/// Codec for the files section.
pub type FilesCodec = MapCodec<I32Codec, StrCodec>;
/// Codec for the functions section.
pub type FunctionsCodec = RangeCodec<FunctionCodec>;
/// Codec for the public symbols section.
pub type PublicSymbolsCodec = MapCodec<U64Codec, PublicSymbolCodec>;
/// Codec for each stack info section.
pub type StackInfoCodec = RangeCodec<StackFrameInfoCodec>;
/// Codec for the CFI initial rules section.
pub type CfiInitialRulesCodec = RangeCodec<StrCodec>;
/// Codec for the CFI delta rules section.
pub type CfiDeltaRulesCodec = MapCodec<U64Codec, StrCodec>;
/// Codec for the inline origins section.
pub type InlineOriginsCodec = MapCodec<I32Codec, InlineOriginCodec>;

/// Name given to modules parsed by [`ModuleSerializer::serialize_from_text`].
pub const UNNAMED_MODULE: &str = "no name";

/// Drives the size and write passes for whole modules.
///
/// The serializer holds configuration only; all per-conversion state lives in
/// the [`SectionSizes`] value returned by the size pass. One instance can be
/// shared across threads and used for any number of conversions.
pub struct ModuleSerializer
{
    config: SerializerConfig,
    allocator: Box<dyn BufferAllocator>,
}

impl Default for ModuleSerializer
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleSerializer
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ModuleSerializer").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ModuleSerializer
{
    /// Serializer with default settings (unbounded heap allocation).
    #[must_use]
    pub fn new() -> Self
    {
        Self::with_config(SerializerConfig::default())
    }

    /// Serializer using the allocator described by `config`.
    #[must_use]
    pub fn with_config(config: SerializerConfig) -> Self
    {
        let allocator = config.allocator();
        Self { config, allocator }
    }

    /// Serializer using a caller-supplied allocator.
    #[must_use]
    pub fn with_allocator(allocator: impl BufferAllocator + 'static) -> Self
    {
        Self {
            config: SerializerConfig::default(),
            allocator: Box::new(allocator),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SerializerConfig
    {
        &self.config
    }

    /// Size pass: byte length of every section of `module`.
    ///
    /// The returned value is what [`Self::write`] needs; use
    /// [`SectionSizes::total`] for the full buffer size.
    pub fn compute_size(&self, module: &SymbolModule) -> SectionSizes
    {
        let mut sizes = SectionSizes::default();
        for section in Section::ALL {
            sizes.set(section, section_size(module, section));
        }
        debug!(module = module.name(), total = sizes.total(), ?sizes, "computed section sizes");
        sizes
    }

    /// Write pass: append the serialized module to `dest`.
    ///
    /// `sizes` must come from [`Self::compute_size`] on the same module.
    /// Returns the number of bytes appended; the end of `dest` is the position
    /// immediately past the sentinel.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::SizeWriteMismatch`] as soon as a section's
    /// written length differs from its recorded size, e.g. when `sizes` was
    /// computed for a different module.
    pub fn write(&self, module: &SymbolModule, sizes: &SectionSizes, dest: &mut Vec<u8>) -> SymflatResult<usize>
    {
        let start = dest.len();

        BoolCodec.write(&module.is_corrupt, dest);
        for (_, size) in sizes.iter() {
            U64Codec.write(&(size as u64), dest);
        }

        for section in Section::ALL {
            let before = dest.len();
            write_section(module, section, dest);
            let written = dest.len() - before;
            let expected = sizes.get(section);
            if written != expected {
                error!(
                    module = module.name(),
                    %section,
                    expected,
                    written,
                    "size_to_alloc differs from size_written"
                );
                return Err(SymflatError::SizeWriteMismatch {
                    section: section.name(),
                    expected,
                    written,
                });
            }
        }

        U8Codec.write(&0, dest);
        Ok(dest.len() - start)
    }

    /// Serialize `module` into a freshly allocated buffer of exactly the
    /// computed size.
    ///
    /// ## Errors
    ///
    /// - [`SymflatError::AllocationFailure`] if the buffer cannot be allocated
    /// - [`SymflatError::SizeWriteMismatch`] if the passes disagree; the
    ///   partially written buffer is dropped
    pub fn serialize(&self, module: &SymbolModule) -> SymflatResult<Vec<u8>>
    {
        let sizes = self.compute_size(module);
        let size_to_alloc = sizes.total();

        let mut buffer = self.allocator.allocate(size_to_alloc).inspect_err(|_| {
            error!(module = module.name(), size_to_alloc, "ModuleSerializer: memory allocation failed");
        })?;

        let size_written = self.write(module, &sizes, &mut buffer)?;
        verify_written(size_to_alloc, size_written)?;
        Ok(buffer)
    }

    /// Parse Breakpad-format text into a transient module and serialize it.
    ///
    /// Used when there is no source database yet.
    ///
    /// ## Errors
    ///
    /// - [`SymflatError::ParseFailure`] from the parser, unchanged
    /// - any error from [`Self::serialize`]
    pub fn serialize_from_text(&self, raw_text: &str) -> SymflatResult<Vec<u8>>
    {
        let module = parse_text_to_module(UNNAMED_MODULE, raw_text)?;
        self.serialize(&module)
    }
}

fn verify_written(size_to_alloc: usize, size_written: usize) -> SymflatResult<()>
{
    if size_to_alloc == size_written {
        return Ok(());
    }
    error!(size_to_alloc, size_written, "size_to_alloc differs from size_written");
    Err(SymflatError::SizeWriteMismatch {
        section: "module",
        expected: size_to_alloc,
        written: size_written,
    })
}

fn section_size(module: &SymbolModule, section: Section) -> usize
{
    match section {
        Section::Files => FilesCodec::default().size_of(&module.files),
        Section::Functions => FunctionsCodec::default().size_of(&module.functions),
        Section::PublicSymbols => PublicSymbolsCodec::default().size_of(&module.public_symbols),
        Section::StackInfo(kind) => StackInfoCodec::default().size_of(module.stack_info(kind)),
        Section::CfiInitialRules => CfiInitialRulesCodec::default().size_of(&module.cfi_initial_rules),
        Section::CfiDeltaRules => CfiDeltaRulesCodec::default().size_of(&module.cfi_delta_rules),
        Section::InlineOrigins => InlineOriginsCodec::default().size_of(&module.inline_origins),
    }
}

fn write_section(module: &SymbolModule, section: Section, dest: &mut Vec<u8>)
{
    match section {
        Section::Files => FilesCodec::default().write(&module.files, dest),
        Section::Functions => FunctionsCodec::default().write(&module.functions, dest),
        Section::PublicSymbols => PublicSymbolsCodec::default().write(&module.public_symbols, dest),
        Section::StackInfo(kind) => StackInfoCodec::default().write(module.stack_info(kind), dest),
        Section::CfiInitialRules => CfiInitialRulesCodec::default().write(&module.cfi_initial_rules, dest),
        Section::CfiDeltaRules => CfiDeltaRulesCodec::default().write(&module.cfi_delta_rules, dest),
        Section::InlineOrigins => InlineOriginsCodec::default().write(&module.inline_origins, dest),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::module::{Function, Line};

    fn scenario_module() -> SymbolModule
    {
        let mut module = SymbolModule::new("scenario");
        module.files.insert(1, "a.cc".to_string());
        let mut foo = Function::new("foo", 0x1000, 0x10, 0, false);
        foo.lines.store_range(
            0x1000,
            0x5,
            Line {
                address: 0x1000,
                size: 0x5,
                source_file_id: 1,
                line: 10,
            },
        );
        module.functions.store_range(0x1000, 0x10, foo);
        module
    }

    #[test]
    fn test_scenario_sizes()
    {
        let sizes = ModuleSerializer::new().compute_size(&scenario_module());

        // count + (key + len + "a.cc")
        assert_eq!(sizes.get(Section::Files), 4 + 4 + 4 + 4);
        // count + range header + name + fixed fields + lines(count + header + line) + inlines(count)
        assert_eq!(sizes.get(Section::Functions), 4 + 16 + (4 + 3) + 21 + (4 + 16 + 24) + 4);
        for section in Section::ALL.into_iter().skip(2) {
            assert_eq!(sizes.get(section), 4, "{section} should be an empty container");
        }
        assert_eq!(
            sizes.total(),
            1 + 88 + sizes.get(Section::Files) + sizes.get(Section::Functions) + 9 * 4 + 1
        );
    }

    #[test]
    fn test_write_matches_compute_size()
    {
        let module = scenario_module();
        let serializer = ModuleSerializer::new();
        let sizes = serializer.compute_size(&module);
        let mut dest = vec![0xaa; 3];
        let written = serializer.write(&module, &sizes, &mut dest).unwrap();
        assert_eq!(written, sizes.total());
        assert_eq!(dest.len(), 3 + written);
        assert_eq!(*dest.last().unwrap(), 0);
    }

    #[test]
    fn test_header_records_section_sizes()
    {
        let module = scenario_module();
        let serializer = ModuleSerializer::new();
        let buffer = serializer.serialize(&module).unwrap();
        let header = BufferHeader::parse(&buffer).unwrap();
        assert!(!header.is_corrupt);
        assert_eq!(header.sizes, serializer.compute_size(&module));
    }

    #[test]
    fn test_stale_sizes_fail_the_write()
    {
        let serializer = ModuleSerializer::new();
        let sizes = serializer.compute_size(&SymbolModule::new("empty"));
        let mut dest = Vec::new();
        let err = serializer.write(&scenario_module(), &sizes, &mut dest).unwrap_err();
        assert!(matches!(err, SymflatError::SizeWriteMismatch { section: "files", expected: 4, written: 16 }));
    }

    #[test]
    fn test_verify_written()
    {
        assert!(verify_written(10, 10).is_ok());
        assert!(matches!(
            verify_written(10, 9),
            Err(SymflatError::SizeWriteMismatch { section: "module", expected: 10, written: 9 })
        ));
    }

    #[test]
    fn test_allocation_failure_exposes_no_buffer()
    {
        let serializer = ModuleSerializer::with_allocator(LimitedAllocator::new(MIN_BUFFER_SIZE));
        let err = serializer.serialize(&scenario_module()).unwrap_err();
        assert!(matches!(err, SymflatError::AllocationFailure { .. }));
    }
}
