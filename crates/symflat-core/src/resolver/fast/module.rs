//! A module loaded straight from a serialized buffer.

use std::ops::Range;

use tracing::{debug, warn};

use super::static_map::StaticMap;
use super::static_range_map::StaticRangeMap;
use crate::codec::{
    ByteReader, Codec, FunctionCodec, I32Codec, InlineOriginCodec, PublicSymbolCodec, StackFrameInfoCodec, StrCodec,
    U64Codec,
};
use crate::error::SymflatResult;
use crate::module::{Function, InlineOrigin, PublicSymbol, StackFrameInfo, StackInfoKind, SymbolModule};
use crate::resolver::demangle::make_symbol_name;
use crate::serializer::{
    BufferHeader, CfiDeltaRulesCodec, CfiInitialRulesCodec, FilesCodec, FunctionsCodec, InlineOriginsCodec,
    PublicSymbolsCodec, Section, StackInfoCodec, SECTION_COUNT,
};
use crate::types::{CfiRules, InlineFrame, SourceLineInfo, SourceLocation};

/// Name reported for an inlined call whose origin is missing.
const UNKNOWN_INLINE_NAME: &str = "<name omitted>";

/// Read-only module backed by one serialized buffer.
///
/// Loading validates the whole buffer and builds a small index per section;
/// lookups then decode only the entry they hit.
#[derive(Debug, Clone)]
pub struct FastModule
{
    name: String,
    buffer: Vec<u8>,
    header: BufferHeader,
    sections: [Range<usize>; SECTION_COUNT],
    files: StaticMap<I32Codec, StrCodec>,
    functions: StaticRangeMap<FunctionCodec>,
    public_symbols: StaticMap<U64Codec, PublicSymbolCodec>,
    stack_info: Vec<StaticRangeMap<StackFrameInfoCodec>>,
    cfi_initial_rules: StaticRangeMap<StrCodec>,
    cfi_delta_rules: StaticMap<U64Codec, StrCodec>,
    inline_origins: StaticMap<I32Codec, InlineOriginCodec>,
}

impl FastModule
{
    /// Validate `buffer` and index every section.
    ///
    /// ## Parameters
    ///
    /// - `name`: Module id
    /// - `buffer`: Output of [`ModuleSerializer::serialize`](crate::serializer::ModuleSerializer::serialize)
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::Malformed`](crate::error::SymflatError::Malformed)
    /// when the framing is wrong or any section does not decode.
    pub fn load(name: impl Into<String>, buffer: Vec<u8>) -> SymflatResult<Self>
    {
        let name = name.into();
        let header = BufferHeader::parse(&buffer)?;
        let sections = header.sizes.section_ranges();
        let section = |section: Section| sections[section.index()].clone();

        let stack_info = StackInfoKind::ALL
            .into_iter()
            .map(|kind| StaticRangeMap::build(&buffer, section(Section::StackInfo(kind))))
            .collect::<SymflatResult<Vec<_>>>()?;

        let module = Self {
            files: StaticMap::build(&buffer, section(Section::Files))?,
            functions: StaticRangeMap::build(&buffer, section(Section::Functions))?,
            public_symbols: StaticMap::build(&buffer, section(Section::PublicSymbols))?,
            stack_info,
            cfi_initial_rules: StaticRangeMap::build(&buffer, section(Section::CfiInitialRules))?,
            cfi_delta_rules: StaticMap::build(&buffer, section(Section::CfiDeltaRules))?,
            inline_origins: StaticMap::build(&buffer, section(Section::InlineOrigins))?,
            sections,
            header,
            buffer,
            name,
        };

        debug!(
            module = module.name.as_str(),
            size = module.buffer.len(),
            corrupt = module.header.is_corrupt,
            functions = module.functions.len(),
            public_symbols = module.public_symbols.len(),
            "loaded flat module"
        );
        Ok(module)
    }

    /// Module id.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// The serialized buffer this module reads from.
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.buffer
    }

    /// Buffer framing: corruption flag and section sizes.
    pub fn header(&self) -> &BufferHeader
    {
        &self.header
    }

    /// Whether the source module was marked corrupt when it was parsed.
    pub fn is_corrupt(&self) -> bool
    {
        self.header.is_corrupt
    }

    /// Resolve `address` to a function, source line and inline frames.
    ///
    /// Falls back to the nearest preceding public symbol when no function
    /// covers the address, provided that symbol starts above the nearest
    /// preceding function. A public symbol below that function would claim
    /// the gap past the function's end.
    pub fn lookup_address(&self, address: u64) -> Option<SourceLineInfo>
    {
        if let Some(function) = self.function_at(address) {
            return Some(self.function_line_info(address, &function));
        }

        let symbol = self.public_symbol(address)?;
        if self
            .functions
            .nearest_base(address)
            .is_some_and(|function_base| symbol.address <= function_base)
        {
            return None;
        }
        Some(SourceLineInfo {
            address,
            function: make_symbol_name(&symbol.name),
            function_base: symbol.address,
            function_size: 0,
            parameter_size: symbol.parameter_size,
            is_multiple: symbol.is_multiple,
            location: None,
            line_base: None,
            inline_frames: Vec::new(),
            from_public_symbol: true,
        })
    }

    fn function_line_info(&self, address: u64, function: &Function) -> SourceLineInfo
    {
        let line = function.lines.retrieve(address);
        let location = line.map(|line| SourceLocation {
            file: self.file_name(line.source_file_id).unwrap_or_default(),
            line: line.line,
        });

        let inline_frames = function
            .inlines
            .retrieve_all(address)
            .into_iter()
            .map(|inline| {
                let name = self
                    .inline_origin(inline.origin_id)
                    .map_or_else(|| UNKNOWN_INLINE_NAME.to_string(), |origin| origin.name);
                let call_site = inline
                    .has_call_site_file_id
                    .then(|| self.file_name(inline.call_site_file_id))
                    .flatten()
                    .map(|file| SourceLocation {
                        file,
                        line: inline.call_site_line,
                    });
                InlineFrame {
                    name: make_symbol_name(&name),
                    origin_id: inline.origin_id,
                    nest_level: inline.nest_level,
                    call_site,
                    call_site_line: inline.call_site_line,
                }
            })
            .collect();

        SourceLineInfo {
            address,
            function: make_symbol_name(&function.name),
            function_base: function.address,
            function_size: function.size,
            parameter_size: function.parameter_size,
            is_multiple: function.is_multiple,
            location,
            line_base: line.map(|line| line.address),
            inline_frames,
            from_public_symbol: false,
        }
    }

    /// Function whose range contains `address`.
    pub fn function_at(&self, address: u64) -> Option<Function>
    {
        let (_, _, function) = self.functions.retrieve(&self.buffer, address)?;
        self.checked(Section::Functions, function)
    }

    /// Public symbol at or nearest below `address`.
    pub fn public_symbol(&self, address: u64) -> Option<PublicSymbol>
    {
        let (_, symbol) = self.public_symbols.floor(&self.buffer, address)?;
        self.checked(Section::PublicSymbols, symbol)
    }

    /// Stack frame info of `kind` covering `address`.
    pub fn stack_frame_info(&self, kind: StackInfoKind, address: u64) -> Option<StackFrameInfo>
    {
        let (_, _, info) = self.stack_info[kind.index()].retrieve(&self.buffer, address)?;
        self.checked(Section::StackInfo(kind), info)
    }

    /// CFI rules in effect at `address`: the covering initial rule set and
    /// every delta between its base and `address`.
    pub fn cfi_rules(&self, address: u64) -> Option<CfiRules>
    {
        let (base, _, initial) = self.cfi_initial_rules.retrieve(&self.buffer, address)?;
        let initial = self.checked(Section::CfiInitialRules, initial)?;
        let deltas = self.checked(Section::CfiDeltaRules, self.cfi_delta_rules.range(&self.buffer, base, address))?;
        Some(CfiRules { base, initial, deltas })
    }

    /// Source file name for a file id.
    pub fn file_name(&self, id: i32) -> Option<String>
    {
        let name = self.files.get(&self.buffer, id)?;
        self.checked(Section::Files, name)
    }

    /// Inline origin for an origin id.
    pub fn inline_origin(&self, id: i32) -> Option<InlineOrigin>
    {
        let origin = self.inline_origins.get(&self.buffer, id)?;
        self.checked(Section::InlineOrigins, origin)
    }

    /// Decode the whole buffer back into a mutable module.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::Malformed`](crate::error::SymflatError::Malformed)
    /// if any section fails to decode.
    pub fn to_module(&self) -> SymflatResult<SymbolModule>
    {
        let mut module = SymbolModule::new(self.name.as_str());
        module.is_corrupt = self.header.is_corrupt;
        module.files = self.decode_section(Section::Files, FilesCodec::default())?;
        module.functions = self.decode_section(Section::Functions, FunctionsCodec::default())?;
        module.public_symbols = self.decode_section(Section::PublicSymbols, PublicSymbolsCodec::default())?;
        for kind in StackInfoKind::ALL {
            module.stack_info[kind.index()] = self.decode_section(Section::StackInfo(kind), StackInfoCodec::default())?;
        }
        module.cfi_initial_rules = self.decode_section(Section::CfiInitialRules, CfiInitialRulesCodec::default())?;
        module.cfi_delta_rules = self.decode_section(Section::CfiDeltaRules, CfiDeltaRulesCodec::default())?;
        module.inline_origins = self.decode_section(Section::InlineOrigins, InlineOriginsCodec::default())?;
        Ok(module)
    }

    fn decode_section<C: Codec>(&self, section: Section, codec: C) -> SymflatResult<C::Value>
    {
        let range = self.sections[section.index()].clone();
        codec.read(&mut ByteReader::new(&self.buffer[range]))
    }

    fn checked<T>(&self, section: Section, decoded: SymflatResult<T>) -> Option<T>
    {
        decoded
            .inspect_err(|err| warn!(module = self.name.as_str(), %section, %err, "failed to decode entry"))
            .ok()
    }
}
