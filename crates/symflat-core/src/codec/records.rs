//! Codecs for the record types stored in a [`SymbolModule`](crate::module::SymbolModule).
//!
//! Each record is a fixed sequence of scalar fields; [`FunctionCodec`] also
//! embeds the function's line table and inline tree, which is where the range
//! and nested-range codecs compose.

use super::{
    write_count, BoolCodec, ByteReader, Codec, ContainedRangeCodec, I32Codec, RangeCodec, StrCodec, U32Codec, U64Codec,
    U8Codec, COUNT_SIZE,
};
use crate::error::SymflatResult;
use crate::module::{Function, Inline, InlineOrigin, Line, PublicSymbol, StackFrameInfo, StackInfoKind};

const LINE_SIZE: usize = 8 + 8 + 4 + 4;
const FUNCTION_FIXED_SIZE: usize = 8 + 8 + 4 + 1;

/// Codec for [`Line`]: `u64 address, u64 size, i32 file id, i32 line`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCodec;

impl Codec for LineCodec
{
    type Value = Line;

    fn size_of(&self, _line: &Line) -> usize
    {
        LINE_SIZE
    }

    fn write(&self, line: &Line, dest: &mut Vec<u8>)
    {
        U64Codec.write(&line.address, dest);
        U64Codec.write(&line.size, dest);
        I32Codec.write(&line.source_file_id, dest);
        I32Codec.write(&line.line, dest);
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Line>
    {
        Ok(Line {
            address: U64Codec.read(src)?,
            size: U64Codec.read(src)?,
            source_file_id: I32Codec.read(src)?,
            line: I32Codec.read(src)?,
        })
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        src.take(LINE_SIZE).map(drop)
    }
}

/// Codec for [`Inline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineCodec;

impl Codec for InlineCodec
{
    type Value = Inline;

    fn size_of(&self, inline: &Inline) -> usize
    {
        1 + 4 * 4 + COUNT_SIZE + inline.ranges.len() * 16
    }

    fn write(&self, inline: &Inline, dest: &mut Vec<u8>)
    {
        BoolCodec.write(&inline.has_call_site_file_id, dest);
        I32Codec.write(&inline.nest_level, dest);
        I32Codec.write(&inline.call_site_line, dest);
        I32Codec.write(&inline.call_site_file_id, dest);
        I32Codec.write(&inline.origin_id, dest);
        write_count(inline.ranges.len(), dest);
        for (address, size) in &inline.ranges {
            U64Codec.write(address, dest);
            U64Codec.write(size, dest);
        }
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Inline>
    {
        let has_call_site_file_id = BoolCodec.read(src)?;
        let nest_level = I32Codec.read(src)?;
        let call_site_line = I32Codec.read(src)?;
        let call_site_file_id = I32Codec.read(src)?;
        let origin_id = I32Codec.read(src)?;
        let count = src.read_count(16)?;
        let mut ranges = Vec::with_capacity(count);
        for _ in 0..count {
            ranges.push((U64Codec.read(src)?, U64Codec.read(src)?));
        }
        Ok(Inline {
            has_call_site_file_id,
            nest_level,
            call_site_line,
            call_site_file_id,
            origin_id,
            ranges,
        })
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        BoolCodec.read(src)?;
        src.take(4 * 4)?;
        let count = src.read_count(16)?;
        src.take(count * 16).map(drop)
    }
}

/// Codec for [`InlineOrigin`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineOriginCodec;

impl Codec for InlineOriginCodec
{
    type Value = InlineOrigin;

    fn size_of(&self, origin: &InlineOrigin) -> usize
    {
        1 + 4 + StrCodec.size_of(&origin.name)
    }

    fn write(&self, origin: &InlineOrigin, dest: &mut Vec<u8>)
    {
        BoolCodec.write(&origin.has_file_id, dest);
        I32Codec.write(&origin.source_file_id, dest);
        StrCodec.write(&origin.name, dest);
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<InlineOrigin>
    {
        Ok(InlineOrigin {
            has_file_id: BoolCodec.read(src)?,
            source_file_id: I32Codec.read(src)?,
            name: StrCodec.read(src)?,
        })
    }
}

/// Codec for [`Function`], including its nested line table and inline tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionCodec
{
    lines: RangeCodec<LineCodec>,
    inlines: ContainedRangeCodec<InlineCodec>,
}

impl Codec for FunctionCodec
{
    type Value = Function;

    fn size_of(&self, function: &Function) -> usize
    {
        StrCodec.size_of(&function.name)
            + FUNCTION_FIXED_SIZE
            + self.lines.size_of(&function.lines)
            + self.inlines.size_of(&function.inlines)
    }

    fn write(&self, function: &Function, dest: &mut Vec<u8>)
    {
        StrCodec.write(&function.name, dest);
        U64Codec.write(&function.address, dest);
        U64Codec.write(&function.size, dest);
        U32Codec.write(&function.parameter_size, dest);
        BoolCodec.write(&function.is_multiple, dest);
        self.lines.write(&function.lines, dest);
        self.inlines.write(&function.inlines, dest);
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Function>
    {
        Ok(Function {
            name: StrCodec.read(src)?,
            address: U64Codec.read(src)?,
            size: U64Codec.read(src)?,
            parameter_size: U32Codec.read(src)?,
            is_multiple: BoolCodec.read(src)?,
            lines: self.lines.read(src)?,
            inlines: self.inlines.read(src)?,
        })
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        StrCodec.skip(src)?;
        src.take(FUNCTION_FIXED_SIZE - 1)?;
        BoolCodec.read(src)?;
        self.lines.skip(src)?;
        self.inlines.skip(src)
    }
}

/// Codec for [`PublicSymbol`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicSymbolCodec;

impl Codec for PublicSymbolCodec
{
    type Value = PublicSymbol;

    fn size_of(&self, symbol: &PublicSymbol) -> usize
    {
        StrCodec.size_of(&symbol.name) + 8 + 4 + 1
    }

    fn write(&self, symbol: &PublicSymbol, dest: &mut Vec<u8>)
    {
        StrCodec.write(&symbol.name, dest);
        U64Codec.write(&symbol.address, dest);
        U32Codec.write(&symbol.parameter_size, dest);
        BoolCodec.write(&symbol.is_multiple, dest);
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<PublicSymbol>
    {
        Ok(PublicSymbol {
            name: StrCodec.read(src)?,
            address: U64Codec.read(src)?,
            parameter_size: U32Codec.read(src)?,
            is_multiple: BoolCodec.read(src)?,
        })
    }
}

/// Codec for [`StackFrameInfo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackFrameInfoCodec;

impl Codec for StackFrameInfoCodec
{
    type Value = StackFrameInfo;

    fn size_of(&self, info: &StackFrameInfo) -> usize
    {
        1 + 6 * 4 + 1 + StrCodec.size_of(&info.program_string)
    }

    fn write(&self, info: &StackFrameInfo, dest: &mut Vec<u8>)
    {
        // `index()` is below COUNT, which fits in a byte.
        U8Codec.write(&(info.kind.index() as u8), dest);
        for field in [
            info.prolog_size,
            info.epilog_size,
            info.parameter_size,
            info.saved_register_size,
            info.local_size,
            info.max_stack_size,
        ] {
            U32Codec.write(&field, dest);
        }
        BoolCodec.write(&info.allocates_base_pointer, dest);
        StrCodec.write(&info.program_string, dest);
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<StackFrameInfo>
    {
        let raw_kind = U8Codec.read(src)?;
        let kind = StackInfoKind::from_index(usize::from(raw_kind))
            .ok_or_else(|| src.error(format!("unknown stack info kind {raw_kind}")))?;
        Ok(StackFrameInfo {
            kind,
            prolog_size: U32Codec.read(src)?,
            epilog_size: U32Codec.read(src)?,
            parameter_size: U32Codec.read(src)?,
            saved_register_size: U32Codec.read(src)?,
            local_size: U32Codec.read(src)?,
            max_stack_size: U32Codec.read(src)?,
            allocates_base_pointer: BoolCodec.read(src)?,
            program_string: StrCodec.read(src)?,
        })
    }
}
