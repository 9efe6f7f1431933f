//! # Codecs
//!
//! Two-phase binary codecs for everything stored in a serialized module.
//!
//! Every codec answers the same three questions about a value:
//!
//! 1. **Size**: how many bytes will the encoding take ([`Codec::size_of`])
//! 2. **Write**: append exactly that many bytes to a buffer ([`Codec::write`])
//! 3. **Read**: decode a value back from a [`ByteReader`] ([`Codec::read`])
//!
//! The serializer runs the size pass over a whole module first, allocates
//! once, then runs the write pass. The two passes must agree byte for byte;
//! the serializer checks that they do.
//!
//! ## Composition
//!
//! Container codecs are generic over the codecs of what they contain:
//!
//! - [`MapCodec`]: association from keys to values
//! - [`RangeCodec`]: disjoint address ranges to values
//! - [`ContainedRangeCodec`]: nested address ranges to values
//!
//! so a function's line table is a `RangeCodec<LineCodec>` embedded inside a
//! `FunctionCodec`, itself stored in a `RangeCodec<FunctionCodec>`.
//!
//! Codecs carry no state. They are zero-sized values built wherever they are
//! needed, which makes concurrent conversions trivially independent.
//!
//! ## Wire conventions
//!
//! - integers are fixed-width little-endian
//! - `bool` is one byte, `0` or `1`
//! - strings are a `u32` byte length followed by UTF-8 bytes
//! - container entry counts are `u32`

mod contained;
mod map;
mod range;
mod records;
mod scalar;

pub use contained::ContainedRangeCodec;
pub use map::MapCodec;
pub use range::RangeCodec;
pub use records::{FunctionCodec, InlineCodec, InlineOriginCodec, LineCodec, PublicSymbolCodec, StackFrameInfoCodec};
pub use scalar::{BoolCodec, I32Codec, StrCodec, U32Codec, U64Codec, U8Codec};

use crate::error::{SymflatError, SymflatResult};

/// Size in bytes of a container entry count.
pub const COUNT_SIZE: usize = std::mem::size_of::<u32>();

/// A stateless encoder/decoder for one kind of value.
pub trait Codec
{
    /// The decoded value type.
    type Value;

    /// Exact number of bytes [`Codec::write`] will append for `value`.
    fn size_of(&self, value: &Self::Value) -> usize;

    /// Append the encoding of `value` to `dest`.
    ///
    /// The new end of `dest` is the position immediately after the value.
    fn write(&self, value: &Self::Value, dest: &mut Vec<u8>);

    /// Decode one value, advancing `src` past it.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::Malformed`] on truncated or invalid input.
    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Self::Value>;

    /// Advance `src` past one encoded value without materializing it.
    ///
    /// Consumers use this to index a section on load. The default decodes and
    /// drops; codecs with cheap skips override it.
    ///
    /// ## Errors
    ///
    /// Same as [`Codec::read`].
    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        self.read(src).map(drop)
    }
}

/// Append a container entry count.
///
/// Counts are `u32` on the wire; containers larger than that cannot be
/// represented and saturate, which the decoder then reports as malformed.
pub(crate) fn write_count(len: usize, dest: &mut Vec<u8>)
{
    let count = u32::try_from(len).unwrap_or(u32::MAX);
    dest.extend_from_slice(&count.to_le_bytes());
}

/// Cursor over an encoded byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a>
{
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a>
{
    /// Start reading at the beginning of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self
    {
        Self { bytes, position: 0 }
    }

    /// Current offset from the start of the slice.
    pub fn position(&self) -> usize
    {
        self.position
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize
    {
        self.bytes.len() - self.position
    }

    /// Whether every byte has been consumed.
    pub fn is_empty(&self) -> bool
    {
        self.remaining() == 0
    }

    /// Build a `Malformed` error at the current position.
    pub fn error(&self, reason: impl Into<String>) -> SymflatError
    {
        SymflatError::malformed(self.position, reason)
    }

    /// Consume `len` bytes.
    ///
    /// ## Errors
    ///
    /// Fails if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> SymflatResult<&'a [u8]>
    {
        if len > self.remaining() {
            return Err(self.error(format!("need {len} bytes, {} remain", self.remaining())));
        }
        let start = self.position;
        self.position += len;
        Ok(&self.bytes[start..self.position])
    }

    /// Consume a fixed-size array.
    ///
    /// ## Errors
    ///
    /// Fails if fewer than `N` bytes remain.
    pub fn take_array<const N: usize>(&mut self) -> SymflatResult<[u8; N]>
    {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a container entry count.
    ///
    /// ## Errors
    ///
    /// Fails on truncation, or when the count cannot possibly fit in the rest
    /// of the input given `min_entry_size`.
    pub fn read_count(&mut self, min_entry_size: usize) -> SymflatResult<usize>
    {
        let count = u32::from_le_bytes(self.take_array()?) as usize;
        if count.saturating_mul(min_entry_size) > self.remaining() {
            return Err(self.error(format!("entry count {count} exceeds remaining input")));
        }
        Ok(count)
    }
}
