//! Serialized buffer layout.
//!
//! ```text
//! offset 0        corruption flag           1 byte (0 or 1)
//! offset 1        section size header       SECTION_COUNT x u64 (little-endian)
//! offset 89       section payloads          in `Section::ALL` order
//! offset len - 1  sentinel                  1 byte, always 0
//! ```
//!
//! The header alone is enough to seek to any section.

use std::fmt;
use std::ops::Range;

use crate::codec::{ByteReader, Codec, U64Codec};
use crate::error::{SymflatError, SymflatResult};
use crate::module::StackInfoKind;

/// Number of sections in a serialized module.
pub const SECTION_COUNT: usize = 6 + StackInfoKind::COUNT;

/// Size of the corruption flag.
pub const FLAG_SIZE: usize = 1;

/// Size of the section size header.
pub const HEADER_SIZE: usize = SECTION_COUNT * std::mem::size_of::<u64>();

/// Size of the trailing sentinel.
pub const SENTINEL_SIZE: usize = 1;

/// Offset of the first section payload.
pub const PAYLOAD_OFFSET: usize = FLAG_SIZE + HEADER_SIZE;

/// Smallest possible buffer: flag, header, no payload bytes, sentinel.
pub const MIN_BUFFER_SIZE: usize = PAYLOAD_OFFSET + SENTINEL_SIZE;

/// One section of a serialized module, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section
{
    Files,
    Functions,
    PublicSymbols,
    StackInfo(StackInfoKind),
    CfiInitialRules,
    CfiDeltaRules,
    InlineOrigins,
}

impl Section
{
    /// Every section, in the fixed order used by the header and the payload.
    pub const ALL: [Section; SECTION_COUNT] = [
        Section::Files,
        Section::Functions,
        Section::PublicSymbols,
        Section::StackInfo(StackInfoKind::Fpo),
        Section::StackInfo(StackInfoKind::Trap),
        Section::StackInfo(StackInfoKind::Tss),
        Section::StackInfo(StackInfoKind::Standard),
        Section::StackInfo(StackInfoKind::FrameData),
        Section::CfiInitialRules,
        Section::CfiDeltaRules,
        Section::InlineOrigins,
    ];

    /// Position of the section in the header.
    pub const fn index(self) -> usize
    {
        match self {
            Section::Files => 0,
            Section::Functions => 1,
            Section::PublicSymbols => 2,
            Section::StackInfo(kind) => 3 + kind.index(),
            Section::CfiInitialRules => 3 + StackInfoKind::COUNT,
            Section::CfiDeltaRules => 4 + StackInfoKind::COUNT,
            Section::InlineOrigins => 5 + StackInfoKind::COUNT,
        }
    }

    /// Stable name used in logs and error messages.
    pub const fn name(self) -> &'static str
    {
        match self {
            Section::Files => "files",
            Section::Functions => "functions",
            Section::PublicSymbols => "public_symbols",
            Section::StackInfo(StackInfoKind::Fpo) => "stack_info_fpo",
            Section::StackInfo(StackInfoKind::Trap) => "stack_info_trap",
            Section::StackInfo(StackInfoKind::Tss) => "stack_info_tss",
            Section::StackInfo(StackInfoKind::Standard) => "stack_info_standard",
            Section::StackInfo(StackInfoKind::FrameData) => "stack_info_frame_data",
            Section::CfiInitialRules => "cfi_initial_rules",
            Section::CfiDeltaRules => "cfi_delta_rules",
            Section::InlineOrigins => "inline_origins",
        }
    }
}

impl fmt::Display for Section
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.name())
    }
}

/// Byte length of every section of one module.
///
/// Produced by the size pass and consumed by the write pass of the same
/// conversion. It is a plain value owned by the caller, so two conversions
/// can never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionSizes([usize; SECTION_COUNT]);

impl SectionSizes
{
    /// Wrap raw per-section sizes, in [`Section::ALL`] order.
    #[must_use]
    pub const fn from_array(sizes: [usize; SECTION_COUNT]) -> Self
    {
        Self(sizes)
    }

    /// Size recorded for `section`.
    pub fn get(&self, section: Section) -> usize
    {
        self.0[section.index()]
    }

    pub(crate) fn set(&mut self, section: Section, size: usize)
    {
        self.0[section.index()] = size;
    }

    /// Sum of all section payloads.
    pub fn payload_size(&self) -> usize
    {
        self.0.iter().sum()
    }

    /// Total buffer size: flag, header, payloads, sentinel.
    pub fn total(&self) -> usize
    {
        FLAG_SIZE + HEADER_SIZE + self.payload_size() + SENTINEL_SIZE
    }

    /// Sizes paired with their sections, in header order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, usize)> + '_
    {
        Section::ALL.iter().map(|section| (*section, self.get(*section)))
    }

    /// Byte range of every section relative to the start of the buffer.
    pub fn section_ranges(&self) -> [Range<usize>; SECTION_COUNT]
    {
        let mut offset = PAYLOAD_OFFSET;
        std::array::from_fn(|index| {
            let start = offset;
            offset += self.0[index];
            start..offset
        })
    }
}

/// Decoded flag and header of a serialized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHeader
{
    pub is_corrupt: bool,
    pub sizes: SectionSizes,
}

impl BufferHeader
{
    /// Parse and validate the framing of a serialized buffer.
    ///
    /// Checks the flag byte, that the header accounts for every payload byte,
    /// and the trailing sentinel. Section contents are not inspected.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::Malformed`] when any framing check fails.
    pub fn parse(bytes: &[u8]) -> SymflatResult<Self>
    {
        if bytes.len() < MIN_BUFFER_SIZE {
            return Err(SymflatError::malformed(
                0,
                format!("buffer is {} bytes, at least {MIN_BUFFER_SIZE} required", bytes.len()),
            ));
        }

        let is_corrupt = match bytes[0] {
            0 => false,
            1 => true,
            other => return Err(SymflatError::malformed(0, format!("invalid corruption flag {other:#04x}"))),
        };

        let mut reader = ByteReader::new(&bytes[FLAG_SIZE..PAYLOAD_OFFSET]);
        let mut sizes = SectionSizes::default();
        let mut payload: u64 = 0;
        for section in Section::ALL {
            let size = U64Codec.read(&mut reader)?;
            payload = payload.saturating_add(size);
            // Bounded by the buffer length below, so the cast cannot truncate.
            sizes.set(section, usize::try_from(size).unwrap_or(usize::MAX));
        }

        let expected = (bytes.len() - MIN_BUFFER_SIZE) as u64;
        if payload != expected {
            return Err(SymflatError::malformed(
                FLAG_SIZE,
                format!("header describes {payload} payload bytes, buffer holds {expected}"),
            ));
        }

        let sentinel = bytes.len() - SENTINEL_SIZE;
        if bytes[sentinel] != 0 {
            return Err(SymflatError::malformed(sentinel, "missing trailing sentinel"));
        }

        Ok(Self { is_corrupt, sizes })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_section_indices_match_order()
    {
        for (index, section) in Section::ALL.iter().enumerate() {
            assert_eq!(section.index(), index, "{section}");
        }
        assert_eq!(HEADER_SIZE, 88);
        assert_eq!(PAYLOAD_OFFSET, 89);
    }

    #[test]
    fn test_section_ranges_are_contiguous()
    {
        let mut raw = [4usize; SECTION_COUNT];
        raw[1] = 100;
        let sizes = SectionSizes::from_array(raw);
        let ranges = sizes.section_ranges();
        assert_eq!(ranges[0], 89..93);
        assert_eq!(ranges[1], 93..193);
        assert_eq!(ranges[SECTION_COUNT - 1].end, sizes.total() - SENTINEL_SIZE);
    }

    #[test]
    fn test_parse_rejects_bad_framing()
    {
        let mut bytes = vec![0u8; MIN_BUFFER_SIZE];
        assert!(BufferHeader::parse(&bytes).is_ok());

        bytes[0] = 2;
        assert!(BufferHeader::parse(&bytes).is_err());
        bytes[0] = 1;
        assert!(BufferHeader::parse(&bytes).unwrap().is_corrupt);

        let last = bytes.len() - 1;
        bytes[last] = 7;
        assert!(BufferHeader::parse(&bytes).is_err());

        assert!(BufferHeader::parse(&bytes[..10]).is_err());
    }

    #[test]
    fn test_parse_rejects_header_length_mismatch()
    {
        let mut bytes = vec![0u8; MIN_BUFFER_SIZE + 4];
        // Claim 8 payload bytes for files while only 4 are present.
        bytes[1] = 8;
        assert!(BufferHeader::parse(&bytes).is_err());
        bytes[1] = 4;
        assert!(BufferHeader::parse(&bytes).is_ok());
    }
}
