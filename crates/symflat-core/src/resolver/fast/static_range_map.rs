//! Address index over an encoded range section.

use std::ops::Range;

use super::static_map::rebase;
use crate::codec::{ByteReader, Codec, U64Codec};
use crate::error::{SymflatError, SymflatResult};

#[derive(Debug, Clone)]
struct IndexedRange
{
    base: u64,
    high: u64,
    value: Range<usize>,
}

/// Index over a section written by [`RangeCodec`](crate::codec::RangeCodec).
///
/// The encoder does not promise any entry order, so entries are sorted by
/// base here and checked for overlap once, at load.
#[derive(Debug, Clone)]
pub struct StaticRangeMap<V>
{
    entries: Vec<IndexedRange>,
    value: V,
}

impl<V> StaticRangeMap<V>
where
    V: Codec + Default,
{
    /// Index `buffer[section]`.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::Malformed`] on truncation, empty or wrapping
    /// ranges, overlapping ranges, or trailing bytes.
    pub fn build(buffer: &[u8], section: Range<usize>) -> SymflatResult<Self>
    {
        let value = V::default();
        let base_offset = section.start;
        let mut reader = ByteReader::new(&buffer[section]);

        let count = reader.read_count(16).map_err(|err| rebase(err, base_offset))?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let entry_start = reader.position();
            let base = U64Codec.read(&mut reader).map_err(|err| rebase(err, base_offset))?;
            let size = U64Codec.read(&mut reader).map_err(|err| rebase(err, base_offset))?;
            let high = size
                .checked_sub(1)
                .and_then(|last| base.checked_add(last))
                .ok_or_else(|| SymflatError::malformed(base_offset + entry_start, format!("invalid range {base:#x}+{size:#x}")))?;
            let start = reader.position();
            value.skip(&mut reader).map_err(|err| rebase(err, base_offset))?;
            entries.push(IndexedRange {
                base,
                high,
                value: base_offset + start..base_offset + reader.position(),
            });
        }
        if !reader.is_empty() {
            return Err(rebase(reader.error("trailing bytes after last range"), base_offset));
        }

        entries.sort_by_key(|entry| entry.base);
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].high >= pair[1].base) {
            return Err(SymflatError::malformed(
                base_offset,
                format!("ranges at {:#x} and {:#x} overlap", pair[0].base, pair[1].base),
            ));
        }
        Ok(Self { entries, value })
    }

    /// Number of ranges.
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Whether the section is empty.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    fn find(&self, address: u64) -> Option<usize>
    {
        let index = self.entries.partition_point(|entry| entry.base <= address).checked_sub(1)?;
        (address <= self.entries[index].high).then_some(index)
    }

    /// Base of the range starting nearest at or below `address`, whether or
    /// not that range reaches `address`.
    pub fn nearest_base(&self, address: u64) -> Option<u64>
    {
        let index = self.entries.partition_point(|entry| entry.base <= address).checked_sub(1)?;
        Some(self.entries[index].base)
    }

    /// Decode the value whose range contains `address`, with the range's
    /// base and size.
    pub fn retrieve(&self, buffer: &[u8], address: u64) -> Option<(u64, u64, SymflatResult<V::Value>)>
    {
        let index = self.find(address)?;
        let entry = &self.entries[index];
        Some((entry.base, entry.high - entry.base + 1, self.decode(buffer, index)))
    }

    /// Decode every range, in address order.
    pub fn decode_all(&self, buffer: &[u8]) -> SymflatResult<Vec<(u64, u64, V::Value)>>
    {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| Ok((entry.base, entry.high - entry.base + 1, self.decode(buffer, index)?)))
            .collect()
    }

    fn decode(&self, buffer: &[u8], index: usize) -> SymflatResult<V::Value>
    {
        let range = self.entries[index].value.clone();
        let base = range.start;
        self.value
            .read(&mut ByteReader::new(&buffer[range]))
            .map_err(|err| rebase(err, base))
    }
}
