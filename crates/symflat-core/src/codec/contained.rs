//! Nested-range codec.
//!
//! Layout of a level: `u32 count`, then `count` × `(u64 base, u64 size, value,
//! level)` where the trailing `level` is the recursive encoding of the ranges
//! nested inside that entry. A leaf carries an empty level (`count = 0`), never
//! an absent marker, so the decoder reconstructs the exact nesting depth.
//!
//! Nesting depth is unbounded, so every pass walks levels with an explicit
//! stack instead of recursing.

use super::range::{read_range_header, RANGE_HEADER_SIZE};
use super::{write_count, ByteReader, Codec, U64Codec, COUNT_SIZE};
use crate::error::{SymflatError, SymflatResult};
use crate::module::ContainedRangeMap;

/// Codec for a [`ContainedRangeMap`], generic over the value codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainedRangeCodec<V>
{
    value: V,
}

impl<V> ContainedRangeCodec<V>
{
    /// Wrap a value codec.
    pub const fn new(value: V) -> Self
    {
        Self { value }
    }
}

impl<V: Codec> Codec for ContainedRangeCodec<V>
{
    type Value = ContainedRangeMap<V::Value>;

    fn size_of(&self, map: &Self::Value) -> usize
    {
        let mut total = 0;
        let mut levels = vec![map];
        while let Some(level) = levels.pop() {
            total += COUNT_SIZE;
            for range in level.iter() {
                total += RANGE_HEADER_SIZE + self.value.size_of(range.value());
                levels.push(range.children());
            }
        }
        total
    }

    fn write(&self, map: &Self::Value, dest: &mut Vec<u8>)
    {
        write_count(map.len(), dest);
        let mut levels = vec![map.iter()];
        while let Some(level) = levels.last_mut() {
            let Some(range) = level.next() else {
                levels.pop();
                continue;
            };
            U64Codec.write(&range.base(), dest);
            U64Codec.write(&range.size(), dest);
            self.value.write(range.value(), dest);
            write_count(range.children().len(), dest);
            levels.push(range.children().iter());
        }
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Self::Value>
    {
        let mut levels = vec![PendingLevel::new(src.read_count(MIN_ENTRY_SIZE)?, None)];
        while let Some(level) = levels.last_mut() {
            if level.remaining > 0 {
                level.remaining -= 1;
                let start = src.position();
                let (base, size) = read_range_header(src)?;
                let value = self.value.read(src)?;
                let count = src.read_count(MIN_ENTRY_SIZE)?;
                levels.push(PendingLevel::new(count, Some(PendingEntry { start, base, size, value })));
                continue;
            }

            let Some(finished) = levels.pop() else {
                break;
            };
            let Some(entry) = finished.entry else {
                return Ok(finished.map);
            };
            let Some(parent) = levels.last_mut() else {
                break;
            };
            if !parent.map.insert_subtree(entry.base, entry.size, entry.value, finished.map) {
                return Err(SymflatError::malformed(
                    entry.start,
                    format!(
                        "nested range {:#x}+{:#x} is empty, overlaps a sibling, or does not contain its children",
                        entry.base, entry.size
                    ),
                ));
            }
        }
        Err(src.error("nested range levels ended without a root"))
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        let mut remaining = vec![src.read_count(MIN_ENTRY_SIZE)?];
        while let Some(count) = remaining.last_mut() {
            if *count == 0 {
                remaining.pop();
                continue;
            }
            *count -= 1;
            src.take(RANGE_HEADER_SIZE)?;
            self.value.skip(src)?;
            remaining.push(src.read_count(MIN_ENTRY_SIZE)?);
        }
        Ok(())
    }
}

/// Smallest possible entry: header plus an empty child level.
const MIN_ENTRY_SIZE: usize = RANGE_HEADER_SIZE + COUNT_SIZE;

/// Decoded range still waiting for its children.
struct PendingEntry<T>
{
    start: usize,
    base: u64,
    size: u64,
    value: T,
}

/// One level of the decode walk. The root level has no entry.
struct PendingLevel<T>
{
    remaining: usize,
    map: ContainedRangeMap<T>,
    entry: Option<PendingEntry<T>>,
}

impl<T> PendingLevel<T>
{
    fn new(remaining: usize, entry: Option<PendingEntry<T>>) -> Self
    {
        Self {
            remaining,
            map: ContainedRangeMap::new(),
            entry,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::codec::I32Codec;

    fn three_levels() -> ContainedRangeMap<i32>
    {
        let mut map = ContainedRangeMap::new();
        map.store_range(0x1000, 0x100, 1, false);
        map.store_range(0x1010, 0x40, 2, false);
        map.store_range(0x1020, 0x8, 3, false);
        map.store_range(0x1080, 0x10, 4, false);
        map.store_range(0x3000, 0x10, 5, false);
        map
    }

    #[test]
    fn test_round_trip_keeps_depth_and_leaves()
    {
        let codec = ContainedRangeCodec::new(I32Codec);
        let map = three_levels();

        let mut out = Vec::new();
        codec.write(&map, &mut out);
        assert_eq!(out.len(), codec.size_of(&map));

        let decoded = codec.read(&mut ByteReader::new(&out)).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(decoded.depth(), 3);
        assert_eq!(decoded.retrieve_all(0x1024).as_slice(), &[&1, &2, &3]);
        assert_eq!(decoded.retrieve_all(0x1088).as_slice(), &[&1, &4]);
        assert_eq!(decoded.retrieve(0x3000), Some(&5));
    }

    #[test]
    fn test_deep_chain_round_trips()
    {
        let depth = 200_000;
        let center = 0x1000_0000u64;
        let mut map = ContainedRangeMap::new();
        for level in 0..depth {
            assert!(map.store_range(center - level as u64, 1 + 2 * level as u64, level, false));
        }

        let codec = ContainedRangeCodec::new(I32Codec);
        let mut out = Vec::new();
        codec.write(&map, &mut out);
        assert_eq!(out.len(), codec.size_of(&map));

        let mut skipper = ByteReader::new(&out);
        codec.skip(&mut skipper).unwrap();
        assert!(skipper.is_empty());

        let decoded = codec.read(&mut ByteReader::new(&out)).unwrap();
        assert_eq!(decoded.depth(), depth as usize);
        let chain = decoded.retrieve_all(center);
        assert_eq!(chain.len(), depth as usize);
        assert_eq!(chain.first(), Some(&&(depth - 1)));
        assert_eq!(chain.last(), Some(&&0));
    }

    #[test]
    fn test_truncated_deep_chain_is_malformed()
    {
        let mut map = ContainedRangeMap::new();
        for level in 0..64 {
            map.store_range(0x1000 - level, 1 + 2 * level, level as i32, false);
        }
        let codec = ContainedRangeCodec::new(I32Codec);
        let mut out = Vec::new();
        codec.write(&map, &mut out);
        out.truncate(out.len() - 1);

        assert!(matches!(codec.read(&mut ByteReader::new(&out)), Err(SymflatError::Malformed { .. })));
        assert!(codec.skip(&mut ByteReader::new(&out)).is_err());
    }

    #[test]
    fn test_leaf_has_empty_child_level()
    {
        let codec = ContainedRangeCodec::new(I32Codec);
        let mut map = ContainedRangeMap::new();
        map.store_range(0x10, 0x2, 7, false);

        let mut out = Vec::new();
        codec.write(&map, &mut out);

        let mut expected = 1u32.to_le_bytes().to_vec();
        expected.extend_from_slice(&0x10u64.to_le_bytes());
        expected.extend_from_slice(&0x2u64.to_le_bytes());
        expected.extend_from_slice(&7i32.to_le_bytes());
        expected.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_empty_map_round_trips()
    {
        let codec = ContainedRangeCodec::new(I32Codec);
        let mut out = Vec::new();
        codec.write(&ContainedRangeMap::new(), &mut out);
        assert_eq!(out, vec![0, 0, 0, 0]);
        let decoded = codec.read(&mut ByteReader::new(&out)).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.depth(), 0);
    }

    #[test]
    fn test_rejects_child_outside_parent()
    {
        // Parent [0x1000, 0x1010) with a child at [0x2000, 0x2004).
        let mut out = 1u32.to_le_bytes().to_vec();
        out.extend_from_slice(&0x1000u64.to_le_bytes());
        out.extend_from_slice(&0x10u64.to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0x2000u64.to_le_bytes());
        out.extend_from_slice(&0x4u64.to_le_bytes());
        out.extend_from_slice(&2i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        let codec = ContainedRangeCodec::new(I32Codec);
        assert!(codec.read(&mut ByteReader::new(&out)).is_err());
        let mut reader = ByteReader::new(&out);
        codec.skip(&mut reader).unwrap();
        assert!(reader.is_empty());
    }
}
