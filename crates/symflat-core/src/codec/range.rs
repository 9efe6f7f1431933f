//! Range codec.
//!
//! Layout: `u32 count`, then `count` × `(u64 base, u64 size, value)`.
//!
//! The encoder writes entries in the container's own order and does not sort.
//! Making the entries searchable by address is the loader's job: the flat
//! consumer sorts its per-section index by base when it loads a buffer.

use super::{write_count, ByteReader, Codec, U64Codec, COUNT_SIZE};
use crate::error::{SymflatError, SymflatResult};
use crate::module::RangeMap;

/// Fixed part of every range entry: base and size.
pub(crate) const RANGE_HEADER_SIZE: usize = 2 * std::mem::size_of::<u64>();

/// Codec for a [`RangeMap`], generic over the value codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeCodec<V>
{
    value: V,
}

impl<V> RangeCodec<V>
{
    /// Wrap a value codec.
    pub const fn new(value: V) -> Self
    {
        Self { value }
    }

    /// The value codec.
    pub fn value_codec(&self) -> &V
    {
        &self.value
    }
}

/// Read one entry header `(base, size)`.
pub(crate) fn read_range_header(src: &mut ByteReader<'_>) -> SymflatResult<(u64, u64)>
{
    let base = U64Codec.read(src)?;
    let size = U64Codec.read(src)?;
    Ok((base, size))
}

impl<V: Codec> Codec for RangeCodec<V>
{
    type Value = RangeMap<V::Value>;

    fn size_of(&self, map: &Self::Value) -> usize
    {
        map.iter()
            .map(|entry| RANGE_HEADER_SIZE + self.value.size_of(&entry.value))
            .fold(COUNT_SIZE, |total, entry| total + entry)
    }

    fn write(&self, map: &Self::Value, dest: &mut Vec<u8>)
    {
        write_count(map.len(), dest);
        for entry in map.iter() {
            U64Codec.write(&entry.base, dest);
            U64Codec.write(&entry.size, dest);
            self.value.write(&entry.value, dest);
        }
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Self::Value>
    {
        let count = src.read_count(RANGE_HEADER_SIZE)?;
        let mut map = RangeMap::new();
        for _ in 0..count {
            let start = src.position();
            let (base, size) = read_range_header(src)?;
            let value = self.value.read(src)?;
            if !map.store_range(base, size, value) {
                return Err(SymflatError::malformed(
                    start,
                    format!("invalid or overlapping range {base:#x}+{size:#x}"),
                ));
            }
        }
        Ok(map)
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        let count = src.read_count(RANGE_HEADER_SIZE)?;
        for _ in 0..count {
            src.take(RANGE_HEADER_SIZE)?;
            self.value.skip(src)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::codec::{I32Codec, StrCodec};

    #[test]
    fn test_entry_is_base_size_value()
    {
        let codec = RangeCodec::new(I32Codec);
        let mut map = RangeMap::new();
        map.store_range(0x1000, 0x5, 10);

        let mut out = Vec::new();
        codec.write(&map, &mut out);

        let mut expected = 1u32.to_le_bytes().to_vec();
        expected.extend_from_slice(&0x1000u64.to_le_bytes());
        expected.extend_from_slice(&0x5u64.to_le_bytes());
        expected.extend_from_slice(&10i32.to_le_bytes());
        assert_eq!(out, expected);
        assert_eq!(codec.size_of(&map), expected.len());
    }

    #[test]
    fn test_round_trip_preserves_ranges()
    {
        let codec = RangeCodec::new(StrCodec);
        let mut map = RangeMap::new();
        map.store_range(0x4000, 0x10, "third".to_string());
        map.store_range(0x1000, 0x10, "first".to_string());
        map.store_range(0x2000, 0x1, String::new());

        let mut out = Vec::new();
        codec.write(&map, &mut out);
        let decoded = codec.read(&mut ByteReader::new(&out)).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(decoded.retrieve(0x400f).map(String::as_str), Some("third"));
    }

    #[test]
    fn test_rejects_overlapping_entries()
    {
        let mut out = 2u32.to_le_bytes().to_vec();
        for base in [0x1000u64, 0x1008] {
            out.extend_from_slice(&base.to_le_bytes());
            out.extend_from_slice(&0x10u64.to_le_bytes());
            out.extend_from_slice(&0i32.to_le_bytes());
        }
        let err = RangeCodec::new(I32Codec).read(&mut ByteReader::new(&out)).unwrap_err();
        assert!(matches!(err, SymflatError::Malformed { offset: 24, .. }));
    }

    #[test]
    fn test_empty_range_map()
    {
        let codec = RangeCodec::new(I32Codec);
        let mut out = Vec::new();
        codec.write(&RangeMap::new(), &mut out);
        assert_eq!(out, vec![0, 0, 0, 0]);
        assert!(codec.read(&mut ByteReader::new(&out)).unwrap().is_empty());
    }
}
