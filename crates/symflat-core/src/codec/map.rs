//! Association codec.
//!
//! Layout: `u32 count`, then `count` × `(key, value)`, in the map's iteration
//! order. Lookups are keyed, so consumers must not rely on entry order.

use std::collections::BTreeMap;

use super::{write_count, ByteReader, Codec, COUNT_SIZE};
use crate::error::{SymflatError, SymflatResult};

/// Codec for a key → value map, generic over the key and value codecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapCodec<K, V>
{
    key: K,
    value: V,
}

impl<K, V> MapCodec<K, V>
{
    /// Compose a map codec from its key and value codecs.
    pub const fn new(key: K, value: V) -> Self
    {
        Self { key, value }
    }

    /// The key codec.
    pub fn key_codec(&self) -> &K
    {
        &self.key
    }

    /// The value codec.
    pub fn value_codec(&self) -> &V
    {
        &self.value
    }
}

impl<K, V> Codec for MapCodec<K, V>
where
    K: Codec,
    K::Value: Ord,
    V: Codec,
{
    type Value = BTreeMap<K::Value, V::Value>;

    fn size_of(&self, map: &Self::Value) -> usize
    {
        map.iter()
            .map(|(key, value)| self.key.size_of(key) + self.value.size_of(value))
            .fold(COUNT_SIZE, |total, entry| total + entry)
    }

    fn write(&self, map: &Self::Value, dest: &mut Vec<u8>)
    {
        write_count(map.len(), dest);
        for (key, value) in map {
            self.key.write(key, dest);
            self.value.write(value, dest);
        }
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<Self::Value>
    {
        let count = src.read_count(1)?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let start = src.position();
            let key = self.key.read(src)?;
            let value = self.value.read(src)?;
            if map.insert(key, value).is_some() {
                return Err(SymflatError::malformed(start, "duplicate map key"));
            }
        }
        Ok(map)
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        let count = src.read_count(1)?;
        for _ in 0..count {
            self.key.skip(src)?;
            self.value.skip(src)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::codec::{I32Codec, StrCodec, U64Codec};

    type FileMapCodec = MapCodec<I32Codec, StrCodec>;

    #[test]
    fn test_empty_map_is_bare_count()
    {
        let codec = FileMapCodec::default();
        let map = BTreeMap::new();
        let mut out = Vec::new();
        codec.write(&map, &mut out);
        assert_eq!(out, vec![0, 0, 0, 0]);
        assert_eq!(codec.size_of(&map), 4);
        assert!(codec.read(&mut ByteReader::new(&out)).unwrap().is_empty());
    }

    #[test]
    fn test_entry_layout()
    {
        let codec = FileMapCodec::default();
        let map = BTreeMap::from([(1, "a.cc".to_string())]);
        let mut out = Vec::new();
        codec.write(&map, &mut out);

        let expected = [
            1, 0, 0, 0, // count
            1, 0, 0, 0, // key
            4, 0, 0, 0, b'a', b'.', b'c', b'c', // value
        ];
        assert_eq!(out, expected);
        assert_eq!(codec.size_of(&map), expected.len());
    }

    #[test]
    fn test_decodes_same_pairs()
    {
        let codec = MapCodec::new(U64Codec, StrCodec);
        let map = BTreeMap::from([
            (0x2000, "r2 = .cfa".to_string()),
            (0x1000, ".cfa: $rsp 8 +".to_string()),
            (0x3000, String::new()),
        ]);
        let mut out = Vec::new();
        codec.write(&map, &mut out);

        let mut reader = ByteReader::new(&out);
        assert_eq!(codec.read(&mut reader).unwrap(), map);
        assert!(reader.is_empty());

        let mut reader = ByteReader::new(&out);
        codec.skip(&mut reader).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_nested_map_values()
    {
        let codec = MapCodec::new(I32Codec, MapCodec::new(U64Codec, StrCodec));
        let map = BTreeMap::from([
            (1, BTreeMap::from([(5, "x".to_string())])),
            (2, BTreeMap::new()),
        ]);
        let mut out = Vec::new();
        codec.write(&map, &mut out);
        assert_eq!(out.len(), codec.size_of(&map));
        assert_eq!(codec.read(&mut ByteReader::new(&out)).unwrap(), map);
    }

    #[test]
    fn test_rejects_duplicate_keys()
    {
        let mut out = Vec::new();
        out.extend_from_slice(&2u32.to_le_bytes());
        for _ in 0..2 {
            out.extend_from_slice(&7i32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        assert!(FileMapCodec::default().read(&mut ByteReader::new(&out)).is_err());
    }
}
