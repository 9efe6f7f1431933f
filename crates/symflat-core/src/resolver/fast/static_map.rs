//! Keyed index over an encoded association section.

use std::ops::Range;

use crate::codec::{ByteReader, Codec};
use crate::error::{SymflatError, SymflatResult};

/// Sorted `(key, value bytes)` index over a section written by
/// [`MapCodec`](crate::codec::MapCodec).
///
/// Keys are decoded once at load; values stay encoded in the owning buffer
/// and are decoded on lookup.
#[derive(Debug, Clone)]
pub struct StaticMap<K, V>
where
    K: Codec,
{
    entries: Vec<(K::Value, Range<usize>)>,
    value: V,
}

impl<K, V> StaticMap<K, V>
where
    K: Codec + Default,
    K::Value: Ord + Copy,
    V: Codec + Default,
{
    /// Index `buffer[section]`.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::Malformed`] (offset relative to the whole
    /// buffer) on truncation, duplicate keys, or trailing bytes.
    pub fn build(buffer: &[u8], section: Range<usize>) -> SymflatResult<Self>
    {
        let key = K::default();
        let value = V::default();
        let base = section.start;
        let mut reader = ByteReader::new(&buffer[section]);

        let count = reader.read_count(1).map_err(|err| rebase(err, base))?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let entry_key = key.read(&mut reader).map_err(|err| rebase(err, base))?;
            let start = reader.position();
            value.skip(&mut reader).map_err(|err| rebase(err, base))?;
            entries.push((entry_key, base + start..base + reader.position()));
        }
        if !reader.is_empty() {
            return Err(rebase(reader.error("trailing bytes after last entry"), base));
        }

        entries.sort_by_key(|(key, _)| *key);
        if entries.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(SymflatError::malformed(base, "duplicate map key"));
        }
        Ok(Self { entries, value })
    }

    /// Number of entries.
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Whether the section is empty.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Decode the value stored under `key`.
    pub fn get(&self, buffer: &[u8], key: K::Value) -> Option<SymflatResult<V::Value>>
    {
        let index = self.entries.binary_search_by_key(&key, |(key, _)| *key).ok()?;
        Some(self.decode(buffer, index))
    }

    /// Decode the entry with the greatest key not above `key`.
    pub fn floor(&self, buffer: &[u8], key: K::Value) -> Option<(K::Value, SymflatResult<V::Value>)>
    {
        let index = self.entries.partition_point(|(entry_key, _)| *entry_key <= key).checked_sub(1)?;
        Some((self.entries[index].0, self.decode(buffer, index)))
    }

    /// Decode every entry with a key in `from..=to`, in key order.
    pub fn range(&self, buffer: &[u8], from: K::Value, to: K::Value) -> SymflatResult<Vec<(K::Value, V::Value)>>
    {
        let start = self.entries.partition_point(|(key, _)| *key < from);
        let end = self.entries.partition_point(|(key, _)| *key <= to);
        (start..end.max(start))
            .map(|index| Ok((self.entries[index].0, self.decode(buffer, index)?)))
            .collect()
    }

    /// Decode every entry, in key order.
    pub fn decode_all(&self, buffer: &[u8]) -> SymflatResult<Vec<(K::Value, V::Value)>>
    {
        (0..self.entries.len())
            .map(|index| Ok((self.entries[index].0, self.decode(buffer, index)?)))
            .collect()
    }

    fn decode(&self, buffer: &[u8], index: usize) -> SymflatResult<V::Value>
    {
        let range = self.entries[index].1.clone();
        let base = range.start;
        self.value
            .read(&mut ByteReader::new(&buffer[range]))
            .map_err(|err| rebase(err, base))
    }
}

/// Shift a section-relative `Malformed` offset to be buffer-relative.
pub(super) fn rebase(err: SymflatError, base: usize) -> SymflatError
{
    match err {
        SymflatError::Malformed { offset, reason } => SymflatError::Malformed {
            offset: offset + base,
            reason,
        },
        other => other,
    }
}
