//! Address range map.
//!
//! Maps disjoint address intervals `[base, base + size)` to values. Entries are
//! keyed by their highest address so that a containment query is a single
//! ordered-map probe: the first entry whose high address is at or above the
//! query address is the only candidate.

use std::collections::BTreeMap;

use tracing::debug;

/// One stored interval and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry<V>
{
    /// First address covered by the range.
    pub base: u64,
    /// Number of bytes covered. Never zero.
    pub size: u64,
    /// Value associated with the range.
    pub value: V,
}

impl<V> RangeEntry<V>
{
    /// Last address covered by the range (inclusive).
    pub fn high(&self) -> u64
    {
        self.base + (self.size - 1)
    }

    /// Whether `address` lies inside the range.
    pub fn contains(&self, address: u64) -> bool
    {
        address >= self.base && address <= self.high()
    }
}

/// Mapping from disjoint address ranges to values.
///
/// Overlapping ranges are rejected at insertion time, so every address maps
/// to at most one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeMap<V>
{
    entries: BTreeMap<u64, RangeEntry<V>>,
}

impl<V> Default for RangeMap<V>
{
    fn default() -> Self
    {
        Self { entries: BTreeMap::new() }
    }
}

impl<V> RangeMap<V>
{
    /// Create an empty range map.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Store `value` for the range `[base, base + size)`.
    ///
    /// Returns `false` (and leaves the map untouched) when the range is empty,
    /// wraps past the end of the address space, or overlaps an existing range.
    pub fn store_range(&mut self, base: u64, size: u64, value: V) -> bool
    {
        if size == 0 {
            debug!(base, "rejecting empty range");
            return false;
        }
        let Some(high) = base.checked_add(size - 1) else {
            debug!(base, size, "rejecting range that overflows the address space");
            return false;
        };

        if let Some(existing) = self.entries.range(base..).next().map(|(_, entry)| entry) {
            if existing.base <= high {
                debug!(
                    base,
                    size,
                    existing_base = existing.base,
                    existing_size = existing.size,
                    "rejecting overlapping range"
                );
                return false;
            }
        }

        self.entries.insert(high, RangeEntry { base, size, value });
        true
    }

    /// Find the entry whose range contains `address`.
    pub fn retrieve_range(&self, address: u64) -> Option<&RangeEntry<V>>
    {
        self.entries
            .range(address..)
            .next()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.base <= address)
    }

    /// Convenience wrapper around [`Self::retrieve_range`] returning only the value.
    pub fn retrieve(&self, address: u64) -> Option<&V>
    {
        self.retrieve_range(address).map(|entry| &entry.value)
    }

    /// Iterate over entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &RangeEntry<V>>
    {
        self.entries.values()
    }

    /// Number of stored ranges.
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Whether the map holds no ranges.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Remove every range.
    pub fn clear(&mut self)
    {
        self.entries.clear();
    }
}
