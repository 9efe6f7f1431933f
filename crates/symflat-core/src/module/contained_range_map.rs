//! Nested address range map.
//!
//! A [`ContainedRangeMap`] is a tree of address ranges. Every range lies
//! entirely inside its parent and siblings never overlap, which is exactly
//! the shape of inlined call regions inside a function: an inlined call can
//! itself contain inlined calls, to any depth.
//!
//! Depth is unbounded, so storing, measuring and dropping walk the tree with
//! loops. The derived `Clone`, `PartialEq` and `Debug` impls still recurse.

use std::collections::{btree_map, BTreeMap};
use std::mem;

use smallvec::SmallVec;
use tracing::debug;

/// A stored range together with the ranges nested inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainedRange<V>
{
    base: u64,
    high: u64,
    value: V,
    children: ContainedRangeMap<V>,
}

impl<V> ContainedRange<V>
{
    /// First address covered by the range.
    pub fn base(&self) -> u64
    {
        self.base
    }

    /// Number of bytes covered by the range.
    pub fn size(&self) -> u64
    {
        self.high - self.base + 1
    }

    /// Last address covered by the range (inclusive).
    pub fn high(&self) -> u64
    {
        self.high
    }

    /// Value stored for this range.
    pub fn value(&self) -> &V
    {
        &self.value
    }

    /// Ranges nested directly inside this one.
    pub fn children(&self) -> &ContainedRangeMap<V>
    {
        &self.children
    }

    fn contains_range(&self, base: u64, high: u64) -> bool
    {
        self.base <= base && high <= self.high
    }
}

/// Tree of nested, non-overlapping address ranges.
///
/// The map itself is the (valueless) root; its direct entries are the
/// outermost ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainedRangeMap<V>
{
    children: BTreeMap<u64, ContainedRange<V>>,
}

impl<V> Default for ContainedRangeMap<V>
{
    fn default() -> Self
    {
        Self {
            children: BTreeMap::new(),
        }
    }
}

impl<V> ContainedRangeMap<V>
{
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Store `value` for `[base, base + size)` at the right nesting depth.
    ///
    /// A range that lies inside an existing range becomes its descendant; a
    /// range that encloses existing siblings adopts them as children. A range
    /// that partially overlaps another is rejected. An exact duplicate of an
    /// existing range is rejected unless `allow_equal_range` is set, in which
    /// case it nests inside the existing one.
    pub fn store_range(&mut self, base: u64, size: u64, value: V, allow_equal_range: bool) -> bool
    {
        if size == 0 {
            debug!(base, "rejecting empty nested range");
            return false;
        }
        let Some(high) = base.checked_add(size - 1) else {
            debug!(base, size, "rejecting nested range that overflows the address space");
            return false;
        };
        self.store(base, high, value, allow_equal_range)
    }

    fn store(&mut self, base: u64, high: u64, value: V, allow_equal_range: bool) -> bool
    {
        // Siblings are disjoint, so only the first child ending at or after
        // `base` can contain the new range.
        let mut level = self;
        loop {
            let container = match level.children.range(base..).next() {
                Some((&key, child)) if child.contains_range(base, high) => {
                    if child.base == base && child.high == high && !allow_equal_range {
                        debug!(base, high, "rejecting duplicate nested range");
                        return false;
                    }
                    key
                }
                _ => break,
            };
            match level.children.get_mut(&container) {
                Some(child) => level = &mut child.children,
                None => return false,
            }
        }
        level.insert_here(base, high, value)
    }

    /// Insert at this level, adopting every sibling the new range encloses.
    fn insert_here(&mut self, base: u64, high: u64, value: V) -> bool
    {
        let mut adopted = Vec::new();
        for (key, child) in self.children.range(base..) {
            if child.base > high {
                break;
            }
            if child.base < base || child.high > high {
                debug!(base, high, child_base = child.base, child_high = child.high, "rejecting partially overlapping range");
                return false;
            }
            adopted.push(*key);
        }

        let mut children = ContainedRangeMap::new();
        for key in adopted {
            if let Some(child) = self.children.remove(&key) {
                children.children.insert(key, child);
            }
        }
        self.children.insert(
            high,
            ContainedRange {
                base,
                high,
                value,
                children,
            },
        );
        true
    }

    /// Attach an already-built subtree, as produced by a decoder.
    ///
    /// Unlike [`Self::store_range`] this never re-parents: `children` must lie
    /// inside the new range and the new range must not overlap any sibling.
    pub(crate) fn insert_subtree(&mut self, base: u64, size: u64, value: V, children: ContainedRangeMap<V>) -> bool
    {
        if size == 0 {
            return false;
        }
        let Some(high) = base.checked_add(size - 1) else {
            return false;
        };
        if let Some(first) = children.children.values().next() {
            if first.base < base {
                return false;
            }
        }
        if let Some((&last_high, _)) = children.children.iter().next_back() {
            if last_high > high {
                return false;
            }
        }
        if let Some(sibling) = self.children.range(base..).next().map(|(_, sibling)| sibling) {
            if sibling.base <= high {
                return false;
            }
        }
        self.children.insert(
            high,
            ContainedRange {
                base,
                high,
                value,
                children,
            },
        );
        true
    }

    /// Innermost value whose range contains `address`.
    pub fn retrieve(&self, address: u64) -> Option<&V>
    {
        self.retrieve_all(address).last().copied()
    }

    /// Every value whose range contains `address`, outermost first.
    pub fn retrieve_all(&self, address: u64) -> SmallVec<[&V; 4]>
    {
        let mut found = SmallVec::new();
        let mut level = self;
        while let Some(child) = level.child_containing(address) {
            found.push(&child.value);
            level = &child.children;
        }
        found
    }

    fn child_containing(&self, address: u64) -> Option<&ContainedRange<V>>
    {
        self.children
            .range(address..)
            .next()
            .map(|(_, child)| child)
            .filter(|child| child.base <= address)
    }

    /// Outermost ranges in ascending address order.
    pub fn iter(&self) -> btree_map::Values<'_, u64, ContainedRange<V>>
    {
        self.children.values()
    }

    /// Number of outermost ranges.
    pub fn len(&self) -> usize
    {
        self.children.len()
    }

    /// Whether the map holds no ranges at all.
    pub fn is_empty(&self) -> bool
    {
        self.children.is_empty()
    }

    /// Depth of the deepest nesting chain (0 for an empty map).
    pub fn depth(&self) -> usize
    {
        let mut deepest = 0;
        let mut levels = vec![(self, 0)];
        while let Some((level, depth)) = levels.pop() {
            deepest = deepest.max(depth);
            levels.extend(level.children.values().map(|child| (&child.children, depth + 1)));
        }
        deepest
    }
}

impl<V> Drop for ContainedRangeMap<V>
{
    fn drop(&mut self)
    {
        // Detach every subtree before it drops so no drop recurses.
        let mut levels = vec![mem::take(&mut self.children)];
        while let Some(level) = levels.pop() {
            for (_, mut range) in level {
                levels.push(mem::take(&mut range.children.children));
            }
        }
    }
}
