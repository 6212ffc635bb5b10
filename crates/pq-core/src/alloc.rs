//! RL: the region allocator over the data area.
//!
//! Tracks free and in-use byte ranges with a best-fit allocator backed by
//! two orderings of the free list — by extent (for best-fit, keyed by
//! `(extent, offset)` so identical-extent fragments tie-break to the
//! lowest offset) and by offset (for neighbor coalescing) — each a
//! [`crate::skiplist::SkipList`] sharing the duplicate-key tolerance the
//! generic structure already provides (several free fragments can share
//! the same extent).
//!
//! `RegionTable`'s own offset/extent-index bookkeeping uses a
//! `HashMap<RegionId, _>` rather than a custom hash table, unlike the
//! signature index in `sigindex.rs` — this table's shape is not mandated
//! by any on-disk format, so the standard library collection is the
//! idiomatic choice (see `DESIGN.md`).

use std::collections::HashMap;

use crate::invariants::{debug_assert_aligned_extent, debug_assert_not_contiguous, debug_assert_slot_conservation};
use crate::region::{RegionId, RegionMeta, NO_REGION};
use crate::skiplist::{FindMode, SkipList};

/// Minimum leftover bytes worth carving off as a separate free fragment
/// when a best-fit allocation is larger than requested; smaller
/// remainders are handed out whole rather than fragmenting the free
/// list further. See `DESIGN.md` Open Question 2.
pub const SPLIT_SLACK_BYTES: u64 = 64;

/// Upper bound on how many free regions a single eviction pass inspects
/// before giving up with [`crate::Error::Access`]. See `DESIGN.md` Open
/// Question 1.
pub const MAX_EVICTION_SCAN_FACTOR: u32 = 4;

struct FreeNodeRefs {
    offset_node: u32,
    extent_node: u32,
}

/// The region allocator: a fixed-capacity slot table plus two free-list
/// orderings.
pub struct RegionTable {
    capacity: u32,
    align: u64,
    slots: Vec<Option<RegionMeta>>,
    free_slot_ids: Vec<RegionId>,
    by_offset: SkipList<u64, RegionId>,
    by_extent: SkipList<(u64, u64), RegionId>,
    free_refs: HashMap<RegionId, FreeNodeRefs>,
    nelems: u32,
    nfree: u32,
    nempty: u32,
}

impl RegionTable {
    /// Builds a table over a data area of `data_size` bytes, budgeted for
    /// at most `capacity` simultaneously tracked regions (in-use plus
    /// free fragments), with alignment `align`.
    #[must_use]
    pub fn new(data_size: u64, capacity: u32, align: u64, seed: u64) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize);
        slots.push(Some(RegionMeta {
            offset: 0,
            extent: data_size,
            in_use: false,
        }));
        for _ in 1..capacity {
            slots.push(None);
        }

        let mut by_offset = SkipList::new(capacity as usize, seed);
        let mut by_extent = SkipList::new(capacity as usize, seed.wrapping_add(1));
        let mut free_refs = HashMap::new();
        let offset_node = by_offset.insert(0, 0).expect("fresh arena has room");
        let extent_node = by_extent.insert((data_size, 0), 0).expect("fresh arena has room");
        free_refs.insert(
            0,
            FreeNodeRefs {
                offset_node,
                extent_node,
            },
        );

        Self {
            capacity,
            align,
            slots,
            free_slot_ids: Vec::new(),
            by_offset,
            by_extent,
            free_refs,
            nelems: 0,
            nfree: 1,
            nempty: capacity - 1,
        }
    }

    fn check_conservation(&self) {
        debug_assert_slot_conservation!(self.nelems, self.nfree, self.nempty, self.capacity);
    }

    fn alloc_slot_id(&mut self) -> Option<RegionId> {
        if let Some(id) = self.free_slot_ids.pop() {
            Some(id)
        } else {
            let next = self.slots.iter().position(Option::is_none)? as RegionId;
            Some(next)
        }
    }

    fn remove_from_free_lists(&mut self, id: RegionId) {
        if let Some(refs) = self.free_refs.remove(&id) {
            self.by_offset.delete(refs.offset_node);
            self.by_extent.delete(refs.extent_node);
        }
    }

    fn insert_into_free_lists(&mut self, id: RegionId, offset: u64, extent: u64) {
        let offset_node = self.by_offset.insert(offset, id).expect("arena sized to capacity");
        let extent_node = self.by_extent.insert((extent, offset), id).expect("arena sized to capacity");
        self.free_refs.insert(
            id,
            FreeNodeRefs {
                offset_node,
                extent_node,
            },
        );
    }

    fn round_up_align(&self, size: u64) -> u64 {
        let align = self.align.max(1);
        ((size + align - 1) / align) * align
    }

    /// Reserves `size` bytes best-fit from the free list, tie-breaking
    /// same-extent candidates to the lowest offset, and splitting off any
    /// remainder of at least [`SPLIT_SLACK_BYTES`] as a new free
    /// fragment. Returns `None` if no free region is large enough.
    pub fn allocate(&mut self, size: u64) -> Option<RegionId> {
        let aligned = self.round_up_align(size);
        let (extent_node, free_id) = self.by_extent.find((aligned, 0), FindMode::Ceiling).map(|(id, _, v)| (id, v))?;
        let _ = extent_node;

        let meta = self.slots[free_id as usize].expect("free region must have metadata");
        debug_assert_aligned_extent!(meta.extent, self.align);
        self.remove_from_free_lists(free_id);

        let remainder = meta.extent - aligned;
        if remainder >= SPLIT_SLACK_BYTES {
            let remainder_id = self.alloc_slot_id().unwrap_or_else(|| {
                self.slots.push(None);
                (self.slots.len() - 1) as RegionId
            });
            self.slots[remainder_id as usize] = Some(RegionMeta {
                offset: meta.offset + aligned,
                extent: remainder,
                in_use: false,
            });
            self.insert_into_free_lists(remainder_id, meta.offset + aligned, remainder);
            self.nempty -= 1;
            self.nfree += 1;

            self.slots[free_id as usize] = Some(RegionMeta {
                offset: meta.offset,
                extent: aligned,
                in_use: true,
            });
            self.nfree -= 1;
            self.nelems += 1;
        } else {
            self.slots[free_id as usize] = Some(RegionMeta {
                offset: meta.offset,
                extent: meta.extent,
                in_use: true,
            });
            self.nfree -= 1;
            self.nelems += 1;
        }
        self.check_conservation();
        Some(free_id)
    }

    /// Returns `id`'s region to the free list, coalescing with an
    /// offset-adjacent free neighbor on either side.
    pub fn free(&mut self, id: RegionId) {
        let mut meta = self.slots[id as usize].expect("free() on unknown region");
        debug_assert!(meta.in_use, "double free of region {id}");
        meta.in_use = false;
        self.nelems -= 1;
        self.nfree += 1;
        self.slots[id as usize] = Some(meta);
        self.insert_into_free_lists(id, meta.offset, meta.extent);

        self.coalesce_with_successor(id);
        self.coalesce_with_predecessor(id);
        self.check_conservation();

        #[cfg(debug_assertions)]
        {
            // No two free regions should now be directly adjacent by
            // offset; adjacency should always have triggered a merge.
            let free_regions: Vec<(u64, u64)> = self
                .by_offset
                .iter()
                .map(|(_, offset, region_id)| (offset, self.slots[region_id as usize].expect("tracked free region must exist").extent))
                .collect();
            for pair in free_regions.windows(2) {
                let (lo_offset, lo_extent) = pair[0];
                let (hi_offset, _) = pair[1];
                debug_assert_not_contiguous!(lo_offset, lo_extent, hi_offset);
            }
        }
    }

    fn coalesce_with_successor(&mut self, id: RegionId) {
        let meta = self.slots[id as usize].expect("region must exist");
        if let Some((node, key, other_id)) = self.by_offset.find(meta.end(), FindMode::Exact).map(|(n, k, v)| (n, k, v)) {
            let _ = node;
            let _ = key;
            if other_id != id {
                self.merge_into(id, other_id);
            }
        }
    }

    fn coalesce_with_predecessor(&mut self, id: RegionId) {
        let meta = self.slots[id as usize].expect("region must exist");
        if meta.offset == 0 {
            return;
        }
        if let Some((_, _, other_id)) = self.by_offset.find(meta.offset, FindMode::Floor) {
            if other_id != id {
                let other = self.slots[other_id as usize].expect("region must exist");
                if other.end() == meta.offset {
                    self.merge_into(other_id, id);
                }
            }
        }
    }

    /// Merges `right` into `left` (both must currently be free), freeing
    /// `right`'s slot back to the empty pool.
    fn merge_into(&mut self, left: RegionId, right: RegionId) {
        let left_meta = self.slots[left as usize].expect("left region must exist");
        let right_meta = self.slots[right as usize].expect("right region must exist");
        debug_assert_eq!(left_meta.end(), right_meta.offset, "merge_into requires adjacency");

        self.remove_from_free_lists(left);
        self.remove_from_free_lists(right);

        let merged = RegionMeta {
            offset: left_meta.offset,
            extent: left_meta.extent + right_meta.extent,
            in_use: false,
        };
        self.slots[left as usize] = Some(merged);
        self.slots[right as usize] = None;
        self.free_slot_ids.push(right);
        self.nfree -= 1;
        self.nempty += 1;

        self.insert_into_free_lists(left, merged.offset, merged.extent);
    }

    /// Metadata for `id`, whether in-use or free.
    #[must_use]
    pub fn meta(&self, id: RegionId) -> Option<RegionMeta> {
        self.slots.get(id as usize).copied().flatten()
    }

    /// Number of in-use regions.
    #[must_use]
    pub fn nelems(&self) -> u32 {
        self.nelems
    }

    /// Number of tracked free fragments.
    #[must_use]
    pub fn nfree(&self) -> u32 {
        self.nfree
    }

    /// Largest free extent currently available, or zero if none.
    #[must_use]
    pub fn largest_free_extent(&self) -> u64 {
        self.by_extent.last().map(|(_, k, _)| k.0).unwrap_or(0)
    }

    /// True if no free region can satisfy `size` bytes without eviction.
    #[must_use]
    pub fn would_need_eviction(&self, size: u64) -> bool {
        self.round_up_align(size) > self.largest_free_extent() || self.nempty == 0 && self.nfree == 0
    }

    /// Every in-use region, `(id, meta)`, in unspecified order — used to
    /// snapshot the table for persistence.
    pub fn in_use_iter(&self) -> impl Iterator<Item = (RegionId, RegionMeta)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.filter(|m| m.in_use).map(|m| (i as RegionId, m)))
    }

    /// Rebuilds a table from a complete partition of the data area: every
    /// region, free or in-use, that was present when the table was last
    /// persisted. `regions` must exactly tile `[0, data_size)` with no
    /// gaps or overlaps.
    ///
    /// This bypasses best-fit placement entirely — it restores exact
    /// historical offsets rather than re-deriving them through
    /// [`Self::allocate`], which could not reproduce an arbitrary prior
    /// layout. See `DESIGN.md` for why whole-table snapshotting was
    /// chosen over in-place on-disk node writes.
    #[must_use]
    pub fn restore(data_size: u64, capacity: u32, align: u64, seed: u64, mut regions: Vec<RegionMeta>) -> Self {
        regions.sort_by_key(|r| r.offset);
        let mut slots: Vec<Option<RegionMeta>> = regions.into_iter().map(Some).collect();
        for _ in slots.len()..capacity as usize {
            slots.push(None);
        }

        let mut by_offset = SkipList::new(capacity as usize, seed);
        let mut by_extent = SkipList::new(capacity as usize, seed.wrapping_add(1));
        let mut free_refs = HashMap::new();
        let mut nelems = 0;
        let mut nfree = 0;
        for (i, slot) in slots.iter().enumerate() {
            if let Some(meta) = slot {
                if meta.in_use {
                    nelems += 1;
                } else {
                    let id = i as RegionId;
                    let offset_node = by_offset.insert(meta.offset, id).expect("arena sized to capacity");
                    let extent_node = by_extent.insert((meta.extent, meta.offset), id).expect("arena sized to capacity");
                    free_refs.insert(
                        id,
                        FreeNodeRefs {
                            offset_node,
                            extent_node,
                        },
                    );
                    nfree += 1;
                }
            }
        }
        let nempty = capacity - nelems - nfree;

        let empty_slot_ids = slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_none().then_some(i as RegionId))
            .collect();

        let table = Self {
            capacity,
            align,
            slots,
            free_slot_ids: empty_slot_ids,
            by_offset,
            by_extent,
            free_refs,
            nelems,
            nfree,
            nempty,
        };
        table.check_conservation();
        table
    }
}

impl Default for FreeNodeRefs {
    fn default() -> Self {
        Self {
            offset_node: NO_REGION,
            extent_node: NO_REGION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_has_one_free_region_spanning_the_data_area() {
        let rt = RegionTable::new(1024, 16, 8, 1);
        assert_eq!(rt.nfree(), 1);
        assert_eq!(rt.nelems(), 0);
        assert_eq!(rt.largest_free_extent(), 1024);
    }

    #[test]
    fn allocate_and_free_round_trips_capacity() {
        let mut rt = RegionTable::new(1024, 16, 8, 2);
        let a = rt.allocate(100).expect("should fit");
        assert_eq!(rt.nelems(), 1);
        let meta = rt.meta(a).unwrap();
        assert!(meta.in_use);
        assert_eq!(meta.extent, 104); // rounded to align=8

        rt.free(a);
        assert_eq!(rt.nelems(), 0);
        assert_eq!(rt.nfree(), 1);
        assert_eq!(rt.largest_free_extent(), 1024);
    }

    #[test]
    fn split_leaves_remainder_available() {
        let mut rt = RegionTable::new(1024, 16, 8, 3);
        let a = rt.allocate(100).unwrap();
        assert_eq!(rt.nfree(), 1);
        assert!(rt.largest_free_extent() >= 900);
        rt.free(a);
        assert_eq!(rt.largest_free_extent(), 1024);
    }

    #[test]
    fn allocation_failure_when_nothing_fits() {
        let mut rt = RegionTable::new(100, 4, 8, 4);
        assert!(rt.allocate(200).is_none());
    }

    #[test]
    fn coalescing_merges_three_adjacent_frees_into_one() {
        let mut rt = RegionTable::new(300, 16, 8, 5);
        let a = rt.allocate(100).unwrap();
        let b = rt.allocate(100).unwrap();
        let c = rt.allocate(96).unwrap();
        assert_eq!(rt.nelems(), 3);
        rt.free(a);
        rt.free(c);
        rt.free(b);
        assert_eq!(rt.nfree(), 1);
        assert_eq!(rt.largest_free_extent(), 300);
    }
}
