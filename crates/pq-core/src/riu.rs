//! RIU: the per-process in-use region table.
//!
//! Heap-resident, never shared across processes. Tracks which offsets
//! this process currently has locked/mapped so [`crate::backing_store`]
//! can find the right handle on release and so a process can forbid
//! recursive locking of a region it already holds.

use crate::backing_store::RegionHandle;

struct Entry {
    offset: u64,
    extent: u64,
    held_for_sequence: bool,
    handle: Option<RegionHandle>,
}

/// The in-use region table, sorted by offset.
#[derive(Default)]
pub struct InUseTable {
    entries: Vec<Entry>,
}

impl InUseTable {
    /// Builds an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if this process already has `offset` checked out — used to
    /// forbid a recursive lock of the same region within one process.
    #[must_use]
    pub fn holds(&self, offset: u64) -> bool {
        self.entries.binary_search_by_key(&offset, |e| e.offset).is_ok()
    }

    /// Registers a freshly locked region, keeping the table sorted by offset.
    pub fn insert(&mut self, offset: u64, extent: u64, handle: RegionHandle, held_for_sequence: bool) {
        let pos = self.entries.partition_point(|e| e.offset < offset);
        self.entries.insert(
            pos,
            Entry {
                offset,
                extent,
                held_for_sequence,
                handle: Some(handle),
            },
        );
    }

    /// Removes and returns the handle for `offset`, if tracked.
    pub fn take(&mut self, offset: u64) -> Option<RegionHandle> {
        let idx = self.entries.binary_search_by_key(&offset, |e| e.offset).ok()?;
        Some(self.entries.remove(idx).handle.expect("handle always present"))
    }

    /// True if `offset` is held under the explicit `sequence_lock`
    /// hold-until-release protocol, rather than a transient call-scoped
    /// lock.
    #[must_use]
    pub fn is_held_for_sequence(&self, offset: u64) -> bool {
        self.entries
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .map(|idx| self.entries[idx].held_for_sequence)
            .unwrap_or(false)
    }

    /// Number of regions this process currently has checked out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if this process holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every offset currently held for the `sequence_lock` protocol —
    /// used by eviction to determine which products cannot be reclaimed.
    pub fn held_offsets(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().filter(|e| e.held_for_sequence).map(|e| e.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_reflects_registered_offsets() {
        let table = InUseTable::new();
        assert!(!table.holds(100));
    }

    #[test]
    fn len_and_is_empty_track_size() {
        let table = InUseTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
