//! TQ: the time index — orders every resident product by insertion time
//! and hands back the oldest/newest/nearest entry for cursor-based
//! sequencing.
//!
//! Built directly on [`crate::skiplist::SkipList`]; the only behavior this
//! module adds over the generic skip list is the sub-tick collision bump
//! that keeps keys strictly increasing even when the system clock's
//! resolution is coarser than the insertion rate.

use crate::region::RegionId;
use crate::skiplist::{FindMode, SkipList};

/// Maximum number of sub-tick bumps attempted before giving up and
/// surfacing a system error; see `DESIGN.md` Open Question 3.
const MAX_TICK_BUMP: u64 = 1_000_000;

/// A monotonically increasing insertion-order key: real time in
/// nanoseconds, bumped by at least 1 on collision with the previous
/// insertion so distinct products are always strictly ordered.
pub type TimeKey = u64;

/// The time index.
pub struct TimeIndex {
    list: SkipList<TimeKey, RegionId>,
    last_key: Option<TimeKey>,
}

impl TimeIndex {
    /// Builds an empty time index sized for `capacity` resident products.
    #[must_use]
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            list: SkipList::new(capacity, seed),
            last_key: None,
        }
    }

    /// Inserts `region` at `wall_clock_ns`, bumping by one nanosecond per
    /// collision against the previous insertion until a free key is
    /// found or [`MAX_TICK_BUMP`] attempts are exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::System`] if no free key could be found
    /// within the bump budget, and [`crate::Error::Exhausted`] if the
    /// underlying arena has no room.
    pub fn add(&mut self, wall_clock_ns: u64, region: RegionId) -> crate::Result<TimeKey> {
        let mut key = match self.last_key {
            Some(prev) if wall_clock_ns <= prev => prev + 1,
            _ => wall_clock_ns,
        };
        let mut attempts = 0;
        while self.list.find(key, FindMode::Exact).is_some() {
            key += 1;
            attempts += 1;
            if attempts > MAX_TICK_BUMP {
                tracing::error!(wall_clock_ns, attempts, "time index sub-tick bump exhausted");
                return Err(crate::Error::System(
                    "time index could not find a free key after maximum sub-tick bumps".into(),
                ));
            }
        }
        self.list.insert(key, region)?;
        self.last_key = Some(key);
        Ok(key)
    }

    /// Finds the entry for `key` under `mode`.
    #[must_use]
    pub fn find(&self, key: TimeKey, mode: FindMode) -> Option<(TimeKey, RegionId)> {
        self.list.find(key, mode).map(|(_, k, v)| (k, v))
    }

    /// Returns the oldest resident entry, if any.
    #[must_use]
    pub fn first(&self) -> Option<(TimeKey, RegionId)> {
        self.list.first().map(|(_, k, v)| (k, v))
    }

    /// Returns the newest resident entry, if any.
    #[must_use]
    pub fn last(&self) -> Option<(TimeKey, RegionId)> {
        self.list.last().map(|(_, k, v)| (k, v))
    }

    /// Returns the entry immediately after `key`, if any.
    #[must_use]
    pub fn next_after(&self, key: TimeKey) -> Option<(TimeKey, RegionId)> {
        let (id, _, _) = self.list.find(key, FindMode::Exact)?;
        self.list.next(id).map(|(_, k, v)| (k, v))
    }

    /// Removes the entry at `key`. Returns `true` if an entry was removed.
    pub fn delete(&mut self, key: TimeKey) -> bool {
        if let Some((id, _, _)) = self.list.find(key, FindMode::Exact) {
            self.list.delete(id)
        } else {
            false
        }
    }

    /// Number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if no entries are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Iterates every entry oldest-to-newest.
    pub fn iter(&self) -> impl Iterator<Item = (TimeKey, RegionId)> + '_ {
        self.list.iter().map(|(_, k, v)| (k, v))
    }

    /// Rebuilds a time index from a previously persisted set of entries,
    /// whose keys are already known-unique and so are inserted verbatim
    /// rather than through the sub-tick bump in [`Self::add`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Exhausted`] if `capacity` is too small for
    /// `entries`.
    pub fn restore(capacity: usize, seed: u64, mut entries: Vec<(TimeKey, RegionId)>) -> crate::Result<Self> {
        entries.sort_by_key(|(k, _)| *k);
        let mut index = Self::new(capacity, seed);
        for (key, region) in entries {
            index.list.insert(key, region)?;
            index.last_key = Some(key);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertions_with_equal_clock_reads_are_bumped_apart() {
        let mut tq = TimeIndex::new(64, 1);
        let k1 = tq.add(1000, 1).unwrap();
        let k2 = tq.add(1000, 2).unwrap();
        let k3 = tq.add(1000, 3).unwrap();
        assert!(k1 < k2);
        assert!(k2 < k3);
        assert_eq!(tq.len(), 3);
    }

    #[test]
    fn first_last_and_next_walk_in_order() {
        let mut tq = TimeIndex::new(64, 2);
        tq.add(10, 1).unwrap();
        tq.add(20, 2).unwrap();
        tq.add(30, 3).unwrap();
        assert_eq!(tq.first(), Some((10, 1)));
        assert_eq!(tq.last(), Some((30, 3)));
        assert_eq!(tq.next_after(10), Some((20, 2)));
    }

    #[test]
    fn delete_removes_entry() {
        let mut tq = TimeIndex::new(64, 3);
        tq.add(10, 1).unwrap();
        tq.add(20, 2).unwrap();
        assert!(tq.delete(10));
        assert_eq!(tq.len(), 1);
        assert_eq!(tq.first(), Some((20, 2)));
    }
}
