//! A generic, arena-backed skip list used for both the time index (TQ)
//! and the two region-allocator indexes (RL's by-offset and by-extent
//! orderings).
//!
//! One generic structure instantiated for each concrete use rather than
//! three hand-duplicated implementations. Each `SkipList` owns its own
//! [`NodeArena`] rather than sharing one arena across all three
//! instances — see `DESIGN.md` for why.

use crate::arena::{ForwardBlock, NodeArena, NodeId, NIL};
use crate::invariants::debug_assert_time_monotonic;

/// Where a lookup should land relative to an absent exact key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMode {
    /// Key must match exactly.
    Exact,
    /// Smallest entry with key `>= target`.
    Ceiling,
    /// Largest entry with key `<= target`.
    Floor,
}

struct Node<K, V> {
    key: K,
    value: V,
    forward: ForwardBlock,
}

/// An ordered, duplicate-key-tolerant skip list addressed by [`NodeId`].
///
/// Duplicate keys are tolerated (ties broken by insertion order within
/// the tie, walking forward pointers) because the time index's key is a
/// clock tick that can legitimately collide across fast successive
/// insertions — resolved by the sub-tick bump in `queue.rs`, not here.
pub struct SkipList<K, V> {
    arena: NodeArena,
    nodes: Vec<Option<Node<K, V>>>,
    free_node_ids: Vec<NodeId>,
    head: ForwardBlock,
    level: usize,
    len: usize,
}

impl<K: Ord + Copy, V: Copy> SkipList<K, V> {
    /// Builds an empty skip list whose arena is pre-sized for `capacity`
    /// entries and whose level sampling is seeded with `seed`.
    #[must_use]
    pub fn new(capacity: usize, seed: u64) -> Self {
        let arena = NodeArena::new(capacity, seed);
        let maxsize = arena.maxsize();
        Self {
            arena,
            nodes: Vec::with_capacity(capacity),
            free_node_ids: Vec::new(),
            head: vec![NIL; maxsize],
            level: 0,
            len: 0,
        }
    }

    /// Number of entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: NodeId) -> &Node<K, V> {
        self.nodes[id as usize].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.nodes[id as usize].as_mut().expect("dangling NodeId")
    }

    fn alloc_node_slot(&mut self) -> NodeId {
        if let Some(id) = self.free_node_ids.pop() {
            id
        } else {
            let id = self.nodes.len() as NodeId;
            self.nodes.push(None);
            id
        }
    }

    /// Inserts `key -> value`, allowing duplicate keys. Returns the new
    /// entry's [`NodeId`], which callers outside this module should treat
    /// as an opaque handle (e.g. for `delete_exact`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Exhausted`] if the backing arena has no
    /// forward-pointer block available at the sampled level.
    pub fn insert(&mut self, key: K, value: V) -> crate::Result<NodeId> {
        let node_level = self.arena.random_level();
        if node_level > self.level {
            self.level = node_level;
        }

        let mut update = vec![NIL; self.arena.maxsize()];
        let mut cursor = NIL;
        for lvl in (0..=self.level).rev() {
            let mut next = self.forward_at(cursor, lvl);
            while next != NIL && self.node(next).key <= key {
                cursor = next;
                next = self.forward_at(cursor, lvl);
            }
            update[lvl] = cursor;
        }

        let block = self.arena.get(node_level).ok_or_else(|| {
            crate::Error::Exhausted("skip-list node arena exhausted".to_string())
        })?;
        let new_id = self.alloc_node_slot();
        self.nodes[new_id as usize] = Some(Node {
            key,
            value,
            forward: block,
        });

        for lvl in 0..=node_level {
            let pred = update[lvl];
            let pred_next = self.forward_at(pred, lvl);
            self.set_forward(pred, lvl, new_id);
            self.node_mut(new_id).forward[lvl] = pred_next;
        }
        self.len += 1;
        Ok(new_id)
    }

    /// Inserts `key -> value`, asserting (in debug builds) that `key` is
    /// strictly greater than the most recently inserted key — the
    /// monotonic-time-index fast path used by the time index, which never
    /// needs the general predecessor search of [`Self::insert`] because
    /// new entries always land at the tail.
    pub fn insert_monotonic(&mut self, key: K, value: V, prev_key: K) -> crate::Result<NodeId>
    where
        K: std::fmt::Debug,
    {
        debug_assert_time_monotonic!(key, prev_key);
        self.insert(key, value)
    }

    fn forward_at(&self, id: NodeId, level: usize) -> NodeId {
        if id == NIL {
            self.head.get(level).copied().unwrap_or(NIL)
        } else {
            self.node(id).forward.get(level).copied().unwrap_or(NIL)
        }
    }

    fn set_forward(&mut self, id: NodeId, level: usize, target: NodeId) {
        if id == NIL {
            self.head[level] = target;
        } else {
            self.node_mut(id).forward[level] = target;
        }
    }

    /// Finds an entry relative to `target` per `mode`.
    #[must_use]
    pub fn find(&self, target: K, mode: FindMode) -> Option<(NodeId, K, V)> {
        let mut cursor = NIL;
        for lvl in (0..=self.level).rev() {
            let mut next = self.forward_at(cursor, lvl);
            while next != NIL && self.node(next).key < target {
                cursor = next;
                next = self.forward_at(cursor, lvl);
            }
        }
        let candidate = self.forward_at(cursor, 0);
        match mode {
            FindMode::Exact => {
                if candidate != NIL && self.node(candidate).key == target {
                    let n = self.node(candidate);
                    Some((candidate, n.key, n.value))
                } else {
                    None
                }
            }
            FindMode::Ceiling => {
                if candidate == NIL {
                    None
                } else {
                    let n = self.node(candidate);
                    Some((candidate, n.key, n.value))
                }
            }
            FindMode::Floor => {
                if candidate != NIL && self.node(candidate).key == target {
                    let n = self.node(candidate);
                    Some((candidate, n.key, n.value))
                } else if cursor == NIL {
                    None
                } else {
                    let n = self.node(cursor);
                    Some((cursor, n.key, n.value))
                }
            }
        }
    }

    /// Returns the smallest entry, if any.
    #[must_use]
    pub fn first(&self) -> Option<(NodeId, K, V)> {
        let id = self.head.first().copied().unwrap_or(NIL);
        if id == NIL {
            None
        } else {
            let n = self.node(id);
            Some((id, n.key, n.value))
        }
    }

    /// Returns the largest entry, if any, by walking the top level's
    /// forward chain to its end.
    #[must_use]
    pub fn last(&self) -> Option<(NodeId, K, V)> {
        let mut cursor = NIL;
        for lvl in (0..=self.level).rev() {
            let mut next = self.forward_at(cursor, lvl);
            while next != NIL {
                cursor = next;
                next = self.forward_at(cursor, lvl);
            }
        }
        if cursor == NIL {
            None
        } else {
            let n = self.node(cursor);
            Some((cursor, n.key, n.value))
        }
    }

    /// Returns the entry immediately after `id` in key order, if any.
    #[must_use]
    pub fn next(&self, id: NodeId) -> Option<(NodeId, K, V)> {
        let next = self.forward_at(id, 0);
        if next == NIL {
            None
        } else {
            let n = self.node(next);
            Some((next, n.key, n.value))
        }
    }

    /// Removes the entry identified by `id`. `O(level * log n)`: a full
    /// predecessor search by key is needed to relink every level, since
    /// this structure keeps no backward pointers.
    ///
    /// Returns `true` if an entry was removed.
    pub fn delete(&mut self, id: NodeId) -> bool {
        if id == NIL || self.nodes.get(id as usize).and_then(Option::as_ref).is_none() {
            return false;
        }
        let key = self.node(id).key;
        let node_level = self.node(id).forward.len() - 1;

        let mut update = vec![NIL; self.arena.maxsize()];
        let mut cursor = NIL;
        for lvl in (0..=self.level).rev() {
            let mut next = self.forward_at(cursor, lvl);
            while next != NIL && next != id && self.node(next).key <= key {
                cursor = next;
                next = self.forward_at(cursor, lvl);
            }
            update[lvl] = cursor;
        }

        for lvl in 0..=node_level {
            if self.forward_at(update[lvl], lvl) == id {
                let target = self.forward_at(id, lvl);
                self.set_forward(update[lvl], lvl, target);
            }
        }

        while self.level > 0 && self.head.get(self.level).copied().unwrap_or(NIL) == NIL {
            self.level -= 1;
        }

        let node = self.nodes[id as usize].take().expect("checked above");
        self.arena.release(node.forward);
        self.free_node_ids.push(id);
        self.len -= 1;
        true
    }

    /// Reads back an entry's value by id without removing it.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<(K, V)> {
        self.nodes
            .get(id as usize)
            .and_then(Option::as_ref)
            .map(|n| (n.key, n.value))
    }

    /// Iterates every entry in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, K, V)> + '_ {
        let mut cursor = self.head.first().copied().unwrap_or(NIL);
        std::iter::from_fn(move || {
            if cursor == NIL {
                None
            } else {
                let n = self.node(cursor);
                let item = (cursor, n.key, n.value);
                cursor = self.forward_at(cursor, 0);
                Some(item)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find_exact() {
        let mut sl: SkipList<u64, u32> = SkipList::new(64, 1);
        sl.insert(10, 100).unwrap();
        sl.insert(20, 200).unwrap();
        sl.insert(5, 50).unwrap();
        assert_eq!(sl.find(20, FindMode::Exact).map(|(_, k, v)| (k, v)), Some((20, 200)));
        assert_eq!(sl.find(15, FindMode::Exact), None);
    }

    #[test]
    fn ceiling_and_floor_modes() {
        let mut sl: SkipList<u64, u32> = SkipList::new(64, 2);
        for k in [10u64, 20, 30] {
            sl.insert(k, k as u32).unwrap();
        }
        assert_eq!(sl.find(15, FindMode::Ceiling).map(|(_, k, _)| k), Some(20));
        assert_eq!(sl.find(15, FindMode::Floor).map(|(_, k, _)| k), Some(10));
        assert_eq!(sl.find(35, FindMode::Ceiling), None);
        assert_eq!(sl.find(5, FindMode::Floor), None);
    }

    #[test]
    fn ordering_is_maintained_across_inserts_and_deletes() {
        let mut sl: SkipList<u64, u32> = SkipList::new(128, 3);
        let mut ids = Vec::new();
        for k in [50u64, 10, 40, 20, 30] {
            ids.push(sl.insert(k, k as u32).unwrap());
        }
        let collected: Vec<u64> = sl.iter().map(|(_, k, _)| k).collect();
        assert_eq!(collected, vec![10, 20, 30, 40, 50]);

        assert!(sl.delete(ids[2])); // removes key 40
        let collected: Vec<u64> = sl.iter().map(|(_, k, _)| k).collect();
        assert_eq!(collected, vec![10, 20, 30, 50]);
        assert_eq!(sl.len(), 4);
    }

    #[test]
    fn first_and_last_track_extremes() {
        let mut sl: SkipList<u64, u32> = SkipList::new(32, 4);
        assert!(sl.first().is_none());
        assert!(sl.last().is_none());
        for k in [3u64, 1, 2] {
            sl.insert(k, 0).unwrap();
        }
        assert_eq!(sl.first().map(|(_, k, _)| k), Some(1));
        assert_eq!(sl.last().map(|(_, k, _)| k), Some(3));
    }

    #[test]
    fn duplicate_keys_are_tolerated_in_insertion_order() {
        let mut sl: SkipList<u64, u32> = SkipList::new(32, 5);
        sl.insert(7, 1).unwrap();
        sl.insert(7, 2).unwrap();
        let matches: Vec<u32> = sl.iter().filter(|(_, k, _)| *k == 7).map(|(_, _, v)| v).collect();
        assert_eq!(matches, vec![1, 2]);
    }
}
