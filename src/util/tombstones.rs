//! Bounded "recently retired" id set
//!
//! Replicated events may arrive after the entity they describe is gone. The
//! apply handlers consult a tombstone set so such stragglers are dropped
//! instead of resurrecting the entity. Oldest entries are evicted first once
//! the capacity is reached.

use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashSet;

pub struct Tombstones<K> {
    set: FxHashSet<K>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Copy + Eq + Hash> Tombstones<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: FxHashSet::default(),
            order: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Record `key`; returns false if it was already present
    pub fn insert(&mut self, key: K) -> bool {
        if !self.set.insert(key) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.set.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_duplicates() {
        let mut t = Tombstones::new(4);
        assert!(t.insert(1u32));
        assert!(!t.insert(1u32));
        assert!(t.contains(&1));
    }

    #[test]
    fn test_evicts_oldest() {
        let mut t = Tombstones::new(2);
        t.insert(1u32);
        t.insert(2);
        t.insert(3);
        assert!(!t.contains(&1));
        assert!(t.contains(&2));
        assert!(t.contains(&3));
        assert_eq!(t.len(), 2);
    }
}
