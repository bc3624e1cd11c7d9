//! Source id to arena slot translation.
//!
//! FE ids are mostly a dense `1..=N` range with the occasional outlier
//! (offset blocks, gaps from deleted entities). Ids inside the dense window
//! resolve with one array read; everything else falls back to a hash map.

use std::collections::HashMap;

const EMPTY: u32 = u32::MAX;
/// How far past the current window an id may land and still grow it.
const GROWTH_SLACK: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    base: i32,
    dense: Vec<u32>,
    sparse: HashMap<i32, u32>,
    len: usize,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes the dense window for ids in `first..=last`.
    pub fn with_range(first: i32, last: i32) -> Self {
        let span = (i64::from(last) - i64::from(first) + 1).max(0) as usize;
        Self {
            base: first,
            dense: vec![EMPTY; span],
            sparse: HashMap::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of ids resolved through the fallback map.
    pub fn sparse_len(&self) -> usize {
        self.sparse.len()
    }

    pub fn get(&self, id: i32) -> Option<usize> {
        if let Some(offset) = self.offset(id)
            && offset < self.dense.len()
        {
            let slot = self.dense[offset];
            return (slot != EMPTY).then_some(slot as usize);
        }
        self.sparse.get(&id).map(|&slot| slot as usize)
    }

    /// Records `id -> slot`. Returns the previous slot if the id was taken,
    /// in which case nothing is changed.
    pub fn insert(&mut self, id: i32, slot: usize) -> Option<usize> {
        if let Some(existing) = self.get(id) {
            return Some(existing);
        }
        let slot = slot as u32;

        if self.dense.is_empty() && self.sparse.is_empty() {
            self.base = id;
        }

        match self.offset(id) {
            Some(offset) if offset < self.dense.len() => self.dense[offset] = slot,
            Some(offset) if offset <= 2 * self.len + GROWTH_SLACK => {
                self.dense.resize(offset + 1, EMPTY);
                self.dense[offset] = slot;
            }
            _ => {
                self.sparse.insert(id, slot);
            }
        }
        self.len += 1;
        None
    }

    fn offset(&self, id: i32) -> Option<usize> {
        let diff = i64::from(id) - i64::from(self.base);
        usize::try_from(diff).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_ids_stay_dense() {
        let mut index = IdIndex::new();
        for (slot, id) in (1..=1000).enumerate() {
            assert_eq!(index.insert(id, slot), None);
        }
        assert_eq!(index.len(), 1000);
        assert_eq!(index.sparse_len(), 0);
        assert_eq!(index.get(1), Some(0));
        assert_eq!(index.get(1000), Some(999));
        assert_eq!(index.get(1001), None);
        assert_eq!(index.get(0), None);
    }

    #[test]
    fn outliers_go_to_the_side_map() {
        let mut index = IdIndex::new();
        index.insert(10, 0);
        index.insert(11, 1);
        index.insert(5, 2);
        index.insert(90_000_000, 3);
        assert_eq!(index.sparse_len(), 2);
        assert_eq!(index.get(5), Some(2));
        assert_eq!(index.get(90_000_000), Some(3));
        assert_eq!(index.get(11), Some(1));
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn duplicate_insert_keeps_first_slot() {
        let mut index = IdIndex::with_range(1, 4);
        assert_eq!(index.insert(3, 0), None);
        assert_eq!(index.insert(3, 7), Some(0));
        assert_eq!(index.get(3), Some(0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn negative_ids_resolve() {
        let mut index = IdIndex::new();
        index.insert(-5, 0);
        index.insert(-4, 1);
        index.insert(-10, 2);
        assert_eq!(index.get(-4), Some(1));
        assert_eq!(index.get(-10), Some(2));
    }
}
