use super::SectionId;
use crate::blob::{BlobPair, PairMatch};
use std::collections::{HashMap, VecDeque};

/// Sections that arrived before the record owning them.
///
/// Keyed by the exact blob pair the diff text announced, so a record with
/// identical ids is found directly; abbreviated ids fall back to a scan
/// over every key. Sections sharing a key are handed out oldest first.
#[derive(Debug, Default)]
pub struct PendingHeaderCache {
    by_pair: HashMap<BlobPair, VecDeque<SectionId>>,
    len: usize,
}

impl PendingHeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pair: BlobPair, section: SectionId) {
        self.by_pair.entry(pair).or_default().push_back(section);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, section: SectionId) -> bool {
        self.by_pair.values().any(|queue| queue.contains(&section))
    }

    pub fn clear(&mut self) {
        self.by_pair.clear();
        self.len = 0;
    }

    /// Remove and return the cached section for `pair`.
    ///
    /// `accepts` is the final say on whether a candidate section really
    /// covers the record being looked up. Candidates under different keys
    /// leave the cache untouched and come back as [`PairMatch::Ambiguous`].
    pub fn take_matching<F>(&mut self, pair: &BlobPair, mut accepts: F) -> PairMatch<SectionId>
    where
        F: FnMut(SectionId) -> bool,
    {
        let exact = self
            .by_pair
            .get(pair)
            .and_then(|queue| queue.iter().copied().find(|id| accepts(*id)));
        if let Some(section) = exact {
            self.remove(pair, section);
            return PairMatch::Unique(section);
        }

        let mut candidates: Vec<(BlobPair, SectionId)> = self
            .by_pair
            .iter()
            .filter(|(key, _)| *key != pair)
            .filter_map(|(key, queue)| {
                queue
                    .iter()
                    .copied()
                    .find(|id| accepts(*id))
                    .map(|id| (key.clone(), id))
            })
            .collect();
        candidates.sort_by_key(|(_, id)| *id);

        let resolved = PairMatch::resolve(candidates.iter().map(|(key, id)| (key, *id)).collect());
        if let PairMatch::Unique(section) = resolved
            && let Some((key, _)) = candidates.iter().find(|(_, id)| *id == section)
        {
            self.remove(key, section);
        }
        resolved
    }

    /// Drop `section` wherever it is queued. Returns whether it was cached.
    pub fn remove_section(&mut self, section: SectionId) -> bool {
        let Some(key) = self
            .by_pair
            .iter()
            .find(|(_, queue)| queue.contains(&section))
            .map(|(key, _)| key.clone())
        else {
            return false;
        };
        self.remove(&key, section);
        true
    }

    fn remove(&mut self, key: &BlobPair, section: SectionId) {
        let Some(queue) = self.by_pair.get_mut(key) else {
            return;
        };
        let before = queue.len();
        queue.retain(|id| *id != section);
        self.len -= before - queue.len();
        if queue.is_empty() {
            self.by_pair.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const FULL_FROM: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";
    const FULL_TO: &str = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad";

    fn full() -> BlobPair {
        BlobPair::new(FULL_FROM, FULL_TO)
    }

    #[test]
    fn exact_pair_is_found() {
        let mut cache = PendingHeaderCache::new();
        cache.insert(full(), SectionId(0));
        assert_eq!(cache.take_matching(&full(), |_| true), PairMatch::Unique(SectionId(0)));
        assert!(cache.is_empty());
    }

    #[test]
    fn predicate_decides_candidates() {
        let mut cache = PendingHeaderCache::new();
        cache.insert(BlobPair::new("e69de29", "3b18e51"), SectionId(3));
        cache.insert(BlobPair::new("1111111", "2222222"), SectionId(4));

        let found = cache.take_matching(&full(), |id| id == SectionId(3));
        assert_eq!(found, PairMatch::Unique(SectionId(3)));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(SectionId(4)));
        assert!(!cache.contains(SectionId(3)));
    }

    #[test]
    fn duplicates_are_first_in_first_out() {
        let mut cache = PendingHeaderCache::new();
        cache.insert(full(), SectionId(1));
        cache.insert(full(), SectionId(2));
        assert_eq!(cache.take_matching(&full(), |_| true), PairMatch::Unique(SectionId(1)));
        assert_eq!(cache.take_matching(&full(), |_| true), PairMatch::Unique(SectionId(2)));
        assert_eq!(cache.take_matching(&full(), |_| true), PairMatch::Missing);
    }

    #[test]
    fn differing_candidates_stay_cached() {
        let mut cache = PendingHeaderCache::new();
        cache.insert(BlobPair::new("e69d", "3b18"), SectionId(0));
        cache.insert(BlobPair::new("e69de", "3b18e"), SectionId(1));

        let found = cache.take_matching(&full(), |_| true);
        assert_eq!(found, PairMatch::Ambiguous(vec![SectionId(0), SectionId(1)]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn remove_section_by_id() {
        let mut cache = PendingHeaderCache::new();
        cache.insert(full(), SectionId(0));
        cache.insert(full(), SectionId(1));
        assert!(cache.remove_section(SectionId(0)));
        assert!(!cache.remove_section(SectionId(0)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take_matching(&full(), |_| true), PairMatch::Unique(SectionId(1)));
    }

    #[test]
    fn clear_empties() {
        let mut cache = PendingHeaderCache::new();
        cache.insert(full(), SectionId(0));
        cache.insert(BlobPair::new("a", "b"), SectionId(1));
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.contains(SectionId(0)));
    }
}
