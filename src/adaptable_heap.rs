use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ahash::RandomState;
use tracing::trace;

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::observer::{ChangeObserver, NoopObserver};

// Stale entries below this count are only removed by `pop`.
const STALE_FLOOR: usize = 64;

/// A binary min-heap whose elements can be re-keyed or removed in place.
///
/// Removal and re-keying never search the heap array. The element's current
/// entry is flagged invalid and dropped from the index; the stale entry is
/// discarded once it reaches the root during [`pop`](Self::pop) or
/// [`peek`](Self::peek), or when the heap compacts itself.
///
/// Equal keys pop in insertion order.
pub struct AdaptableHeap<T, K, O = NoopObserver> {
    entries: Vec<Option<Entry<T, K>>>,     // arena, addressed by slot
    free_slots: Vec<usize>,                // reusable arena slots
    heap: Vec<usize>,                      // slots in min-heap order
    index: HashMap<T, usize, RandomState>, // element -> slot of its valid entry
    stale: usize,
    sequence: u64,
    observer: O,
}

impl<T, K> AdaptableHeap<T, K>
where
    T: Hash + Eq + Clone,
    K: PartialOrd,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: RandomState) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_slots: Vec::new(),
            heap: Vec::with_capacity(capacity),
            index: HashMap::with_capacity_and_hasher(capacity, hasher),
            stale: 0,
            sequence: 0,
            observer: NoopObserver,
        }
    }
}

impl<T, K> Default for AdaptableHeap<T, K>
where
    T: Hash + Eq + Clone,
    K: PartialOrd,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K, O> AdaptableHeap<T, K, O>
where
    T: Hash + Eq + Clone,
    K: PartialOrd,
    O: ChangeObserver<T, K>,
{
    /// Replaces the change observer. Existing contents are kept.
    pub fn with_observer<P>(self, observer: P) -> AdaptableHeap<T, K, P>
    where
        P: ChangeObserver<T, K>,
    {
        AdaptableHeap {
            entries: self.entries,
            free_slots: self.free_slots,
            heap: self.heap,
            index: self.index,
            stale: self.stale,
            sequence: self.sequence,
            observer,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Number of tracked elements. Stale entries are not counted.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Length of the underlying array, stale entries included.
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    pub fn stale_len(&self) -> usize {
        self.stale
    }

    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(element)
    }

    pub fn key_of<Q>(&self, element: &Q) -> Option<&K>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(element)?;
        self.entries[slot].as_ref().map(Entry::key)
    }

    /// Tracked elements and their keys, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &K)> {
        self.valid_entries().map(|entry| (entry.element(), entry.key()))
    }

    pub(crate) fn valid_entries(&self) -> impl Iterator<Item = &Entry<T, K>> {
        self.index
            .values()
            .filter_map(|&slot| self.entries[slot].as_ref())
    }

    /// Fails with [`Error::IncomparableKey`] if `key` cannot be ordered
    /// against itself or against the key currently at the root.
    pub fn check_key(&self, key: &K) -> Result<()> {
        if key.partial_cmp(key).is_none() {
            return Err(Error::IncomparableKey);
        }
        if let Some(root) = self.heap.first().and_then(|&slot| self.entries[slot].as_ref()) {
            if key.partial_cmp(root.key()).is_none() {
                return Err(Error::IncomparableKey);
            }
        }
        Ok(())
    }

    /// Tracks `element` with `key`, replacing any key it already had.
    ///
    /// The observer sees the removal of the old key (or a no-change event if
    /// the element was new) followed by the insertion of the new one.
    pub fn push_or_update(&mut self, element: T, key: K) -> Result<()> {
        self.check_key(&key)?;
        self.push_unchecked(element, key);
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, element: T, key: K) {
        self.delete(&element);

        let seq = self.sequence;
        self.sequence += 1;
        let slot = self.alloc(Entry::new(element.clone(), key, seq));
        self.index.insert(element, slot);

        let pos = self.heap.len();
        self.heap.push(slot);
        self.sift_up(pos);

        if let Some(entry) = self.entries[slot].as_ref() {
            self.observer.on_change(entry.element(), None, Some(entry.key()));
        }
        self.maybe_compact();
    }

    /// Untracks `element`. Returns whether it was tracked.
    pub fn delete(&mut self, element: &T) -> bool {
        let Some(slot) = self.index.remove(element) else {
            self.observer.on_change(element, None, None);
            return false;
        };
        if let Some(entry) = self.entries[slot].as_mut() {
            entry.invalidate();
            self.stale += 1;
            self.observer.on_change(entry.element(), Some(entry.key()), None);
        }
        self.maybe_compact();
        true
    }

    /// Removes and returns the element with the smallest key.
    pub fn pop(&mut self) -> Option<(T, K)> {
        self.prune_stale_root();
        let entry = self.remove_root()?;
        self.index.remove(entry.element());
        let (element, key) = entry.into_parts();
        self.observer.on_change(&element, Some(&key), None);
        Some((element, key))
    }

    /// Returns the element with the smallest key without untracking it.
    /// Stale entries sitting at the root are discarded first.
    pub fn peek(&mut self) -> Option<(&T, &K)> {
        self.prune_stale_root();
        let slot = *self.heap.first()?;
        self.entries[slot]
            .as_ref()
            .map(|entry| (entry.element(), entry.key()))
    }

    /// Untracks everything, reporting each tracked element to the observer.
    pub fn clear(&mut self) {
        for (_, slot) in self.index.drain() {
            if let Some(entry) = self.entries[slot].take() {
                self.observer.on_change(entry.element(), Some(entry.key()), None);
            }
        }
        self.entries.clear();
        self.free_slots.clear();
        self.heap.clear();
        self.stale = 0;
    }

    /// Drops every stale entry and rebuilds the heap in linear time.
    pub fn compact(&mut self) {
        if self.stale == 0 {
            return;
        }
        let before = self.heap.len();
        let entries = &mut self.entries;
        let free_slots = &mut self.free_slots;
        self.heap.retain(|&slot| {
            if entries[slot].as_ref().is_some_and(Entry::is_valid) {
                true
            } else {
                entries[slot] = None;
                free_slots.push(slot);
                false
            }
        });
        self.stale = 0;
        for pos in (0..self.heap.len() / 2).rev() {
            self.sift_down(pos);
        }
        trace!(
            removed = before - self.heap.len(),
            live = self.heap.len(),
            "compacted adaptable heap"
        );
    }

    /// Verifies heap order, index/arena agreement and stale accounting.
    pub fn check_invariants(&self) -> Result<()> {
        for (element, &slot) in &self.index {
            match self.entries.get(slot).and_then(Option::as_ref) {
                Some(entry) if entry.is_valid() && entry.element() == element => {}
                _ => {
                    return Err(Error::Invariant(format!(
                        "index slot {slot} does not hold a valid entry for its element"
                    )))
                }
            }
        }

        let valid = self
            .heap
            .iter()
            .filter(|&&slot| self.entries[slot].as_ref().is_some_and(Entry::is_valid))
            .count();
        if valid != self.index.len() {
            return Err(Error::Invariant(format!(
                "{valid} valid entries in the heap but {} indexed elements",
                self.index.len()
            )));
        }
        if self.heap.len() - valid != self.stale {
            return Err(Error::Invariant(format!(
                "stale count {} does not match {} stale entries",
                self.stale,
                self.heap.len() - valid
            )));
        }
        if self.heap.len() + self.free_slots.len() != self.entries.len() {
            return Err(Error::Invariant(format!(
                "{} heap slots and {} free slots do not cover {} arena slots",
                self.heap.len(),
                self.free_slots.len(),
                self.entries.len()
            )));
        }
        for pos in 1..self.heap.len() {
            if self.less(pos, Self::parent(pos)) {
                return Err(Error::Invariant(format!(
                    "heap order violated between position {pos} and its parent"
                )));
            }
        }
        Ok(())
    }

    fn maybe_compact(&mut self) {
        if self.stale > STALE_FLOOR && self.stale > self.index.len() {
            self.compact();
        }
    }

    fn prune_stale_root(&mut self) {
        while let Some(&slot) = self.heap.first() {
            if self.entries[slot].as_ref().is_some_and(Entry::is_valid) {
                break;
            }
            if self.remove_root().is_some() {
                self.stale -= 1;
            }
            trace!(stale = self.stale, "discarded stale entry at heap root");
        }
    }

    fn alloc(&mut self, entry: Entry<T, K>) -> usize {
        if let Some(slot) = self.free_slots.pop() {
            self.entries[slot] = Some(entry);
            slot
        } else {
            self.entries.push(Some(entry));
            self.entries.len() - 1
        }
    }

    fn remove_root(&mut self) -> Option<Entry<T, K>> {
        if self.heap.is_empty() {
            return None;
        }
        let slot = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        self.free_slots.push(slot);
        self.entries[slot].take()
    }

    // Binary heap helper methods using Eytzinger layout (0-based indexing)
    fn parent(i: usize) -> usize { (i - 1) >> 1 }
    fn left(i: usize) -> usize { 2 * i + 1 }
    fn right(i: usize) -> usize { 2 * i + 2 }

    fn less(&self, a: usize, b: usize) -> bool {
        let (Some(x), Some(y)) = (
            self.entries[self.heap[a]].as_ref(),
            self.entries[self.heap[b]].as_ref(),
        ) else {
            return false;
        };
        match x.key().partial_cmp(y.key()) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => x.seq() < y.seq(),
            _ => false,
        }
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = Self::parent(pos);
            if self.less(pos, parent) {
                self.heap.swap(parent, pos);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let mut smallest = pos;
            let left = Self::left(pos);
            let right = Self::right(pos);

            if left < self.heap.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }

            if smallest == pos {
                break;
            }

            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }
}

impl<T, K, O> fmt::Debug for AdaptableHeap<T, K, O>
where
    T: fmt::Debug,
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&K> = self
            .heap
            .iter()
            .filter_map(|&slot| self.entries[slot].as_ref().map(Entry::key))
            .collect();
        let tracked: Vec<&T> = self.index.keys().collect();
        f.debug_struct("AdaptableHeap")
            .field("heap", &keys)
            .field("tracked", &tracked)
            .field("stale", &self.stale)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{mock, predicate::eq, Sequence};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    mock! {
        Sink {
            fn event(&mut self, element: String, old: Option<i32>, new: Option<i32>);
        }
    }

    impl ChangeObserver<&'static str, i32> for MockSink {
        fn on_change(&mut self, element: &&'static str, old: Option<&i32>, new: Option<&i32>) {
            self.event(element.to_string(), old.copied(), new.copied())
        }
    }

    fn drain<T, K, O>(heap: &mut AdaptableHeap<T, K, O>) -> Vec<T>
    where
        T: Hash + Eq + Clone,
        K: PartialOrd,
        O: ChangeObserver<T, K>,
    {
        std::iter::from_fn(|| heap.pop().map(|(element, _)| element)).collect()
    }

    #[test]
    fn test_push_and_pop_order() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("x", 3).unwrap();
        heap.push_or_update("y", 1).unwrap();
        heap.push_or_update("z", 2).unwrap();

        assert_eq!(heap.pop(), Some(("y", 1)));
        assert_eq!(heap.pop(), Some(("z", 2)));
        assert_eq!(heap.pop(), Some(("x", 3)));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_priority_update() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("alpha", 10).unwrap();
        heap.push_or_update("beta", 20).unwrap();
        heap.push_or_update("alpha", 5).unwrap();

        assert_eq!(heap.len(), 2);
        assert_eq!(heap.heap_len(), 3);
        assert_eq!(heap.stale_len(), 1);
        assert_eq!(heap.pop(), Some(("alpha", 5)));
        assert_eq!(heap.pop(), Some(("beta", 20)));
        assert_eq!(heap.pop(), None);
        assert_eq!(heap.heap_len(), 0);
    }

    #[test]
    fn test_upsert_replaces_not_duplicates() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("item", 100).unwrap();
        heap.push_or_update("item", 50).unwrap();
        heap.push_or_update("item", 200).unwrap();

        assert_eq!(heap.len(), 1);
        assert_eq!(heap.key_of("item"), Some(&200));
        assert_eq!(heap.pop(), Some(("item", 200)));
        assert_eq!(heap.pop(), None);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_accumulation_of_invalid_entries() {
        let mut heap = AdaptableHeap::new();
        for i in 0..100 {
            heap.push_or_update("dup", i).unwrap();
            assert_eq!(heap.len(), 1);
        }
        assert!(heap.heap_len() <= 2 * STALE_FLOOR);
        heap.check_invariants().unwrap();

        assert_eq!(heap.pop(), Some(("dup", 99)));
        assert_eq!(heap.pop(), None);
        assert_eq!(heap.len(), 0);
    }

    #[test]
    fn test_equal_keys_all_popped() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("a", 10).unwrap();
        heap.push_or_update("b", 10).unwrap();

        let popped: HashSet<_> = drain(&mut heap).into_iter().collect();
        assert_eq!(popped, HashSet::from(["a", "b"]));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_equal_keys_pop_in_insertion_order() {
        let mut heap = AdaptableHeap::new();
        for name in ["c", "a", "d", "b"] {
            heap.push_or_update(name, 7).unwrap();
        }
        assert_eq!(drain(&mut heap), vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn test_interleaved_updates() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("x", 10).unwrap();
        heap.push_or_update("y", 20).unwrap();
        heap.push_or_update("x", 5).unwrap();
        heap.push_or_update("z", 15).unwrap();

        assert_eq!(drain(&mut heap), vec!["x", "z", "y"]);
    }

    #[test]
    fn test_delete_existing() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("a", 10).unwrap();
        heap.push_or_update("b", 20).unwrap();
        heap.push_or_update("c", 15).unwrap();

        assert!(heap.delete(&"b"));
        assert_eq!(heap.len(), 2);
        assert!(!heap.contains("b"));
        assert_eq!(drain(&mut heap), vec!["a", "c"]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("x", 5).unwrap();
        heap.push_or_update("y", 6).unwrap();

        assert!(heap.delete(&"x"));
        assert!(!heap.delete(&"x"));
        assert!(!heap.delete(&"nonexistent"));
        assert_eq!(heap.len(), 1);
        heap.check_invariants().unwrap();
        assert_eq!(heap.pop(), Some(("y", 6)));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_delete_after_multiple_updates() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("dup", 100).unwrap();
        heap.push_or_update("dup", 50).unwrap();
        heap.push_or_update("dup", 200).unwrap();

        heap.delete(&"dup");
        assert_eq!(heap.len(), 0);
        assert_eq!(heap.pop(), None);
        assert_eq!(heap.heap_len(), 0);
    }

    #[test]
    fn test_membership() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("apple".to_string(), 5).unwrap();
        heap.push_or_update("banana".to_string(), 3).unwrap();
        assert!(heap.contains("apple"));
        assert!(heap.contains("banana"));
        assert!(!heap.contains("cherry"));

        let (popped, _) = heap.pop().unwrap();
        assert_eq!(popped, "banana");
        assert!(!heap.contains("banana"));

        heap.delete(&"apple".to_string());
        assert!(!heap.contains("apple"));
    }

    #[test]
    fn test_peek_skips_stale_root() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("a", 1).unwrap();
        heap.push_or_update("b", 2).unwrap();
        heap.delete(&"a");

        assert_eq!(heap.peek(), Some((&"b", &2)));
        assert_eq!(heap.stale_len(), 0);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.pop(), Some(("b", 2)));
        assert_eq!(heap.peek(), None);
    }

    #[test]
    fn test_nan_key_rejected() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("a", 1.0).unwrap();
        let err = heap.push_or_update("a", f64::NAN).unwrap_err();
        assert!(matches!(err, Error::IncomparableKey));
        assert_eq!(heap.key_of("a"), Some(&1.0));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_compact_removes_stale_entries() {
        let mut heap = AdaptableHeap::new();
        for i in 0..20 {
            heap.push_or_update(i, i).unwrap();
        }
        for i in (0..20).step_by(2) {
            heap.delete(&i);
        }
        assert_eq!(heap.stale_len(), 10);

        heap.compact();
        assert_eq!(heap.stale_len(), 0);
        assert_eq!(heap.heap_len(), 10);
        heap.check_invariants().unwrap();
        assert_eq!(drain(&mut heap), (1..20).step_by(2).collect::<Vec<_>>());
    }

    #[test]
    fn test_automatic_compaction_bounds_stale_entries() {
        let mut heap = AdaptableHeap::new();
        for i in 0..1_000 {
            heap.push_or_update(i % 10, i).unwrap();
        }
        assert_eq!(heap.len(), 10);
        assert!(heap.stale_len() <= STALE_FLOOR + 1);
        heap.check_invariants().unwrap();
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut heap = AdaptableHeap::with_capacity(4);
        heap.push_or_update("a", 1).unwrap();
        heap.push_or_update("b", 2).unwrap();
        heap.push_or_update("a", 3).unwrap();
        heap.clear();

        assert!(heap.is_empty());
        assert_eq!(heap.heap_len(), 0);
        heap.push_or_update("c", 0).unwrap();
        assert_eq!(heap.pop(), Some(("c", 0)));
    }

    #[test]
    fn test_iter_lists_only_valid_entries() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("a", 1).unwrap();
        heap.push_or_update("b", 2).unwrap();
        heap.push_or_update("a", 3).unwrap();

        let mut items: Vec<_> = heap.iter().map(|(e, k)| (*e, *k)).collect();
        items.sort_unstable();
        assert_eq!(items, vec![("a", 3), ("b", 2)]);
    }

    #[test]
    fn test_debug_output() {
        let mut heap = AdaptableHeap::new();
        heap.push_or_update("a", 1).unwrap();
        let rendered = format!("{heap:?}");
        assert!(rendered.starts_with("AdaptableHeap"));
        assert!(rendered.contains("\"a\""));
    }

    #[test]
    fn test_observer_event_sequence() {
        let mut sink = MockSink::new();
        let mut seq = Sequence::new();
        let mut expect = |element: &str, old: Option<i32>, new: Option<i32>| {
            sink.expect_event()
                .with(eq(element.to_string()), eq(old), eq(new))
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        };
        // insert
        expect("a", None, None);
        expect("a", None, Some(10));
        // update
        expect("a", Some(10), None);
        expect("a", None, Some(4));
        // delete of an untracked element
        expect("ghost", None, None);
        // pop
        expect("a", Some(4), None);

        let mut heap: AdaptableHeap<&'static str, i32, MockSink> =
            AdaptableHeap::new().with_observer(sink);
        heap.push_or_update("a", 10).unwrap();
        heap.push_or_update("a", 4).unwrap();
        heap.delete(&"ghost");
        assert_eq!(heap.pop(), Some(("a", 4)));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_closure_observer_sees_clear() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let mut heap: AdaptableHeap<&'static str, i32, _> = AdaptableHeap::new().with_observer(
            move |e: &&'static str, old: Option<&i32>, new: Option<&i32>| {
                sink.borrow_mut().push((*e, old.copied(), new.copied()));
            },
        );
        heap.push_or_update("a", 1).unwrap();
        heap.clear();

        assert_eq!(
            *RefCell::borrow(&log),
            vec![("a", None, None), ("a", None, Some(1)), ("a", Some(1), None)]
        );
    }

    #[test]
    fn test_randomized_against_sorted_model() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut heap = AdaptableHeap::new();
        let mut model: HashMap<u32, i64> = HashMap::new();

        for _ in 0..5_000 {
            let element = rng.random_range(0..64u32);
            match rng.random_range(0..10) {
                0..=5 => {
                    let key = rng.random_range(-1_000..1_000i64);
                    heap.push_or_update(element, key).unwrap();
                    model.insert(element, key);
                }
                6..=7 => {
                    assert_eq!(heap.delete(&element), model.remove(&element).is_some());
                }
                _ => {
                    let expected = model.iter().map(|(_, &k)| k).min();
                    let popped = heap.pop();
                    assert_eq!(popped.as_ref().map(|(_, k)| *k), expected);
                    if let Some((element, key)) = popped {
                        assert_eq!(model.remove(&element), Some(key));
                    }
                }
            }
            assert_eq!(heap.len(), model.len());
        }
        heap.check_invariants().unwrap();

        let mut previous = i64::MIN;
        while let Some((element, key)) = heap.pop() {
            assert!(key >= previous);
            assert_eq!(model.remove(&element), Some(key));
            previous = key;
        }
        assert!(model.is_empty());
    }
}
