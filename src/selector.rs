use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use tracing::debug;

use crate::adaptable_heap::AdaptableHeap;
use crate::error::{Error, Result};
use crate::negator::{KeyNegator, ReverseOrder};
use crate::observer::{ChangeObserver, NoopObserver};

const MAX_PREALLOCATED: usize = 1 << 16;

/// Maintains the exact set of the `k` elements with the largest keys.
///
/// Tracked elements are split between two heaps. `retained` is a min-heap
/// holding at most `k` elements, so its root is the weakest retained element.
/// `overflow` holds everything else under negated keys, so its root is the
/// strongest excluded element. Once `retained` is full, every retained key is
/// at least as large as every excluded key.
///
/// An observer attached with [`with_observer`](Self::with_observer) sees every
/// change to the retained set, promotions and demotions included.
pub struct TopKSelector<T, K, O = NoopObserver, N = ReverseOrder>
where
    N: KeyNegator<K>,
{
    capacity: usize,
    negator: N,
    retained: AdaptableHeap<T, K, O>,
    overflow: AdaptableHeap<T, N::Negated>,
}

impl<T, K> TopKSelector<T, K>
where
    T: Hash + Eq + Clone,
    K: PartialOrd,
{
    /// Creates a selector for the top `capacity` elements. Excluded keys are
    /// ordered through [`ReverseOrder`], so every key value is accepted.
    pub fn new(capacity: usize) -> Self {
        Self::with_negator(capacity, ReverseOrder)
    }

    /// Like [`new`](Self::new), but rejects negative capacities.
    pub fn try_new(capacity: i64) -> Result<Self> {
        let capacity = usize::try_from(capacity).map_err(|_| Error::InvalidCapacity(capacity))?;
        Ok(Self::new(capacity))
    }
}

impl<T, K, N> TopKSelector<T, K, NoopObserver, N>
where
    T: Hash + Eq + Clone,
    K: PartialOrd,
    N: KeyNegator<K>,
{
    pub fn with_negator(capacity: usize, negator: N) -> Self {
        Self {
            capacity,
            negator,
            retained: AdaptableHeap::with_capacity(capacity.min(MAX_PREALLOCATED)),
            overflow: AdaptableHeap::new(),
        }
    }
}

impl<T, K, O, N> TopKSelector<T, K, O, N>
where
    T: Hash + Eq + Clone,
    K: PartialOrd,
    O: ChangeObserver<T, K>,
    N: KeyNegator<K>,
{
    pub fn with_observer<P>(self, observer: P) -> TopKSelector<T, K, P, N>
    where
        P: ChangeObserver<T, K>,
    {
        TopKSelector {
            capacity: self.capacity,
            negator: self.negator,
            retained: self.retained.with_observer(observer),
            overflow: self.overflow,
        }
    }

    /// The observer attached to the retained set.
    pub fn observer(&self) -> &O {
        self.retained.observer()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tracked elements, retained or not.
    pub fn len(&self) -> usize {
        self.retained.len() + self.overflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty() && self.overflow.is_empty()
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    /// Whether `element` is currently among the top `k`.
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.retained.contains(element)
    }

    /// Whether `element` is tracked at all.
    pub fn is_tracked<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.retained.contains(element) || self.overflow.contains(element)
    }

    /// The key `element` was last added with, whichever side it is on.
    pub fn key_of<Q>(&self, element: &Q) -> Option<K>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        K: Clone,
        N::Negated: Clone,
    {
        if let Some(key) = self.retained.key_of(element) {
            return Some(key.clone());
        }
        self.overflow
            .key_of(element)
            .map(|negated| self.negator.restore(negated.clone()))
    }

    /// The smallest retained key, once `k` elements are retained. Any key
    /// above it would enter the top `k`.
    pub fn threshold(&mut self) -> Option<&K> {
        if self.capacity == 0 || self.retained.len() < self.capacity {
            return None;
        }
        self.retained.peek().map(|(_, key)| key)
    }

    /// Retained elements, largest key first. Equal keys are listed in the
    /// order they were added.
    pub fn top(&self) -> Vec<(&T, &K)> {
        let mut entries: Vec<_> = self.retained.valid_entries().collect();
        entries.sort_unstable_by(|a, b| match b.key().partial_cmp(a.key()) {
            Some(Ordering::Equal) | None => a.seq().cmp(&b.seq()),
            Some(other) => other,
        });
        entries
            .into_iter()
            .map(|entry| (entry.element(), entry.key()))
            .collect()
    }

    /// Tracks `element` with `key`, moving it across the top-`k` boundary if
    /// its new key requires it.
    pub fn add_or_update(&mut self, element: T, key: K) -> Result<()> {
        self.retained.check_key(&key)?;
        self.delete(&element);
        self.retained.push_unchecked(element, key);
        if self.retained.len() > self.capacity {
            self.demote_weakest();
        }
        Ok(())
    }

    /// Untracks `element`. If it was retained, the best excluded element is
    /// promoted in its place. Returns whether it was tracked.
    pub fn delete(&mut self, element: &T) -> bool {
        if !self.retained.contains(element) {
            return self.overflow.delete(element);
        }
        self.retained.delete(element);
        self.promote_best();
        true
    }

    pub fn clear(&mut self) {
        self.retained.clear();
        self.overflow.clear();
    }

    /// Verifies both heaps, the partition sizes, disjointness and that no
    /// excluded key beats a retained one.
    pub fn check_invariants(&self) -> Result<()>
    where
        K: Clone,
        N::Negated: Clone,
    {
        self.retained.check_invariants()?;
        self.overflow.check_invariants()?;

        let expected = self.capacity.min(self.len());
        if self.retained.len() != expected {
            return Err(Error::Invariant(format!(
                "{} elements retained, expected {expected}",
                self.retained.len()
            )));
        }
        if self.retained.iter().any(|(e, _)| self.overflow.contains(e)) {
            return Err(Error::Invariant(
                "an element is both retained and excluded".to_string(),
            ));
        }

        let weakest_retained = min_key(self.retained.iter().map(|(_, k)| k));
        let best_excluded = min_key(self.overflow.iter().map(|(_, k)| k))
            .map(|negated| self.negator.restore(negated.clone()));
        if let (Some(retained), Some(excluded)) = (weakest_retained, best_excluded) {
            if retained.partial_cmp(&excluded) == Some(Ordering::Less) {
                return Err(Error::Invariant(
                    "an excluded key is larger than a retained key".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn demote_weakest(&mut self) {
        if let Some((element, key)) = self.retained.pop() {
            self.overflow
                .push_unchecked(element, self.negator.negate(key));
            debug!(
                retained = self.retained.len(),
                overflow = self.overflow.len(),
                "demoted weakest retained element"
            );
        }
    }

    fn promote_best(&mut self) {
        if let Some((element, negated)) = self.overflow.pop() {
            self.retained
                .push_unchecked(element, self.negator.restore(negated));
            debug!(
                retained = self.retained.len(),
                overflow = self.overflow.len(),
                "promoted best excluded element"
            );
        }
    }
}

fn min_key<'a, K: PartialOrd + 'a>(keys: impl Iterator<Item = &'a K>) -> Option<&'a K> {
    keys.fold(None, |min, key| match min {
        Some(current) if key.partial_cmp(current) != Some(Ordering::Less) => Some(current),
        _ => Some(key),
    })
}

impl<T, K, O, N> fmt::Debug for TopKSelector<T, K, O, N>
where
    T: fmt::Debug,
    K: fmt::Debug,
    N: KeyNegator<K>,
    N::Negated: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopKSelector")
            .field("k", &self.capacity)
            .field("retained", &self.retained)
            .field("overflow", &self.overflow)
            .finish()
    }
}
