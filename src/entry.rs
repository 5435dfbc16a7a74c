/// A tracked element paired with the key it held when it was inserted.
///
/// Entries are never re-keyed. An update invalidates the current entry and
/// inserts a fresh one; invalid entries stay in the heap array until a `pop`
/// reaches them.
pub(crate) struct Entry<T, K> {
    element: T,
    key: K,
    seq: u64,
    valid: bool,
}

impl<T, K> Entry<T, K> {
    pub(crate) fn new(element: T, key: K, seq: u64) -> Self {
        Self {
            element,
            key,
            seq,
            valid: true,
        }
    }

    #[inline]
    pub(crate) fn element(&self) -> &T {
        &self.element
    }

    #[inline]
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    /// Insertion sequence, used to break ties between equal keys.
    #[inline]
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }

    /// Marks the entry stale. There is no way back.
    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    pub(crate) fn into_parts(self) -> (T, K) {
        (self.element, self.key)
    }
}
