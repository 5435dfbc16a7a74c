/// Receives every tracked/untracked transition of a heap.
///
/// `old` is the key the element held before the call (`None` if it was not
/// tracked) and `new` the key it holds afterwards (`None` if it is no longer
/// tracked). A call on an element that was not tracked and stays untracked is
/// reported as `(element, None, None)`.
///
/// Observers run synchronously inside the mutating call and must not touch
/// the heap that invokes them.
pub trait ChangeObserver<T, K> {
    fn on_change(&mut self, element: &T, old: Option<&K>, new: Option<&K>);
}

impl<T, K, F> ChangeObserver<T, K> for F
where
    F: FnMut(&T, Option<&K>, Option<&K>),
{
    #[inline]
    fn on_change(&mut self, element: &T, old: Option<&K>, new: Option<&K>) {
        self(element, old, new)
    }
}

/// Observer that ignores every event. Used when none is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<T, K> ChangeObserver<T, K> for NoopObserver {
    #[inline(always)]
    fn on_change(&mut self, _element: &T, _old: Option<&K>, _new: Option<&K>) {}
}
