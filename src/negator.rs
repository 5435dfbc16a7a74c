use std::cmp::Reverse;

/// An order-reversing key transform.
///
/// The selector keeps its excluded elements in a min-heap under the negated
/// key, so the best excluded element is always that heap's minimum.
/// `restore` must undo `negate` exactly, for every key the selector accepts.
pub trait KeyNegator<K> {
    type Negated: PartialOrd;

    fn negate(&self, key: K) -> Self::Negated;

    fn restore(&self, negated: Self::Negated) -> K;
}

/// Arithmetic negation of floating-point keys.
///
/// Only implemented for `f32` and `f64`, where negation is exact for every
/// value. Integer negation overflows on `MIN`; integers use the default
/// [`ReverseOrder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Negate;

macro_rules! negate_float {
    ($($ty:ty),*) => {
        $(
            impl KeyNegator<$ty> for Negate {
                type Negated = $ty;

                #[inline]
                fn negate(&self, key: $ty) -> $ty {
                    -key
                }

                #[inline]
                fn restore(&self, negated: $ty) -> $ty {
                    -negated
                }
            }
        )*
    };
}

negate_float!(f32, f64);

/// Reverses the ordering with [`Reverse`]; works for any ordered key and is
/// the selector's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReverseOrder;

impl<K: PartialOrd> KeyNegator<K> for ReverseOrder {
    type Negated = Reverse<K>;

    #[inline]
    fn negate(&self, key: K) -> Reverse<K> {
        Reverse(key)
    }

    #[inline]
    fn restore(&self, negated: Reverse<K>) -> K {
        negated.0
    }
}

/// A caller-supplied negation function. It must be an order-reversing
/// involution over every key passed to the selector: `f(f(k)) == k` and
/// `a < b` implies `f(b) < f(a)`. `i32::wrapping_neg` is not, since it maps
/// `i32::MIN` to itself.
#[derive(Debug, Clone, Copy)]
pub struct NegateWith<F>(pub F);

impl<K, F> KeyNegator<K> for NegateWith<F>
where
    K: PartialOrd,
    F: Fn(K) -> K,
{
    type Negated = K;

    #[inline]
    fn negate(&self, key: K) -> K {
        (self.0)(key)
    }

    #[inline]
    fn restore(&self, negated: K) -> K {
        (self.0)(negated)
    }
}
