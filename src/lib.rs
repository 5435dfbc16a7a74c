//! Exact dynamic top-K selection over elements whose keys change.
//!
//! [`TopKSelector`] keeps the `k` elements with the largest keys while
//! elements are added, re-keyed and deleted in any order. It is built from two
//! [`AdaptableHeap`]s, binary min-heaps that re-key and remove elements by
//! lazily invalidating their entries instead of searching the heap array.
//!
//! ```
//! use adaptable_topk::TopKSelector;
//!
//! let mut top = TopKSelector::new(3);
//! for (name, score) in [("a", 10), ("b", 20), ("c", 15), ("d", 5), ("e", 25)] {
//!     top.add_or_update(name, score).unwrap();
//! }
//! assert!(top.contains("e"));
//! assert!(!top.contains("a"));
//!
//! top.delete(&"e");
//! assert!(top.contains("a"));
//! ```
//!
//! Neither structure is thread-safe; wrap it in a lock to share it.

mod adaptable_heap;
pub use adaptable_heap::AdaptableHeap;

mod selector;
pub use selector::TopKSelector;

mod negator;
pub use negator::{KeyNegator, Negate, NegateWith, ReverseOrder};

mod observer;
pub use observer::{ChangeObserver, NoopObserver};

pub mod command;
pub mod error;
pub use error::{Error, Result};

mod entry;
