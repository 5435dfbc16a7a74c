use thiserror::Error;

/// Errors reported by the heap, the selector and the command reader.
///
/// Looking up or deleting an element that is not tracked is never an error;
/// those calls return `false` or `None` instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The key cannot be ordered against itself (e.g. `f64::NAN`) or against
    /// the keys already stored.
    #[error("key is not comparable with previously inserted keys")]
    IncomparableKey,

    #[error("invalid capacity {0}: capacity must be non-negative")]
    InvalidCapacity(i64),

    /// Returned by `check_invariants` when internal state is inconsistent.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
