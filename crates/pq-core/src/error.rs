use thiserror::Error;

/// Status codes for every fallible queue operation, expressed as a
/// `thiserror`-derived error enum.
///
/// Every public API function returns `Result<T, Error>`. None of them
/// panic on caller-reachable bad input; internal invariant violations are
/// caught by the `debug_assert_*!` macros in `invariants.rs` in debug
/// builds and surfaced as [`Error::Corrupt`] in release builds — the
/// queue is left read-accessible rather than aborting the process.
#[derive(Debug, Error)]
pub enum Error {
    /// A product with this signature is already present (`DUP`).
    #[error("duplicate signature")]
    Dup,

    /// The encoded product is larger than the data area (`BIG`).
    #[error("product size {size} exceeds data area size {data_size}")]
    Big {
        /// Encoded size of the rejected product.
        size: u64,
        /// Total size of the queue's data area.
        data_size: u64,
    },

    /// No entry matches the given key (`NOTFOUND`).
    #[error("not found")]
    NotFound,

    /// Sequencing reached the end of the queue in the requested direction (`END`).
    #[error("end of queue")]
    End,

    /// A structural invariant was violated; the queue remains readable (`CORRUPT`).
    #[error("corruption detected: {0}")]
    Corrupt(String),

    /// A platform I/O or OS-resource error; fatal to the current call only (`SYSTEM`).
    #[error("system error: {0}")]
    System(String),

    /// The target product is held by a `sequence_lock` lease (`LOCKED`).
    #[error("product is locked by an outstanding lease")]
    Locked,

    /// An argument was invalid for the requested operation (`INVAL`).
    #[error("invalid argument: {0}")]
    Inval(String),

    /// The queue has no room for this product and eviction could not free
    /// enough space: either the queue emptied out first ("out of memory")
    /// or only locked products remained, none large enough to evict.
    #[error("access denied: no evictable, unlocked products large enough")]
    Access,

    /// The skip-list node arena or signature table is exhausted; retry
    /// after products age out.
    #[error("resource exhausted: {0}")]
    Exhausted(String),

    /// A wrapped platform I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True if this error represents lock contention that a caller passing
    /// the no-wait flag should treat as transient: reported as "access
    /// denied" without a log entry.
    #[must_use]
    pub fn is_transient_contention(&self) -> bool {
        matches!(self, Error::Locked | Error::Access)
    }
}
