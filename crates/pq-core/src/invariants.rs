//! Debug assertion macros for product-queue invariants.
//!
//! These macros provide runtime checks for the structural invariants that
//! hold across the region table, time index, and node arena. They are
//! only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// INV-REGION-01: Slot Conservation
// =============================================================================

/// Assert that `nelems + nfree + nempty == nalloc`.
///
/// Used in: `RegionTable` after every allocate/free/split/coalesce.
macro_rules! debug_assert_slot_conservation {
    ($nelems:expr, $nfree:expr, $nempty:expr, $nalloc:expr) => {
        debug_assert_eq!(
            $nelems + $nfree + $nempty,
            $nalloc,
            "INV-REGION-01 violated: nelems({}) + nfree({}) + nempty({}) != nalloc({})",
            $nelems,
            $nfree,
            $nempty,
            $nalloc
        )
    };
}

// =============================================================================
// INV-REGION-02: Coalescing
// =============================================================================

/// Assert that two offset-adjacent free regions are never physically
/// contiguous (they should have been merged).
macro_rules! debug_assert_not_contiguous {
    ($lo_offset:expr, $lo_extent:expr, $hi_offset:expr) => {
        debug_assert!(
            $lo_offset + $lo_extent < $hi_offset,
            "INV-REGION-02 violated: free regions [{}, {}) and starting at {} are contiguous",
            $lo_offset,
            $lo_offset + $lo_extent,
            $hi_offset
        )
    };
}

// =============================================================================
// INV-REGION-03: Alignment
// =============================================================================

/// Assert that a region's extent is a multiple of the control-block alignment.
macro_rules! debug_assert_aligned_extent {
    ($extent:expr, $align:expr) => {
        debug_assert!(
            $extent % $align == 0,
            "INV-REGION-03 violated: extent {} is not a multiple of alignment {}",
            $extent,
            $align
        )
    };
}

// =============================================================================
// INV-TIME-01: Monotonic Uniqueness
// =============================================================================

/// Assert that a newly assigned time-entry key is strictly greater than the
/// previous most-recent insertion time.
macro_rules! debug_assert_time_monotonic {
    ($new_key:expr, $prev_key:expr) => {
        debug_assert!(
            $new_key > $prev_key,
            "INV-TIME-01 violated: new time key {:?} did not advance past {:?}",
            $new_key,
            $prev_key
        )
    };
}

// =============================================================================
// INV-ARENA-01: Block Shape
// =============================================================================

/// Assert that a forward-pointer block handed out by the node arena has
/// exactly `level + 1` entries.
macro_rules! debug_assert_block_shape {
    ($block:expr, $level:expr) => {
        debug_assert_eq!(
            $block.len(),
            $level + 1,
            "INV-ARENA-01 violated: block has {} entries, expected {}",
            $block.len(),
            $level + 1
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_aligned_extent;
pub(crate) use debug_assert_block_shape;
pub(crate) use debug_assert_not_contiguous;
pub(crate) use debug_assert_slot_conservation;
pub(crate) use debug_assert_time_monotonic;
