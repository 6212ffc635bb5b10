//! Shared region identifiers and metadata used by the allocator, time
//! index, and signature index alike.

use serde::{Deserialize, Serialize};

/// Identifies a region (in-use or free) inside the data area. Stable for
/// the lifetime of the region; reused once freed and reallocated.
pub type RegionId = u32;

/// Sentinel "no region" value.
pub const NO_REGION: RegionId = u32::MAX;

/// Metadata describing one contiguous span of the data area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionMeta {
    /// Byte offset from the start of the data area.
    pub offset: u64,
    /// Length in bytes, always a multiple of the queue's alignment.
    pub extent: u64,
    /// `false` for a free fragment tracked only for allocation purposes.
    pub in_use: bool,
}

impl RegionMeta {
    /// Byte offset one past the end of this region.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.extent
    }
}
