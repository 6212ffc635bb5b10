//! CTL: the control block — pinned at file offset 0, the single source
//! of truth for layout and cross-process metrics.

use serde::{Deserialize, Serialize};

/// ASCII "PQUE" as a big-endian u32.
pub const MAGIC: u32 = 0x5051_5545;
/// On-disk format version this crate reads and writes.
pub const VERSION: u32 = 7;
/// Same value as [`MAGIC`]; kept distinct in the type system from the
/// write-count field it guards so a reader can tell a torn write-count
/// update from a genuinely absent one.
pub const WRITE_COUNT_MAGIC: u32 = MAGIC;
/// Guards the high-water / MVRT metrics block.
pub const METRICS_MAGIC: u32 = MAGIC.wrapping_add(1);
/// Guards the secondary metrics block (occupancy history).
pub const METRICS_MAGIC_2: u32 = MAGIC.wrapping_add(2);

/// The persisted control block. One instance lives at file offset 0;
/// every mutating API call rewrites it inside the control-block lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlBlock {
    pub magic: u32,
    pub version: u32,
    pub data_offset: u64,
    pub index_offset: u64,
    pub index_size: u64,
    pub data_size: u64,
    pub capacity: u32,
    pub align: u64,

    pub write_count_magic: u32,
    pub write_count: u32,

    pub metrics_magic: u32,
    pub high_water_bytes: u64,
    pub high_water_slots: u32,

    pub metrics_magic_2: u32,
    pub most_recent_insertion_ns: u64,
    /// Minimum virtual residence time observed across all evictions so
    /// far, in nanoseconds, or `None` if no eviction has occurred.
    pub mvrt_ns: Option<u64>,
    pub mvrt_bytes_in_use: u64,
    pub mvrt_slots_in_use: u32,

    pub full_queue: bool,
}

impl ControlBlock {
    /// Builds a fresh control block for a newly created queue.
    #[must_use]
    pub fn new(data_offset: u64, index_offset: u64, index_size: u64, data_size: u64, capacity: u32, align: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            data_offset,
            index_offset,
            index_size,
            data_size,
            capacity,
            align,
            write_count_magic: WRITE_COUNT_MAGIC,
            write_count: 1,
            metrics_magic: METRICS_MAGIC,
            high_water_bytes: 0,
            high_water_slots: 0,
            metrics_magic_2: METRICS_MAGIC_2,
            most_recent_insertion_ns: 0,
            mvrt_ns: None,
            mvrt_bytes_in_use: 0,
            mvrt_slots_in_use: 0,
            full_queue: false,
        }
    }

    /// Validates magic and version on open.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if either field does not match
    /// what this crate writes.
    pub fn validate(&self) -> crate::Result<()> {
        if self.magic != MAGIC {
            return Err(crate::Error::Corrupt(format!(
                "bad control block magic: {:#x}",
                self.magic
            )));
        }
        if self.version != VERSION {
            return Err(crate::Error::Corrupt(format!(
                "unsupported queue version {} (expected {VERSION})",
                self.version
            )));
        }
        Ok(())
    }

    /// Records a new eviction's residence time, updating MVRT if this
    /// eviction's residence time is the smallest seen so far.
    pub fn observe_eviction(&mut self, residence_ns: u64, bytes_in_use: u64, slots_in_use: u32) {
        let is_new_minimum = self.mvrt_ns.map_or(true, |current| residence_ns < current);
        if is_new_minimum {
            self.mvrt_ns = Some(residence_ns);
            self.mvrt_bytes_in_use = bytes_in_use;
            self.mvrt_slots_in_use = slots_in_use;
        }
    }
}
