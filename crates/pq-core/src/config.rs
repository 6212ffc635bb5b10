/// Options for [`crate::Queue::create`], following a `const fn new` +
/// `assert!`-validation + `Default` pattern.
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// Unix file mode bits for the new queue file (e.g. `0o600`).
    pub mode: u32,
    /// Fail with [`crate::Error::Inval`] if the file already exists.
    pub no_clobber: bool,
    /// Region alignment unit in bytes. Rounded up to `sizeof(f64)` (8) if
    /// smaller.
    pub align: u64,
    /// Size in bytes of the product data area.
    pub data_size: u64,
    /// Maximum number of regions (products plus free fragments) the queue
    /// can track simultaneously (`nalloc`).
    pub capacity: u32,
}

impl CreateOptions {
    /// Creates a new set of create-time options.
    ///
    /// # Panics
    ///
    /// Panics if `data_size` or `capacity` is zero: fail-fast validation
    /// of construction parameters that can never be sensibly zero.
    #[must_use]
    pub const fn new(mode: u32, align: u64, data_size: u64, capacity: u32) -> Self {
        assert!(data_size > 0, "data_size must be > 0");
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            mode,
            no_clobber: false,
            align,
            data_size,
            capacity,
        }
    }

    /// Builder-style toggle for the no-clobber flag.
    #[must_use]
    pub const fn no_clobber(mut self, value: bool) -> Self {
        self.no_clobber = value;
        self
    }

    /// Returns the effective alignment: `align` rounded up to `sizeof(f64)`.
    #[must_use]
    pub const fn effective_align(&self) -> u64 {
        const MIN_ALIGN: u64 = std::mem::size_of::<f64>() as u64;
        if self.align < MIN_ALIGN {
            MIN_ALIGN
        } else {
            self.align
        }
    }
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self::new(0o600, 8, 16 * 1024 * 1024, 256)
    }
}

/// Flags controlling how an existing queue is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Open for writing (increments the write-count); otherwise read-only.
    pub writable: bool,
}

impl OpenFlags {
    /// Read-only open.
    pub const READ_ONLY: Self = Self { writable: false };
    /// Read-write open.
    pub const READ_WRITE: Self = Self { writable: true };
}

/// Backing-store mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingMode {
    /// The whole file is mapped with a single shared `mmap`.
    WholeFile,
    /// Each region is mapped individually for the duration of the call.
    PerRegion,
    /// No mapping; `pread`/`pwrite` through a heap buffer.
    ReadWrite,
}

/// A queue too large to usefully map whole: per-region mapping still
/// bounds the VA footprint to the working set rather than the full file.
pub const WHOLE_FILE_MAP_LIMIT: u64 = 1 << 34; // 16 GiB

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_sane() {
        let opts = CreateOptions::default();
        assert!(opts.data_size > 0);
        assert!(opts.capacity > 0);
        assert_eq!(opts.effective_align(), 8);
    }

    #[test]
    fn align_rounds_up_to_f64_size() {
        let opts = CreateOptions::new(0o600, 1, 4096, 8);
        assert_eq!(opts.effective_align(), 8);
    }

    #[test]
    #[should_panic(expected = "data_size must be > 0")]
    fn zero_data_size_panics() {
        let _ = CreateOptions::new(0o600, 8, 0, 8);
    }
}
