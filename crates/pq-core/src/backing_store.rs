//! BS: the view of the backing file, in one of three interchangeable
//! modes chosen at open time.
//!
//! Grounded on the pack's shared-memory conventions (other example
//! manifests reach for `memmap2` for exactly this "map once, hand out
//! interior slices" pattern): whole-file and per-region mapping both use
//! `memmap2::MmapMut`; the read/write fallback uses `pread`/`pwrite`
//! through a heap buffer when mapping is unavailable or disabled.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;

use memmap2::MmapMut;

use crate::config::{BackingMode, WHOLE_FILE_MAP_LIMIT};
use crate::lockfile::{self, LockRange, WaitPolicy};

/// A region handle returned by [`BackingStore::get`]; release it with
/// [`BackingStore::release`] to unmap/flush and drop the file-range lock.
pub struct RegionHandle {
    offset: u64,
    len: u64,
    buf: RegionBuf,
    writable: bool,
}

enum RegionBuf {
    /// Interior slice of the whole-file map; nothing to unmap on release.
    WholeFileSlice,
    /// Its own mapping, unmapped on release.
    PerRegionMap(MmapMut),
    /// A heap buffer, `pwrite`n back on release if writable.
    Heap(Vec<u8>),
}

impl RegionHandle {
    /// Mutable view of the region's bytes.
    pub fn as_mut_slice<'a>(&'a mut self, whole_file: Option<&'a mut MmapMut>) -> &'a mut [u8] {
        match (&mut self.buf, whole_file) {
            (RegionBuf::WholeFileSlice, Some(map)) => {
                let start = self.offset as usize;
                let end = start + self.len as usize;
                &mut map[start..end]
            }
            (RegionBuf::PerRegionMap(map), _) => &mut map[..],
            (RegionBuf::Heap(buf), _) => &mut buf[..],
            (RegionBuf::WholeFileSlice, None) => {
                unreachable!("whole-file slice requires the whole-file map")
            }
        }
    }

    /// Immutable view of the region's bytes.
    #[must_use]
    pub fn as_slice<'a>(&'a self, whole_file: Option<&'a MmapMut>) -> &'a [u8] {
        match (&self.buf, whole_file) {
            (RegionBuf::WholeFileSlice, Some(map)) => {
                let start = self.offset as usize;
                let end = start + self.len as usize;
                &map[start..end]
            }
            (RegionBuf::PerRegionMap(map), _) => &map[..],
            (RegionBuf::Heap(buf), _) => &buf[..],
            (RegionBuf::WholeFileSlice, None) => {
                unreachable!("whole-file slice requires the whole-file map")
            }
        }
    }
}

/// The chosen view over the backing file.
pub struct BackingStore {
    file: File,
    mode: BackingMode,
    whole_file_map: Option<MmapMut>,
}

impl BackingStore {
    /// Opens `file`, picking whole-file mapping when the file fits under
    /// [`WHOLE_FILE_MAP_LIMIT`], falling back to per-region mapping, and
    /// finally to `pread`/`pwrite` if the initial map attempt fails.
    pub fn open(file: File, file_len: u64, disable_mmap: bool) -> io::Result<Self> {
        if disable_mmap {
            return Ok(Self {
                file,
                mode: BackingMode::ReadWrite,
                whole_file_map: None,
            });
        }
        if file_len <= WHOLE_FILE_MAP_LIMIT {
            match unsafe { MmapMut::map_mut(&file) } {
                Ok(map) => {
                    return Ok(Self {
                        file,
                        mode: BackingMode::WholeFile,
                        whole_file_map: Some(map),
                    })
                }
                Err(_) => {
                    return Ok(Self {
                        file,
                        mode: BackingMode::PerRegion,
                        whole_file_map: None,
                    })
                }
            }
        }
        Ok(Self {
            file,
            mode: BackingMode::PerRegion,
            whole_file_map: None,
        })
    }

    /// The mode this store ended up in.
    #[must_use]
    pub fn mode(&self) -> BackingMode {
        self.mode
    }

    /// Locks and retrieves the region `[offset, offset+len)`, per the
    /// mode selected at open time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Locked`] under [`WaitPolicy::NoWait`] on
    /// contention, [`crate::Error::Io`] for any other I/O failure.
    pub fn get(&mut self, offset: u64, len: u64, writable: bool, wait: WaitPolicy) -> crate::Result<RegionHandle> {
        let range = LockRange { offset, len };
        if writable {
            lockfile::lock_exclusive(self.file.as_raw_fd(), range, wait)?;
        } else {
            lockfile::lock_shared(self.file.as_raw_fd(), range, wait)?;
        }

        let buf = match self.mode {
            BackingMode::WholeFile => RegionBuf::WholeFileSlice,
            BackingMode::PerRegion => {
                let map = unsafe {
                    memmap2::MmapOptions::new()
                        .offset(offset)
                        .len(len as usize)
                        .map_mut(&self.file)
                        .map_err(crate::Error::Io)?
                };
                RegionBuf::PerRegionMap(map)
            }
            BackingMode::ReadWrite => {
                let mut heap = vec![0u8; len as usize];
                self.file.read_exact_at(&mut heap, offset).map_err(crate::Error::Io)?;
                RegionBuf::Heap(heap)
            }
        };

        Ok(RegionHandle {
            offset,
            len,
            buf,
            writable,
        })
    }

    /// Borrows the whole-file map, if that is the active mode —
    /// required to materialize a [`RegionHandle`]'s slice.
    pub fn whole_file_map_mut(&mut self) -> Option<&mut MmapMut> {
        self.whole_file_map.as_mut()
    }

    /// Flushes (if writable and heap-backed) and unlocks a region
    /// previously obtained from [`Self::get`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the flush write fails.
    pub fn release(&mut self, handle: RegionHandle) -> crate::Result<()> {
        if let RegionBuf::Heap(buf) = &handle.buf {
            if handle.writable {
                self.file.write_all_at(buf, handle.offset).map_err(crate::Error::Io)?;
            }
        }
        let range = LockRange {
            offset: handle.offset,
            len: handle.len,
        };
        lockfile::unlock(self.file.as_raw_fd(), range)?;
        Ok(())
    }

    /// Flushes the whole-file map to disk, if that mode is active.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on a flush failure.
    pub fn flush(&mut self) -> crate::Result<()> {
        if let Some(map) = &mut self.whole_file_map {
            map.flush().map_err(crate::Error::Io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    fn make_file(len: u64) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.seek(SeekFrom::Start(len - 1)).unwrap();
        file.write_all(&[0]).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file
    }

    #[test]
    fn whole_file_mode_chosen_for_small_files() {
        let file = make_file(4096);
        let store = BackingStore::open(file, 4096, false).unwrap();
        assert_eq!(store.mode(), BackingMode::WholeFile);
    }

    #[test]
    fn read_write_mode_forced_when_mmap_disabled() {
        let file = make_file(4096);
        let store = BackingStore::open(file, 4096, true).unwrap();
        assert_eq!(store.mode(), BackingMode::ReadWrite);
    }

    #[test]
    fn read_write_region_round_trips_through_pwrite() {
        let file = make_file(4096);
        let mut store = BackingStore::open(file, 4096, true).unwrap();
        let mut handle = store.get(0, 16, true, WaitPolicy::Wait).unwrap();
        handle.as_mut_slice(None).copy_from_slice(&[7u8; 16]);
        store.release(handle).unwrap();

        let handle = store.get(0, 16, false, WaitPolicy::Wait).unwrap();
        assert_eq!(handle.as_slice(None), &[7u8; 16]);
        store.release(handle).unwrap();
    }
}
