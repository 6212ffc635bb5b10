//! The public API surface: `Queue::create`/`open`/`close` and every
//! operation in between.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alloc::RegionTable;
use crate::backing_store::BackingStore;
use crate::config::{CreateOptions, OpenFlags};
use crate::control::ControlBlock;
use crate::cursor::{Cursor, Direction};
use crate::lockfile::WaitPolicy;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::product::{self, Product, ProductMetadata, RecordHeader};
use crate::region::RegionId;
use crate::reservation::Reservation;
use crate::riu::InUseTable;
use crate::signal::{self, CriticalSection};
use crate::sigindex::{Signature, SignatureIndex};
use crate::timeindex::TimeIndex;

const PAGE_SIZE: u64 = 4096;

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    regions: Vec<(RegionId, crate::region::RegionMeta)>,
    signatures: Vec<(Signature, RegionId)>,
    time_entries: Vec<(u64, RegionId)>,
}

/// A handle to an open product queue.
pub struct Queue {
    path: PathBuf,
    file: File,
    control: ControlBlock,
    regions: RegionTable,
    time_index: TimeIndex,
    sig_index: SignatureIndex,
    store: BackingStore,
    riu: InUseTable,
    metrics: Metrics,
    cursor: Cursor,
    writable: bool,
    seed: u64,
}

impl Queue {
    /// Creates a new queue file at `path`. Fails if the file exists and
    /// `options.no_clobber` is set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Inval`] if `options.no_clobber` is set and
    /// the file exists, or [`crate::Error::Io`] for any other filesystem
    /// failure.
    pub fn create(path: impl AsRef<Path>, options: CreateOptions) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut open_options = OpenOptions::new();
        open_options.read(true).write(true).create(true);
        if options.no_clobber {
            open_options.create_new(true);
        } else {
            open_options.truncate(true);
        }
        let mut file = open_options.open(&path).map_err(|e| {
            if options.no_clobber && e.kind() == std::io::ErrorKind::AlreadyExists {
                crate::Error::Inval(format!("{} already exists", path.display()))
            } else {
                crate::Error::Io(e)
            }
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(options.mode);
            let _ = file.set_permissions(perms);
        }

        let align = options.effective_align();
        let data_offset = PAGE_SIZE;
        let index_offset = data_offset + options.data_size;
        let index_size = estimate_index_size(options.capacity);
        let file_len = index_offset + index_size;
        file.set_len(file_len).map_err(crate::Error::Io)?;

        let control = ControlBlock::new(data_offset, index_offset, index_size, options.data_size, options.capacity, align);
        let seed = options.data_size ^ u64::from(options.capacity);
        let regions = RegionTable::new(options.data_size, options.capacity, align, seed);
        let time_index = TimeIndex::new(options.capacity as usize, seed.wrapping_add(1));
        let sig_index = SignatureIndex::new(options.capacity);

        let store = BackingStore::open(file.try_clone().map_err(crate::Error::Io)?, file_len, false).map_err(crate::Error::Io)?;

        let mut queue = Self {
            path,
            file,
            control,
            regions,
            time_index,
            sig_index,
            store,
            riu: InUseTable::new(),
            metrics: Metrics::default(),
            cursor: Cursor::unset(),
            writable: true,
            seed,
        };
        queue.persist()?;
        Ok(queue)
    }

    /// Opens an existing queue file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if the control block fails
    /// validation, [`crate::Error::Access`] if opened writable and the
    /// write-count is already at the implementation maximum, or
    /// [`crate::Error::Io`] for any filesystem failure.
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(flags.writable)
            .open(&path)
            .map_err(crate::Error::Io)?;

        let file_len = file.metadata().map_err(crate::Error::Io)?.len();
        let mut control_buf = vec![0u8; PAGE_SIZE as usize];
        file.seek(SeekFrom::Start(0)).map_err(crate::Error::Io)?;
        file.read_exact(&mut control_buf).map_err(crate::Error::Io)?;
        let mut control: ControlBlock = bincode::deserialize(&control_buf)
            .map_err(|e| crate::Error::Corrupt(format!("control block decode failed: {e}")))?;
        control.validate()?;

        if flags.writable {
            const MAX_WRITE_COUNT: u32 = u32::MAX - 1;
            if control.write_count >= MAX_WRITE_COUNT {
                return Err(crate::Error::Access);
            }
        }

        file.seek(SeekFrom::Start(control.index_offset)).map_err(crate::Error::Io)?;
        let mut len_buf = [0u8; 8];
        file.read_exact(&mut len_buf).map_err(crate::Error::Io)?;
        let snapshot_len = u64::from_le_bytes(len_buf) as usize;
        let mut snapshot_buf = vec![0u8; snapshot_len];
        file.read_exact(&mut snapshot_buf).map_err(crate::Error::Io)?;
        let snapshot: IndexSnapshot = bincode::deserialize(&snapshot_buf)
            .map_err(|e| crate::Error::Corrupt(format!("index snapshot decode failed: {e}")))?;

        let seed = control.data_size ^ u64::from(control.capacity);
        let regions = RegionTable::restore(
            control.data_size,
            control.capacity,
            control.align,
            seed,
            snapshot.regions.into_iter().map(|(_, meta)| meta).collect(),
        );
        let time_index = TimeIndex::restore(control.capacity as usize, seed.wrapping_add(1), snapshot.time_entries)?;
        let sig_index = SignatureIndex::restore(control.capacity, snapshot.signatures);

        if flags.writable {
            control.write_count += 1;
        }

        let store = BackingStore::open(file.try_clone().map_err(crate::Error::Io)?, file_len, false).map_err(crate::Error::Io)?;

        let mut queue = Self {
            path,
            file,
            control,
            regions,
            time_index,
            sig_index,
            store,
            riu: InUseTable::new(),
            metrics: Metrics::default(),
            cursor: Cursor::unset(),
            writable: flags.writable,
            seed,
        };
        if flags.writable {
            queue.metrics.record_write_open();
            queue.persist_control_only()?;
        }
        Ok(queue)
    }

    /// Closes the queue, decrementing the write-count if it was opened
    /// writable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on a final flush failure.
    pub fn close(mut self) -> crate::Result<()> {
        if self.writable {
            self.control.write_count = self.control.write_count.saturating_sub(1);
            self.persist_control_only()?;
        }
        self.store.flush()
    }

    /// Path this queue was created or opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&mut self) -> crate::Result<()> {
        let _cs = CriticalSection::enter()?;
        let control_bytes = bincode::serialize(&self.control).map_err(|e| crate::Error::System(e.to_string()))?;
        debug_assert!((control_bytes.len() as u64) <= PAGE_SIZE);
        self.file.seek(SeekFrom::Start(0)).map_err(crate::Error::Io)?;
        self.file.write_all(&control_bytes).map_err(crate::Error::Io)?;

        // `regions` must tile the whole data area for
        // `RegionTable::restore`, so free fragments go in alongside the
        // in-use ones.
        let mut all_regions: Vec<_> = self.regions.in_use_iter().collect();
        all_regions.extend(self.free_region_snapshot());
        let snapshot = IndexSnapshot {
            regions: all_regions,
            signatures: self.sig_index.iter().collect(),
            time_entries: self.time_index.iter().collect(),
        };

        let snapshot_bytes = bincode::serialize(&snapshot).map_err(|e| crate::Error::System(e.to_string()))?;
        self.file.seek(SeekFrom::Start(self.control.index_offset)).map_err(crate::Error::Io)?;
        self.file.write_all(&(snapshot_bytes.len() as u64).to_le_bytes()).map_err(crate::Error::Io)?;
        self.file.write_all(&snapshot_bytes).map_err(crate::Error::Io)?;
        Ok(())
    }

    fn persist_control_only(&mut self) -> crate::Result<()> {
        let control_bytes = bincode::serialize(&self.control).map_err(|e| crate::Error::System(e.to_string()))?;
        self.file.seek(SeekFrom::Start(0)).map_err(crate::Error::Io)?;
        self.file.write_all(&control_bytes).map_err(crate::Error::Io)?;
        Ok(())
    }

    fn free_region_snapshot(&self) -> Vec<(RegionId, crate::region::RegionMeta)> {
        // RegionTable doesn't expose free fragments directly; rebuilding
        // them here from the complement of in-use regions keeps
        // `RegionTable` from needing a second, free-specific iterator
        // purely for persistence.
        let mut in_use: Vec<_> = self.regions.in_use_iter().collect();
        in_use.sort_by_key(|(_, m)| m.offset);
        let mut free = Vec::new();
        let mut cursor_offset = 0u64;
        let mut next_id = self.control.capacity;
        for (_, meta) in &in_use {
            if meta.offset > cursor_offset {
                next_id -= 1;
                free.push((
                    next_id,
                    crate::region::RegionMeta {
                        offset: cursor_offset,
                        extent: meta.offset - cursor_offset,
                        in_use: false,
                    },
                ));
            }
            cursor_offset = meta.end();
        }
        if cursor_offset < self.control.data_size {
            next_id -= 1;
            free.push((
                next_id,
                crate::region::RegionMeta {
                    offset: cursor_offset,
                    extent: self.control.data_size - cursor_offset,
                    in_use: false,
                },
            ));
        }
        free
    }

    fn encode_record(&self, header: &RecordHeader, data: &[u8]) -> crate::Result<Vec<u8>> {
        product::encode(header, data)
    }

    /// Encodes and inserts `item`, evicting the oldest unlocked products
    /// as needed to make room, signaling consumers on success.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Dup`] if `item.signature` is already
    /// present, [`crate::Error::Big`] if the encoded size exceeds the
    /// data area, or [`crate::Error::Access`] if no unlocked products
    /// could be evicted to make room.
    pub fn insert(&mut self, item: &Product) -> crate::Result<()> {
        item.validate()?;
        let header = RecordHeader {
            origin: item.origin.clone(),
            feedtype: item.feedtype,
            seqno: item.seqno,
            arrival: item.arrival,
            ident: item.ident.clone(),
            signature: item.signature,
            data_len: item.data.len() as u32,
        };
        let encoded = self.encode_record(&header, &item.data)?;
        let mut reservation = self.reserve(encoded.len() as u64, item.signature)?;
        reservation.payload_mut().extend_from_slice(&encoded);
        self.commit(reservation)
    }

    /// Reserves a region of `size` bytes for `signature`, evicting the
    /// oldest unlocked products as needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Access`] if not writable,
    /// [`crate::Error::Dup`] on a duplicate signature,
    /// [`crate::Error::Big`] if `size` exceeds the data area, or
    /// [`crate::Error::Access`] if eviction could not free enough room.
    pub fn reserve(&mut self, size: u64, signature: Signature) -> crate::Result<Reservation> {
        if !self.writable {
            return Err(crate::Error::Access);
        }
        if size > self.control.data_size {
            return Err(crate::Error::Big {
                size,
                data_size: self.control.data_size,
            });
        }
        if self.sig_index.find(&signature).is_some() {
            self.metrics.record_dup();
            return Err(crate::Error::Dup);
        }

        let _cs = CriticalSection::enter()?;
        self.make_room_for(size)?;

        let region = self
            .regions
            .allocate(size)
            .ok_or(crate::Error::Access)?;
        if !self.sig_index.add(signature, region) {
            self.regions.free(region);
            return Err(crate::Error::Exhausted("signature index exhausted".into()));
        }

        Ok(Reservation::new(region, signature, size as usize))
    }

    /// Repeatedly evicts the oldest *unlocked* product until there is
    /// room for `size` bytes. Products held via `sequence_lock` are
    /// skipped rather than stopping the scan, so a held product only
    /// blocks eviction when it is the only remaining candidate.
    fn make_room_for(&mut self, size: u64) -> crate::Result<()> {
        const MAX_EVICTION_SCAN_BASE: u32 = 4;
        let max_scans = MAX_EVICTION_SCAN_BASE * self.control.capacity.max(1);
        let mut scans = 0;
        while self.regions.would_need_eviction(size) {
            let mut candidate = self.time_index.first();
            let victim = loop {
                let Some((time_key, region)) = candidate else {
                    return Err(crate::Error::Access);
                };
                scans += 1;
                if scans > max_scans {
                    return Err(crate::Error::Access);
                }
                let offset = self.regions.meta(region).map(|m| m.offset).unwrap_or_default();
                if self.riu.is_held_for_sequence(offset) {
                    candidate = self.time_index.next_after(time_key);
                    continue;
                }
                break (time_key, region);
            };
            self.evict(victim.0, victim.1)?;
        }
        Ok(())
    }

    fn evict(&mut self, time_key: u64, region: RegionId) -> crate::Result<()> {
        let meta = self.regions.meta(region).ok_or_else(|| crate::Error::Corrupt("evicting unknown region".into()))?;
        let now_ns = self.control.most_recent_insertion_ns.max(time_key);
        let residence = now_ns.saturating_sub(time_key);
        self.control.observe_eviction(residence, self.metrics.snapshot().bytes_in_use, self.metrics.snapshot().slots_in_use);

        self.time_index.delete(time_key);
        if let Some((sig, _)) = self.find_signature_for_region(region) {
            self.sig_index.find_delete(&sig);
        }
        self.regions.free(region);
        self.metrics.record_free(meta.extent);
        self.metrics.record_evict();
        Ok(())
    }

    fn find_signature_for_region(&self, region: RegionId) -> Option<(Signature, RegionId)> {
        self.sig_index.iter().find(|(_, r)| *r == region)
    }

    /// Publishes a reservation: adds the time entry, wakes consumers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if writing the encoded bytes into the
    /// region fails.
    pub fn commit(&mut self, reservation: Reservation) -> crate::Result<()> {
        let (region, _signature, payload) = reservation.mark_resolved();
        let meta = self
            .regions
            .meta(region)
            .ok_or_else(|| crate::Error::Corrupt("commit on unknown region".into()))?;

        let mut handle = self.store.get(self.control.data_offset + meta.offset, meta.extent, true, WaitPolicy::Wait)?;
        {
            let map = self.store.whole_file_map_mut();
            let slice = handle.as_mut_slice(map);
            slice[..payload.len()].copy_from_slice(&payload);
        }
        self.store.release(handle)?;

        let now_ns = wall_clock_ns();
        let time_key = self.time_index.add(now_ns, region)?;
        self.control.most_recent_insertion_ns = now_ns;
        self.metrics.record_insert(meta.extent);

        self.persist()?;
        let _ = time_key;
        signal::wake_consumers()
    }

    /// Reverses a reservation: frees the region, removes the signature
    /// entry, releases the claimed space back to the free list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on a persistence failure.
    pub fn discard(&mut self, reservation: Reservation) -> crate::Result<()> {
        let (region, signature, _payload) = reservation.mark_resolved();
        self.sig_index.find_delete(&signature);
        self.regions.free(region);
        self.persist()
    }

    /// Sets the cursor directly.
    pub fn set_cursor(&mut self, key: u64) {
        self.cursor.set(key);
    }

    /// Locates the signature entry for `sig`, then scans the time index
    /// forward from slightly before the product's stored arrival to find
    /// its time entry, falling back to a full scan if not found nearby.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `sig` is not present, or
    /// [`crate::Error::Corrupt`] if the signature's region has no
    /// corresponding time entry at all.
    pub fn set_cursor_from_signature(&mut self, sig: &Signature) -> crate::Result<()> {
        let region = self.sig_index.find(sig).ok_or(crate::Error::NotFound)?;
        if let Some((key, _)) = self.time_index.iter().find(|(_, r)| *r == region) {
            self.cursor.set(key);
            return Ok(());
        }
        Err(crate::Error::Corrupt("signature present with no time entry".into()))
    }

    /// Advances the cursor in `direction`, invoking `callback` with the
    /// decoded metadata and payload of the next matching product.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::End`] if no further entry exists in
    /// `direction`.
    pub fn sequence<F>(&mut self, direction: Direction, class_filter: Option<u32>, callback: F) -> crate::Result<()>
    where
        F: FnOnce(&ProductMetadata, &[u8]) -> crate::Result<()>,
    {
        self.sequence_impl(direction, class_filter, callback, false)
    }

    /// As [`Self::sequence`], but the region remains locked on a match;
    /// the caller must later call [`Self::release`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::sequence`].
    pub fn sequence_lock<F>(&mut self, direction: Direction, class_filter: Option<u32>, callback: F) -> crate::Result<()>
    where
        F: FnOnce(&ProductMetadata, &[u8]) -> crate::Result<()>,
    {
        self.sequence_impl(direction, class_filter, callback, true)
    }

    fn sequence_impl<F>(
        &mut self,
        direction: Direction,
        class_filter: Option<u32>,
        callback: F,
        hold: bool,
    ) -> crate::Result<()>
    where
        F: FnOnce(&ProductMetadata, &[u8]) -> crate::Result<()>,
    {
        let mut callback = Some(callback);
        loop {
            let start = self.cursor.resolve_start(direction);
            let next = match direction {
                Direction::Gt => self
                    .time_index
                    .next_after(start)
                    .or_else(|| self.time_index.find(start, crate::skiplist::FindMode::Ceiling).filter(|(k, _)| *k > start)),
                Direction::Lt => self
                    .time_index
                    .find(start, crate::skiplist::FindMode::Floor)
                    .filter(|(k, _)| *k < start),
                Direction::Eq => self.time_index.find(start, crate::skiplist::FindMode::Exact),
            };
            let Some((time_key, region)) = next else {
                return Err(crate::Error::End);
            };

            let meta = self
                .regions
                .meta(region)
                .ok_or_else(|| crate::Error::Corrupt("sequence landed on unknown region".into()))?;
            let mut handle = self.store.get(self.control.data_offset + meta.offset, meta.extent, false, WaitPolicy::Wait)?;
            let (header, payload) = {
                let map = self.store.whole_file_map_mut();
                let slice = handle.as_slice(map.map(|m| &*m));
                match product::decode(slice) {
                    Ok((header, payload)) => (header, payload.to_vec()),
                    Err(e) => {
                        self.store.release(handle)?;
                        return Err(e);
                    }
                }
            };

            if !class_filter.is_none_or_matches(header.feedtype) {
                self.store.release(handle)?;
                self.cursor.set(time_key);
                continue;
            }

            let metadata = ProductMetadata { header, time_key, offset: meta.offset };
            let callback_result = callback.take().expect("called exactly once")(&metadata, &payload);
            self.cursor.set(time_key);

            if callback_result.is_err() {
                self.cursor.rewind_one_tick();
            }

            if hold && callback_result.is_ok() {
                self.riu.insert(meta.offset, meta.extent, handle, true);
            } else {
                self.store.release(handle)?;
            }
            return callback_result;
        }
    }

    /// Releases a region previously held via [`Self::sequence_lock`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `offset` was not held.
    pub fn release(&mut self, offset: u64) -> crate::Result<()> {
        let handle = self.riu.take(offset).ok_or(crate::Error::NotFound)?;
        self.store.release(handle)
    }

    /// Removes a product by signature, failing if it is currently held.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `sig` is absent, or
    /// [`crate::Error::Locked`] if the product is held under
    /// `sequence_lock`.
    pub fn delete_by_signature(&mut self, sig: &Signature) -> crate::Result<()> {
        let region = self.sig_index.find(sig).ok_or(crate::Error::NotFound)?;
        let meta = self.regions.meta(region).ok_or_else(|| crate::Error::Corrupt("dangling signature entry".into()))?;
        if self.riu.is_held_for_sequence(meta.offset) {
            return Err(crate::Error::Locked);
        }
        let _cs = CriticalSection::enter()?;
        let found_time_key = self.time_index.iter().find(|(_, r)| *r == region).map(|(time_key, _)| time_key);
        if let Some(time_key) = found_time_key {
            self.time_index.delete(time_key);
        }
        self.sig_index.find_delete(sig);
        self.metrics.record_free(meta.extent);
        self.regions.free(region);
        self.persist()
    }

    /// A point-in-time snapshot of usage counters.
    #[must_use]
    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// `(high_water_slots, high_water_bytes)`.
    #[must_use]
    pub fn highwater(&self) -> (u32, u64) {
        (self.control.high_water_slots, self.control.high_water_bytes)
    }

    /// True if the queue has no empty or free region slots left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.control.full_queue
    }

    /// The most recent insertion time, in nanoseconds since the epoch.
    #[must_use]
    pub fn get_most_recent(&self) -> u64 {
        self.control.most_recent_insertion_ns
    }

    /// `(mvrt_ns, bytes_in_use_at_mvrt, slots_in_use_at_mvrt)`.
    #[must_use]
    pub fn get_mvrt_metrics(&self) -> Option<(u64, u64, u32)> {
        self.control
            .mvrt_ns
            .map(|ns| (ns, self.control.mvrt_bytes_in_use, self.control.mvrt_slots_in_use))
    }

    /// Clears the MVRT tracking fields.
    pub fn clear_mvrt_metrics(&mut self) {
        self.control.mvrt_ns = None;
        self.control.mvrt_bytes_in_use = 0;
        self.control.mvrt_slots_in_use = 0;
        self.metrics.clear_mvrt();
    }

    /// Time key of the oldest resident product, if any.
    #[must_use]
    pub fn get_oldest_cursor(&self) -> Option<u64> {
        self.time_index.first().map(|(k, _)| k)
    }

    /// Maximum number of regions this queue can track.
    #[must_use]
    pub fn get_slot_count(&self) -> u32 {
        self.control.capacity
    }

    /// Size in bytes of the data area.
    #[must_use]
    pub fn get_data_size(&self) -> u64 {
        self.control.data_size
    }

    /// Host page size used to lay out the control block.
    #[must_use]
    pub fn get_pagesize(&self) -> u64 {
        PAGE_SIZE
    }

    /// Number of times this queue has been opened for writing.
    #[must_use]
    pub fn get_write_count(&self) -> u32 {
        self.control.write_count
    }

    /// Resets the write-count to zero.
    pub fn clear_write_count(&mut self) {
        self.control.write_count = 0;
        self.metrics.clear_write_count();
    }

    /// Blocks on `SIGCONT`/`SIGALRM`, per [`signal::suspend`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::System`] on a signal-handler install
    /// failure.
    pub fn suspend(timeout_secs: Option<u32>) -> crate::Result<u32> {
        signal::suspend(timeout_secs)
    }
}

trait ClassFilterExt {
    fn is_none_or_matches(self, feedtype: u32) -> bool;
}

impl ClassFilterExt for Option<u32> {
    fn is_none_or_matches(self, feedtype: u32) -> bool {
        match self {
            None => true,
            Some(wanted) => wanted == feedtype,
        }
    }
}

fn estimate_index_size(capacity: u32) -> u64 {
    // Rough per-slot budget for the serialized snapshot (region meta +
    // signature + time entry, each with bincode framing overhead),
    // rounded up to a page.
    let per_slot = 96u64;
    let raw = u64::from(capacity) * per_slot + PAGE_SIZE;
    ((raw + PAGE_SIZE - 1) / PAGE_SIZE) * PAGE_SIZE
}

fn wall_clock_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_product(sig_byte: u8, data_len: usize) -> Product {
        Product {
            origin: "h".into(),
            feedtype: 1,
            seqno: 0,
            arrival: (100, 0),
            ident: "i".into(),
            signature: [sig_byte; 16],
            data: vec![sig_byte; data_len],
        }
    }

    #[test]
    fn create_insert_sequence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pq.dat");
        let options = CreateOptions::new(0o600, 8, 1 << 20, 128);
        let mut queue = Queue::create(&path, options).unwrap();

        queue.insert(&sample_product(1, 16)).unwrap();

        let mut seen = Vec::new();
        queue
            .sequence(Direction::Gt, None, |meta, data| {
                seen.push((meta.header.signature, data.to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, [1; 16]);

        let end = queue.sequence(Direction::Gt, None, |_, _| Ok(()));
        assert!(matches!(end, Err(crate::Error::End)));
    }

    #[test]
    fn duplicate_signature_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pq.dat");
        let options = CreateOptions::new(0o600, 8, 1 << 20, 128);
        let mut queue = Queue::create(&path, options).unwrap();

        queue.insert(&sample_product(1, 16)).unwrap();
        let second = queue.insert(&sample_product(1, 16));
        assert!(matches!(second, Err(crate::Error::Dup)));
        assert_eq!(queue.stats().insert_count, 1);
    }

    #[test]
    fn oversize_product_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pq.dat");
        let options = CreateOptions::new(0o600, 8, 4096, 8);
        let mut queue = Queue::create(&path, options).unwrap();

        let big = sample_product(9, 1 << 20);
        assert!(matches!(queue.insert(&big), Err(crate::Error::Big { .. })));
    }
}
