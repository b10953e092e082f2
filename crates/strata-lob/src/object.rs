use std::sync::Arc;

use strata_store::{Store, StoreError};
use strata_types::{AreaId, ObjectId};
use tracing::debug;

use crate::error::{LobError, LobResult};
use crate::page::{self, PageTable, PAGE_SIZE, UNWRITTEN};
use crate::record::Status;
use crate::store::Shared;

/// Handle to one large object.
///
/// A handle is a view, not an owner: the object's lifetime is governed by
/// the reference count persisted in its record. Dropping a handle never
/// releases the object; call [`LargeObject::release`] explicitly.
#[derive(Clone)]
pub struct LargeObject {
    shared: Arc<Shared>,
    id: ObjectId,
    page_table: AreaId,
    page_count: u64,
    compressed: bool,
    raw_size: u64,
    current_size: u64,
    complete: bool,
}

impl LargeObject {
    pub(crate) fn new(
        shared: Arc<Shared>,
        id: ObjectId,
        page_table: AreaId,
        table: PageTable,
        raw_size: u64,
        current_size: u64,
        complete: bool,
    ) -> Self {
        Self {
            shared,
            id,
            page_table,
            page_count: table.page_count,
            compressed: table.compressed,
            raw_size,
            current_size,
            complete,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Nominal size: the allocation ceiling while open, the payload length
    /// once complete.
    pub fn raw_size(&self) -> u64 {
        self.raw_size
    }

    /// Bytes written so far.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of 64 KiB pages reserved at creation.
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Write one page.
    ///
    /// # Panics
    ///
    /// If `offset` is not a multiple of [`PAGE_SIZE`], `data` is longer than a
    /// page or runs past the object's size, the object is complete, or the
    /// page was already written.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> LobResult<()> {
        let page = self.check_page_access(offset, data.len());
        assert!(!self.complete, "write to completed large object {}", self.id);
        assert!(
            offset + data.len() as u64 <= self.raw_size,
            "write of {} bytes at {offset} runs past the end of large object {} ({} bytes)",
            data.len(),
            self.id,
            self.raw_size
        );

        let shared = &self.shared;
        let store: &dyn Store = &*shared.store;
        let _lock = store.lock();

        let mut table = store.get_area(self.page_table, false)?;
        table.set_position(page::slot_offset(page))?;
        let slot = table.read_i64()?;
        assert_eq!(slot, UNWRITTEN, "page {page} of large object {} is already written", self.id);

        let list = shared.records.lock();
        let (mut record, mut record_area) = shared.load_record(&list, self.id)?;
        assert!(
            record.status == Status::Open,
            "write to completed large object {}",
            self.id
        );

        let (page_area, stored) = page::write_page(store, data, self.compressed, &shared.config)?;
        table.set_position(page::slot_offset(page))?;
        table.write_i64(page_area.raw())?;
        store.checkout(&table)?;

        record.current_size += data.len() as u64;
        record.write(&mut record_area)?;
        list.checkout(&record_area)?;
        self.current_size = record.current_size;

        debug!(object = %self.id, page, len = data.len(), stored, "wrote large object page");
        Ok(())
    }

    /// Read one page into `buf`.
    ///
    /// Reading a page that was never written is reported as
    /// [`LobError::Corrupt`].
    ///
    /// # Panics
    ///
    /// If `offset` is not a multiple of [`PAGE_SIZE`], `buf` is longer than a
    /// page, or the page lies beyond the object.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> LobResult<()> {
        let page = self.check_page_access(offset, buf.len());
        let store: &dyn Store = &*self.shared.store;
        let _lock = store.lock();
        let page_area = self
            .page_area(store, page)?
            .ok_or_else(|| LobError::corrupt(self.id, format!("page {page} was never written")))?;
        page::read_page(store, page_area, buf, self.id)
    }

    /// Finalize the object. Its nominal size becomes the number of bytes
    /// written, and no further writes are accepted.
    ///
    /// # Panics
    ///
    /// If the object is not open.
    pub fn complete(&mut self) -> LobResult<()> {
        let shared = &self.shared;
        let _lock = shared.store.lock();
        let list = shared.records.lock();
        let (mut record, mut area) = shared.load_record(&list, self.id)?;
        assert!(
            record.status == Status::Open,
            "complete on large object {} which is not open",
            self.id
        );

        record.status = Status::Committed;
        record.ref_count = 0;
        record.max_size = record.current_size;
        record.write(&mut area)?;
        list.checkout(&area)?;

        self.complete = true;
        self.raw_size = record.current_size;
        self.current_size = record.current_size;
        debug!(object = %self.id, size = record.current_size, "completed large object");
        Ok(())
    }

    /// Add one reference.
    ///
    /// # Panics
    ///
    /// If the object is not complete.
    pub fn establish(&self) -> LobResult<()> {
        let shared = &self.shared;
        let _lock = shared.store.lock();
        let list = shared.records.lock();
        let (mut record, mut area) = shared.load_record(&list, self.id)?;
        assert!(
            record.status == Status::Committed,
            "establish on large object {} which is not complete",
            self.id
        );

        record.ref_count = record
            .ref_count
            .checked_add(1)
            .unwrap_or_else(|| panic!("reference count overflow on large object {}", self.id));
        record.write(&mut area)?;
        list.checkout(&area)?;
        debug!(object = %self.id, refs = record.ref_count, "established reference");
        Ok(())
    }

    /// Drop one reference. When the count reaches zero the object's pages and
    /// page table are deleted, its record joins the delete chain, and `true`
    /// is returned.
    ///
    /// # Panics
    ///
    /// If the object is not complete or has no references left.
    ///
    /// A release that fails part way leaves the reference persisted, so it
    /// can be retried.
    pub fn release(&self) -> LobResult<bool> {
        let shared = &self.shared;
        let store: &dyn Store = &*shared.store;
        let _lock = store.lock();
        let mut list = shared.records.lock();
        let (mut record, mut area) = shared.load_record(&list, self.id)?;
        assert!(
            record.status == Status::Committed,
            "release on large object {} which is not complete",
            self.id
        );
        assert!(
            record.ref_count > 0,
            "release underflow on large object {}",
            self.id
        );

        record.ref_count -= 1;
        if record.ref_count > 0 {
            record.write(&mut area)?;
            list.checkout(&area)?;
            debug!(object = %self.id, refs = record.ref_count, "released reference");
            return Ok(false);
        }

        // Pages are deleted before their table. A missing table means an
        // earlier attempt already deleted everything.
        match store.get_area(record.page_table, true) {
            Ok(mut table) => {
                let table_header = PageTable::read(&mut table, self.id)?;
                for page in 0..table_header.page_count {
                    table.set_position(page::slot_offset(page))?;
                    let slot = table.read_i64()?;
                    if slot != UNWRITTEN {
                        delete_if_present(store, AreaId::new(slot))?;
                    }
                }
                delete_if_present(store, record.page_table)?;
            }
            Err(StoreError::AreaNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        shared.free_record(&mut list, area, self.id.record())?;

        debug!(object = %self.id, "destroyed large object");
        Ok(true)
    }

    /// Stored byte length of `page`, `None` if it has not been written.
    ///
    /// For a compressed object this is the DEFLATE output length.
    pub fn stored_page_len(&self, page: u64) -> LobResult<Option<usize>> {
        let store: &dyn Store = &*self.shared.store;
        let _lock = store.lock();
        match self.page_area(store, page)? {
            Some(area) => Ok(Some(page::stored_len(store, area)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn page_area(&self, store: &dyn Store, page: u64) -> LobResult<Option<AreaId>> {
        if page >= self.page_count {
            return Ok(None);
        }
        let mut table = store.get_area(self.page_table, true)?;
        table.set_position(page::slot_offset(page))?;
        match table.read_i64()? {
            UNWRITTEN => Ok(None),
            raw => Ok(Some(AreaId::new(raw))),
        }
    }

    fn check_page_access(&self, offset: u64, len: usize) -> u64 {
        assert!(
            offset % PAGE_SIZE as u64 == 0,
            "large object access at offset {offset} is not page aligned"
        );
        assert!(
            len <= PAGE_SIZE,
            "large object access of {len} bytes exceeds the page size"
        );
        let page = offset / PAGE_SIZE as u64;
        assert!(
            page < self.page_count,
            "page {page} is beyond large object {} ({} pages)",
            self.id,
            self.page_count
        );
        page
    }
}

fn delete_if_present(store: &dyn Store, id: AreaId) -> LobResult<()> {
    match store.delete_area(id) {
        Ok(()) | Err(StoreError::AreaNotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl std::fmt::Debug for LargeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeObject")
            .field("id", &self.id)
            .field("raw_size", &self.raw_size)
            .field("current_size", &self.current_size)
            .field("compressed", &self.compressed)
            .field("complete", &self.complete)
            .finish()
    }
}
