use std::sync::Arc;

use strata_records::{block_start, FixedRecordList, RecordListGuard};
use strata_store::{Area, Store};
use strata_types::{AreaId, ObjectId, RecordId, StoreId};
use tracing::{debug, info, warn};

use crate::config::LobConfig;
use crate::error::{LobError, LobResult};
use crate::object::LargeObject;
use crate::page::PageTable;
use crate::record::{write_free, ObjectRecord, Slot, Status, RECORD_SIZE};

const MAGIC: u32 = 0x0B10_B5A7;
const VERSION: u32 = 1;

/// Root header:
///
/// ```text
/// 0   4  magic
/// 4   4  version
/// 8   4  store id
/// 12  8  object index header area id
/// ```
const HEADER_SIZE: usize = 20;

/// State shared by an [`ObjectStore`] and every [`LargeObject`] it hands out.
pub(crate) struct Shared {
    pub store: Arc<dyn Store>,
    pub store_id: StoreId,
    pub root: AreaId,
    pub records: FixedRecordList,
    pub config: LobConfig,
}

/// Large-object engine over one [`Store`].
///
/// Object metadata lives in a [`FixedRecordList`] of 32-byte records; each
/// live record points at a page table, which points at one area per written
/// 64 KiB page.
///
/// # Locking
///
/// Every multi-step update takes the store-wide lock first and the record
/// list lock second.
#[derive(Clone)]
pub struct ObjectStore {
    shared: Arc<Shared>,
}

impl ObjectStore {
    /// Bootstrap a new object store inside `store`.
    ///
    /// The caller persists [`ObjectStore::root`] (for example in the store's
    /// fixed area) and passes it to [`ObjectStore::open`] on restart.
    pub fn create(store: Arc<dyn Store>, store_id: StoreId, config: LobConfig) -> LobResult<Self> {
        let lock = store.lock();
        let records = FixedRecordList::create(Arc::clone(&store), RECORD_SIZE)?;

        let mut header = store.create_area(HEADER_SIZE)?;
        header.write_u32(MAGIC)?;
        header.write_u32(VERSION)?;
        header.write_u32(store_id.0)?;
        header.write_i64(records.header_id().raw())?;
        store.checkout(&header)?;

        info!(store = %store_id, root = %header.id(), "created object store");
        drop(lock);
        Ok(Self {
            shared: Arc::new(Shared {
                store,
                store_id,
                root: header.id(),
                records,
                config,
            }),
        })
    }

    /// Restore an object store from its root header.
    pub fn open(store: Arc<dyn Store>, root: AreaId, config: LobConfig) -> LobResult<Self> {
        let mut header = store.get_area(root, true)?;
        let magic = header.read_u32()?;
        if magic != MAGIC {
            return Err(LobError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            });
        }
        let version = header.read_u32()?;
        if version != VERSION {
            return Err(LobError::UnsupportedVersion(version));
        }
        let store_id = StoreId(header.read_u32()?);
        let records_header = AreaId::new(header.read_i64()?);
        let records = FixedRecordList::open(Arc::clone(&store), records_header, RECORD_SIZE)?;

        info!(
            store = %store_id,
            root = %root,
            capacity = records.node_count(),
            "opened object store"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                store,
                store_id,
                root,
                records,
                config,
            }),
        })
    }

    pub fn store_id(&self) -> StoreId {
        self.shared.store_id
    }

    /// Area id of the root header, the value to persist for [`ObjectStore::open`].
    pub fn root(&self) -> AreaId {
        self.shared.root
    }

    /// Number of record slots allocated, live or free.
    pub fn capacity(&self) -> u64 {
        self.shared.records.node_count()
    }

    pub fn config(&self) -> &LobConfig {
        &self.shared.config
    }

    /// Allocate a new, open object that can hold up to `max_size` bytes.
    pub fn create_new_object(&self, max_size: u64, compressed: bool) -> LobResult<LargeObject> {
        let shared = &self.shared;
        let table = PageTable::for_size(max_size, compressed);

        let _lock = shared.store.lock();
        let page_table = table.create(&*shared.store)?;
        let record = match shared.add_to_record_list(&ObjectRecord::open(max_size, page_table)) {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = shared.store.delete_area(page_table) {
                    warn!(area = %page_table, error = %cleanup, "failed to delete page table of unregistered object");
                }
                return Err(e);
            }
        };

        let id = ObjectId::new(shared.store_id, record);
        debug!(object = %id, max_size, pages = table.page_count, compressed, "created large object");
        Ok(LargeObject::new(
            Arc::clone(shared),
            id,
            page_table,
            table,
            max_size,
            0,
            false,
        ))
    }

    /// Reconstruct a handle for an existing object.
    ///
    /// Fails with [`LobError::InvalidReference`] when `id` belongs to another
    /// store, is out of range, or names a deleted object.
    ///
    /// An object that is still open can be fetched too, so a second writer
    /// can continue filling it. [`LargeObject::is_complete`] reflects the
    /// persisted status rather than always being `true`.
    pub fn get_object(&self, id: ObjectId) -> LobResult<LargeObject> {
        let shared = &self.shared;
        if id.store_id() != shared.store_id {
            return Err(LobError::invalid(
                id,
                format!("belongs to store {}, not {}", id.store_id(), shared.store_id),
            ));
        }

        let _lock = shared.store.lock();
        let list = shared.records.lock();
        if id.record() >= list.node_count() {
            return Err(LobError::invalid(
                id,
                format!("record out of range (capacity {})", list.node_count()),
            ));
        }
        let (record, _) = shared.load_record(&list, id)?;
        drop(list);

        let mut table_area = shared.store.get_area(record.page_table, true)?;
        let table = PageTable::read(&mut table_area, id)?;
        Ok(LargeObject::new(
            Arc::clone(shared),
            id,
            record.page_table,
            table,
            record.max_size,
            record.current_size,
            record.status == Status::Committed,
        ))
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("store_id", &self.shared.store_id)
            .field("root", &self.shared.root)
            .field("records", &self.shared.records)
            .finish()
    }
}

impl Shared {
    /// Read the live record for `id`, returning it with its block area
    /// positioned for an in-place rewrite.
    pub fn load_record(
        &self,
        list: &RecordListGuard<'_>,
        id: ObjectId,
    ) -> LobResult<(ObjectRecord, Area)> {
        let mut area = list.record(id.record(), false)?;
        match Slot::read(&mut area)? {
            Ok(Slot::Live(record)) => Ok((record, area)),
            Ok(Slot::Free { .. }) => Err(LobError::invalid(id, "object has been deleted")),
            Ok(Slot::Vacant) => Err(LobError::invalid(id, "record was never used")),
            Err(status) => Err(LobError::corrupt(id, format!("unknown record status {status:#x}"))),
        }
    }

    /// Register `record`, reusing the head of the delete chain when there is
    /// one and otherwise growing the index by one block.
    ///
    /// The delete chain never points at a live record: the head is advanced
    /// before the reused slot is overwritten, and a new block is published
    /// only once its free records are threaded.
    fn add_to_record_list(&self, record: &ObjectRecord) -> LobResult<RecordId> {
        let mut list = self.records.lock();

        if let Some(head) = list.delete_head() {
            let mut area = list.record(head, false)?;
            let next = match Slot::read(&mut area)? {
                Ok(Slot::Free { next }) => next,
                _ => {
                    return Err(LobError::corrupt(
                        ObjectId::new(self.store_id, head),
                        "delete chain points at a live record",
                    ))
                }
            };
            list.set_delete_head(next)?;
            let placed = record
                .write(&mut area)
                .map_err(LobError::from)
                .and_then(|()| Ok(list.checkout(&area)?));
            if let Err(e) = placed {
                if let Err(restore) = list.set_delete_head(Some(head)) {
                    warn!(record = head, error = %restore, "failed to restore delete chain head, record leaked");
                }
                return Err(e);
            }
            return Ok(head);
        }

        // Slot 0 goes to the caller; the rest are threaded ascending.
        let first = block_start(list.block_count());
        list.increase_size_with(|area, start| {
            let end = start + (area.capacity() / RECORD_SIZE) as u64;
            record.write(area)?;
            for n in start + 1..end {
                write_free(area, (n + 1 < end).then_some(n + 1))?;
            }
            Ok((start + 1 < end).then_some(start + 1))
        })?;
        Ok(first)
    }

    /// Return a destroyed object's record to the head of the delete chain.
    ///
    /// If the chain head cannot be persisted the record is written back as
    /// it was, so the release can be retried.
    pub fn free_record(
        &self,
        list: &mut RecordListGuard<'_>,
        mut area: Area,
        record: RecordId,
    ) -> LobResult<()> {
        let original = area.clone();
        write_free(&mut area, list.delete_head())?;
        list.checkout(&area)?;
        if let Err(e) = list.set_delete_head(Some(record)) {
            if let Err(restore) = list.checkout(&original) {
                warn!(record, error = %restore, "failed to restore released record, record leaked");
            }
            return Err(e.into());
        }
        Ok(())
    }
}
