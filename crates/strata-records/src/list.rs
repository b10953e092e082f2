use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strata_store::{Area, Store};
use strata_types::{AreaId, RecordId};
use tracing::{debug, warn};

use crate::error::{RecordListError, RecordListResult};

/// Number of records in block 0. Block `i` holds `FIRST_BLOCK_RECORDS << i`.
pub const FIRST_BLOCK_RECORDS: u64 = 32;

/// Number of block slots in the header.
pub const MAX_BLOCKS: usize = 64;

/// Blocks past this one would overflow record numbering (`32 << 58 == 2^63`).
const ADDRESSABLE_BLOCKS: usize = 58;

const MAGIC: u32 = 0x087C_3A11;

/// Raw value of an empty delete chain.
const EMPTY_CHAIN: i64 = -1;

/// Header layout:
///
/// ```text
/// Offset  Size   Description
/// ------  -----  ----------------------------------
/// 0       4      magic
/// 4       4      block count
/// 8       8      delete chain head (-1 = empty)
/// 16      8*64   block area ids
/// ```
const HEADER_SIZE: usize = 16 + 8 * MAX_BLOCKS;

/// Index of the first record stored in `block`: `32 * (2^block - 1)`.
pub fn block_start(block: usize) -> u64 {
    (FIRST_BLOCK_RECORDS << block) - FIRST_BLOCK_RECORDS
}

/// Number of records stored in `block`.
pub fn block_capacity(block: usize) -> u64 {
    FIRST_BLOCK_RECORDS << block
}

/// Map a record number to `(block, offset within block)`.
///
/// The block is the largest `i` with `block_start(i) <= record`.
pub fn locate(record: RecordId) -> (usize, u64) {
    let block = (record / FIRST_BLOCK_RECORDS + 1).ilog2() as usize;
    (block, record - block_start(block))
}

struct ListState {
    blocks: Vec<AreaId>,
    delete_head: Option<RecordId>,
}

/// Persistent, geometrically growing list of fixed-width records.
///
/// The list is self-describing: its header area records the magic, the
/// block table and the delete chain head, so [`FixedRecordList::open`]
/// restores it from the header id alone.
pub struct FixedRecordList {
    store: Arc<dyn Store>,
    header_id: AreaId,
    element_size: usize,
    state: Mutex<ListState>,
}

impl FixedRecordList {
    /// Allocate and persist the header of a new, empty list.
    pub fn create(store: Arc<dyn Store>, element_size: usize) -> RecordListResult<Self> {
        assert!(element_size > 0, "record element size must be non-zero");
        let header = store.create_area(HEADER_SIZE)?;
        let list = Self {
            store,
            header_id: header.id(),
            element_size,
            state: Mutex::new(ListState {
                blocks: Vec::new(),
                delete_head: None,
            }),
        };
        list.lock().write_header()?;
        debug!(header = %list.header_id, element_size, "created record list");
        Ok(list)
    }

    /// Restore a list from its header area.
    ///
    /// Validates the magic and re-opens every block area, checking that each
    /// still has the capacity its position in the table implies.
    pub fn open(
        store: Arc<dyn Store>,
        header_id: AreaId,
        element_size: usize,
    ) -> RecordListResult<Self> {
        assert!(element_size > 0, "record element size must be non-zero");
        let mut header = store.get_area(header_id, true)?;

        let magic = header.read_u32()?;
        if magic != MAGIC {
            return Err(RecordListError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            });
        }
        let block_count = header.read_i32()?;
        let block_count = usize::try_from(block_count)
            .ok()
            .filter(|count| *count <= ADDRESSABLE_BLOCKS)
            .ok_or_else(|| {
                RecordListError::CorruptHeader(format!("block count {block_count}"))
            })?;
        let delete_head = decode_head(header.read_i64()?)?;

        let mut blocks = Vec::with_capacity(block_count);
        for block in 0..block_count {
            let id = AreaId::new(header.read_i64()?);
            let area = store.get_area(id, true)?;
            let expected = block_bytes(block, element_size).ok_or_else(|| {
                RecordListError::CorruptHeader(format!("block {block} is not addressable"))
            })?;
            if area.capacity() != expected {
                return Err(RecordListError::CorruptBlock {
                    block,
                    area: id,
                    expected,
                    actual: area.capacity(),
                });
            }
            blocks.push(id);
        }

        debug!(header = %header_id, blocks = block_count, "opened record list");
        Ok(Self {
            store,
            header_id,
            element_size,
            state: Mutex::new(ListState {
                blocks,
                delete_head,
            }),
        })
    }

    /// Acquire the list lock for a multi-step sequence.
    ///
    /// Every state change is rolled back when its header write fails, so a
    /// lock poisoned by a panicking holder still guards consistent state.
    pub fn lock(&self) -> RecordListGuard<'_> {
        RecordListGuard {
            list: self,
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn header_id(&self) -> AreaId {
        self.header_id
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn block_count(&self) -> usize {
        self.lock().block_count()
    }

    /// Total number of addressable records.
    pub fn node_count(&self) -> u64 {
        self.lock().node_count()
    }

    /// Area id backing `block`, if that block exists.
    pub fn block_area(&self, block: usize) -> Option<AreaId> {
        self.lock().state.blocks.get(block).copied()
    }

    /// Working copy of the block holding `record`, positioned at the record.
    pub fn record(&self, record: RecordId, read_only: bool) -> RecordListResult<Area> {
        self.lock().record(record, read_only)
    }

    pub fn increase_size(&self) -> RecordListResult<AreaId> {
        self.lock().increase_size()
    }

    pub fn decrease_size(&self) -> RecordListResult<()> {
        self.lock().decrease_size()
    }

    pub fn read_delete_head(&self) -> Option<RecordId> {
        self.lock().delete_head()
    }

    pub fn write_delete_head(&self, head: Option<RecordId>) -> RecordListResult<()> {
        self.lock().set_delete_head(head)
    }
}

impl std::fmt::Debug for FixedRecordList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.lock();
        f.debug_struct("FixedRecordList")
            .field("header", &self.header_id)
            .field("element_size", &self.element_size)
            .field("block_count", &guard.block_count())
            .field("delete_head", &guard.delete_head())
            .finish()
    }
}

/// Exclusive view of a [`FixedRecordList`] while its lock is held.
pub struct RecordListGuard<'a> {
    list: &'a FixedRecordList,
    state: MutexGuard<'a, ListState>,
}

impl RecordListGuard<'_> {
    pub fn block_count(&self) -> usize {
        self.state.blocks.len()
    }

    pub fn node_count(&self) -> u64 {
        block_start(self.state.blocks.len())
    }

    pub fn delete_head(&self) -> Option<RecordId> {
        self.state.delete_head
    }

    /// Set the delete chain head and persist the header.
    pub fn set_delete_head(&mut self, head: Option<RecordId>) -> RecordListResult<()> {
        let previous = std::mem::replace(&mut self.state.delete_head, head);
        if let Err(e) = self.write_header() {
            self.state.delete_head = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Working copy of the block holding `record`, positioned at the record.
    pub fn record(&self, record: RecordId, read_only: bool) -> RecordListResult<Area> {
        let node_count = self.node_count();
        if record >= node_count {
            return Err(RecordListError::OutOfRange { record, node_count });
        }
        let (block, offset) = locate(record);
        let mut area = self
            .list
            .store
            .get_area(self.state.blocks[block], read_only)?;
        area.set_position(offset as usize * self.list.element_size)?;
        Ok(area)
    }

    /// Publish a record area obtained from [`RecordListGuard::record`].
    pub fn checkout(&self, area: &Area) -> RecordListResult<()> {
        self.list.store.checkout(area)?;
        Ok(())
    }

    /// Append one block sized for the next `32 << block_count` records.
    ///
    /// The new block's records are zeroed. Returns the new block's area id.
    pub fn increase_size(&mut self) -> RecordListResult<AreaId> {
        let head = self.state.delete_head;
        self.increase_size_with(|_, _| Ok(head))
    }

    /// Append one block whose records are formatted by `init` before the
    /// block becomes part of the list.
    ///
    /// `init` receives the new block's area, cursor at 0, and the number of
    /// its first record. It returns the delete chain head to publish, which
    /// is written in the same header update as the new block. On any
    /// failure the list is unchanged and the area is deleted.
    pub fn increase_size_with<F>(&mut self, init: F) -> RecordListResult<AreaId>
    where
        F: FnOnce(&mut Area, RecordId) -> RecordListResult<Option<RecordId>>,
    {
        let block = self.state.blocks.len();
        if block >= ADDRESSABLE_BLOCKS {
            return Err(RecordListError::BlockLimit(ADDRESSABLE_BLOCKS));
        }
        let size = block_bytes(block, self.list.element_size)
            .ok_or(RecordListError::BlockLimit(block))?;

        let store = &self.list.store;
        let mut area = store.create_area(size)?;
        let formatted = init(&mut area, block_start(block)).and_then(|head| {
            store.checkout(&area)?;
            Ok(head)
        });
        let head = match formatted {
            Ok(head) => head,
            Err(e) => {
                self.discard_block(area.id());
                return Err(e);
            }
        };

        self.state.blocks.push(area.id());
        let previous = std::mem::replace(&mut self.state.delete_head, head);
        if let Err(e) = self.write_header() {
            self.state.blocks.pop();
            self.state.delete_head = previous;
            self.discard_block(area.id());
            return Err(e);
        }
        debug!(block, area = %area.id(), records = block_capacity(block), "grew record list");
        Ok(area.id())
    }

    /// Remove the top block and delete its area. Exact inverse of
    /// [`RecordListGuard::increase_size`].
    ///
    /// The caller must ensure no delete chain entry points into the block.
    pub fn decrease_size(&mut self) -> RecordListResult<()> {
        let id = self.state.blocks.pop().ok_or(RecordListError::Empty)?;
        if let Err(e) = self.write_header() {
            self.state.blocks.push(id);
            return Err(e);
        }
        self.list.store.delete_area(id)?;
        debug!(block = self.state.blocks.len(), area = %id, "shrank record list");
        Ok(())
    }

    fn discard_block(&self, id: AreaId) {
        if let Err(e) = self.list.store.delete_area(id) {
            warn!(area = %id, error = %e, "failed to delete unpublished block area");
        }
    }

    fn write_header(&self) -> RecordListResult<()> {
        let mut header = self.list.store.get_area(self.list.header_id, false)?;
        header.write_u32(MAGIC)?;
        header.write_i32(self.state.blocks.len() as i32)?;
        header.write_i64(encode_head(self.state.delete_head))?;
        for block in 0..MAX_BLOCKS {
            let raw = self.state.blocks.get(block).map_or(0, |id| id.raw());
            header.write_i64(raw)?;
        }
        self.list.store.checkout(&header)?;
        Ok(())
    }
}

fn block_bytes(block: usize, element_size: usize) -> Option<usize> {
    usize::try_from(block_capacity(block))
        .ok()?
        .checked_mul(element_size)
}

fn encode_head(head: Option<RecordId>) -> i64 {
    head.map_or(EMPTY_CHAIN, |record| record as i64)
}

fn decode_head(raw: i64) -> RecordListResult<Option<RecordId>> {
    match raw {
        EMPTY_CHAIN => Ok(None),
        n if n >= 0 => Ok(Some(n as RecordId)),
        n => Err(RecordListError::CorruptHeader(format!("delete head {n}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use strata_store::{HeapStore, HeapStoreConfig, StoreError};

    fn heap() -> Arc<HeapStore> {
        Arc::new(HeapStore::new())
    }

    // -----------------------------------------------------------------------
    // Addressing
    // -----------------------------------------------------------------------

    #[test]
    fn block_boundaries() {
        assert_eq!(block_start(0), 0);
        assert_eq!(block_start(1), 32);
        assert_eq!(block_start(2), 96);
        assert_eq!(block_start(3), 224);
        assert_eq!(block_capacity(0), 32);
        assert_eq!(block_capacity(3), 256);
    }

    #[test]
    fn locate_at_block_edges() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(31), (0, 31));
        assert_eq!(locate(32), (1, 0));
        assert_eq!(locate(95), (1, 63));
        assert_eq!(locate(96), (2, 0));
        assert_eq!(locate(223), (2, 127));
        assert_eq!(locate(224), (3, 0));
    }

    proptest! {
        #[test]
        fn locate_lands_inside_its_block(record in 0u64..(1u64 << 40)) {
            let (block, offset) = locate(record);
            prop_assert!(block_start(block) <= record);
            prop_assert!(record < block_start(block + 1));
            prop_assert!(offset < block_capacity(block));
            prop_assert_eq!(block_start(block) + offset, record);
        }

        #[test]
        fn consecutive_records_never_overlap(record in 0u64..(1u64 << 20), width in 1usize..64) {
            // Either the next record is in the same block exactly one
            // element further, or it starts the next block at offset 0.
            let (block, offset) = locate(record);
            let (next_block, next_offset) = locate(record + 1);
            if next_block == block {
                prop_assert_eq!(next_offset as usize * width, offset as usize * width + width);
            } else {
                prop_assert_eq!(next_block, block + 1);
                prop_assert_eq!(next_offset, 0);
                prop_assert_eq!(offset + 1, block_capacity(block));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Create / open
    // -----------------------------------------------------------------------

    #[test]
    fn new_list_is_empty() {
        let list = FixedRecordList::create(heap(), 16).unwrap();
        assert_eq!(list.block_count(), 0);
        assert_eq!(list.node_count(), 0);
        assert_eq!(list.read_delete_head(), None);
    }

    #[test]
    fn reopen_restores_blocks_and_delete_head() {
        let store = heap();
        let list = FixedRecordList::create(store.clone(), 8).unwrap();
        list.increase_size().unwrap();
        list.increase_size().unwrap();
        list.write_delete_head(Some(40)).unwrap();
        let header = list.header_id();
        let block1 = list.block_area(1);
        drop(list);

        let list = FixedRecordList::open(store, header, 8).unwrap();
        assert_eq!(list.block_count(), 2);
        assert_eq!(list.node_count(), 96);
        assert_eq!(list.read_delete_head(), Some(40));
        assert_eq!(list.block_area(1), block1);
    }

    #[test]
    fn open_rejects_bad_magic() {
        let store = heap();
        let mut area = store.create_area(HEADER_SIZE).unwrap();
        area.write_u32(0xdead_beef).unwrap();
        store.checkout(&area).unwrap();

        let err = FixedRecordList::open(store, area.id(), 8).unwrap_err();
        assert!(matches!(
            err,
            RecordListError::InvalidMagic { actual: 0xdead_beef, .. }
        ));
    }

    #[test]
    fn open_with_wrong_element_size_detects_block_mismatch() {
        let store = heap();
        let list = FixedRecordList::create(store.clone(), 8).unwrap();
        list.increase_size().unwrap();
        let err = FixedRecordList::open(store, list.header_id(), 16).unwrap_err();
        assert!(matches!(
            err,
            RecordListError::CorruptBlock { block: 0, expected: 512, actual: 256, .. }
        ));
    }

    #[test]
    fn open_missing_header_is_store_error() {
        let err = FixedRecordList::open(heap(), AreaId::new(77), 8).unwrap_err();
        assert!(matches!(err, RecordListError::Store(StoreError::AreaNotFound(_))));
    }

    // -----------------------------------------------------------------------
    // Growth / shrink
    // -----------------------------------------------------------------------

    #[test]
    fn increase_size_allocates_geometric_blocks() {
        let store = heap();
        let list = FixedRecordList::create(store.clone(), 4).unwrap();
        for block in 0..4 {
            let id = list.increase_size().unwrap();
            let area = store.get_area(id, true).unwrap();
            assert_eq!(area.capacity(), (32 << block) * 4);
        }
        assert_eq!(list.node_count(), 32 + 64 + 128 + 256);
    }

    #[test]
    fn increase_then_decrease_is_identity() {
        let store = heap();
        let list = FixedRecordList::create(store.clone(), 8).unwrap();
        list.increase_size().unwrap();
        let (blocks, nodes, areas) = (list.block_count(), list.node_count(), store.area_count());

        let id = list.increase_size().unwrap();
        assert!(store.contains(id));
        list.decrease_size().unwrap();

        assert_eq!(list.block_count(), blocks);
        assert_eq!(list.node_count(), nodes);
        assert_eq!(store.area_count(), areas);
        assert!(!store.contains(id));
    }

    #[test]
    fn decrease_on_empty_list_fails() {
        let list = FixedRecordList::create(heap(), 8).unwrap();
        assert!(matches!(list.decrease_size(), Err(RecordListError::Empty)));
    }

    #[test]
    fn failed_growth_leaves_list_unchanged() {
        // Header (528) + fixed area (64) + block 0 (32 * 8) fit; block 1 does not.
        let store = Arc::new(HeapStore::with_config(HeapStoreConfig::bounded(
            64 + HEADER_SIZE as u64 + 256 + 100,
        )));
        let list = FixedRecordList::create(store, 8).unwrap();
        list.increase_size().unwrap();
        let err = list.increase_size().unwrap_err();
        assert!(matches!(
            err,
            RecordListError::Store(StoreError::CapacityExceeded { .. })
        ));
        assert_eq!(list.block_count(), 1);
    }

    #[test]
    fn increase_size_with_publishes_formatted_block_and_head() {
        let store = heap();
        let list = FixedRecordList::create(store.clone(), 8).unwrap();
        list.increase_size().unwrap();

        let id = list
            .lock()
            .increase_size_with(|area, first| {
                assert_eq!(first, 32);
                area.write_i64(-7)?;
                Ok(Some(first + 1))
            })
            .unwrap();
        assert_eq!(list.block_area(1), Some(id));
        assert_eq!(list.read_delete_head(), Some(33));
        assert_eq!(list.record(32, true).unwrap().read_i64().unwrap(), -7);

        let reopened = FixedRecordList::open(store, list.header_id(), 8).unwrap();
        assert_eq!(reopened.read_delete_head(), Some(33));
    }

    #[test]
    fn failed_block_format_leaves_list_unchanged() {
        let store = heap();
        let list = FixedRecordList::create(store.clone(), 8).unwrap();
        list.write_delete_head(Some(3)).unwrap();
        let areas = store.area_count();

        let err = list
            .lock()
            .increase_size_with(|area, _| {
                area.set_position(area.capacity())?;
                area.write_u8(1)?;
                Ok(None)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RecordListError::Store(StoreError::OutOfBounds { .. })
        ));
        assert_eq!(list.block_count(), 0);
        assert_eq!(list.read_delete_head(), Some(3));
        assert_eq!(store.area_count(), areas);
    }

    // -----------------------------------------------------------------------
    // Record access
    // -----------------------------------------------------------------------

    #[test]
    fn record_is_positioned_at_its_slot() {
        let list = FixedRecordList::create(heap(), 12).unwrap();
        list.increase_size().unwrap();
        list.increase_size().unwrap();

        let area = list.record(31, true).unwrap();
        assert_eq!(area.position(), 31 * 12);
        assert_eq!(Some(area.id()), list.block_area(0));

        let area = list.record(33, true).unwrap();
        assert_eq!(area.position(), 12);
        assert_eq!(Some(area.id()), list.block_area(1));
    }

    #[test]
    fn records_written_independently_read_back() {
        let list = FixedRecordList::create(heap(), 8).unwrap();
        list.increase_size().unwrap();
        list.increase_size().unwrap();

        let guard = list.lock();
        for record in 0..guard.node_count() {
            let mut area = guard.record(record, false).unwrap();
            area.write_i64(record as i64 * 3).unwrap();
            guard.checkout(&area).unwrap();
        }
        for record in 0..guard.node_count() {
            let mut area = guard.record(record, true).unwrap();
            assert_eq!(area.read_i64().unwrap(), record as i64 * 3);
        }
    }

    #[test]
    fn record_past_node_count_is_out_of_range() {
        let list = FixedRecordList::create(heap(), 8).unwrap();
        list.increase_size().unwrap();
        let err = list.record(32, true).unwrap_err();
        assert!(matches!(
            err,
            RecordListError::OutOfRange { record: 32, node_count: 32 }
        ));
    }

    #[test]
    fn concurrent_growth_is_serialized() {
        let list = Arc::new(FixedRecordList::create(heap(), 1).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let list = Arc::clone(&list);
                std::thread::spawn(move || list.increase_size().unwrap())
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(list.block_count(), 4);
        assert_eq!(list.node_count(), 32 * 15);
    }

    #[test]
    fn debug_format() {
        let list = FixedRecordList::create(heap(), 8).unwrap();
        let debug = format!("{list:?}");
        assert!(debug.contains("FixedRecordList"));
        assert!(debug.contains("block_count"));
    }
}
