//! On-store layout of one large-object record.
//!
//! ```text
//! Offset  Size  Live record            Free record
//! ------  ----  ---------------------  ---------------------------
//! 0       4     status                 status = DELETED
//! 4       4     reference count        0
//! 8       8     max size               0
//! 16      8     current size           0
//! 24      8     page table area id     next free record (-1 = end)
//! ```
//!
//! A status of 0 marks a slot that was never formatted.

use strata_store::{Area, StoreResult};
use strata_types::{AreaId, RecordId};

/// Width of one record in the object index.
pub(crate) const RECORD_SIZE: usize = 32;

const STATUS_VACANT: i32 = 0;
const STATUS_OPEN: i32 = 0x01;
const STATUS_COMMITTED: i32 = 0x02;
const STATUS_DELETED: i32 = 0x20;

const CHAIN_END: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    Open,
    Committed,
}

/// A record owned by a live object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ObjectRecord {
    pub status: Status,
    pub ref_count: i32,
    pub max_size: u64,
    pub current_size: u64,
    pub page_table: AreaId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Live(ObjectRecord),
    Free { next: Option<RecordId> },
    Vacant,
}

impl Slot {
    /// Decode the record at the cursor. The cursor is left where it was so
    /// the same area can be rewritten in place.
    ///
    /// `Ok(Err(status))` reports an unknown status word.
    pub fn read(area: &mut Area) -> StoreResult<Result<Self, i32>> {
        let start = area.position();
        let status = area.read_i32()?;
        let ref_count = area.read_i32()?;
        let max_size = area.read_i64()?;
        let current_size = area.read_i64()?;
        let link = area.read_i64()?;
        area.set_position(start)?;

        let status = match status {
            STATUS_VACANT => return Ok(Ok(Slot::Vacant)),
            STATUS_OPEN => Status::Open,
            STATUS_COMMITTED => Status::Committed,
            STATUS_DELETED => {
                let next = (link != CHAIN_END).then_some(link as RecordId);
                return Ok(Ok(Slot::Free { next }));
            }
            other => return Ok(Err(other)),
        };
        Ok(Ok(Slot::Live(ObjectRecord {
            status,
            ref_count,
            max_size: max_size as u64,
            current_size: current_size as u64,
            page_table: AreaId::new(link),
        })))
    }
}

impl ObjectRecord {
    /// A freshly registered record.
    pub fn open(max_size: u64, page_table: AreaId) -> Self {
        Self {
            status: Status::Open,
            ref_count: 0,
            max_size,
            current_size: 0,
            page_table,
        }
    }

    /// Encode at the cursor, advancing it by [`RECORD_SIZE`].
    pub fn write(&self, area: &mut Area) -> StoreResult<()> {
        area.write_i32(match self.status {
            Status::Open => STATUS_OPEN,
            Status::Committed => STATUS_COMMITTED,
        })?;
        area.write_i32(self.ref_count)?;
        area.write_i64(self.max_size as i64)?;
        area.write_i64(self.current_size as i64)?;
        area.write_i64(self.page_table.raw())
    }
}

/// Encode a zeroed, deleted record linking to `next`, advancing the cursor by
/// [`RECORD_SIZE`].
pub(crate) fn write_free(area: &mut Area, next: Option<RecordId>) -> StoreResult<()> {
    area.write_i32(STATUS_DELETED)?;
    area.write_i32(0)?;
    area.write_i64(0)?;
    area.write_i64(0)?;
    area.write_i64(next.map_or(CHAIN_END, |n| n as i64))
}
