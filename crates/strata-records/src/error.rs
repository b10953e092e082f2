use strata_store::StoreError;
use strata_types::{AreaId, RecordId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordListError {
    #[error("invalid record list magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("record list header is corrupt: {0}")]
    CorruptHeader(String),

    #[error("block {block} (area {area}) has capacity {actual}, expected {expected}")]
    CorruptBlock {
        block: usize,
        area: AreaId,
        expected: usize,
        actual: usize,
    },

    #[error("record list cannot grow beyond {0} blocks")]
    BlockLimit(usize),

    #[error("record list has no blocks to remove")]
    Empty,

    #[error("record {record} out of range (node count {node_count})")]
    OutOfRange { record: RecordId, node_count: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RecordListResult<T> = Result<T, RecordListError>;
