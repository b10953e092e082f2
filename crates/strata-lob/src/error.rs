use strata_records::RecordListError;
use strata_store::StoreError;
use strata_types::ObjectId;
use thiserror::Error;

/// Errors from large-object operations.
///
/// Contract violations by the caller (unaligned I/O, writing a page twice,
/// releasing below zero, ...) are not represented here: they panic.
#[derive(Debug, Error)]
pub enum LobError {
    /// The id does not name a live object of this store. Stale or forged ids
    /// end up here.
    #[error("invalid object reference {id}: {reason}")]
    InvalidReference { id: ObjectId, reason: String },

    /// Stored object data failed an integrity check.
    #[error("corrupt object {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    #[error("invalid object store magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("unsupported object store version: {0}")]
    UnsupportedVersion(u32),

    /// The requested maximum size cannot be addressed by a page table.
    #[error("object size {0} is too large")]
    TooLarge(u64),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error(transparent)]
    Records(#[from] RecordListError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LobError {
    pub(crate) fn corrupt(id: ObjectId, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(id: ObjectId, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            id,
            reason: reason.into(),
        }
    }
}

pub type LobResult<T> = Result<T, LobError>;
