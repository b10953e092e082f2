use strata_types::AreaId;

/// Errors from store and area operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The area does not exist (never created, or already deleted).
    #[error("area not found: {0}")]
    AreaNotFound(AreaId),

    /// A read, write or seek fell outside the area's fixed capacity.
    #[error("access out of bounds in area {id}: position {position} + {len} exceeds capacity {capacity}")]
    OutOfBounds {
        id: AreaId,
        position: usize,
        len: usize,
        capacity: usize,
    },

    /// The area was opened read-only and cannot be modified or checked out.
    #[error("area {0} is read-only")]
    ReadOnly(AreaId),

    /// The backend refused an allocation because it is full.
    #[error("store capacity exceeded: requested {requested} bytes, limit {limit}")]
    CapacityExceeded { requested: u64, limit: u64 },

    /// The fixed bootstrap area cannot be deleted.
    #[error("the fixed area cannot be deleted")]
    FixedArea,

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
