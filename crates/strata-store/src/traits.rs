use std::sync::{Mutex, MutexGuard, PoisonError};

use strata_types::AreaId;

use crate::area::Area;
use crate::error::StoreResult;

/// Area allocator.
///
/// All implementations must satisfy these invariants:
/// - An area's capacity is fixed at creation. There is no resize.
/// - `get_area` and `checkout` on a deleted id fail with
///   [`StoreError::AreaNotFound`](crate::StoreError::AreaNotFound).
/// - The fixed area [`FIXED_AREA_ID`](crate::FIXED_AREA_ID) always exists
///   and cannot be deleted.
/// - Holding the [`StoreLock`] excludes [`Store::checkpoint`].
/// - All I/O errors are propagated, never silently ignored.
pub trait Store: Send + Sync {
    /// Allocate a new area of `size` bytes.
    ///
    /// The returned working copy is writable. Its initial content is
    /// unspecified until it is checked out.
    fn create_area(&self, size: usize) -> StoreResult<Area>;

    /// Fetch a working copy of an existing area, cursor at 0.
    fn get_area(&self, id: AreaId, read_only: bool) -> StoreResult<Area>;

    /// Publish the content of a working copy to the store.
    fn checkout(&self, area: &Area) -> StoreResult<()>;

    /// Delete an area. Any later access to `id` is an error.
    fn delete_area(&self, id: AreaId) -> StoreResult<()>;

    /// Acquire the store-wide structural lock. Released when the guard drops.
    fn lock(&self) -> StoreLock<'_>;

    /// Bring the backing medium to a consistent point.
    ///
    /// Default implementation only waits for in-flight structural updates.
    /// Durable backends override it to flush.
    fn checkpoint(&self) -> StoreResult<()> {
        let _lock = self.lock();
        Ok(())
    }
}

/// Guard for the store-wide lock returned by [`Store::lock`].
///
/// Dropping the guard unlocks.
#[must_use = "the store is unlocked as soon as the guard is dropped"]
pub struct StoreLock<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl<'a> StoreLock<'a> {
    /// Acquire `mutex` as a store-wide lock.
    ///
    /// The mutex guards no data of its own, so a poisoned lock is recovered
    /// rather than propagated.
    pub fn acquire(mutex: &'a Mutex<()>) -> Self {
        Self {
            _guard: mutex.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl std::fmt::Debug for StoreLock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoreLock")
    }
}
