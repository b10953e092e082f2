//! Area allocator for the Strata storage kernel.
//!
//! A [`Store`] hands out *areas*: fixed-capacity byte regions addressed by a
//! 64-bit [`AreaId`]. Every structure above this crate (the fixed record
//! list, the large-object engine) is built from areas and reaches them only
//! through the `Store` boundary.
//!
//! # Storage Backends
//!
//! All backends implement the [`Store`] trait:
//!
//! - [`HeapStore`] -- `HashMap`-based store for tests and embedding
//!
//! File, multi-slice and journalled backends live outside this crate and
//! implement the same contract.
//!
//! # Design Rules
//!
//! 1. An area never changes size after creation. Structures that grow do so
//!    by allocating additional areas.
//! 2. An [`Area`] is a private working copy. Changes become visible to
//!    other readers only after [`Store::checkout`].
//! 3. Accessing a deleted area is an error, never a silent no-op.
//! 4. Multi-step structural updates are bracketed by [`Store::lock`] so a
//!    checkpoint never observes them half-done.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod area;
pub mod config;
pub mod error;
pub mod heap;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use area::Area;
pub use config::HeapStoreConfig;
pub use error::{StoreError, StoreResult};
pub use heap::HeapStore;
pub use strata_types::{AreaId, FIXED_AREA_ID};
pub use traits::{Store, StoreLock};
