//! Fixed-width record index for the Strata storage kernel.
//!
//! A [`FixedRecordList`] stores records of one byte width in a growing
//! sequence of blocks. Block `i` holds `32 << i` records, so a list of `b`
//! blocks addresses `32 * (2^b - 1)` records while never resizing an area:
//! growth always allocates one whole new block.
//!
//! The list also persists the head of a *delete chain*, the free list that
//! owners thread through their own records. The list does not interpret
//! record contents; it only stores and returns the head.
//!
//! # Locking
//!
//! The list has its own lock, independent of the store-wide lock. Take it
//! with [`FixedRecordList::lock`] to run a multi-step sequence (pop the
//! delete chain, grow) atomically. When both are needed the store-wide lock
//! is acquired first.

pub mod error;
pub mod list;

pub use error::{RecordListError, RecordListResult};
pub use list::{
    block_capacity, block_start, locate, FixedRecordList, RecordListGuard, FIRST_BLOCK_RECORDS,
    MAX_BLOCKS,
};
