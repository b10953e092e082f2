//! Foundation types for the Strata storage kernel.
//!
//! This crate provides the identifiers shared by every layer of the kernel:
//! the allocator (`strata-store`), the fixed record index
//! (`strata-records`), and the large-object engine (`strata-lob`).
//!
//! # Key Types
//!
//! - [`AreaId`] -- 64-bit address of an area inside a store
//! - [`StoreId`] -- identity of one store within a database
//! - [`RecordId`] -- slot number inside a fixed record list
//! - [`ObjectId`] -- (store id, record number) pair naming a large object

pub mod error;
pub mod id;

pub use error::TypeError;
pub use id::{AreaId, ObjectId, RecordId, StoreId, FIXED_AREA_ID};
