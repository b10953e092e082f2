//! Large-object engine for the Strata storage kernel.
//!
//! An [`ObjectStore`] keeps BLOB/CLOB payloads inside a [`Store`] as pages
//! of up to 64 KiB, optionally DEFLATE-compressed, with lifetimes governed by
//! an explicit, persisted reference count.
//!
//! # Object Lifecycle
//!
//! ```text
//! open --complete()--> committed --release() to 0--> deleted
//! ```
//!
//! - [`ObjectStore::create_new_object`] reserves a page table for up to
//!   `max_size` bytes and registers an *open* record.
//! - [`LargeObject::write`] streams pages in. Each page is written at most
//!   once.
//! - [`LargeObject::complete`] commits the object; its nominal size shrinks
//!   to the bytes actually written.
//! - [`LargeObject::establish`] / [`LargeObject::release`] move the
//!   reference count. Reaching zero deletes every page and recycles the
//!   record through the delete chain.
//!
//! # Errors
//!
//! Stale or forged ids are reported as [`LobError::InvalidReference`] and
//! integrity failures as [`LobError::Corrupt`]. Misuse by the caller
//! (unaligned I/O, double writes, reference underflow) panics.
//!
//! [`Store`]: strata_store::Store

pub mod config;
pub mod error;
pub mod object;
pub mod page;
mod record;
pub mod store;

pub use config::LobConfig;
pub use error::{LobError, LobResult};
pub use object::LargeObject;
pub use page::PAGE_SIZE;
pub use store::ObjectStore;
