//! Page tables and page areas.
//!
//! Page table area:
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  ------------------------------------------
//! 0       4     reserved (0)
//! 4       4     type tag: BINARY, optionally | COMPRESSED
//! 8       8     nominal size (max size at creation)
//! 16      4     page count
//! 20      8*n   page area ids (UNWRITTEN until written)
//! ```
//!
//! Page area:
//!
//! ```text
//! 0       4     type tag of this page's encoding
//! 4       4     stored length
//! 8       4     CRC32 of the stored bytes
//! 12      n     stored bytes (raw or DEFLATE)
//! ```

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use strata_store::{Area, Store};
use strata_types::{AreaId, ObjectId};
use tracing::warn;

use crate::config::LobConfig;
use crate::error::{LobError, LobResult};

/// Size of one large-object page.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Slot value of a page that has not been written. `-1` is the fixed area.
pub(crate) const UNWRITTEN: i64 = -2;

const TYPE_BINARY: i32 = 0x01;
const TYPE_COMPRESSED: i32 = 0x10;

const TABLE_HEADER_SIZE: usize = 20;
const PAGE_HEADER_SIZE: usize = 12;

/// Decoded page table header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PageTable {
    pub compressed: bool,
    pub nominal_size: u64,
    pub page_count: u64,
}

impl PageTable {
    pub fn for_size(max_size: u64, compressed: bool) -> Self {
        Self {
            compressed,
            nominal_size: max_size,
            page_count: max_size.div_ceil(PAGE_SIZE as u64),
        }
    }

    /// Bytes needed for the table area, `None` if unaddressable.
    pub fn area_size(&self) -> Option<usize> {
        let pages = i32::try_from(self.page_count).ok()? as usize;
        pages.checked_mul(8)?.checked_add(TABLE_HEADER_SIZE)
    }

    /// Allocate and publish a table with every slot unwritten.
    pub fn create(&self, store: &dyn Store) -> LobResult<AreaId> {
        let size = self
            .area_size()
            .ok_or(LobError::TooLarge(self.nominal_size))?;
        let mut area = store.create_area(size)?;
        area.write_i32(0)?;
        area.write_i32(type_tag(self.compressed))?;
        area.write_i64(self.nominal_size as i64)?;
        area.write_i32(self.page_count as i32)?;
        for _ in 0..self.page_count {
            area.write_i64(UNWRITTEN)?;
        }
        store.checkout(&area)?;
        Ok(area.id())
    }

    /// Decode the header of a table area.
    pub fn read(area: &mut Area, object: ObjectId) -> LobResult<Self> {
        area.set_position(0)?;
        let _reserved = area.read_i32()?;
        let tag = area.read_i32()?;
        let nominal_size = area.read_i64()?;
        let page_count = area.read_i32()?;
        if tag & TYPE_BINARY == 0 || nominal_size < 0 || page_count < 0 {
            return Err(LobError::corrupt(
                object,
                format!("bad page table header (type {tag:#x}, size {nominal_size}, pages {page_count})"),
            ));
        }
        Ok(Self {
            compressed: tag & TYPE_COMPRESSED != 0,
            nominal_size: nominal_size as u64,
            page_count: page_count as u64,
        })
    }
}

/// Byte offset of `page`'s slot inside a table area.
pub(crate) fn slot_offset(page: u64) -> usize {
    TABLE_HEADER_SIZE + page as usize * 8
}

fn type_tag(compressed: bool) -> i32 {
    if compressed {
        TYPE_BINARY | TYPE_COMPRESSED
    } else {
        TYPE_BINARY
    }
}

/// Encode `data` into a new page area and publish it.
///
/// Returns the area id and the stored length.
pub(crate) fn write_page(
    store: &dyn Store,
    data: &[u8],
    compressed: bool,
    config: &LobConfig,
) -> LobResult<(AreaId, usize)> {
    let deflated = if compressed {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), config.compression());
        encoder
            .write_all(data)
            .map_err(|e| LobError::Compression(e.to_string()))?;
        let out = encoder
            .finish()
            .map_err(|e| LobError::Compression(e.to_string()))?;
        (out.len() < data.len() || !config.store_raw_if_larger).then_some(out)
    } else {
        None
    };
    let (tag, stored) = match &deflated {
        Some(bytes) => (type_tag(true), bytes.as_slice()),
        None => (type_tag(false), data),
    };

    let mut area = store.create_area(PAGE_HEADER_SIZE + stored.len())?;
    area.write_i32(tag)?;
    area.write_i32(stored.len() as i32)?;
    area.write_u32(crc32fast::hash(stored))?;
    area.write_bytes(stored)?;
    store.checkout(&area)?;
    Ok((area.id(), stored.len()))
}

/// Stored length recorded in a page area's header.
pub(crate) fn stored_len(store: &dyn Store, page: AreaId) -> LobResult<usize> {
    let mut area = store.get_area(page, true)?;
    area.set_position(4)?;
    Ok(area.read_i32()?.max(0) as usize)
}

/// Decode the page in area `page` into `buf`.
///
/// A compressed page must inflate to exactly `buf.len()` bytes; a raw page
/// must hold at least `buf.len()` bytes, of which the prefix is returned.
pub(crate) fn read_page(
    store: &dyn Store,
    page: AreaId,
    buf: &mut [u8],
    object: ObjectId,
) -> LobResult<()> {
    let mut area = store.get_area(page, true)?;
    let tag = area.read_i32()?;
    let stored_len = area.read_i32()?;
    let expected_crc = area.read_u32()?;

    let fail = |reason: String| {
        warn!(object = %object, page = %page, %reason, "large object page failed integrity check");
        LobError::corrupt(object, reason)
    };

    if tag & TYPE_BINARY == 0 {
        return Err(fail(format!("page area {page} has type {tag:#x}")));
    }
    let stored_len = usize::try_from(stored_len)
        .ok()
        .filter(|len| PAGE_HEADER_SIZE + len <= area.capacity())
        .ok_or_else(|| fail(format!("page area {page} has stored length {stored_len}")))?;
    let stored = &area.as_bytes()[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + stored_len];

    let actual_crc = crc32fast::hash(stored);
    if actual_crc != expected_crc {
        return Err(fail(format!(
            "page area {page} CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        )));
    }

    if tag & TYPE_COMPRESSED != 0 {
        let mut inflated = Vec::with_capacity(buf.len());
        DeflateDecoder::new(stored)
            .take(buf.len() as u64 + 1)
            .read_to_end(&mut inflated)
            .map_err(|e| fail(format!("inflate failed: {e}")))?;
        if inflated.len() != buf.len() {
            return Err(fail(format!(
                "page inflated to {} bytes, expected {}",
                inflated.len(),
                buf.len()
            )));
        }
        buf.copy_from_slice(&inflated);
    } else {
        if stored_len < buf.len() {
            return Err(fail(format!(
                "page holds {stored_len} bytes, {} requested",
                buf.len()
            )));
        }
        buf.copy_from_slice(&stored[..buf.len()]);
    }
    Ok(())
}
