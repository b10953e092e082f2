use strata_types::AreaId;

use crate::error::{StoreError, StoreResult};

/// Working copy of one area with a read/write cursor.
///
/// An `Area` is obtained from [`Store::create_area`](crate::Store::create_area)
/// or [`Store::get_area`](crate::Store::get_area). Its capacity is fixed for
/// life. Writes land in this copy only; call
/// [`Store::checkout`](crate::Store::checkout) to publish them.
///
/// Integers are stored big-endian.
#[derive(Clone, PartialEq, Eq)]
pub struct Area {
    id: AreaId,
    data: Vec<u8>,
    position: usize,
    read_only: bool,
}

impl Area {
    /// Build an area over `data`. Intended for `Store` implementations.
    pub fn new(id: AreaId, data: Vec<u8>, read_only: bool) -> Self {
        Self {
            id,
            data,
            position: 0,
            read_only,
        }
    }

    pub fn id(&self) -> AreaId {
        self.id
    }

    /// Fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor. `position == capacity` is allowed (end of area).
    pub fn set_position(&mut self, position: usize) -> StoreResult<()> {
        if position > self.data.len() {
            return Err(self.out_of_bounds(position, 0));
        }
        self.position = position;
        Ok(())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The full content of the area, independent of the cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn read_u8(&mut self) -> StoreResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> StoreResult<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> StoreResult<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> StoreResult<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> StoreResult<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    /// Fill `buf` from the cursor position.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> StoreResult<()> {
        let range = self.span(buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        self.position += buf.len();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) -> StoreResult<()> {
        self.write_bytes(&[value])
    }

    pub fn write_i16(&mut self, value: i16) -> StoreResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> StoreResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> StoreResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> StoreResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Copy `bytes` in at the cursor position.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly(self.id));
        }
        let range = self.span(bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// Copy `len` bytes from this area's cursor into `dest` at its cursor.
    /// Both cursors advance.
    pub fn copy_to(&mut self, dest: &mut Area, len: usize) -> StoreResult<()> {
        let range = self.span(len)?;
        dest.write_bytes(&self.data[range])?;
        self.position += len;
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> StoreResult<[u8; N]> {
        let mut out = [0u8; N];
        self.read_bytes(&mut out)?;
        Ok(out)
    }

    fn span(&self, len: usize) -> StoreResult<std::ops::Range<usize>> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.out_of_bounds(self.position, len))?;
        Ok(self.position..end)
    }

    fn out_of_bounds(&self, position: usize, len: usize) -> StoreError {
        StoreError::OutOfBounds {
            id: self.id,
            position,
            len,
            capacity: self.data.len(),
        }
    }
}

impl std::fmt::Debug for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Area")
            .field("id", &self.id)
            .field("capacity", &self.data.len())
            .field("position", &self.position)
            .field("read_only", &self.read_only)
            .finish()
    }
}
