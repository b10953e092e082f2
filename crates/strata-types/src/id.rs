use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Address of an area inside a store.
///
/// Area ids are opaque 64-bit values handed out by the store that created
/// the area. The value `-1` is reserved for the fixed bootstrap area that
/// every store carries (see [`FIXED_AREA_ID`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(i64);

/// The reserved 64-byte fixed area present in every store.
pub const FIXED_AREA_ID: AreaId = AreaId(-1);

impl AreaId {
    /// Wrap a raw 64-bit area id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value, as persisted inside other areas.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Returns `true` for the reserved fixed area.
    pub const fn is_fixed(self) -> bool {
        self.0 == FIXED_AREA_ID.0
    }
}

impl fmt::Debug for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AreaId({})", self.0)
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AreaId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<AreaId> for i64 {
    fn from(id: AreaId) -> Self {
        id.0
    }
}

/// Identity of one store within a database.
///
/// No two stores of the same database share an id, so an [`ObjectId`]
/// carrying a store id is unique database-wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(pub u32);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot number inside a fixed record list.
pub type RecordId = u64;

/// Identifier of a large object: the store that owns it plus its record
/// number inside that store's object index.
///
/// Textual form is `lob:<store>:<record>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    store: StoreId,
    record: RecordId,
}

impl ObjectId {
    /// Size of the packed byte form produced by [`ObjectId::to_bytes`].
    pub const ENCODED_LEN: usize = 12;

    pub const fn new(store: StoreId, record: RecordId) -> Self {
        Self { store, record }
    }

    /// The store that issued this id.
    pub const fn store_id(&self) -> StoreId {
        self.store
    }

    /// The record number inside the issuing store.
    pub const fn record(&self) -> RecordId {
        self.record
    }

    /// Packed big-endian form, suitable for embedding in a row.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..4].copy_from_slice(&self.store.0.to_be_bytes());
        out[4..].copy_from_slice(&self.record.to_be_bytes());
        out
    }

    /// Parse the packed form written by [`ObjectId::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(TypeError::InvalidLength {
                expected: Self::ENCODED_LEN,
                actual: bytes.len(),
            });
        }
        let mut store = [0u8; 4];
        let mut record = [0u8; 8];
        store.copy_from_slice(&bytes[..4]);
        record.copy_from_slice(&bytes[4..]);
        Ok(Self {
            store: StoreId(u32::from_be_bytes(store)),
            record: u64::from_be_bytes(record),
        })
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lob:{}:{}", self.store.0, self.record)
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TypeError::MalformedObjectId(s.to_string());
        let rest = s.strip_prefix("lob:").ok_or_else(malformed)?;
        let (store, record) = rest.split_once(':').ok_or_else(malformed)?;
        let store = store.parse::<u32>().map_err(|_| malformed())?;
        let record = record.parse::<u64>().map_err(|_| malformed())?;
        Ok(Self::new(StoreId(store), record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_area_is_minus_one() {
        assert_eq!(FIXED_AREA_ID.raw(), -1);
        assert!(FIXED_AREA_ID.is_fixed());
        assert!(!AreaId::new(0).is_fixed());
    }

    #[test]
    fn area_id_converts_to_and_from_i64() {
        let id = AreaId::from(42i64);
        assert_eq!(i64::from(id), 42);
        assert_eq!(format!("{id:?}"), "AreaId(42)");
    }

    #[test]
    fn object_id_display_format() {
        let id = ObjectId::new(StoreId(3), 17);
        assert_eq!(id.to_string(), "lob:3:17");
    }

    #[test]
    fn object_id_parse() {
        let id: ObjectId = "lob:3:17".parse().unwrap();
        assert_eq!(id.store_id(), StoreId(3));
        assert_eq!(id.record(), 17);
    }

    #[test]
    fn object_id_parse_rejects_garbage() {
        for bad in ["", "lob:", "lob:1", "blob:1:2", "lob:x:2", "lob:1:-2"] {
            let err = bad.parse::<ObjectId>().unwrap_err();
            assert!(matches!(err, TypeError::MalformedObjectId(_)), "{bad}");
        }
    }

    #[test]
    fn from_bytes_wrong_length() {
        let err = ObjectId::from_bytes(&[0u8; 5]).unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 12,
                actual: 5
            }
        );
    }

    #[test]
    fn ids_from_different_stores_differ() {
        let a = ObjectId::new(StoreId(1), 0);
        let b = ObjectId::new(StoreId(2), 0);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::new(StoreId(9), 1234);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    proptest! {
        #[test]
        fn packed_form_roundtrips(store in any::<u32>(), record in any::<u64>()) {
            let id = ObjectId::new(StoreId(store), record);
            prop_assert_eq!(ObjectId::from_bytes(&id.to_bytes()).unwrap(), id);
            prop_assert_eq!(id.to_string().parse::<ObjectId>().unwrap(), id);
        }
    }
}
