use serde::{Deserialize, Serialize};

/// Configuration for the heap-resident store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStoreConfig {
    /// Upper bound on the total bytes held by all areas. `None` is unbounded.
    pub max_bytes: Option<u64>,
    /// Capacity of the reserved fixed area (`-1`).
    pub fixed_area_size: usize,
}

impl Default for HeapStoreConfig {
    fn default() -> Self {
        Self {
            max_bytes: None,
            fixed_area_size: 64,
        }
    }
}

impl HeapStoreConfig {
    /// A store that refuses to hold more than `max_bytes` in total.
    pub fn bounded(max_bytes: u64) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded_with_64_byte_fixed_area() {
        let config = HeapStoreConfig::default();
        assert_eq!(config.max_bytes, None);
        assert_eq!(config.fixed_area_size, 64);
    }

    #[test]
    fn bounded_keeps_fixed_area_default() {
        let config = HeapStoreConfig::bounded(1024);
        assert_eq!(config.max_bytes, Some(1024));
        assert_eq!(config.fixed_area_size, 64);
    }

    #[test]
    fn deserializes_from_json() {
        let config: HeapStoreConfig =
            serde_json::from_str(r#"{"max_bytes":4096,"fixed_area_size":128}"#).unwrap();
        assert_eq!(config, HeapStoreConfig { max_bytes: Some(4096), fixed_area_size: 128 });
    }
}
