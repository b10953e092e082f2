use serde::{Deserialize, Serialize};

/// Configuration for the large-object engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobConfig {
    /// DEFLATE level for compressed objects, 0 (store) to 9 (best).
    pub compression_level: u32,
    /// When a page of a compressed object does not shrink under DEFLATE,
    /// store it raw. The page's type tag records the choice.
    pub store_raw_if_larger: bool,
}

impl Default for LobConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            store_raw_if_larger: true,
        }
    }
}

impl LobConfig {
    /// Favour throughput over ratio.
    pub fn fast() -> Self {
        Self {
            compression_level: 1,
            ..Default::default()
        }
    }

    pub(crate) fn compression(&self) -> flate2::Compression {
        flate2::Compression::new(self.compression_level.min(9))
    }
}
