//! Satellite tile overlays: the tile index, viewport resolution and the
//! overlay cache.

mod cache;
mod index;
mod probe;
mod resolver;

use std::collections::BTreeMap;
use std::fmt;

use crate::geo::GeoBounds;

pub use cache::{Dispatch, TileLayerCache, TileOverlay};
pub use index::{TileIndex, TileIndexError};
pub use probe::{ImageProbe, ProbeError, TileImage, TileProbe};
pub use resolver::{is_tile_visible, resolve};

/// Identity of a tile in the imagery grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub row: i32,
    pub col: i32,
}

impl TileKey {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// File name of the tile's image under the tiles directory
    pub fn image_file_name(&self) -> String {
        format!("cropped_row_{}_col_{}.webp", self.row, self.col)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One row of the tile bounds table. Immutable once parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct TileRecord {
    pub row: i32,
    pub col: i32,
    pub bounds: GeoBounds,
    /// Every column other than the key and bounds, kept as text
    pub extra: BTreeMap<String, String>,
}

impl TileRecord {
    pub fn new(row: i32, col: i32, bounds: GeoBounds) -> Self {
        Self {
            row,
            col,
            bounds,
            extra: BTreeMap::new(),
        }
    }

    #[inline(always)]
    pub fn key(&self) -> TileKey {
        TileKey::new(self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_file_name() {
        assert_eq!(TileKey::new(9, 6).image_file_name(), "cropped_row_9_col_6.webp");
    }

    #[test]
    fn test_key_ordering_is_row_major() {
        let mut keys = vec![TileKey::new(2, 0), TileKey::new(1, 5), TileKey::new(1, 2)];
        keys.sort();
        assert_eq!(keys, vec![TileKey::new(1, 2), TileKey::new(1, 5), TileKey::new(2, 0)]);
    }
}
