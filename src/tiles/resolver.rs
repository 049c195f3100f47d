use std::collections::HashSet;

use super::{TileKey, TileRecord};
use crate::geo::{GeoBounds, ViewportBounds};

/// Whether a tile should be on screen for the given viewport.
///
/// True when any corner of the tile lies inside the viewport (edges
/// inclusive), or when the tile's box encloses the whole viewport. This is
/// looser than a bbox intersection on purpose: corner hits on shared tile
/// edges count.
#[inline(always)]
pub fn is_tile_visible(viewport: &ViewportBounds, tile: &GeoBounds) -> bool {
    tile.corners()
        .iter()
        .any(|&(lon, lat)| viewport.contains(lon, lat))
        || tile.encloses(&viewport.as_geo())
}

/// Set of tiles that should be present for the viewport. No ordering.
pub fn resolve(viewport: &ViewportBounds, tiles: &[TileRecord]) -> HashSet<TileKey> {
    tiles
        .iter()
        .filter(|t| is_tile_visible(viewport, &t.bounds))
        .map(TileRecord::key)
        .collect()
}
