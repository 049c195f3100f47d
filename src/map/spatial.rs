use std::collections::HashMap;

use crate::geo::GeoBounds;

/// Spatial index for feature footprints using conservative approximation.
/// Each feature's bounding box is indexed into every cell it overlaps,
/// guaranteeing no false negatives while allowing false positives
/// (eliminated by the caller's exact geometry test).
#[derive(Debug)]
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    cell_size: f64,
}

impl FeatureGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Build from feature bounding boxes; feature index = iteration order
    pub fn build<'a>(bboxes: impl Iterator<Item = &'a GeoBounds>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (idx, b) in bboxes.enumerate() {
            let min_cell = grid.to_cell(b.lon_min, b.lat_min);
            let max_cell = grid.to_cell(b.lon_max, b.lat_max);
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    grid.cells.entry((x, y)).or_default().push(idx);
                }
            }
        }
        grid
    }

    /// Feature indices whose cells overlap `bounds`, sorted and deduplicated
    pub fn query(&self, bounds: &GeoBounds) -> Vec<usize> {
        if self.cells.is_empty() {
            return Vec::new();
        }
        let min_cell = self.to_cell(bounds.lon_min, bounds.lat_min);
        let max_cell = self.to_cell(bounds.lon_max, bounds.lat_max);
        let mut results = Vec::new();

        // Wide queries walk the occupied cells instead of the cell range
        let span = (max_cell.0 as i64 - min_cell.0 as i64 + 1) * (max_cell.1 as i64 - min_cell.1 as i64 + 1);
        if span > self.cells.len() as i64 {
            for (&(x, y), indices) in &self.cells {
                if x >= min_cell.0 && x <= max_cell.0 && y >= min_cell.1 && y <= max_cell.1 {
                    results.extend_from_slice(indices);
                }
            }
        } else {
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    if let Some(indices) = self.cells.get(&(x, y)) {
                        results.extend_from_slice(indices);
                    }
                }
            }
        }
        results.sort_unstable();
        results.dedup();
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_finds_overlapping_features_once() {
        let boxes = [
            GeoBounds::new(0.0, 0.25, 0.0, 0.25),
            // Spans four cells
            GeoBounds::new(0.05, 0.15, 0.05, 0.15),
            GeoBounds::new(5.0, 5.1, 5.0, 5.1),
        ];
        let grid = FeatureGrid::build(boxes.iter(), 0.1);

        assert_eq!(grid.query(&GeoBounds::new(0.0, 0.2, 0.0, 0.2)), vec![0, 1]);
        assert_eq!(grid.query(&GeoBounds::new(5.01, 5.02, 5.01, 5.02)), vec![2]);
        assert!(grid.query(&GeoBounds::new(-3.0, -2.0, -3.0, -2.0)).is_empty());
    }
}
