use crate::map::projection::Viewport;

/// Screen-space density grid for the aggregate view.
/// Cells are `CELL` Braille pixels square; rebuilt every frame.
pub struct HeatGrid {
    /// Weighted counts per cell
    cells: Vec<u32>,
    cols: usize,
    rows: usize,
}

impl HeatGrid {
    pub const CELL: usize = 4;

    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            cols: 0,
            rows: 0,
        }
    }

    /// Rebuild from (lon, lat) points. Each point adds 2 to its own cell and
    /// 1 to each neighbour, which smooths isolated points into blobs.
    pub fn rebuild(&mut self, points: impl Iterator<Item = (f64, f64)>, viewport: &Viewport) {
        self.cols = viewport.width.div_ceil(Self::CELL);
        self.rows = viewport.height.div_ceil(Self::CELL);
        self.cells.clear();
        self.cells.resize(self.cols * self.rows, 0);

        for (lon, lat) in points {
            let (px, py) = viewport.project(lon, lat);
            if px < 0 || py < 0 {
                continue;
            }
            let cx = px as usize / Self::CELL;
            let cy = py as usize / Self::CELL;
            if cx >= self.cols || cy >= self.rows {
                continue;
            }
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let x = cx as i32 + dx;
                    let y = cy as i32 + dy;
                    if x < 0 || y < 0 || x as usize >= self.cols || y as usize >= self.rows {
                        continue;
                    }
                    let weight = if dx == 0 && dy == 0 { 2 } else { 1 };
                    self.cells[y as usize * self.cols + x as usize] += weight;
                }
            }
        }
    }

    /// Iterate over non-empty cells as (pixel x, pixel y, intensity 1..=255),
    /// intensity relative to the densest cell
    pub fn iter_cells(&self) -> impl Iterator<Item = (i32, i32, u8)> + '_ {
        let max = self.cells.iter().copied().max().unwrap_or(0).max(1) as f64;
        self.cells.iter().enumerate().filter_map(move |(idx, &count)| {
            if count == 0 {
                return None;
            }
            let x = (idx % self.cols * Self::CELL) as i32;
            let y = (idx / self.cols * Self::CELL) as i32;
            let intensity = ((count as f64 / max) * 255.0).round().clamp(1.0, 255.0) as u8;
            Some((x, y, intensity))
        })
    }
}

impl Default for HeatGrid {
    fn default() -> Self {
        Self::new()
    }
}
