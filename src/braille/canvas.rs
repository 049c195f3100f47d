use std::fmt;

/// First codepoint of the Unicode Braille block (no dots)
const BLANK: u32 = 0x2800;

/// Dot bits indexed by [y % 4][x % 2]:
/// ```text
/// (0,0) (1,0)   0x01 0x08
/// (0,1) (1,1)   0x02 0x10
/// (0,2) (1,2)   0x04 0x20
/// (0,3) (1,3)   0x40 0x80
/// ```
const DOT_BITS: [[u8; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

/// One-colour Braille layer for terminal graphics.
/// Each character cell holds a 2x4 dot grid, so a canvas of `width` x
/// `height` characters addresses `width*2` x `height*4` pixels.
pub struct BrailleCanvas {
    width: usize,
    height: usize,
    /// Row-major dot patterns, one byte per character cell
    cells: Vec<u8>,
}

impl BrailleCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0u8; width * height],
        }
    }

    /// Size in pixels (two dots per column, four per row)
    pub fn pixel_size(&self) -> (usize, usize) {
        (self.width * 2, self.height * 4)
    }

    /// Cell index and dot bit for a pixel, `None` off the canvas
    #[inline(always)]
    fn locate(&self, x: usize, y: usize) -> Option<(usize, u8)> {
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.width || cy >= self.height {
            return None;
        }
        Some((cy * self.width + cx, DOT_BITS[y % 4][x % 2]))
    }

    /// Set a pixel; pixels off the canvas are ignored
    #[inline(always)]
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        if let Some((idx, bit)) = self.locate(x, y) {
            self.cells[idx] |= bit;
        }
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    #[inline(always)]
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.locate(x, y)
            .is_some_and(|(idx, bit)| self.cells[idx] & bit != 0)
    }

    /// Number of dots set across the canvas
    pub fn dot_count(&self) -> u32 {
        self.cells.iter().map(|b| b.count_ones()).sum()
    }

    /// Non-empty cells as (column, row, glyph)
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &bits)| bits != 0)
            .map(move |(idx, &bits)| (idx % self.width, idx / self.width, glyph(bits)))
    }
}

#[inline(always)]
fn glyph(bits: u8) -> char {
    char::from_u32(BLANK + bits as u32).unwrap_or(' ')
}

impl fmt::Display for BrailleCanvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.chunks(self.width.max(1)).enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            for &bits in row {
                write!(f, "{}", glyph(bits))?;
            }
        }
        Ok(())
    }
}
