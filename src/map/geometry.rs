use crate::braille::BrailleCanvas;

/// 4x4 Bayer matrix scaled to 0..=240, for ordered dithering
const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 128, 32, 160],
    [192, 64, 224, 96],
    [48, 176, 16, 144],
    [240, 112, 208, 80],
];

/// Dither threshold for a pixel; a pixel is lit when its level exceeds it
#[inline(always)]
pub fn dither_threshold(x: i32, y: i32) -> u8 {
    BAYER_4X4[y.rem_euclid(4) as usize][x.rem_euclid(4) as usize]
}

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a point marker (small cross)
pub fn draw_marker(canvas: &mut BrailleCanvas, x: i32, y: i32, size: i32) {
    for i in -size..=size {
        canvas.set_pixel_signed(x + i, y);
        canvas.set_pixel_signed(x, y + i);
    }
}

/// Draw a filled circle (for building markers)
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Draw a circle outline (midpoint algorithm). Rings whose box misses the
/// canvas, or that enclose the whole canvas, draw nothing and return false.
pub fn draw_ring(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) -> bool {
    if radius <= 0 {
        canvas.set_pixel_signed(cx, cy);
        return true;
    }

    let (w, h) = canvas.pixel_size();
    let (w, h) = (w as i64, h as i64);
    let (cx, cy, r) = (cx as i64, cy as i64, radius as i64);
    if cx + r < 0 || cy + r < 0 || cx - r >= w || cy - r >= h {
        return false;
    }

    // Farthest canvas pixel from the centre
    let far_x = cx.abs().max((w - 1 - cx).abs());
    let far_y = cy.abs().max((h - 1 - cy).abs());
    if far_x * far_x + far_y * far_y < (r - 1) * (r - 1) {
        return false;
    }

    let mut x = r;
    let mut y = 0;
    let mut err = 1 - r;

    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            let (px, py) = (cx + px, cy + py);
            if (0..w).contains(&px) && (0..h).contains(&py) {
                canvas.set_pixel(px as usize, py as usize);
            }
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
    true
}

/// Draw a closed rectangle outline
pub fn draw_rect(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    draw_line(canvas, x0, y0, x1, y0);
    draw_line(canvas, x1, y0, x1, y1);
    draw_line(canvas, x1, y1, x0, y1);
    draw_line(canvas, x0, y1, x0, y0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        // Top dots of all five cells
        assert_eq!(canvas.to_string(), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert_eq!(canvas.to_string(), "⡇\n⡇");
    }

    #[test]
    fn test_ring_is_hollow() {
        let mut canvas = BrailleCanvas::new(10, 5);
        assert!(draw_ring(&mut canvas, 10, 10, 6));
        assert!(canvas.is_set(16, 10));
        assert!(canvas.is_set(10, 4));
        assert!(!canvas.is_set(10, 10));
    }

    #[test]
    fn test_ring_enclosing_the_canvas_draws_nothing() {
        let mut canvas = BrailleCanvas::new(10, 5);
        assert!(!draw_ring(&mut canvas, 10, 10, i32::MAX));
        assert!(!draw_ring(&mut canvas, 10, 10, 1_000_000));
        assert_eq!(canvas.dot_count(), 0);
    }

    #[test]
    fn test_ring_off_canvas_draws_nothing() {
        let mut canvas = BrailleCanvas::new(10, 5);
        assert!(!draw_ring(&mut canvas, -50, 10, 20));
        assert!(!draw_ring(&mut canvas, i32::MAX, i32::MAX, 5));
        assert_eq!(canvas.dot_count(), 0);
    }

    #[test]
    fn test_ring_crossing_the_edge_is_clipped() {
        let mut canvas = BrailleCanvas::new(10, 5);
        // Centre outside on the left, right arc reaches into the canvas
        assert!(draw_ring(&mut canvas, -5, 10, 10));
        assert!(canvas.is_set(5, 10));
        assert!(canvas.dot_count() > 0);
    }

    #[test]
    fn test_dither_threshold_covers_levels() {
        let mut seen: Vec<u8> = (0..4)
            .flat_map(|y| (0..4).map(move |x| dither_threshold(x, y)))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 16);
        assert_eq!(dither_threshold(-1, -1), dither_threshold(3, 3));
    }
}
