use std::f64::consts::PI;

use crate::geo::{GeoBounds, ViewportBounds};

/// Lowest zoom level the viewport allows
pub const MIN_ZOOM: f64 = 2.0;
/// Highest zoom level the viewport allows
pub const MAX_ZOOM: f64 = 19.0;
/// Width of the whole world in Braille pixels at zoom 0.
/// Terminal dots are much coarser than screen pixels, so this is a quarter
/// of the usual 256.
const WORLD_PIXELS: f64 = 64.0;
/// Web Mercator latitude limit
const MAX_LAT: f64 = 85.051_128_78;

/// Viewport representing the visible map area and zoom level
#[derive(Clone, Debug)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude
    pub center_lat: f64,
    /// Zoom level; each step doubles the scale
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

/// Normalized Web Mercator x in [0, 1)
#[inline(always)]
fn mercator_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Normalized Web Mercator y, 0 at the north limit
#[inline(always)]
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

#[inline(always)]
fn inverse_mercator(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    (lon, lat)
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    /// World size in pixels at the current zoom
    #[inline(always)]
    fn world_size(&self) -> f64 {
        WORLD_PIXELS * self.zoom.exp2()
    }

    /// Move the view to a new center and zoom
    pub fn set_view(&mut self, center_lon: f64, center_lat: f64, zoom: f64) {
        self.center_lon = center_lon;
        self.center_lat = center_lat.clamp(-MAX_LAT, MAX_LAT);
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Center on `bounds` at the highest whole zoom level that fits it inside
    /// the canvas minus `padding` pixels per side, capped at `max_zoom`.
    pub fn fit_bounds(&mut self, bounds: &GeoBounds, padding: usize, max_zoom: f64) {
        let avail_w = self.width.saturating_sub(padding * 2).max(1) as f64;
        let avail_h = self.height.saturating_sub(padding * 2).max(1) as f64;

        let span_x = (mercator_x(bounds.lon_max) - mercator_x(bounds.lon_min)).abs();
        let span_y = (mercator_y(bounds.lat_min) - mercator_y(bounds.lat_max)).abs();

        let mut zoom = max_zoom.min(MAX_ZOOM).floor();
        while zoom > MIN_ZOOM {
            let world = WORLD_PIXELS * zoom.exp2();
            if span_x * world <= avail_w && span_y * world <= avail_h {
                break;
            }
            zoom -= 1.0;
        }

        let (lon, lat) = bounds.center();
        self.set_view(lon, lat, zoom);
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let world = self.world_size();
        let x = mercator_x(self.center_lon) + dx as f64 / world;
        let y = (mercator_y(self.center_lat) + dy as f64 / world).clamp(0.0, 1.0);
        let (mut lon, lat) = inverse_mercator(x, y);

        // Wrap longitude
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }

        self.center_lon = lon;
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
    }

    /// Zoom in one level
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + 1.0).min(MAX_ZOOM);
    }

    /// Zoom out one level
    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - 1.0).max(MIN_ZOOM);
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0);
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, -1.0);
    }

    /// Change zoom by `delta` levels keeping the point under (px, py) fixed
    fn zoom_at(&mut self, px: i32, py: i32, delta: f64) {
        // Get the geographic coordinates under the mouse
        let (lon, lat) = self.unproject(px, py);

        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);

        // Pan so that point is back under the mouse
        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    /// Project to fractional pixel coordinates
    #[inline(always)]
    pub fn project_f64(&self, lon: f64, lat: f64) -> (f64, f64) {
        let world = self.world_size();
        let px = (mercator_x(lon) - mercator_x(self.center_lon)) * world + self.width as f64 / 2.0;
        let py = (mercator_y(lat) - mercator_y(self.center_lat)) * world + self.height as f64 / 2.0;
        (px, py)
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    #[inline(always)]
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let (px, py) = self.project_f64(lon, lat);
        (px.floor() as i32, py.floor() as i32)
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        self.unproject_f64(px as f64, py as f64)
    }

    fn unproject_f64(&self, px: f64, py: f64) -> (f64, f64) {
        let world = self.world_size();
        let x = (px - self.width as f64 / 2.0) / world + mercator_x(self.center_lon);
        let y = (py - self.height as f64 / 2.0) / world + mercator_y(self.center_lat);
        inverse_mercator(x, y)
    }

    /// Geographic area covered by the canvas
    pub fn bounds(&self) -> ViewportBounds {
        let (west, north) = self.unproject_f64(0.0, 0.0);
        let (east, south) = self.unproject_f64(self.width as f64, self.height as f64);
        ViewportBounds::new(north, south, east, west)
    }

    /// Ground metres covered by one pixel at a latitude
    pub fn metres_per_pixel(&self, lat: f64) -> f64 {
        const EQUATOR_M: f64 = 40_075_016.686;
        EQUATOR_M * lat.to_radians().cos() / self.world_size()
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}
