use crate::annotate::{DrawnCrater, SelectionTool};
use crate::braille::BrailleCanvas;
use crate::map::features::{CraterMarker, DamagedBuilding, FootprintLayer, MarkerInfo};
use crate::map::geometry::{dither_threshold, draw_circle, draw_line, draw_marker, draw_rect, draw_ring};
use crate::map::heat::HeatGrid;
use crate::map::mode::FeatureRendering;
use crate::map::projection::Viewport;
use crate::tiles::TileOverlay;

/// Click distance in pixels that still picks a marker
const PICK_RADIUS_PX: i64 = 3;

/// Display settings for feature layers (the satellite switch lives in the
/// zoom mode controller)
#[derive(Clone, Debug)]
pub struct LayerSettings {
    pub show_buildings: bool,
    pub show_craters: bool,
    pub show_footprints: bool,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            show_buildings: true,
            show_craters: true,
            show_footprints: true,
        }
    }
}

/// One Braille canvas per color, plus text labels
pub struct MapLayers {
    pub satellite: BrailleCanvas,
    pub tile_edges: BrailleCanvas,
    pub footprints: BrailleCanvas,
    pub selected: BrailleCanvas,
    /// Low, medium and high density bands
    pub heat: [BrailleCanvas; 3],
    pub buildings: BrailleCanvas,
    pub craters: BrailleCanvas,
    pub drawing: BrailleCanvas,
    /// (column, row, text) in character cells
    pub labels: Vec<(u16, u16, String)>,
}

impl MapLayers {
    fn new(cols: usize, rows: usize) -> Self {
        let canvas = || BrailleCanvas::new(cols, rows);
        Self {
            satellite: canvas(),
            tile_edges: canvas(),
            footprints: canvas(),
            selected: canvas(),
            heat: [canvas(), canvas(), canvas()],
            buildings: canvas(),
            craters: canvas(),
            drawing: canvas(),
            labels: Vec::new(),
        }
    }
}

/// What the renderer needs beyond its own feature data
pub struct RenderState<'a, I>
where
    I: Iterator<Item = &'a TileOverlay>,
{
    pub rendering: FeatureRendering,
    pub overlays: I,
    pub tool: &'a SelectionTool,
}

/// Feature data and the drawing of every map layer
#[derive(Default)]
pub struct MapRenderer {
    pub buildings: Vec<DamagedBuilding>,
    pub craters: Vec<CraterMarker>,
    pub footprints: FootprintLayer,
    pub settings: LayerSettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render all layers for a canvas of `cols` x `rows` characters
    pub fn render<'a, I>(&self, cols: usize, rows: usize, viewport: &Viewport, state: RenderState<'a, I>) -> MapLayers
    where
        I: Iterator<Item = &'a TileOverlay>,
    {
        let mut layers = MapLayers::new(cols, rows);

        for overlay in state.overlays {
            self.draw_overlay(&mut layers, overlay, viewport);
        }

        match state.rendering {
            FeatureRendering::Heat => self.draw_heat(&mut layers, viewport),
            FeatureRendering::Markers => {
                if self.settings.show_footprints {
                    self.draw_footprints(&mut layers, viewport, state.tool);
                }
                self.draw_markers(&mut layers, viewport);
            }
        }

        self.draw_annotations(&mut layers, viewport, state.tool);
        layers
    }

    /// Marker drawn nearest to pixel (`px`, `py`), within a few pixels of
    /// a building dot or of a crater's centre or ring
    pub fn marker_at(&self, viewport: &Viewport, px: i32, py: i32) -> Option<MarkerInfo> {
        let distance = |lon: f64, lat: f64| {
            let (mx, my) = viewport.project(lon, lat);
            let (dx, dy) = (mx as i64 - px as i64, my as i64 - py as i64);
            ((dx * dx + dy * dy) as f64).sqrt()
        };

        let buildings = self
            .buildings
            .iter()
            .filter(|_| self.settings.show_buildings)
            .map(|b| (distance(b.lon, b.lat), MarkerInfo::Building(b.clone())));
        let craters = self
            .craters
            .iter()
            .filter(|_| self.settings.show_craters)
            .map(|c| {
                let d = distance(c.lon, c.lat);
                let ring = ring_radius(c.radius_m, c.lat, viewport) as f64;
                (d.min((d - ring).abs()), MarkerInfo::Crater(c.clone()))
            });

        buildings
            .chain(craters)
            .filter(|(d, _)| *d <= PICK_RADIUS_PX as f64)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, marker)| marker)
    }

    /// Dithered satellite imagery stretched over the tile's bounds
    fn draw_overlay(&self, layers: &mut MapLayers, overlay: &TileOverlay, viewport: &Viewport) {
        let b = &overlay.bounds;
        let (x0, y0) = viewport.project_f64(b.lon_min, b.lat_max);
        let (x1, y1) = viewport.project_f64(b.lon_max, b.lat_min);
        let (w, h) = (x1 - x0, y1 - y0);
        if w <= 0.0 || h <= 0.0 {
            return;
        }

        let px_min = x0.floor().max(0.0) as i32;
        let py_min = y0.floor().max(0.0) as i32;
        let px_max = x1.ceil().min(viewport.width as f64) as i32;
        let py_max = y1.ceil().min(viewport.height as f64) as i32;

        for py in py_min..py_max {
            let v = (py as f64 + 0.5 - y0) / h;
            for px in px_min..px_max {
                let u = (px as f64 + 0.5 - x0) / w;
                if overlay.image.sample(u, v) > dither_threshold(px, py) {
                    layers.satellite.set_pixel_signed(px, py);
                }
            }
        }

        let (ex0, ey0) = viewport.project(b.lon_min, b.lat_max);
        let (ex1, ey1) = viewport.project(b.lon_max, b.lat_min);
        if viewport.line_might_be_visible((ex0, ey0), (ex1, ey1)) {
            draw_rect(&mut layers.tile_edges, ex0, ey0, ex1, ey1);
        }
    }

    /// Visible point features (buildings and craters) for the active layers
    fn visible_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let buildings = self
            .buildings
            .iter()
            .filter(|_| self.settings.show_buildings)
            .map(|b| (b.lon, b.lat));
        let craters = self
            .craters
            .iter()
            .filter(|_| self.settings.show_craters)
            .map(|c| (c.lon, c.lat));
        buildings.chain(craters)
    }

    fn draw_heat(&self, layers: &mut MapLayers, viewport: &Viewport) {
        let mut grid = HeatGrid::new();
        grid.rebuild(self.visible_points(), viewport);

        for (x, y, intensity) in grid.iter_cells() {
            let band = match intensity {
                0..=85 => 0,
                86..=170 => 1,
                _ => 2,
            };
            for py in y..y + HeatGrid::CELL as i32 {
                for px in x..x + HeatGrid::CELL as i32 {
                    if intensity > dither_threshold(px, py) {
                        layers.heat[band].set_pixel_signed(px, py);
                    }
                }
            }
        }
    }

    fn draw_markers(&self, layers: &mut MapLayers, viewport: &Viewport) {
        if self.settings.show_buildings {
            let radius = if viewport.zoom >= 18.0 { 2 } else { 1 };
            for building in &self.buildings {
                let (px, py) = viewport.project(building.lon, building.lat);
                if viewport.is_visible(px, py) {
                    draw_circle(&mut layers.buildings, px, py, radius);
                }
            }
        }

        if self.settings.show_craters {
            for crater in &self.craters {
                let (px, py) = viewport.project(crater.lon, crater.lat);
                if !viewport.is_visible(px, py) {
                    continue;
                }
                draw_ring(&mut layers.craters, px, py, ring_radius(crater.radius_m, crater.lat, viewport));
                layers.craters.set_pixel_signed(px, py);
            }
        }
    }

    fn draw_footprints(&self, layers: &mut MapLayers, viewport: &Viewport, tool: &SelectionTool) {
        let view = viewport.bounds().as_geo();
        for footprint in self.footprints.in_bounds(&view) {
            let canvas = if tool.is_selected(&footprint.id) {
                &mut layers.selected
            } else {
                &mut layers.footprints
            };
            draw_polyline(canvas, &footprint.ring, true, viewport);
        }
    }

    /// Drawn craters and the stroke in progress
    fn draw_annotations(&self, layers: &mut MapLayers, viewport: &Viewport, tool: &SelectionTool) {
        for crater in tool.craters() {
            draw_drawn_crater(layers, crater, viewport);
        }

        if let Some(points) = tool.lasso_points() {
            draw_polyline(&mut layers.drawing, points, false, viewport);
        }

        if let Some(crater) = tool.pending_crater() {
            let (px, py) = viewport.project(crater.lon, crater.lat);
            draw_marker(&mut layers.drawing, px, py, 1);
            draw_drawn_crater(layers, &crater, viewport);
        }
    }
}

/// Ring radius in pixels, at least one. Saturates for huge radii.
fn ring_radius(radius_m: f64, lat: f64, viewport: &Viewport) -> i32 {
    let px = (radius_m / viewport.metres_per_pixel(lat)).round();
    if px.is_nan() {
        return 1;
    }
    (px as i32).max(1)
}

fn draw_drawn_crater(layers: &mut MapLayers, crater: &DrawnCrater, viewport: &Viewport) {
    let (px, py) = viewport.project(crater.lon, crater.lat);
    if !viewport.is_visible(px, py) {
        return;
    }
    let radius = ring_radius(crater.radius_m, crater.lat, viewport);
    if !draw_ring(&mut layers.drawing, px, py, radius) {
        return;
    }

    // Label to the right of the ring, in character cells
    let char_x = (px + radius) / 2 + 1;
    let char_y = py / 4;
    if char_x >= 0 && char_y >= 0 {
        layers
            .labels
            .push((char_x as u16, char_y as u16, format!("{:.0}m", crater.radius_m)));
    }
}

/// Draw a lon/lat polyline with viewport culling
fn draw_polyline(canvas: &mut BrailleCanvas, points: &[(f64, f64)], closed: bool, viewport: &Viewport) {
    let mut prev: Option<(i32, i32)> = None;
    let first = points.first().map(|&(lon, lat)| viewport.project(lon, lat));

    for &(lon, lat) in points {
        let p = viewport.project(lon, lat);
        if let Some(q) = prev {
            if viewport.line_might_be_visible(q, p) {
                draw_line(canvas, q.0, q.1, p.0, p.1);
            }
        }
        prev = Some(p);
    }

    if let (true, Some(a), Some(b)) = (closed, prev, first) {
        if viewport.line_might_be_visible(a, b) {
            draw_line(canvas, a.0, a.1, b.0, b.1);
        }
    }
}
