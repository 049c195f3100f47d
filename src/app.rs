use tracing::{error, info};

use crate::annotate::{SelectionTool, StrokeOutcome, ToolMode};
use crate::config::MapConfig;
use crate::data;
use crate::geo::GeoBounds;
use crate::map::features::MarkerInfo;
use crate::map::{MapRenderer, Mode, Transition, Viewport, ZoomModeController};
use crate::tiles::{TileIndex, TileLayerCache};
use crate::ui::LEGEND_WIDTH;

/// View used when the data cannot be loaded, as (lat, lon)
pub const DEFAULT_CENTER: (f64, f64) = (31.5, 34.47);
pub const DEFAULT_ZOOM: f64 = 13.0;
/// Fitting the data never zooms in further than this
const FIT_MAX_ZOOM: f64 = 16.0;
/// Braille pixels kept free around fitted data
const FIT_PADDING: usize = 4;

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub tiles: TileIndex,
    pub tile_cache: TileLayerCache,
    pub zoom_mode: ZoomModeController,
    pub tool: SelectionTool,
    /// Load errors shown in the legend panel
    pub notices: Vec<String>,
    /// Marker picked by the last browse click
    pub inspected: Option<MarkerInfo>,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Whether the pointer moved since the button went down
    drag_moved: bool,
}

/// Braille pixel size of the map area for a terminal of `width` x `height`
/// characters: border on every side, legend on the right, status bar below
fn map_pixels(width: usize, height: usize) -> (usize, usize) {
    let inner_width = width.saturating_sub(2 + LEGEND_WIDTH as usize);
    let inner_height = height.saturating_sub(3);
    (inner_width * 2, inner_height * 4)
}

impl App {
    pub fn new(width: usize, height: usize, config: &MapConfig, tile_cache: TileLayerCache) -> Self {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        Self {
            viewport: Viewport::new(DEFAULT_CENTER.1, DEFAULT_CENTER.0, DEFAULT_ZOOM, pixel_width, pixel_height),
            map_renderer: MapRenderer::new(),
            tiles: TileIndex::default(),
            tile_cache,
            zoom_mode: ZoomModeController::new(config.detail_zoom),
            tool: SelectionTool::new(),
            notices: Vec::new(),
            inspected: None,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            drag_moved: false,
        }
    }

    /// Load the tile table and feature layers, then frame the data
    pub fn load(&mut self, config: &MapConfig) {
        self.notices.clear();
        self.tile_cache.clear();

        self.tiles = match TileIndex::load(&config.tile_bounds) {
            Ok(index) => {
                info!(tiles = index.len(), "Tile bounds loaded");
                index
            }
            Err(e) => {
                error!(error = %e, "Error loading tile bounds");
                self.notices.push(format!("Satellite tiles unavailable: {e}"));
                TileIndex::default()
            }
        };

        let notices = data::load_all(&mut self.map_renderer, config);
        self.notices.extend(notices);

        self.fit_to_data();
    }

    /// Fit the view to buildings and craters, then to the tile extent,
    /// then fall back to the default view
    pub fn fit_to_data(&mut self) {
        let points = self
            .map_renderer
            .buildings
            .iter()
            .map(|b| (b.lon, b.lat))
            .chain(self.map_renderer.craters.iter().map(|c| (c.lon, c.lat)));

        match GeoBounds::from_points(points).or_else(|| self.tiles.extent()) {
            Some(bounds) => self.viewport.fit_bounds(&bounds, FIT_PADDING, FIT_MAX_ZOOM),
            None => self.viewport.set_view(DEFAULT_CENTER.1, DEFAULT_CENTER.0, DEFAULT_ZOOM),
        }
        self.view_changed();
    }

    /// Re-evaluate mode and visible tiles after any move, zoom or resize
    pub fn view_changed(&mut self) -> Transition {
        let bounds = self.viewport.bounds();
        let transition = self
            .zoom_mode
            .on_view_changed(self.viewport.zoom, &bounds, &self.tiles, &mut self.tile_cache);
        if transition == Transition::Entered(Mode::Aggregate) {
            self.inspected = None;
        }
        transition
    }

    /// Apply finished tile loads; called once per frame
    pub fn tick(&mut self) -> usize {
        self.tile_cache.apply_completed()
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        self.viewport.width = pixel_width;
        self.viewport.height = pixel_height;
        self.view_changed();
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
        self.view_changed();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.view_changed();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.view_changed();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = screen_to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
        self.view_changed();
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = screen_to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
        self.view_changed();
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn toggle_satellite(&mut self) {
        let bounds = self.viewport.bounds();
        let enabled = !self.zoom_mode.satellite_enabled();
        self.zoom_mode
            .set_satellite_enabled(enabled, &bounds, &self.tiles, &mut self.tile_cache);
    }

    pub fn toggle_buildings(&mut self) {
        let settings = &mut self.map_renderer.settings;
        settings.show_buildings = !settings.show_buildings;
        info!(visible = settings.show_buildings, "Buildings layer toggled");
    }

    pub fn toggle_craters(&mut self) {
        let settings = &mut self.map_renderer.settings;
        settings.show_craters = !settings.show_craters;
        info!(visible = settings.show_craters, "Craters layer toggled");
    }

    /// Arm a drawing tool, or return to browsing if it is already armed
    pub fn toggle_tool(&mut self, mode: ToolMode) {
        self.tool.toggle_mode(mode);
        self.last_mouse = None;
    }

    /// Drop all selections and drawn craters
    pub fn clear_annotations(&mut self) {
        self.tool.clear();
    }

    /// Map coordinates under a terminal cell
    pub fn screen_to_geo(&self, col: u16, row: u16) -> (f64, f64) {
        let (px, py) = screen_to_pixel(col, row);
        // Centre of the character cell
        self.viewport.unproject(px + 1, py + 2)
    }

    fn in_detail(&self) -> bool {
        self.zoom_mode.mode() == Mode::Detail
    }

    /// Mouse button pressed. Lasso strokes only start in Detail, where
    /// footprints are drawn.
    pub fn press_at(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.drag_moved = false;
        if self.tool.mode() == ToolMode::Lasso && !self.in_detail() {
            return;
        }
        if !self.tool.allows_panning() {
            let (lon, lat) = self.screen_to_geo(col, row);
            self.tool.press(lon, lat);
        }
    }

    /// Mouse dragged: extends the stroke, or pans while browsing
    pub fn drag_to(&mut self, col: u16, row: u16) {
        if let Some((last_col, last_row)) = self.last_mouse {
            if (last_col, last_row) != (col, row) {
                self.drag_moved = true;
            }
            if self.tool.is_drawing() {
                let (lon, lat) = self.screen_to_geo(col, row);
                self.tool.drag(lon, lat);
            } else if self.tool.allows_panning() {
                let dx = (last_col as i32 - col as i32) * 2;
                let dy = (last_row as i32 - row as i32) * 4;
                if dx != 0 || dy != 0 {
                    self.pan(dx, dy);
                }
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Mouse released: finishes a stroke. A browse click that did not move
    /// inspects the marker under it, or else toggles the footprint under it.
    /// Clicks only act in Detail, where markers and footprints are drawn.
    pub fn release_at(&mut self, col: u16, row: u16) -> StrokeOutcome {
        let outcome = if self.tool.is_drawing() {
            self.tool.release(&self.map_renderer.footprints)
        } else if !self.drag_moved && self.last_mouse.is_some() && self.in_detail() {
            self.click_at(col, row)
        } else {
            StrokeOutcome::Idle
        };
        self.last_mouse = None;
        self.drag_moved = false;
        outcome
    }

    fn click_at(&mut self, col: u16, row: u16) -> StrokeOutcome {
        if self.tool.mode() != ToolMode::Browse {
            return StrokeOutcome::Idle;
        }

        let (px, py) = screen_to_pixel(col, row);
        self.inspected = self.map_renderer.marker_at(&self.viewport, px + 1, py + 2);
        if let Some(marker) = &self.inspected {
            info!(%marker, "Marker inspected");
            return StrokeOutcome::Idle;
        }

        let (lon, lat) = self.screen_to_geo(col, row);
        match self.tool.click(lon, lat, &self.map_renderer.footprints) {
            Some(id) => StrokeOutcome::Toggled(vec![id]),
            None => StrokeOutcome::Idle,
        }
    }

    /// Update mouse cursor position
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Get mouse position in braille pixel coordinates (for rendering marker)
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| screen_to_pixel(col, row))
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("z{:.0}", self.viewport.zoom)
    }

    /// Loaded tiles, plus pending loads when any are in flight
    pub fn tile_status(&self) -> String {
        let loaded = self.tile_cache.len();
        match self.tile_cache.in_flight() {
            0 => format!("{loaded} tiles"),
            pending => format!("{loaded} tiles (+{pending})"),
        }
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        format!(
            "{:.4}°{}, {:.4}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }
}

/// Terminal cell to braille pixel. Each cell is 2 pixels wide and 4 tall,
/// and the map starts one cell in from the border.
fn screen_to_pixel(col: u16, row: u16) -> (i32, i32) {
    let px = (col.saturating_sub(1) as i32) * 2;
    let py = (row.saturating_sub(1) as i32) * 4;
    (px, py)
}
