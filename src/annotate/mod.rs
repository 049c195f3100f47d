//! Building-selection annotation tool.
//!
//! The tool owns all drawing state. Handlers get it by reference from the
//! app and drive it through `press`, `drag` and `release`.

mod polygon;

use std::collections::HashSet;

use tracing::{debug, info};

use crate::geo::{haversine_m, GeoBounds};
use crate::map::features::FootprintLayer;

pub use polygon::{lasso_hits, point_in_polygon};

/// Craters smaller than this are treated as accidental clicks
const MIN_CRATER_RADIUS_M: f64 = 1.0;

/// Which tool is armed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolMode {
    /// Map pans on drag, clicking a footprint toggles it
    Browse,
    /// Drag draws a lasso that toggles the footprints it catches
    Lasso,
    /// Drag draws a crater from its centre outward
    Crater,
}

impl ToolMode {
    pub fn label(self) -> &'static str {
        match self {
            ToolMode::Browse => "browse",
            ToolMode::Lasso => "select",
            ToolMode::Crater => "crater",
        }
    }
}

/// Stroke in progress
#[derive(Clone, Debug, PartialEq)]
enum Stroke {
    Idle,
    Lasso(Vec<(f64, f64)>),
    Crater { center: (f64, f64), radius_m: f64 },
}

/// A crater marked by hand
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawnCrater {
    pub lon: f64,
    pub lat: f64,
    pub radius_m: f64,
}

/// What finishing a stroke did
#[derive(Clone, Debug, PartialEq)]
pub enum StrokeOutcome {
    /// Nothing was being drawn
    Idle,
    /// Stroke too small to count
    Discarded,
    /// Footprints whose selection flipped
    Toggled(Vec<String>),
    CraterAdded(DrawnCrater),
}

#[derive(Debug)]
pub struct SelectionTool {
    mode: ToolMode,
    stroke: Stroke,
    selected: HashSet<String>,
    craters: Vec<DrawnCrater>,
}

impl Default for SelectionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionTool {
    pub fn new() -> Self {
        Self {
            mode: ToolMode::Browse,
            stroke: Stroke::Idle,
            selected: HashSet::new(),
            craters: Vec::new(),
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    /// Arm `mode`, or go back to Browse if it is already armed.
    /// Any stroke in progress is dropped.
    pub fn toggle_mode(&mut self, mode: ToolMode) {
        self.mode = if self.mode == mode { ToolMode::Browse } else { mode };
        self.stroke = Stroke::Idle;
        debug!(mode = self.mode.label(), "Selection tool mode");
    }

    /// Map dragging is only allowed while browsing
    pub fn allows_panning(&self) -> bool {
        self.mode == ToolMode::Browse
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke != Stroke::Idle
    }

    /// Start a stroke at (lon, lat). No-op while browsing.
    pub fn press(&mut self, lon: f64, lat: f64) {
        self.stroke = match self.mode {
            ToolMode::Browse => Stroke::Idle,
            ToolMode::Lasso => Stroke::Lasso(vec![(lon, lat)]),
            ToolMode::Crater => Stroke::Crater {
                center: (lon, lat),
                radius_m: 0.0,
            },
        };
    }

    /// Extend the current stroke
    pub fn drag(&mut self, lon: f64, lat: f64) {
        match &mut self.stroke {
            Stroke::Idle => {}
            Stroke::Lasso(points) => points.push((lon, lat)),
            Stroke::Crater { center, radius_m } => {
                *radius_m = haversine_m(center.0, center.1, lon, lat);
            }
        }
    }

    /// Finish the current stroke
    pub fn release(&mut self, footprints: &FootprintLayer) -> StrokeOutcome {
        match std::mem::replace(&mut self.stroke, Stroke::Idle) {
            Stroke::Idle => StrokeOutcome::Idle,
            Stroke::Lasso(points) => self.finish_lasso(points, footprints),
            Stroke::Crater { center, radius_m } => {
                if radius_m <= MIN_CRATER_RADIUS_M {
                    return StrokeOutcome::Discarded;
                }
                let crater = DrawnCrater {
                    lon: center.0,
                    lat: center.1,
                    radius_m,
                };
                info!(lon = crater.lon, lat = crater.lat, radius_m, "Crater marked");
                self.craters.push(crater);
                StrokeOutcome::CraterAdded(crater)
            }
        }
    }

    fn finish_lasso(&mut self, mut points: Vec<(f64, f64)>, footprints: &FootprintLayer) -> StrokeOutcome {
        if points.len() < 3 {
            return StrokeOutcome::Discarded;
        }
        points.push(points[0]);

        let Some(lasso_bounds) = GeoBounds::from_points(points.iter().copied()) else {
            return StrokeOutcome::Discarded;
        };
        let hits: Vec<String> = footprints
            .in_bounds(&lasso_bounds)
            .filter(|f| lasso_hits(&points, &lasso_bounds, &f.ring, &f.bounds))
            .map(|f| f.id.clone())
            .collect();

        for id in &hits {
            self.toggle_selection(id);
        }
        info!(toggled = hits.len(), selected = self.selected.len(), "Lasso selection applied");
        StrokeOutcome::Toggled(hits)
    }

    /// Toggle the footprint under (lon, lat). Only while browsing.
    pub fn click(&mut self, lon: f64, lat: f64, footprints: &FootprintLayer) -> Option<String> {
        if self.mode != ToolMode::Browse {
            return None;
        }
        let id = footprints.hit(lon, lat)?.id.clone();
        self.toggle_selection(&id);
        Some(id)
    }

    /// Flip one footprint's selection; returns whether it is now selected
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            debug!(id, "Building unselected");
            false
        } else {
            self.selected.insert(id.to_string());
            debug!(id, "Building selected as damaged");
            true
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn craters(&self) -> &[DrawnCrater] {
        &self.craters
    }

    /// Lasso points drawn so far
    pub fn lasso_points(&self) -> Option<&[(f64, f64)]> {
        match &self.stroke {
            Stroke::Lasso(points) => Some(points),
            _ => None,
        }
    }

    /// Crater currently being sized
    pub fn pending_crater(&self) -> Option<DrawnCrater> {
        match self.stroke {
            Stroke::Crater { center, radius_m } => Some(DrawnCrater {
                lon: center.0,
                lat: center.1,
                radius_m,
            }),
            _ => None,
        }
    }

    /// Drop every selection and drawn crater
    pub fn clear(&mut self) {
        info!(
            buildings = self.selected.len(),
            craters = self.craters.len(),
            "Clearing selections"
        );
        self.selected.clear();
        self.craters.clear();
        self.stroke = Stroke::Idle;
    }
}
