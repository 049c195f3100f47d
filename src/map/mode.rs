use tracing::{debug, info};

use crate::geo::ViewportBounds;
use crate::tiles::{resolve, TileIndex, TileLayerCache};

/// Zoom level at which the map switches to per-feature detail
pub const DEFAULT_DETAIL_ZOOM: f64 = 16.0;

/// Map rendering mode, derived purely from zoom
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Heat aggregate, no satellite tiles
    Aggregate,
    /// Discrete markers, satellite tiles when enabled
    Detail,
}

impl Mode {
    /// Detail is inclusive of the threshold
    #[inline(always)]
    pub fn from_zoom(zoom: f64, threshold: f64) -> Self {
        if zoom >= threshold {
            Mode::Detail
        } else {
            Mode::Aggregate
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Aggregate => "aggregate",
            Mode::Detail => "detail",
        }
    }

    /// How point features are drawn in this mode
    pub fn rendering(self) -> FeatureRendering {
        match self {
            Mode::Aggregate => FeatureRendering::Heat,
            Mode::Detail => FeatureRendering::Markers,
        }
    }
}

/// Exactly one of these is active at any time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureRendering {
    Heat,
    Markers,
}

/// Result of feeding a view change to the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Unchanged(Mode),
    Entered(Mode),
}

impl Transition {
    pub fn mode(self) -> Mode {
        match self {
            Transition::Unchanged(m) | Transition::Entered(m) => m,
        }
    }
}

/// Two-state switch between the aggregate and detail views.
///
/// Entering Aggregate clears every tile overlay. In Detail, every view
/// change resolves the visible tiles and reconciles the cache when the
/// satellite layer is enabled. Zoom direction does not matter: the mode
/// always follows the last zoom seen.
#[derive(Debug)]
pub struct ZoomModeController {
    threshold: f64,
    mode: Mode,
    satellite_enabled: bool,
}

impl ZoomModeController {
    /// Starts in Aggregate with the satellite layer enabled
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            mode: Mode::Aggregate,
            satellite_enabled: true,
        }
    }

    #[inline(always)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline(always)]
    pub fn rendering(&self) -> FeatureRendering {
        self.mode.rendering()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn satellite_enabled(&self) -> bool {
        self.satellite_enabled
    }

    /// Handle a move or zoom of the map
    pub fn on_view_changed(
        &mut self,
        zoom: f64,
        bounds: &ViewportBounds,
        index: &TileIndex,
        cache: &mut TileLayerCache,
    ) -> Transition {
        let next = Mode::from_zoom(zoom, self.threshold);
        let entered = next != self.mode;
        self.mode = next;

        if entered {
            info!(mode = next.label(), zoom, "Map mode changed");
        }

        match next {
            Mode::Aggregate => {
                if entered {
                    cache.clear();
                }
            }
            Mode::Detail => {
                if self.satellite_enabled {
                    Self::refresh_tiles(bounds, index, cache);
                }
            }
        }

        if entered {
            Transition::Entered(next)
        } else {
            Transition::Unchanged(next)
        }
    }

    /// Turn the satellite layer on or off. Off clears every overlay; on
    /// loads the current view straight away when in Detail.
    pub fn set_satellite_enabled(
        &mut self,
        enabled: bool,
        bounds: &ViewportBounds,
        index: &TileIndex,
        cache: &mut TileLayerCache,
    ) {
        if enabled == self.satellite_enabled {
            return;
        }
        self.satellite_enabled = enabled;
        info!(enabled, "Satellite layer toggled");

        if !enabled {
            cache.clear();
        } else if self.mode == Mode::Detail {
            Self::refresh_tiles(bounds, index, cache);
        }
    }

    fn refresh_tiles(bounds: &ViewportBounds, index: &TileIndex, cache: &mut TileLayerCache) {
        let desired = resolve(bounds, index.records());
        let started = cache.reconcile(&desired, |key| index.get(key));
        debug!(visible = desired.len(), started, "Resolved visible tiles");
    }
}
