pub mod features;
mod geometry;
mod heat;
pub mod mode;
mod projection;
mod renderer;
mod spatial;

pub use mode::{FeatureRendering, Mode, Transition, ZoomModeController, DEFAULT_DETAIL_ZOOM};
pub use projection::{Viewport, MAX_ZOOM, MIN_ZOOM};
pub use renderer::{LayerSettings, MapLayers, MapRenderer, RenderState};
