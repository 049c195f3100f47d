use std::path::PathBuf;

use clap::Parser;

use crate::map::DEFAULT_DETAIL_ZOOM;

/// Terminal damage-assessment map with zoom-adaptive satellite tiles
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Directory the relative data paths below are resolved against
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding `cropped_row_{row}_col_{col}.webp` images
    #[arg(long, default_value = "images/tiles")]
    pub tiles_dir: PathBuf,

    /// CSV of tile bounds (row, col, lat/lon min/max)
    #[arg(long, default_value = "data/tile_bounds_coords_adj.csv")]
    pub tile_bounds: PathBuf,

    /// Labelled buildings GeoJSON
    #[arg(long, default_value = "data/buildings_with_labels_stripped.geojson")]
    pub buildings: PathBuf,

    /// Per-tile crater detections (JSON)
    #[arg(long, default_value = "data/all_craters.json")]
    pub craters: PathBuf,

    /// Building footprints used by the selection tool
    #[arg(long, default_value = "data/buildings_row_9_col_6.geojson")]
    pub footprints: PathBuf,

    /// Zoom at which the map switches to satellite detail
    #[arg(long, default_value_t = DEFAULT_DETAIL_ZOOM)]
    pub detail_zoom: f64,

    /// Log file (the terminal is taken by the map)
    #[arg(long, default_value = "damage-map.log")]
    pub log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Resolved paths and settings for one map session
#[derive(Clone, Debug, PartialEq)]
pub struct MapConfig {
    pub tiles_dir: PathBuf,
    pub tile_bounds: PathBuf,
    pub buildings: PathBuf,
    pub craters: PathBuf,
    pub footprints: PathBuf,
    pub detail_zoom: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tiles_dir: PathBuf::from("images/tiles"),
            tile_bounds: PathBuf::from("data/tile_bounds_coords_adj.csv"),
            buildings: PathBuf::from("data/buildings_with_labels_stripped.geojson"),
            craters: PathBuf::from("data/all_craters.json"),
            footprints: PathBuf::from("data/buildings_row_9_col_6.geojson"),
            detail_zoom: DEFAULT_DETAIL_ZOOM,
        }
    }
}

impl From<&Args> for MapConfig {
    fn from(args: &Args) -> Self {
        let resolve = |path: &PathBuf| match &args.data_dir {
            Some(root) => root.join(path),
            None => path.clone(),
        };
        Self {
            tiles_dir: resolve(&args.tiles_dir),
            tile_bounds: resolve(&args.tile_bounds),
            buildings: resolve(&args.buildings),
            craters: resolve(&args.craters),
            footprints: resolve(&args.footprints),
            detail_zoom: args.detail_zoom,
        }
    }
}
