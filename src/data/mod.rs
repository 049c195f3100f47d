use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geojson::{feature::Id, Feature, GeoJson, JsonObject, JsonValue, Value};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::MapConfig;
use crate::map::features::{CraterMarker, DamagedBuilding, Footprint, FootprintLayer};
use crate::map::MapRenderer;
use crate::tiles::TileKey;

/// Crater detections for one imagery tile
#[derive(Debug, Deserialize)]
struct CraterTile {
    row: i32,
    col: i32,
    #[serde(default)]
    craters: Vec<RawCrater>,
}

#[derive(Debug, Deserialize)]
struct RawCrater {
    lat: Option<f64>,
    lng: Option<f64>,
    #[serde(default)]
    radius: f64,
}

/// Load every feature layer named in `config`. A layer that fails to load
/// is left empty and reported in the returned notices.
pub fn load_all(renderer: &mut MapRenderer, config: &MapConfig) -> Vec<String> {
    let mut notices = Vec::new();

    if let Err(e) = load_buildings(renderer, &config.buildings) {
        error!(error = %e, "Error loading building data");
        notices.push(format!("Failed to load building data: {e:#}"));
    }
    if let Err(e) = load_craters(renderer, &config.craters) {
        error!(error = %e, "Error loading crater data");
        notices.push(format!("Failed to load crater data: {e:#}"));
    }
    // Footprints only feed the selection tool; a missing file is not worth a notice
    if let Err(e) = load_footprints(renderer, &config.footprints) {
        debug!(error = %e, "No building footprints");
    }

    notices
}

/// Load damaged-building markers into the renderer
pub fn load_buildings(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    renderer.buildings = parse_buildings(&content)?;
    info!(count = renderer.buildings.len(), "Displaying damaged buildings");
    Ok(renderer.buildings.len())
}

/// Load crater markers into the renderer
pub fn load_craters(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    renderer.craters = parse_craters(&mut bytes)?;
    info!(count = renderer.craters.len(), "Displaying craters");
    Ok(renderer.craters.len())
}

/// Load building footprints for the selection tool
pub fn load_footprints(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let footprints = parse_footprints(&content)?;
    let count = footprints.len();
    renderer.footprints = FootprintLayer::new(footprints);
    info!(count, "Added building footprints");
    Ok(count)
}

/// Damaged buildings from a feature collection: features labelled
/// `is_damaged_labeled == "True"` with `center_lat` / `center_lon`
/// properties. A Point geometry stands in for missing center properties.
pub fn parse_buildings(content: &str) -> Result<Vec<DamagedBuilding>> {
    let GeoJson::FeatureCollection(fc) = content.parse::<GeoJson>()? else {
        bail!("building data is not a FeatureCollection");
    };

    let total = fc.features.len();
    let buildings: Vec<DamagedBuilding> = fc
        .features
        .iter()
        .enumerate()
        .filter_map(|(idx, feature)| {
            let props = feature.properties.as_ref()?;
            if !is_damaged(props) {
                return None;
            }
            let (lon, lat) = match (prop_f64(props, "center_lon"), prop_f64(props, "center_lat")) {
                (Some(lon), Some(lat)) => (lon, lat),
                _ => point_of(feature)?,
            };
            Some(DamagedBuilding {
                id: feature_id(feature).unwrap_or_else(|| format!("building-{idx}")),
                lon,
                lat,
            })
        })
        .collect();

    debug!(total, damaged = buildings.len(), "Parsed building features");
    Ok(buildings)
}

/// Craters from the per-tile detection list. Craters without usable
/// coordinates or with a negative or non-finite radius are skipped.
pub fn parse_craters(bytes: &mut [u8]) -> Result<Vec<CraterMarker>> {
    let tiles: Vec<CraterTile> = simd_json::serde::from_slice(bytes).context("parsing crater list")?;

    let craters = tiles
        .iter()
        .flat_map(|tile| {
            let key = TileKey::new(tile.row, tile.col);
            tile.craters.iter().filter_map(move |c| match (c.lat, c.lng) {
                _ if !c.radius.is_finite() || c.radius < 0.0 => {
                    debug!(row = key.row, col = key.col, radius = c.radius, "Skipping crater with bad radius");
                    None
                }
                (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => Some(CraterMarker {
                    lon: lng,
                    lat,
                    radius_m: c.radius,
                    tile: key,
                }),
                _ => None,
            })
        })
        .collect();
    Ok(craters)
}

/// Building outlines (exterior rings of Polygon / MultiPolygon features)
pub fn parse_footprints(content: &str) -> Result<Vec<Footprint>> {
    let GeoJson::FeatureCollection(fc) = content.parse::<GeoJson>()? else {
        bail!("footprint data is not a FeatureCollection");
    };

    let mut footprints = Vec::new();
    for (idx, feature) in fc.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let id = feature_id(feature).unwrap_or_else(|| format!("footprint-{idx}"));
        match &geometry.value {
            Value::Polygon(rings) => {
                if let Some(fp) = rings.first().and_then(|r| Footprint::new(id, to_ring(r))) {
                    footprints.push(fp);
                }
            }
            Value::MultiPolygon(polygons) => {
                for (part, rings) in polygons.iter().enumerate() {
                    let part_id = if part == 0 { id.clone() } else { format!("{id}#{part}") };
                    if let Some(fp) = rings.first().and_then(|r| Footprint::new(part_id, to_ring(r))) {
                        footprints.push(fp);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(footprints)
}

fn to_ring(coords: &[Vec<f64>]) -> Vec<(f64, f64)> {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| (c[0], c[1]))
        .collect()
}

fn is_damaged(props: &JsonObject) -> bool {
    match props.get("is_damaged_labeled") {
        Some(JsonValue::String(s)) => s == "True",
        Some(JsonValue::Bool(b)) => *b,
        _ => false,
    }
}

/// Numeric property, accepting numbers or numeric strings
fn prop_f64(props: &JsonObject, key: &str) -> Option<f64> {
    match props.get(key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

/// Feature id, falling back to `properties.id`
fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => return Some(s.clone()),
        Some(Id::Number(n)) => return Some(n.to_string()),
        None => {}
    }
    match feature.properties.as_ref()?.get("id")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn point_of(feature: &Feature) -> Option<(f64, f64)> {
    match &feature.geometry.as_ref()?.value {
        Value::Point(c) if c.len() >= 2 => Some((c[0], c[1])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILDINGS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": null,
             "properties": {"id": 17, "is_damaged_labeled": "True", "center_lat": 31.505, "center_lon": 34.475}},
            {"type": "Feature", "geometry": null,
             "properties": {"id": 18, "is_damaged_labeled": "False", "center_lat": 31.506, "center_lon": 34.476}},
            {"type": "Feature", "id": "pt", "geometry": {"type": "Point", "coordinates": [34.48, 31.51]},
             "properties": {"is_damaged_labeled": "True"}},
            {"type": "Feature", "geometry": null, "properties": {"is_damaged_labeled": "True"}}
        ]
    }"#;

    #[test]
    fn test_parse_buildings_keeps_damaged_only() {
        let buildings = parse_buildings(BUILDINGS).unwrap();
        assert_eq!(buildings.len(), 2);
        assert_eq!(buildings[0].id, "17");
        assert_eq!((buildings[0].lon, buildings[0].lat), (34.475, 31.505));
        assert_eq!(buildings[1].id, "pt");
        assert_eq!((buildings[1].lon, buildings[1].lat), (34.48, 31.51));
    }

    #[test]
    fn test_parse_buildings_rejects_non_collection() {
        let single = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(parse_buildings(single).is_err());
        assert!(parse_buildings("not json").is_err());
    }

    #[test]
    fn test_parse_craters() {
        let mut json = br#"[
            {"row": 9, "col": 6, "craters": [
                {"lat": 31.505, "lng": 34.475, "radius": 4.5},
                {"lat": 0, "lng": 34.475, "radius": 2.0},
                {"lng": 34.475, "radius": 2.0}
            ]},
            {"row": 9, "col": 7},
            {"row": 10, "col": 6, "craters": [{"lat": 31.49, "lng": 34.47, "radius": 7.25}]}
        ]"#
        .to_vec();
        let craters = parse_craters(&mut json).unwrap();
        assert_eq!(craters.len(), 2);
        assert_eq!(craters[0].tile, TileKey::new(9, 6));
        assert_eq!(craters[0].radius_m, 4.5);
        assert_eq!(craters[1].tile, TileKey::new(10, 6));
    }

    #[test]
    fn test_parse_craters_skips_bad_radius() {
        let mut json = br#"[
            {"row": 9, "col": 6, "craters": [
                {"lat": 31.505, "lng": 34.475, "radius": -3.0},
                {"lat": 31.506, "lng": 34.476, "radius": 1e400},
                {"lat": 31.507, "lng": 34.477, "radius": 0.0}
            ]}
        ]"#
        .to_vec();
        // An out-of-range literal may be rejected by the parser outright
        if let Ok(craters) = parse_craters(&mut json) {
            assert_eq!(craters.len(), 1);
            assert_eq!(craters[0].lat, 31.507);
        }

        let mut json = br#"[{"row": 1, "col": 2, "craters": [
            {"lat": 31.5, "lng": 34.4, "radius": -0.5},
            {"lat": 31.5, "lng": 34.4, "radius": 6.0}
        ]}]"#
        .to_vec();
        let craters = parse_craters(&mut json).unwrap();
        assert_eq!(craters.len(), 1);
        assert_eq!(craters[0].radius_m, 6.0);
    }

    #[test]
    fn test_parse_craters_invalid() {
        let mut json = b"{\"row\": 1}".to_vec();
        assert!(parse_craters(&mut json).is_err());
    }

    #[test]
    fn test_parse_footprints() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "a", "properties": {},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type": "Feature", "properties": {"id": "m"},
                 "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[2,2],[3,2],[3,3],[2,2]]],
                    [[[5,5],[6,5],[6,6],[5,5]]]
                 ]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]
        }"#;
        let footprints = parse_footprints(json).unwrap();
        let ids: Vec<&str> = footprints.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "m#1"]);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let mut renderer = MapRenderer::new();
        let err = load_buildings(&mut renderer, Path::new("/nonexistent/buildings.geojson")).unwrap_err();
        assert!(err.to_string().contains("buildings.geojson"));
    }

    #[test]
    fn test_load_all_reports_each_failed_layer() {
        let dir = tempfile::tempdir().unwrap();
        let config = MapConfig {
            buildings: dir.path().join("missing.geojson"),
            craters: dir.path().join("missing.json"),
            footprints: dir.path().join("missing-footprints.geojson"),
            ..MapConfig::default()
        };
        let mut renderer = MapRenderer::new();
        let notices = load_all(&mut renderer, &config);
        assert_eq!(notices.len(), 2);
        assert!(notices[0].starts_with("Failed to load building data"));
        assert!(notices[1].starts_with("Failed to load crater data"));
        assert!(renderer.buildings.is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_craters.json");
        fs::write(&path, r#"[{"row": 1, "col": 2, "craters": [{"lat": 31.5, "lng": 34.4, "radius": 3.0}]}]"#).unwrap();

        let mut renderer = MapRenderer::new();
        assert_eq!(load_craters(&mut renderer, &path).unwrap(), 1);
        assert_eq!(renderer.craters[0].tile, TileKey::new(1, 2));
    }
}
