use std::fmt;

use crate::annotate::point_in_polygon;
use crate::geo::GeoBounds;
use crate::map::spatial::FeatureGrid;
use crate::tiles::TileKey;

/// Grid cell size for footprint lookups (~100 m)
const FOOTPRINT_CELL_DEGREES: f64 = 0.001;

/// A building labelled as damaged
#[derive(Clone, Debug, PartialEq)]
pub struct DamagedBuilding {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
}

/// A detected crater and the tile it was found in
#[derive(Clone, Debug, PartialEq)]
pub struct CraterMarker {
    pub lon: f64,
    pub lat: f64,
    pub radius_m: f64,
    pub tile: TileKey,
}

/// A marker picked by clicking on the map
#[derive(Clone, Debug, PartialEq)]
pub enum MarkerInfo {
    Building(DamagedBuilding),
    Crater(CraterMarker),
}

impl fmt::Display for MarkerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerInfo::Building(b) => {
                write!(f, "Building {} at {:.5}, {:.5}", b.id, b.lat, b.lon)
            }
            MarkerInfo::Crater(c) => write!(
                f,
                "Crater at {:.5}, {:.5} r={:.1}m Tile: {}, {}",
                c.lat, c.lon, c.radius_m, c.tile.row, c.tile.col
            ),
        }
    }
}

/// Building outline used by the selection tool
#[derive(Clone, Debug, PartialEq)]
pub struct Footprint {
    pub id: String,
    /// Exterior ring as (lon, lat)
    pub ring: Vec<(f64, f64)>,
    pub bounds: GeoBounds,
}

impl Footprint {
    /// `None` for rings with fewer than three points
    pub fn new(id: impl Into<String>, ring: Vec<(f64, f64)>) -> Option<Self> {
        if ring.len() < 3 {
            return None;
        }
        let bounds = GeoBounds::from_points(ring.iter().copied())?;
        Some(Self {
            id: id.into(),
            ring,
            bounds,
        })
    }
}

/// Footprints with a spatial index over their bounds
#[derive(Debug)]
pub struct FootprintLayer {
    items: Vec<Footprint>,
    grid: FeatureGrid,
}

impl FootprintLayer {
    pub fn new(items: Vec<Footprint>) -> Self {
        let grid = FeatureGrid::build(items.iter().map(|f| &f.bounds), FOOTPRINT_CELL_DEGREES);
        Self { items, grid }
    }

    /// Footprints whose bounds intersect `bounds`
    pub fn in_bounds(&self, bounds: &GeoBounds) -> impl Iterator<Item = &Footprint> + '_ {
        let bounds = *bounds;
        self.grid
            .query(&bounds)
            .into_iter()
            .filter_map(move |i| self.items.get(i))
            .filter(move |f| f.bounds.intersects(&bounds))
    }

    /// Footprint containing the point, if any
    pub fn hit(&self, lon: f64, lat: f64) -> Option<&Footprint> {
        let point = GeoBounds::new(lat, lat, lon, lon);
        self.in_bounds(&point)
            .find(|f| point_in_polygon((lon, lat), &f.ring))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Footprint> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for FootprintLayer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: &str, lon: f64, lat: f64, size: f64) -> Footprint {
        Footprint::new(
            id,
            vec![
                (lon, lat),
                (lon + size, lat),
                (lon + size, lat + size),
                (lon, lat + size),
                (lon, lat),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_degenerate_ring_is_rejected() {
        assert!(Footprint::new("a", vec![(0.0, 0.0), (1.0, 1.0)]).is_none());
    }

    #[test]
    fn test_hit() {
        let layer = FootprintLayer::new(vec![
            square("a", 34.4700, 31.5000, 0.0001),
            square("b", 34.4710, 31.5000, 0.0001),
        ]);
        assert_eq!(layer.hit(34.47105, 31.50005).map(|f| f.id.as_str()), Some("b"));
        assert!(layer.hit(34.4705, 31.50005).is_none());
    }

    #[test]
    fn test_marker_info_text() {
        let building = MarkerInfo::Building(DamagedBuilding {
            id: "b-17".into(),
            lon: 34.475,
            lat: 31.505,
        });
        assert_eq!(building.to_string(), "Building b-17 at 31.50500, 34.47500");

        let crater = MarkerInfo::Crater(CraterMarker {
            lon: 34.476,
            lat: 31.506,
            radius_m: 12.3,
            tile: TileKey::new(9, 6),
        });
        assert_eq!(crater.to_string(), "Crater at 31.50600, 34.47600 r=12.3m Tile: 9, 6");
    }

    #[test]
    fn test_in_bounds() {
        let layer = FootprintLayer::new(vec![
            square("a", 34.4700, 31.5000, 0.0001),
            square("b", 34.4800, 31.5000, 0.0001),
        ]);
        let view = GeoBounds::new(31.49, 31.51, 34.469, 34.475);
        let ids: Vec<&str> = layer.in_bounds(&view).map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }
}
