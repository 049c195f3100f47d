/// Mean Earth radius in metres (same constant web maps use for distances)
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geographic bounding box in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoBounds {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Smallest box containing every (lon, lat) point, `None` for no points
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for (lon, lat) in points {
            let point = Self::new(lat, lat, lon, lon);
            bounds = Some(match bounds {
                Some(b) => b.union(&point),
                None => point,
            });
        }
        bounds
    }

    /// Corners as (lon, lat): SW, SE, NE, NW
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.lon_min, self.lat_min),
            (self.lon_max, self.lat_min),
            (self.lon_max, self.lat_max),
            (self.lon_min, self.lat_max),
        ]
    }

    /// Inclusive point test
    #[inline(always)]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    /// Boxes overlap or touch
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.lat_min <= other.lat_max
            && self.lat_max >= other.lat_min
            && self.lon_min <= other.lon_max
            && self.lon_max >= other.lon_min
    }

    /// `other` lies entirely inside (or on the edge of) this box
    pub fn encloses(&self, other: &GeoBounds) -> bool {
        self.lat_min <= other.lat_min
            && self.lat_max >= other.lat_max
            && self.lon_min <= other.lon_min
            && self.lon_max >= other.lon_max
    }

    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        GeoBounds {
            lat_min: self.lat_min.min(other.lat_min),
            lat_max: self.lat_max.max(other.lat_max),
            lon_min: self.lon_min.min(other.lon_min),
            lon_max: self.lon_max.max(other.lon_max),
        }
    }

    /// Center as (lon, lat)
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lon_min + self.lon_max) * 0.5,
            (self.lat_min + self.lat_max) * 0.5,
        )
    }
}

/// The geographic area currently visible on screen.
/// Produced fresh from the viewport on every move or zoom; never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl ViewportBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Inclusive on every edge
    #[inline(always)]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    pub fn as_geo(&self) -> GeoBounds {
        GeoBounds::new(self.south, self.north, self.west, self.east)
    }
}

impl From<GeoBounds> for ViewportBounds {
    fn from(b: GeoBounds) -> Self {
        Self::new(b.lat_max, b.lat_min, b.lon_max, b.lon_min)
    }
}

/// Great-circle distance in metres (haversine)
pub fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}
