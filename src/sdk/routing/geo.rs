use super::error::RoutingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius used by the great-circle distance, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position. Only constructible through [`Coordinate::new`], so every
/// value is inside the valid latitude/longitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = RoutingError;
    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, RoutingError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(RoutingError::InvalidInput(format!(
                "latitude {} is outside [-90, 90]",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(RoutingError::InvalidInput(format!(
                "longitude {} is outside [-180, 180]",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Builds a coordinate from a GeoJSON position (`[lng, lat, ...]`).
    pub fn from_lng_lat(position: &[f64]) -> Result<Self, RoutingError> {
        match position {
            [lng, lat, ..] => Coordinate::new(*lat, *lng),
            _ => Err(RoutingError::MalformedResponse(format!(
                "position needs at least two values, got {}",
                position.len()
            ))),
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// `lng,lat` as the directions provider expects it.
    pub fn to_lng_lat_param(&self) -> String {
        format!("{},{}", self.lng, self.lat)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

impl std::str::FromStr for Coordinate {
    type Err = RoutingError;

    /// Parses `lat,lng`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| RoutingError::InvalidInput(format!("expected \"lat,lng\", got \"{}\"", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| RoutingError::InvalidInput(format!("\"{}\": {}", v.trim(), e)))
        };
        Coordinate::new(parse(lat)?, parse(lng)?)
    }
}

/// Great-circle distance between two coordinates (haversine), in kilometers.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// A route origin or destination: where it is, and what the user called it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEndpoint {
    pub coordinate: Coordinate,
    pub label: Option<String>,
}

impl RouteEndpoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            label: None,
        }
    }

    pub fn labeled(coordinate: Coordinate, label: impl Into<String>) -> Self {
        Self {
            coordinate,
            label: Some(label.into()),
        }
    }
}

/// Polyline vertices in traversal order. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePath(Vec<Coordinate>);

impl RoutePath {
    pub fn new(vertices: Vec<Coordinate>) -> Result<Self, RoutingError> {
        if vertices.is_empty() {
            return Err(RoutingError::MalformedResponse(
                "route geometry has no vertices".to_string(),
            ));
        }
        Ok(Self(vertices))
    }

    pub(crate) fn between(start: Coordinate, end: Coordinate) -> Self {
        Self(vec![start, end])
    }

    pub fn vertices(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Coordinate> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::enclosing(&self.0)
    }
}

/// Axis-aligned lat/lng box used to fit the map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    fn enclosing(points: &[Coordinate]) -> Self {
        points.iter().fold(
            Bounds {
                south: f64::INFINITY,
                west: f64::INFINITY,
                north: f64::NEG_INFINITY,
                east: f64::NEG_INFINITY,
            },
            |b, p| Bounds {
                south: b.south.min(p.lat),
                west: b.west.min(p.lng),
                north: b.north.max(p.lat),
                east: b.east.max(p.lng),
            },
        )
    }
}
