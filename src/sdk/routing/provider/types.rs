use crate::sdk::config::DistanceUnit;
use crate::sdk::routing::error::RoutingError;
use crate::sdk::routing::geo::{Coordinate, RoutePath};
use crate::sdk::routing::navigation::{ManeuverModifier, ManeuverType, ProviderStep};
use crate::sdk::routing::route::{ProviderRoute, RouteSegmentInfo, TravelTime};
use serde::Deserialize;

// --- ORS GeoJSON directions response ---

#[derive(Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub features: Vec<RouteFeature>,
}
#[derive(Deserialize)]
pub struct RouteFeature {
    pub geometry: LineGeometry,
    pub properties: RouteProperties,
}
#[derive(Deserialize)]
pub struct LineGeometry {
    pub coordinates: Vec<Vec<f64>>,
}
#[derive(Deserialize)]
pub struct RouteProperties {
    #[serde(default)]
    pub segments: Vec<Segment>,
}
#[derive(Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub steps: Vec<Step>,
}
#[derive(Deserialize)]
pub struct Step {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub modifier: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub way_points: Vec<usize>,
}

/// ORS reports numeric instruction codes; OSRM-style providers use names.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum StepKind {
    Code(u32),
    Name(String),
}

impl StepKind {
    fn maneuver(&self, modifier: Option<&str>) -> (ManeuverType, Option<ManeuverModifier>) {
        let named_modifier = modifier.map(ManeuverModifier::from_code);
        let code = match self {
            StepKind::Name(name) => return (ManeuverType::from_code(name), named_modifier),
            StepKind::Code(code) => *code,
        };
        let turn = |m: ManeuverModifier| (ManeuverType::Turn, Some(m));
        match code {
            0 => turn(ManeuverModifier::Left),
            1 => turn(ManeuverModifier::Right),
            2 => turn(ManeuverModifier::SharpLeft),
            3 => turn(ManeuverModifier::SharpRight),
            4 | 12 => turn(ManeuverModifier::SlightLeft),
            5 | 13 => turn(ManeuverModifier::SlightRight),
            6 => (ManeuverType::Continue, Some(ManeuverModifier::Straight)),
            7 | 8 => (ManeuverType::Roundabout, named_modifier),
            9 => turn(ManeuverModifier::UTurn),
            10 => (ManeuverType::Arrive, None),
            11 => (ManeuverType::Depart, None),
            other => (ManeuverType::Unknown(other.to_string()), named_modifier),
        }
    }
}

impl Step {
    fn into_provider_step(self, units: DistanceUnit) -> ProviderStep {
        let (maneuver, modifier) = self.kind.maneuver(self.modifier.as_deref());
        ProviderStep {
            maneuver,
            modifier,
            // ORS uses "-" for unnamed roads.
            street_name: self
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty() && n != "-"),
            distance_m: units.to_meters(self.distance),
            duration_s: self.duration,
            waypoint_index: self.way_points.first().copied(),
        }
    }
}

impl DirectionsResponse {
    pub fn into_provider_route(self, units: DistanceUnit) -> Result<ProviderRoute, RoutingError> {
        let feature = self.features.into_iter().next().ok_or_else(|| {
            RoutingError::MalformedResponse("No route found in success response".to_string())
        })?;

        let vertices = feature
            .geometry
            .coordinates
            .iter()
            .map(|position| Coordinate::from_lng_lat(position))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RoutingError::MalformedResponse(format!("bad route geometry: {}", e)))?;
        let path = RoutePath::new(vertices)?;

        let segments = feature.properties.segments;
        let distance_m: f64 = segments.iter().map(|s| units.to_meters(s.distance)).sum();
        let duration_s: f64 = segments.iter().map(|s| s.duration).sum();
        let steps = segments
            .into_iter()
            .flat_map(|s| s.steps)
            .map(|s| s.into_provider_step(units))
            .collect();

        Ok(ProviderRoute {
            path,
            segment: RouteSegmentInfo {
                distance_km: distance_m / 1000.0,
                duration: TravelTime::from_seconds(duration_s),
            },
            steps,
        })
    }
}

// --- Nominatim search response ---

#[derive(Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub class: Option<String>,
}
