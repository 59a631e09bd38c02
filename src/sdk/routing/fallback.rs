use super::geo::{haversine_km, Coordinate, RoutePath};
use super::route::{RouteSegmentInfo, TravelTime};

/// Substitute route shown when the directions provider is unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightLine {
    pub path: RoutePath,
    pub segment: RouteSegmentInfo,
}

/// Two-vertex path between the endpoints with the great-circle distance and
/// an unknown duration. Pure; no provider is consulted.
pub fn straight_line(start: Coordinate, end: Coordinate) -> StraightLine {
    StraightLine {
        path: RoutePath::between(start, end),
        segment: RouteSegmentInfo {
            distance_km: haversine_km(start, end),
            duration: TravelTime::Unknown,
        },
    }
}
