use super::geo::RoutePath;
use super::navigation::ProviderStep;
use serde::Serialize;
use std::fmt;

/// Travel time of a route. Straight-line fallbacks have no meaningful
/// duration, so they carry `Unknown` instead of a made-up number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelTime {
    Minutes(u32),
    Unknown,
}

impl TravelTime {
    pub fn from_seconds(seconds: f64) -> Self {
        TravelTime::Minutes((seconds.max(0.0) / 60.0).round() as u32)
    }

    pub fn minutes(&self) -> Option<u32> {
        match self {
            TravelTime::Minutes(m) => Some(*m),
            TravelTime::Unknown => None,
        }
    }
}

impl fmt::Display for TravelTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelTime::Minutes(m) => write!(f, "{} 分", m),
            TravelTime::Unknown => write!(f, "---"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteSegmentInfo {
    pub distance_km: f64,
    pub duration: TravelTime,
}

impl RouteSegmentInfo {
    /// Distance as shown in the route info panel.
    pub fn distance_label(&self) -> String {
        format!("{:.1} km", self.distance_km)
    }
}

/// What the directions provider returned, before localization.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub path: RoutePath,
    pub segment: RouteSegmentInfo,
    pub steps: Vec<ProviderStep>,
}
