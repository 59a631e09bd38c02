pub mod error;
pub mod fallback;
pub mod geo;
pub mod geocode;
pub mod navigation;
pub mod pipeline;
pub mod provider;
pub mod route;
pub mod service;

pub use error::{ErrorKind, RoutingError};
pub use geo::{haversine_km, Bounds, Coordinate, RouteEndpoint, RoutePath};
pub use geocode::{NominatimGeocoder, PlaceCandidate};
pub use navigation::NavigationStep;
pub use pipeline::{
    ActiveRoute, ClickOutcome, RouteKind, RouteOutcome, RoutePipeline, FALLBACK_NOTICE,
};
pub use provider::OrsRouteClient;
pub use route::{ProviderRoute, RouteSegmentInfo, TravelTime};
pub use service::{Geocoder, RouteClient};
