pub mod sdk;

pub use sdk::config::MapConfig;
pub use sdk::events::{RouteCommand, RouteNotification, SessionStatus};
pub use sdk::map::{MapView, SceneMap};
pub use sdk::pins::{JsonPinStore, PinStore};
pub use sdk::routing::{
    Coordinate, NominatimGeocoder, OrsRouteClient, RouteOutcome, RoutePipeline, RoutingError,
};
