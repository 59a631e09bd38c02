// Typed interface between the UI layer and the route pipeline.
use crate::sdk::routing::navigation::NavigationStep;
use crate::sdk::routing::route::RouteSegmentInfo;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteMode {
    AddressSearch,
    MapClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickPhase {
    AwaitingStart,
    AwaitingEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Idle,
    Resolving,
    Routed,
    FallbackRouted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSlot {
    Start,
    End,
}

/// Commands emitted by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteCommand {
    SearchRouteRequested { start_text: String, end_text: String },
    MapClicked { lat: f64, lng: f64 },
    AddressDraftChanged { slot: EndpointSlot, text: String },
    ModeSelected(RouteMode),
    ClearRequested,
}

/// State changes for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouteNotification {
    StatusChanged {
        status: SessionStatus,
    },
    ModeChanged {
        mode: RouteMode,
    },
    ClickPhaseChanged {
        phase: ClickPhase,
    },
    /// False while a computation is pending, so a third click cannot land in
    /// the middle of a two-click cycle.
    ClickInputEnabled {
        enabled: bool,
    },
    RouteDisplayed {
        segment: RouteSegmentInfo,
        steps: Vec<NavigationStep>,
        message: String,
    },
    FallbackDisplayed {
        segment: RouteSegmentInfo,
        notice: String,
    },
    SearchFailed {
        message: String,
    },
    Cleared,
}
