//! Route session state machine.
//!
//! Geocoding and routing are awaited without holding any borrow of the
//! session, so a newer request may start while an older one is still in
//! flight. Every computation carries a generation token; a result is applied
//! only if its token is still the newest one ("last write wins").

use super::error::{ErrorKind, RoutingError};
use super::fallback::straight_line;
use super::geo::{Coordinate, RouteEndpoint, RoutePath};
use super::navigation::{translate, NavigationStep};
use super::route::RouteSegmentInfo;
use super::service::{Geocoder, RouteClient};
use crate::sdk::events::{
    ClickPhase, EndpointSlot, RouteCommand, RouteMode, RouteNotification, SessionStatus,
};
use crate::sdk::map::{DrawableHandle, MapView, MarkerIcon, PolylineStyle};
use crate::sdk::pins::PinStore;
use serde::Serialize;
use std::cell::RefCell;
use tokio::sync::broadcast;

const NOTIFICATION_CAPACITY: usize = 64;

pub const FALLBACK_NOTICE: &str = "道路ルートが取得できないため、直線で表示します。";
const MISSING_INPUT_MESSAGE: &str = "出発地と目的地を入力してください。";
const NOT_FOUND_MESSAGE: &str = "住所が見つかりませんでした。";
const SEARCH_FAILED_MESSAGE: &str = "ルート検索に失敗しました。";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Routed,
    Fallback,
}

/// A displayed route. Steps are empty for fallbacks. Its endpoints are the
/// ones the route was computed for; the session's endpoints may already
/// belong to a newer, unfinished click cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRoute {
    pub kind: RouteKind,
    pub start: RouteEndpoint,
    pub end: RouteEndpoint,
    pub path: RoutePath,
    pub segment: RouteSegmentInfo,
    pub steps: Vec<NavigationStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressDraft {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSessionState {
    pub mode: RouteMode,
    pub click_phase: ClickPhase,
    pub start: Option<RouteEndpoint>,
    pub end: Option<RouteEndpoint>,
    pub drafts: AddressDraft,
    pub route: Option<ActiveRoute>,
}

impl RouteSessionState {
    fn new(mode: RouteMode) -> Self {
        Self {
            mode,
            click_phase: ClickPhase::AwaitingStart,
            start: None,
            end: None,
            drafts: AddressDraft::default(),
            route: None,
        }
    }
}

#[derive(Debug)]
pub enum RouteOutcome {
    Routed(ActiveRoute),
    FallbackRouted {
        route: ActiveRoute,
        cause: RoutingError,
    },
    /// A newer computation (or a clear) replaced this one before it finished.
    Superseded,
}

#[derive(Debug)]
pub enum ClickOutcome {
    StartSet,
    RouteComputed(RouteOutcome),
}

#[derive(Default)]
struct Drawn {
    /// Path, START/GOAL and step markers of the displayed route.
    route: Vec<DrawableHandle>,
    /// Markers placed by an unfinished click cycle.
    pending: Vec<DrawableHandle>,
}

struct PipelineState {
    status: SessionStatus,
    session: RouteSessionState,
    generation: u64,
    drawn: Drawn,
}

pub struct RoutePipeline<G, R, M> {
    geocoder: G,
    router: R,
    map: RefCell<M>,
    state: RefCell<PipelineState>,
    notifier: broadcast::Sender<RouteNotification>,
}

impl<G, R, M> RoutePipeline<G, R, M>
where
    G: Geocoder,
    R: RouteClient,
    M: MapView,
{
    pub fn new(geocoder: G, router: R, map: M) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            geocoder,
            router,
            map: RefCell::new(map),
            state: RefCell::new(PipelineState {
                status: SessionStatus::Idle,
                session: RouteSessionState::new(RouteMode::AddressSearch),
                generation: 0,
                drawn: Drawn::default(),
            }),
            notifier,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteNotification> {
        self.notifier.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    pub fn session(&self) -> RouteSessionState {
        self.state.borrow().session.clone()
    }

    pub fn mode(&self) -> RouteMode {
        self.state.borrow().session.mode
    }

    pub fn click_input_enabled(&self) -> bool {
        self.status() != SessionStatus::Resolving
    }

    /// Runs `f` against the map. Used by callers that own the rendering
    /// surface (e.g. to export it).
    pub fn with_map<T>(&self, f: impl FnOnce(&M) -> T) -> T {
        f(&self.map.borrow())
    }

    pub async fn handle(&self, command: RouteCommand) -> Result<(), RoutingError> {
        match command {
            RouteCommand::SearchRouteRequested {
                start_text,
                end_text,
            } => self.search_by_address(&start_text, &end_text).await.map(|_| ()),
            RouteCommand::MapClicked { lat, lng } => {
                let coord = Coordinate::new(lat, lng)?;
                self.register_map_click(coord).await.map(|_| ())
            }
            RouteCommand::AddressDraftChanged { slot, text } => {
                self.set_address_draft(slot, &text);
                Ok(())
            }
            RouteCommand::ModeSelected(mode) => {
                self.set_mode(mode);
                Ok(())
            }
            RouteCommand::ClearRequested => {
                self.clear();
                Ok(())
            }
        }
    }

    pub fn set_address_draft(&self, slot: EndpointSlot, text: &str) {
        let mut state = self.state.borrow_mut();
        match slot {
            EndpointSlot::Start => state.session.drafts.start = text.to_string(),
            EndpointSlot::End => state.session.drafts.end = text.to_string(),
        }
    }

    /// Fills the address draft for `slot` with the name of a stored pin.
    pub fn select_pin_for_route(
        &self,
        slot: EndpointSlot,
        pin_id: &str,
        pins: &impl PinStore,
    ) -> Result<(), RoutingError> {
        let pin = pins
            .list_pins()
            .into_iter()
            .find(|p| p.id == pin_id)
            .ok_or_else(|| RoutingError::NotFound {
                query: pin_id.to_string(),
            })?;
        self.set_address_draft(slot, &pin.label);
        Ok(())
    }

    /// Searches using the current address drafts.
    pub async fn search_route(&self) -> Result<RouteOutcome, RoutingError> {
        let drafts = self.state.borrow().session.drafts.clone();
        self.search_by_address(&drafts.start, &drafts.end).await
    }

    pub async fn search_by_address(
        &self,
        start_text: &str,
        end_text: &str,
    ) -> Result<RouteOutcome, RoutingError> {
        let (start_text, end_text) = (start_text.trim(), end_text.trim());
        if start_text.is_empty() || end_text.is_empty() {
            self.notify(RouteNotification::SearchFailed {
                message: MISSING_INPUT_MESSAGE.to_string(),
            });
            return Err(RoutingError::InvalidInput(
                "both start and end addresses are required".to_string(),
            ));
        }

        let token = self.begin_computation();
        log::info!("Route search #{}: \"{}\" -> \"{}\"", token, start_text, end_text);

        // Both lookups run so that both failures can be reported.
        let start = self.geocoder.resolve(start_text).await;
        if !self.is_current(token) {
            log::debug!("Route search #{} superseded while geocoding", token);
            return Ok(RouteOutcome::Superseded);
        }
        let end = self.geocoder.resolve(end_text).await;

        match (start, end) {
            (Ok(start), Ok(end)) => Ok(self
                .compute_with_token(
                    token,
                    RouteEndpoint::labeled(start, start_text),
                    RouteEndpoint::labeled(end, end_text),
                )
                .await),
            (start, end) => {
                let err = RoutingError::EndpointsUnresolved {
                    start: start.err().map(Box::new),
                    end: end.err().map(Box::new),
                };
                if !self.abandon_computation(token) {
                    log::debug!("Route search #{} failed after being superseded", token);
                    return Ok(RouteOutcome::Superseded);
                }
                log::warn!("Route search #{} failed: {}", token, err);
                let message = match err.kind() {
                    ErrorKind::InvalidInput => MISSING_INPUT_MESSAGE,
                    ErrorKind::NotFound => NOT_FOUND_MESSAGE,
                    ErrorKind::Network | ErrorKind::Provider => SEARCH_FAILED_MESSAGE,
                };
                self.notify(RouteNotification::SearchFailed {
                    message: message.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Only meaningful in map-click mode. The first click of a cycle sets
    /// the start, the second sets the end and computes the route.
    pub async fn register_map_click(&self, coord: Coordinate) -> Result<ClickOutcome, RoutingError> {
        let endpoints = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.session.mode != RouteMode::MapClick {
                return Err(RoutingError::InvalidInput(
                    "map clicks only set endpoints in map-click mode".to_string(),
                ));
            }

            let mut map = self.map.borrow_mut();
            match state.session.click_phase {
                ClickPhase::AwaitingStart => {
                    for handle in state.drawn.pending.drain(..) {
                        map.remove_drawable(handle);
                    }
                    state
                        .drawn
                        .pending
                        .push(map.draw_marker(coord, MarkerIcon::RouteStart));
                    state.session.start = Some(RouteEndpoint::new(coord));
                    state.session.end = None;
                    state.session.click_phase = ClickPhase::AwaitingEnd;
                    None
                }
                ClickPhase::AwaitingEnd => {
                    state
                        .drawn
                        .pending
                        .push(map.draw_marker(coord, MarkerIcon::RouteEnd));
                    let end = RouteEndpoint::new(coord);
                    state.session.end = Some(end.clone());
                    state.session.click_phase = ClickPhase::AwaitingStart;
                    // AwaitingEnd implies the start is set.
                    state.session.start.clone().map(|start| (start, end))
                }
            }
        };

        let phase = self.state.borrow().session.click_phase;
        self.notify(RouteNotification::ClickPhaseChanged { phase });

        match endpoints {
            None => Ok(ClickOutcome::StartSet),
            Some((start, end)) => Ok(ClickOutcome::RouteComputed(
                self.compute_route(start, end).await,
            )),
        }
    }

    /// Routes between two resolved endpoints, falling back to a straight
    /// line when the directions provider fails.
    pub async fn compute_route(&self, start: RouteEndpoint, end: RouteEndpoint) -> RouteOutcome {
        let token = self.begin_computation();
        self.compute_with_token(token, start, end).await
    }

    async fn compute_with_token(
        &self,
        token: u64,
        start: RouteEndpoint,
        end: RouteEndpoint,
    ) -> RouteOutcome {
        if !self.is_current(token) {
            log::debug!("Route computation #{} superseded before routing", token);
            return RouteOutcome::Superseded;
        }
        let fetched = self.router.fetch_route(start.coordinate, end.coordinate).await;

        if !self.is_current(token) {
            log::debug!("Discarding result of superseded route computation #{}", token);
            return RouteOutcome::Superseded;
        }

        match fetched {
            Ok(provider_route) => {
                let steps = translate(&provider_route.steps, &provider_route.path);
                let route = ActiveRoute {
                    kind: RouteKind::Routed,
                    start,
                    end,
                    path: provider_route.path,
                    segment: provider_route.segment,
                    steps,
                };
                log::info!(
                    "Route #{} ready: {} / {} with {} steps",
                    token,
                    route.segment.distance_label(),
                    route.segment.duration,
                    route.steps.len()
                );
                self.display(route.clone());
                RouteOutcome::Routed(route)
            }
            Err(cause) => {
                log::warn!(
                    "Directions unavailable for route #{} ({}); showing straight line",
                    token,
                    cause
                );
                let line = straight_line(start.coordinate, end.coordinate);
                let route = ActiveRoute {
                    kind: RouteKind::Fallback,
                    start,
                    end,
                    path: line.path,
                    segment: line.segment,
                    steps: Vec::new(),
                };
                self.display(route.clone());
                RouteOutcome::FallbackRouted { route, cause }
            }
        }
    }

    /// Drops the route, both endpoints, drafts and any pending computation.
    /// The mode is kept.
    pub fn clear(&self) {
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.status == SessionStatus::Resolving {
                state.generation += 1;
            }
            let mut map = self.map.borrow_mut();
            for handle in state.drawn.route.drain(..).chain(state.drawn.pending.drain(..)) {
                map.remove_drawable(handle);
            }
            state.session = RouteSessionState::new(state.session.mode);
            state.status = SessionStatus::Idle;
        }
        self.notify(RouteNotification::Cleared);
        self.notify(RouteNotification::StatusChanged {
            status: SessionStatus::Idle,
        });
        self.notify(RouteNotification::ClickInputEnabled { enabled: true });
    }

    /// Switching modes discards the other mode's unfinished input but keeps
    /// a route that is already displayed.
    pub fn set_mode(&self, mode: RouteMode) {
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            state.session.mode = mode;
            state.session.click_phase = ClickPhase::AwaitingStart;
            // Markers of an unfinished click cycle go with its lone start.
            let mut map = self.map.borrow_mut();
            for handle in state.drawn.pending.drain(..) {
                map.remove_drawable(handle);
            }
            match mode {
                RouteMode::MapClick => {
                    state.session.drafts = AddressDraft::default();
                    if state.session.end.is_none() {
                        state.session.start = None;
                    }
                }
                RouteMode::AddressSearch => {
                    state.session.start = None;
                    state.session.end = None;
                }
            }
        }
        self.notify(RouteNotification::ModeChanged { mode });
        self.notify(RouteNotification::ClickPhaseChanged {
            phase: ClickPhase::AwaitingStart,
        });
    }

    fn begin_computation(&self) -> u64 {
        let token = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.status = SessionStatus::Resolving;
            state.generation
        };
        self.notify(RouteNotification::StatusChanged {
            status: SessionStatus::Resolving,
        });
        self.notify(RouteNotification::ClickInputEnabled { enabled: false });
        token
    }

    fn is_current(&self, token: u64) -> bool {
        self.state.borrow().generation == token
    }

    /// Returns to the status of whatever is displayed. False if `token` is
    /// stale, in which case nothing changes.
    fn abandon_computation(&self, token: u64) -> bool {
        let status = {
            let mut state = self.state.borrow_mut();
            if state.generation != token {
                return false;
            }
            state.status = match state.session.route.as_ref().map(|r| r.kind) {
                None => SessionStatus::Idle,
                Some(RouteKind::Routed) => SessionStatus::Routed,
                Some(RouteKind::Fallback) => SessionStatus::FallbackRouted,
            };
            state.status
        };
        self.notify(RouteNotification::StatusChanged { status });
        self.notify(RouteNotification::ClickInputEnabled { enabled: true });
        true
    }

    fn display(&self, route: ActiveRoute) {
        let status = match route.kind {
            RouteKind::Routed => SessionStatus::Routed,
            RouteKind::Fallback => SessionStatus::FallbackRouted,
        };
        let style = match route.kind {
            RouteKind::Routed => PolylineStyle::Routed,
            RouteKind::Fallback => PolylineStyle::Fallback,
        };

        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let mut map = self.map.borrow_mut();

            for handle in state.drawn.route.drain(..) {
                map.remove_drawable(handle);
            }
            // An unfinished click cycle keeps its start marker and endpoint.
            let mid_cycle = state.session.mode == RouteMode::MapClick
                && state.session.click_phase == ClickPhase::AwaitingEnd;
            if !mid_cycle {
                for handle in state.drawn.pending.drain(..) {
                    map.remove_drawable(handle);
                }
                state.session.start = Some(route.start.clone());
                state.session.end = Some(route.end.clone());
            }

            let mut drawn = vec![
                map.draw_polyline(route.path.vertices(), style),
                map.draw_marker(route.start.coordinate, MarkerIcon::RouteStart),
                map.draw_marker(route.end.coordinate, MarkerIcon::RouteEnd),
            ];
            // Departure and arrival already have START/GOAL markers.
            let last = route.steps.len().saturating_sub(1);
            for step in route.steps.iter().filter(|s| s.ordinal > 1 && s.ordinal - 1 < last) {
                if let Some(anchor) = step.anchor {
                    drawn.push(map.draw_marker(
                        anchor,
                        MarkerIcon::Step {
                            ordinal: step.ordinal,
                            icon: step.icon,
                        },
                    ));
                }
            }
            map.fit_to(route.path.bounds(), style.fit_padding());

            state.drawn.route = drawn;
            state.status = status;
            state.session.route = Some(route.clone());
        }

        self.notify(RouteNotification::StatusChanged { status });
        self.notify(match route.kind {
            RouteKind::Routed => RouteNotification::RouteDisplayed {
                message: format!(
                    "ルートを表示しました！ ({:.1}km, {}分)",
                    route.segment.distance_km,
                    route.segment.duration.minutes().unwrap_or(0)
                ),
                segment: route.segment,
                steps: route.steps,
            },
            RouteKind::Fallback => RouteNotification::FallbackDisplayed {
                segment: route.segment,
                notice: FALLBACK_NOTICE.to_string(),
            },
        });
        self.notify(RouteNotification::ClickInputEnabled { enabled: true });
    }

    fn notify(&self, notification: RouteNotification) {
        // No subscribers is fine.
        let _ = self.notifier.send(notification);
    }
}
