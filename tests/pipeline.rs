use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use travel_route::sdk::events::{
    ClickPhase, EndpointSlot, RouteCommand, RouteMode, RouteNotification, SessionStatus,
};
use travel_route::sdk::map::{MarkerIcon, PolylineStyle, SceneMap};
use travel_route::sdk::pins::{JsonPinStore, PinCategory};
use travel_route::sdk::routing::navigation::{ManeuverModifier, ManeuverType, ProviderStep};
use travel_route::sdk::routing::{
    haversine_km, ClickOutcome, Coordinate, ErrorKind, Geocoder, ProviderRoute, RouteClient,
    RouteEndpoint, RouteKind, RouteOutcome, RoutePath, RoutePipeline, RouteSegmentInfo,
    RoutingError, TravelTime,
};

fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap()
}

fn tokyo() -> Coordinate {
    coord(35.6762, 139.6503)
}

fn osaka() -> Coordinate {
    coord(34.6937, 135.5023)
}

type Gate = (oneshot::Sender<()>, oneshot::Receiver<()>);

/// Knows a fixed set of addresses; "offline" fails like a dropped connection.
#[derive(Default)]
struct FakeGeocoder {
    places: HashMap<String, Coordinate>,
    calls: AtomicUsize,
    /// When set, the first lookup signals and then waits for release.
    gate: Mutex<Option<Gate>>,
}

impl FakeGeocoder {
    fn with(places: &[(&str, Coordinate)]) -> Self {
        Self {
            places: places.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Self::default()
        }
    }

    fn gated(self, entered: oneshot::Sender<()>, release: oneshot::Receiver<()>) -> Self {
        *self.gate.lock().unwrap() = Some((entered, release));
        self
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn resolve(&self, address: &str) -> Result<Coordinate, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.await;
        }
        if address == "offline" {
            return Err(RoutingError::Network("connection reset".to_string()));
        }
        self.places
            .get(address)
            .copied()
            .ok_or_else(|| RoutingError::NotFound {
                query: address.to_string(),
            })
    }
}

enum Reply {
    Route(ProviderRoute),
    Fail(RoutingError),
    /// Signals `entered`, then waits for `release` before answering `then`.
    Gated {
        entered: oneshot::Sender<()>,
        release: oneshot::Receiver<()>,
        then: Box<Reply>,
    },
}

struct ScriptedRouter {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl ScriptedRouter {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RouteClient for ScriptedRouter {
    async fn fetch_route(
        &self,
        _start: Coordinate,
        _end: Coordinate,
    ) -> Result<ProviderRoute, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        let mut reply = reply.unwrap_or_else(|| {
            Reply::Fail(RoutingError::Network("no scripted reply".to_string()))
        });
        loop {
            match reply {
                Reply::Route(route) => return Ok(route),
                Reply::Fail(err) => return Err(err),
                Reply::Gated {
                    entered,
                    release,
                    then,
                } => {
                    let _ = entered.send(());
                    let _ = release.await;
                    reply = *then;
                }
            }
        }
    }
}

fn step(
    maneuver: ManeuverType,
    modifier: Option<ManeuverModifier>,
    street: Option<&str>,
    distance_m: f64,
    waypoint_index: usize,
) -> ProviderStep {
    ProviderStep {
        maneuver,
        modifier,
        street_name: street.map(str::to_string),
        distance_m,
        duration_s: 120.0,
        waypoint_index: Some(waypoint_index),
    }
}

/// Four-vertex route with depart, turn, continue and arrive steps.
fn provider_route(start: Coordinate, end: Coordinate) -> ProviderRoute {
    let mid_a = coord(start.lat(), end.lng());
    let mid_b = coord(end.lat(), start.lng());
    ProviderRoute {
        path: RoutePath::new(vec![start, mid_a, mid_b, end]).unwrap(),
        segment: RouteSegmentInfo {
            distance_km: 12.34,
            duration: TravelTime::from_seconds(1500.0),
        },
        steps: vec![
            step(ManeuverType::Depart, None, None, 1500.0, 0),
            step(
                ManeuverType::Turn,
                Some(ManeuverModifier::Left),
                Some("Main St"),
                450.0,
                1,
            ),
            step(ManeuverType::Continue, None, Some("Route 1"), 10_000.0, 2),
            step(ManeuverType::Arrive, None, None, 0.0, 3),
        ],
    }
}

fn drain(rx: &mut broadcast::Receiver<RouteNotification>) -> Vec<RouteNotification> {
    let mut seen = Vec::new();
    while let Ok(n) = rx.try_recv() {
        seen.push(n);
    }
    seen
}

type TestPipeline = RoutePipeline<Arc<FakeGeocoder>, Arc<ScriptedRouter>, SceneMap>;

/// The pipeline plus shared handles on its fakes, for call counting.
struct Harness {
    pipeline: TestPipeline,
    geocoder: Arc<FakeGeocoder>,
    router: Arc<ScriptedRouter>,
}

impl Harness {
    fn geocoder_calls(&self) -> usize {
        self.geocoder.calls.load(Ordering::SeqCst)
    }

    fn router_calls(&self) -> usize {
        self.router.calls.load(Ordering::SeqCst)
    }
}

impl Deref for Harness {
    type Target = TestPipeline;
    fn deref(&self) -> &TestPipeline {
        &self.pipeline
    }
}

fn pipeline(geocoder: FakeGeocoder, replies: Vec<Reply>) -> Harness {
    let geocoder = Arc::new(geocoder);
    let router = Arc::new(ScriptedRouter::new(replies));
    Harness {
        pipeline: RoutePipeline::new(geocoder.clone(), router.clone(), SceneMap::new()),
        geocoder,
        router,
    }
}

#[tokio::test]
async fn address_search_draws_routed_path_and_step_markers() {
    let p = pipeline(
        FakeGeocoder::with(&[("東京駅", tokyo()), ("大阪駅", osaka())]),
        vec![Reply::Route(provider_route(tokyo(), osaka()))],
    );
    let mut rx = p.subscribe();

    let outcome = p.search_by_address(" 東京駅 ", "大阪駅").await.unwrap();
    let route = match outcome {
        RouteOutcome::Routed(route) => route,
        other => panic!("expected a routed result, got {:?}", other),
    };

    let instructions: Vec<&str> = route.steps.iter().map(|s| s.instruction.as_str()).collect();
    assert_eq!(
        instructions,
        vec![
            "出発します",
            "左に曲がってMain Stに入ります",
            "Route 1を直進します",
            "目的地に到着します"
        ]
    );
    assert_eq!(route.steps[0].distance_label, "1.5km");
    assert_eq!(route.steps[1].distance_label, "450m");
    assert_eq!(route.start.label.as_deref(), Some("東京駅"));
    assert_eq!(p.status(), SessionStatus::Routed);

    p.with_map(|map| {
        assert_eq!(map.polylines().len(), 1);
        assert_eq!(map.polylines()[0].1, PolylineStyle::Routed);
        let labels: Vec<String> = map.markers().iter().map(|(_, icon)| icon.label()).collect();
        assert_eq!(labels, vec!["START", "GOAL", "2", "3"]);
        assert_eq!(map.viewport().unwrap().padding_px, 20);
    });

    let seen = drain(&mut rx);
    assert!(seen.contains(&RouteNotification::ClickInputEnabled { enabled: false }));
    assert!(seen.iter().any(|n| matches!(
        n,
        RouteNotification::RouteDisplayed { message, .. } if message == "ルートを表示しました！ (12.3km, 25分)"
    )));
    assert_eq!(
        seen.last(),
        Some(&RouteNotification::ClickInputEnabled { enabled: true })
    );
}

#[tokio::test]
async fn provider_failure_falls_back_to_straight_line() {
    let p = pipeline(
        FakeGeocoder::default(),
        vec![Reply::Fail(RoutingError::Network("timed out".to_string()))],
    );
    let mut rx = p.subscribe();

    let outcome = p
        .compute_route(RouteEndpoint::new(tokyo()), RouteEndpoint::new(osaka()))
        .await;
    let (route, cause) = match outcome {
        RouteOutcome::FallbackRouted { route, cause } => (route, cause),
        other => panic!("expected a fallback, got {:?}", other),
    };

    assert_eq!(cause.kind(), ErrorKind::Network);
    assert_eq!(route.kind, RouteKind::Fallback);
    assert!(route.steps.is_empty());
    assert_eq!(route.path.vertices(), &[tokyo(), osaka()]);
    assert!((route.segment.distance_km - haversine_km(tokyo(), osaka())).abs() < 1e-9);
    assert!((route.segment.distance_km - 392.44).abs() < 0.01);
    assert_eq!(route.segment.duration.to_string(), "---");
    assert_eq!(p.status(), SessionStatus::FallbackRouted);

    p.with_map(|map| {
        assert_eq!(map.polylines()[0].1, PolylineStyle::Fallback);
        assert_eq!(map.markers().len(), 2);
        assert_eq!(map.viewport().unwrap().padding_px, 50);
    });
    assert!(drain(&mut rx).iter().any(|n| matches!(
        n,
        RouteNotification::FallbackDisplayed { notice, .. } if notice.contains("直線")
    )));
}

#[tokio::test]
async fn map_clicks_run_two_phase_cycles() {
    let a = coord(35.0, 135.0);
    let b = coord(35.1, 135.2);
    let c = coord(36.0, 136.0);
    let p = pipeline(
        FakeGeocoder::default(),
        vec![Reply::Route(provider_route(a, b))],
    );

    assert!(matches!(
        p.register_map_click(a).await,
        Err(RoutingError::InvalidInput(_))
    ));

    p.set_mode(RouteMode::MapClick);
    assert!(matches!(
        p.register_map_click(a).await.unwrap(),
        ClickOutcome::StartSet
    ));
    let session = p.session();
    assert_eq!(session.click_phase, ClickPhase::AwaitingEnd);
    assert_eq!(session.start.unwrap().coordinate, a);
    assert_eq!(p.with_map(|m| m.markers()), vec![(a, MarkerIcon::RouteStart)]);

    match p.register_map_click(b).await.unwrap() {
        ClickOutcome::RouteComputed(RouteOutcome::Routed(route)) => {
            assert_eq!(route.end.coordinate, b)
        }
        other => panic!("expected a routed result, got {:?}", other),
    }
    assert_eq!(p.session().click_phase, ClickPhase::AwaitingStart);
    assert_eq!(p.session().end.unwrap().coordinate, b);

    // The third click starts over.
    assert!(matches!(
        p.register_map_click(c).await.unwrap(),
        ClickOutcome::StartSet
    ));
    let session = p.session();
    assert_eq!(session.click_phase, ClickPhase::AwaitingEnd);
    assert_eq!(session.start.unwrap().coordinate, c);
    assert!(session.end.is_none());
    // The displayed route still carries the endpoints it was computed for.
    let shown = session.route.unwrap();
    assert_eq!(shown.start.coordinate, a);
    assert_eq!(shown.end.coordinate, b);
    assert_eq!(p.router_calls(), 1);
}

#[tokio::test]
async fn switching_modes_discards_partial_input_but_keeps_route() {
    let p = pipeline(
        FakeGeocoder::default(),
        vec![Reply::Fail(RoutingError::Network("down".to_string()))],
    );
    p.compute_route(RouteEndpoint::new(tokyo()), RouteEndpoint::new(osaka()))
        .await;

    p.set_address_draft(EndpointSlot::Start, "京都");
    p.set_mode(RouteMode::MapClick);
    assert_eq!(p.session().drafts.start, "");
    assert!(p.session().route.is_some());

    p.register_map_click(coord(35.0, 135.7)).await.unwrap();
    let markers_mid_cycle = p.with_map(|m| m.markers().len());
    assert_eq!(markers_mid_cycle, 3);

    p.set_mode(RouteMode::AddressSearch);
    let session = p.session();
    assert!(session.start.is_none());
    assert_eq!(session.click_phase, ClickPhase::AwaitingStart);
    assert_eq!(session.route.unwrap().kind, RouteKind::Fallback);
    assert_eq!(p.with_map(|m| m.markers().len()), 2);
    assert_eq!(p.status(), SessionStatus::FallbackRouted);
}

#[tokio::test]
async fn clear_is_idempotent_and_keeps_mode() {
    let p = pipeline(
        FakeGeocoder::default(),
        vec![Reply::Route(provider_route(tokyo(), osaka()))],
    );
    p.set_mode(RouteMode::MapClick);
    p.register_map_click(tokyo()).await.unwrap();
    p.register_map_click(osaka()).await.unwrap();
    assert_eq!(p.status(), SessionStatus::Routed);

    p.handle(RouteCommand::ClearRequested).await.unwrap();
    let once = p.session();
    p.clear();

    assert_eq!(p.session(), once);
    assert_eq!(p.status(), SessionStatus::Idle);
    assert_eq!(once.mode, RouteMode::MapClick);
    assert_eq!(once.click_phase, ClickPhase::AwaitingStart);
    assert!(once.start.is_none() && once.end.is_none() && once.route.is_none());
    assert!(p.with_map(|m| m.is_empty()));
}

#[tokio::test]
async fn newer_computation_supersedes_pending_one() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let kyoto = coord(35.0116, 135.7681);
    let nagoya = coord(35.1815, 136.9066);
    let p = pipeline(
        FakeGeocoder::default(),
        vec![
            Reply::Gated {
                entered: entered_tx,
                release: release_rx,
                then: Box::new(Reply::Route(provider_route(tokyo(), osaka()))),
            },
            Reply::Route(provider_route(kyoto, nagoya)),
        ],
    );

    let first = p.compute_route(RouteEndpoint::new(tokyo()), RouteEndpoint::new(osaka()));
    let second = async {
        entered_rx.await.unwrap();
        let outcome = p
            .compute_route(RouteEndpoint::new(kyoto), RouteEndpoint::new(nagoya))
            .await;
        release_tx.send(()).unwrap();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(first, RouteOutcome::Superseded));
    assert!(matches!(second, RouteOutcome::Routed(_)));
    assert_eq!(p.session().route.unwrap().start.coordinate, kyoto);
    assert_eq!(p.status(), SessionStatus::Routed);
    p.with_map(|map| {
        assert_eq!(map.polylines().len(), 1);
        assert_eq!(map.polylines()[0].0[0], kyoto);
    });
}

#[tokio::test]
async fn stale_fallback_is_not_applied_after_clear() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let p = pipeline(
        FakeGeocoder::default(),
        vec![Reply::Gated {
            entered: entered_tx,
            release: release_rx,
            then: Box::new(Reply::Fail(RoutingError::Network("late".to_string()))),
        }],
    );

    let pending = p.compute_route(RouteEndpoint::new(tokyo()), RouteEndpoint::new(osaka()));
    let clearing = async {
        entered_rx.await.unwrap();
        assert_eq!(p.status(), SessionStatus::Resolving);
        assert!(!p.click_input_enabled());
        p.clear();
        release_tx.send(()).unwrap();
    };
    let (outcome, ()) = tokio::join!(pending, clearing);

    assert!(matches!(outcome, RouteOutcome::Superseded));
    assert_eq!(p.status(), SessionStatus::Idle);
    assert!(p.session().route.is_none());
    assert!(p.with_map(|m| m.is_empty()));
}

#[tokio::test]
async fn both_geocoding_failures_are_reported() {
    let p = pipeline(FakeGeocoder::default(), vec![]);
    let mut rx = p.subscribe();

    let err = p.search_by_address("nowhere", "offline").await.unwrap_err();
    match &err {
        RoutingError::EndpointsUnresolved {
            start: Some(start),
            end: Some(end),
        } => {
            assert_eq!(start.kind(), ErrorKind::NotFound);
            assert_eq!(end.kind(), ErrorKind::Network);
        }
        other => panic!("expected both endpoints to fail, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(p.geocoder_calls(), 2);
    assert_eq!(p.router_calls(), 0);
    assert_eq!(p.status(), SessionStatus::Idle);
    assert!(drain(&mut rx).contains(&RouteNotification::SearchFailed {
        message: "住所が見つかりませんでした。".to_string()
    }));
}

#[tokio::test]
async fn empty_address_is_rejected_before_any_lookup() {
    let p = pipeline(FakeGeocoder::with(&[("大阪駅", osaka())]), vec![]);

    let err = p.search_by_address("   ", "大阪駅").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(p.geocoder_calls(), 0);
    assert_eq!(p.status(), SessionStatus::Idle);

    let err = p
        .handle(RouteCommand::MapClicked {
            lat: 95.0,
            lng: 0.0,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn pins_fill_address_drafts() {
    let mut store = JsonPinStore::default();
    let asakusa = store
        .add_pin("浅草寺", coord(35.7148, 139.7967), PinCategory::Tourist, "")
        .id
        .clone();
    let p = pipeline(
        FakeGeocoder::with(&[("浅草寺", coord(35.7148, 139.7967)), ("東京タワー", tokyo())]),
        vec![Reply::Route(provider_route(coord(35.7148, 139.7967), tokyo()))],
    );

    p.select_pin_for_route(EndpointSlot::Start, &asakusa, &store)
        .unwrap();
    assert!(matches!(
        p.select_pin_for_route(EndpointSlot::End, "missing", &store),
        Err(RoutingError::NotFound { .. })
    ));
    p.handle(RouteCommand::AddressDraftChanged {
        slot: EndpointSlot::End,
        text: "東京タワー".to_string(),
    })
    .await
    .unwrap();
    assert_eq!(p.session().drafts.start, "浅草寺");

    assert!(matches!(
        p.search_route().await.unwrap(),
        RouteOutcome::Routed(_)
    ));
    assert_eq!(p.session().end.unwrap().label.as_deref(), Some("東京タワー"));
}

#[tokio::test]
async fn search_cleared_while_geocoding_never_requests_directions() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let p = pipeline(
        FakeGeocoder::with(&[("東京駅", tokyo()), ("大阪駅", osaka())]).gated(entered_tx, release_rx),
        vec![Reply::Route(provider_route(tokyo(), osaka()))],
    );

    let search = p.search_by_address("東京駅", "大阪駅");
    let clearing = async {
        entered_rx.await.unwrap();
        p.clear();
        release_tx.send(()).unwrap();
    };
    let (outcome, ()) = tokio::join!(search, clearing);

    assert!(matches!(outcome, Ok(RouteOutcome::Superseded)));
    assert_eq!(p.geocoder_calls(), 1);
    assert_eq!(p.router_calls(), 0);
    assert_eq!(p.status(), SessionStatus::Idle);
    assert!(p.with_map(|m| m.is_empty()));
}

#[tokio::test]
async fn search_superseded_while_geocoding_leaves_newer_route() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let kyoto = coord(35.0116, 135.7681);
    let nagoya = coord(35.1815, 136.9066);
    let p = pipeline(
        FakeGeocoder::with(&[("東京駅", tokyo()), ("大阪駅", osaka())]).gated(entered_tx, release_rx),
        vec![Reply::Route(provider_route(kyoto, nagoya))],
    );

    let search = p.search_by_address("東京駅", "大阪駅");
    let newer = async {
        entered_rx.await.unwrap();
        let outcome = p
            .compute_route(RouteEndpoint::new(kyoto), RouteEndpoint::new(nagoya))
            .await;
        release_tx.send(()).unwrap();
        outcome
    };
    let (stale, newer) = tokio::join!(search, newer);

    assert!(matches!(stale, Ok(RouteOutcome::Superseded)));
    assert!(matches!(newer, RouteOutcome::Routed(_)));
    assert_eq!(p.router_calls(), 1);
    assert_eq!(p.session().route.unwrap().start.coordinate, kyoto);
}

#[tokio::test]
async fn reselecting_map_click_mode_drops_pending_start_marker() {
    let p = pipeline(FakeGeocoder::default(), vec![]);
    p.set_mode(RouteMode::MapClick);
    p.register_map_click(tokyo()).await.unwrap();
    assert_eq!(p.with_map(|m| m.markers().len()), 1);

    p.set_mode(RouteMode::MapClick);
    let session = p.session();
    assert_eq!(session.click_phase, ClickPhase::AwaitingStart);
    assert!(session.start.is_none());
    assert!(p.with_map(|m| m.is_empty()));

    // The next click starts a clean cycle.
    assert!(matches!(
        p.register_map_click(osaka()).await.unwrap(),
        ClickOutcome::StartSet
    ));
    assert_eq!(p.with_map(|m| m.markers()), vec![(osaka(), MarkerIcon::RouteStart)]);
}
