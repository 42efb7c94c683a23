//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use roambot::client::{
    Batch, ChallengeSolver, GameCall, GameClient, GameResponse, MappingService, ProxyFeedback,
    RemoteFuture, RouteLeg,
};
use roambot::error::{MappingError, RemoteError, TransportKind};
use roambot::geo;
use roambot::observer::Observer;
use roambot::protocol::Initialized;
use roambot::types::{
    BotConfig, Delays, LatLng, OwnedPokemon, Pokestop, Position, WildPokemon,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn origin() -> LatLng {
    LatLng::new(48.8456222, 2.3364526)
}

/// Deterministic, instant config.
pub fn test_config() -> BotConfig {
    BotConfig {
        session: "test".into(),
        start: origin(),
        delays: Delays::zero(),
        incubator_chance: 0.0,
        seed: Some(7),
        state_path: None,
        templates_path: None,
        ..Default::default()
    }
}

/// Offset `origin` by `north_m` / `east_m` metres.  Small-distance
/// approximation for placing fixtures near the agent.
pub fn offset(origin: LatLng, north_m: f64, east_m: f64) -> LatLng {
    let d_lat = north_m / geo::EARTH_RADIUS_M;
    let d_lng = east_m / (geo::EARTH_RADIUS_M * origin.lat.to_radians().cos());
    LatLng::new(origin.lat + d_lat.to_degrees(), origin.lng + d_lng.to_degrees())
}

pub fn stop_at(id: &str, north_m: f64, east_m: f64) -> Pokestop {
    let at = offset(origin(), north_m, east_m);
    Pokestop {
        id: id.into(),
        latitude: at.lat,
        longitude: at.lng,
        cooldown_complete_ms: 0,
        visited: false,
        reached: false,
    }
}

pub fn wild(encounter_id: u64) -> WildPokemon {
    WildPokemon {
        encounter_id,
        spawn_point_id: format!("spawn-{encounter_id}"),
        pokemon_id: 16,
        latitude: origin().lat,
        longitude: origin().lng,
        expiration_ms: 0,
    }
}

// ---------------------------------------------------------------------------
// Game client
// ---------------------------------------------------------------------------

/// Answers each submitted batch with the next queued reply; an empty
/// response list once the queue runs dry.
#[derive(Default)]
pub struct FakeClient {
    replies: Mutex<VecDeque<Result<Vec<GameResponse>, RemoteError>>>,
    batches: Mutex<Vec<Batch>>,
    positions: Mutex<Vec<Position>>,
}

impl FakeClient {
    pub fn reply(&self, responses: Vec<GameResponse>) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(responses));
        self
    }

    pub fn fail(&self, err: RemoteError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    /// First call of every submitted batch (`None` for empty batches).
    pub fn primary_calls(&self) -> Vec<Option<GameCall>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.calls().first().cloned())
            .collect()
    }

    pub fn count_calls(&self, pred: impl Fn(&GameCall) -> bool) -> usize {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.calls().iter())
            .filter(|c| pred(*c))
            .count()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.lock().unwrap().clone()
    }
}

impl GameClient for FakeClient {
    fn set_position(&self, position: Position) {
        self.positions.lock().unwrap().push(position);
    }

    fn submit<'a>(
        &'a self,
        batch: Batch,
    ) -> RemoteFuture<'a, Result<Vec<GameResponse>, RemoteError>> {
        Box::pin(async move {
            self.batches.lock().unwrap().push(batch);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        })
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

pub struct FakeMapping {
    pub legs: Mutex<VecDeque<Result<Vec<RouteLeg>, MappingError>>>,
    pub elevation: Result<f64, MappingError>,
    pub route_calls: Mutex<Vec<(LatLng, LatLng)>>,
}

impl Default for FakeMapping {
    fn default() -> Self {
        Self {
            legs: Mutex::new(VecDeque::new()),
            elevation: Ok(35.0),
            route_calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMapping {
    pub fn failing_elevation() -> Self {
        Self {
            elevation: Err(MappingError::Unavailable("offline".into())),
            ..Default::default()
        }
    }

    pub fn route_call_count(&self) -> usize {
        self.route_calls.lock().unwrap().len()
    }
}

impl MappingService for FakeMapping {
    fn route<'a>(
        &'a self,
        origin: LatLng,
        destination: LatLng,
    ) -> RemoteFuture<'a, Result<Vec<RouteLeg>, MappingError>> {
        Box::pin(async move {
            self.route_calls.lock().unwrap().push((origin, destination));
            self.legs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        })
    }

    fn elevation<'a>(&'a self, _at: LatLng) -> RemoteFuture<'a, Result<f64, MappingError>> {
        Box::pin(async move { self.elevation.clone() })
    }
}

// ---------------------------------------------------------------------------
// Solver / proxy / observer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSolver {
    pub token: Option<String>,
    pub urls: Mutex<Vec<String>>,
}

impl ChallengeSolver for FakeSolver {
    fn resolve<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Option<String>> {
        Box::pin(async move {
            self.urls.lock().unwrap().push(url.to_string());
            self.token.clone()
        })
    }
}

#[derive(Default)]
pub struct FakeProxy {
    pub marked: Mutex<Vec<TransportKind>>,
}

impl ProxyFeedback for FakeProxy {
    fn mark_bad<'a>(&'a self, kind: TransportKind) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.marked.lock().unwrap().push(kind);
        })
    }
}

/// Records the name of every notification.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn record(&self, name: &str) {
        self.events.lock().unwrap().push(name.to_string());
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == name).count()
    }
}

impl Observer for RecordingObserver {
    fn initialized(&self, _payload: &Initialized) {
        self.record("initialized");
    }
    fn position(&self, _position: &Position) {
        self.record("position");
    }
    fn route(&self, _route: &[LatLng]) {
        self.record("route");
    }
    fn pokestops(&self, _stops: &[Pokestop]) {
        self.record("pokestops");
    }
    fn pokestop_visited(&self, _stop: &Pokestop) {
        self.record("pokestop_visited");
    }
    fn pokemon_encountered(&self, _pokemon: &WildPokemon) {
        self.record("pokemon_encountered");
    }
    fn pokemon_caught(&self, _pokemon: &OwnedPokemon) {
        self.record("pokemon_caught");
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One set of fakes, kept so tests can inspect them after the run.
#[derive(Default)]
pub struct Fakes {
    pub client: Arc<FakeClient>,
    pub mapping: Arc<FakeMapping>,
    pub solver: Arc<FakeSolver>,
    pub proxy: Arc<FakeProxy>,
    pub observer: Arc<RecordingObserver>,
}

impl Fakes {
    pub fn with_mapping(mapping: FakeMapping) -> Self {
        Self {
            mapping: Arc::new(mapping),
            ..Default::default()
        }
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            solver: Arc::new(FakeSolver {
                token: Some(token.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[cfg(feature = "server")]
    pub fn collaborators(&self) -> roambot::session::Collaborators {
        roambot::session::Collaborators {
            client: self.client.clone(),
            mapping: self.mapping.clone(),
            solver: self.solver.clone(),
            proxy: self.proxy.clone(),
            observer: self.observer.clone(),
        }
    }
}
