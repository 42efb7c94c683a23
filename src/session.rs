//! Session controller – the top-level state machine.
//!
//! ```text
//! Bootstrapping ─► Ready ─► Walking ─► Dispatching ─┬─► Walking      (gate closed)
//!                             ▲                     └─► Refreshing ─┐
//!                             └─────────────────────────────────────┘
//!
//! any phase ── ChallengeRequired ──► ChallengePending ──► Terminated
//! any phase ── transport / other ──────────────────────► Terminated
//! ```
//!
//! One stepping function per phase.  Every remote call is awaited before the
//! next is issued, and [`SessionState`] is only touched from here and from
//! the components this controller lends it to.

use crate::api::{self, Parsed};
use crate::client::{Batch, ChallengeSolver, GameCall, GameClient, GameResponse, MappingService, ProxyFeedback};
use crate::dispatcher::Dispatcher;
use crate::error::RemoteError;
use crate::observer::Observer;
use crate::persist::{CachedTemplates, SnapshotWriter, TemplateCache};
use crate::protocol::{self, Initialized};
use crate::recovery::{self, ExitReason, Recovery};
use crate::refresh;
use crate::state::SessionState;
use crate::types::{now_ms, scaled_delay, BotConfig, Position};
use crate::ui::UiRequest;
use crate::walker;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Tutorial steps a fresh account must have completed before playing.
pub const REQUIRED_TUTORIAL_STEPS: [u32; 5] = [0, 1, 3, 4, 7];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Bootstrapping,
    Ready,
    Walking,
    Dispatching,
    Refreshing,
    ChallengePending { url: String },
    Terminated(ExitReason),
}

/// Everything outside the process the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub client: Arc<dyn GameClient>,
    pub mapping: Arc<dyn MappingService>,
    pub solver: Arc<dyn ChallengeSolver>,
    pub proxy: Arc<dyn ProxyFeedback>,
    pub observer: Arc<dyn Observer>,
}

pub struct SessionController {
    config: BotConfig,
    io: Collaborators,
    state: SessionState,
    phase: SessionPhase,
    rng: StdRng,
    snapshots: Option<SnapshotWriter>,
    templates: Option<TemplateCache>,
    requests: Option<mpsc::Receiver<UiRequest>>,
}

impl SessionController {
    pub fn new(config: BotConfig, io: Collaborators) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = SessionState::new(Position::from(config.start));
        let snapshots = config.state_path.as_deref().map(SnapshotWriter::new);
        let templates = config.templates_path.as_deref().map(TemplateCache::new);
        Self {
            config,
            io,
            state,
            phase: SessionPhase::Bootstrapping,
            rng,
            snapshots,
            templates,
            requests: None,
        }
    }

    /// Serve UI queries and commands while pausing between ticks.
    pub fn with_requests(mut self, requests: mpsc::Receiver<UiRequest>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Start from a prepared state instead of a fresh one.
    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    /// Start in `phase` instead of [`SessionPhase::Bootstrapping`].
    pub fn starting_at(mut self, phase: SessionPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Step until the session terminates.
    pub async fn run(&mut self) -> ExitReason {
        loop {
            if let SessionPhase::Terminated(reason) = &self.phase {
                info!("Session {} stopped: {}", self.config.session, reason);
                return reason.clone();
            }
            self.step().await;
        }
    }

    /// Wait for queued snapshot and template writes to reach disk.
    pub async fn shutdown(&mut self) {
        if let Some(writer) = self.snapshots.take() {
            writer.close().await;
        }
        if let Some(cache) = self.templates.take() {
            cache.close().await;
        }
    }

    /// Step until the controller is back in `Walking`, waiting on a
    /// challenge, or stopped.
    pub async fn tick(&mut self) {
        loop {
            self.step().await;
            match self.phase {
                SessionPhase::Walking
                | SessionPhase::ChallengePending { .. }
                | SessionPhase::Terminated(_) => return,
                _ => {}
            }
        }
    }

    /// Run the current phase once and move to the next.
    pub async fn step(&mut self) {
        let outcome = match self.phase.clone() {
            SessionPhase::Bootstrapping => self.bootstrap().await.map(|_| SessionPhase::Ready),
            SessionPhase::Ready => self.ready().await.map(|_| SessionPhase::Walking),
            SessionPhase::Walking => {
                self.walk().await;
                Ok(SessionPhase::Dispatching)
            }
            SessionPhase::Dispatching => self.dispatch().await,
            SessionPhase::Refreshing => self.refreshing().await.map(|_| SessionPhase::Walking),
            SessionPhase::ChallengePending { url } => {
                let reason = recovery::resolve_challenge(
                    &mut self.state,
                    &url,
                    self.io.client.as_ref(),
                    self.io.solver.as_ref(),
                    self.io.proxy.as_ref(),
                )
                .await;
                Ok(SessionPhase::Terminated(reason))
            }
            SessionPhase::Terminated(reason) => Ok(SessionPhase::Terminated(reason)),
        };

        self.phase = match outcome {
            Ok(next) => next,
            Err(e) => match recovery::classify(e, self.io.proxy.as_ref()).await {
                Recovery::ResolveChallenge { url } => SessionPhase::ChallengePending { url },
                Recovery::Terminate(reason) => SessionPhase::Terminated(reason),
            },
        };
        debug!("Phase -> {:?}", self.phase);
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    async fn bootstrap(&mut self) -> Result<(), RemoteError> {
        info!("Starting session {}", self.config.session);

        let start = self.state.position.latlng();
        let altitude = walker::elevation(self.io.mapping.as_ref(), start).await;
        let start = walker::fuzz(start, &mut self.rng);
        self.state.position = Position {
            lat: start.lat,
            lng: start.lng,
            altitude: Some(altitude),
        };
        self.io.client.set_position(self.state.position);

        debug!("First empty request.");
        self.call(Batch::new()).await?;
        info!("Logged in.");

        debug!("Get player info...");
        let mut batch = self.io.client.start_batch();
        batch.add(GameCall::GetPlayer {
            country: self.config.api.country.clone(),
            language: self.config.api.language.clone(),
            timezone: self.config.api.timezone.clone(),
        });
        self.call(batch).await?;

        debug!("Download remote config...");
        let app_version = self.config.api.app_version;
        let mut batch = self.io.client.start_batch();
        batch.add(GameCall::DownloadRemoteConfigVersion { app_version });
        api::always_init(&mut batch);
        self.call(batch).await?;

        debug!("Get asset digest...");
        let mut batch = self.io.client.start_batch();
        batch.add(GameCall::GetAssetDigest { app_version });
        api::always_init(&mut batch);
        self.call(batch).await?;

        self.refresh_item_templates().await?;
        self.complete_tutorial().await?;

        debug!("Level up rewards...");
        let mut batch = self.io.client.start_batch();
        batch.add(GameCall::LevelUpRewards {
            level: self.state.inventory.player.level,
        });
        api::always(&mut batch);
        self.call(batch).await?;

        Ok(())
    }

    /// Download item templates unless the cached copy is as new as the
    /// timestamp the remote config reported.
    async fn refresh_item_templates(&mut self) -> Result<(), RemoteError> {
        let cached = match &self.templates {
            Some(cache) => cache.load().await,
            None => None,
        };
        if let Some(c) = &cached {
            self.state.api.item_templates = c.templates.clone();
        }
        if !CachedTemplates::is_stale(cached.as_ref(), self.state.api.item_templates_timestamp_ms) {
            debug!("Item templates are up to date");
            return Ok(());
        }

        info!("Game master updating...");
        let mut batch = self.io.client.start_batch();
        batch.add(GameCall::DownloadItemTemplates);
        api::always_init(&mut batch);
        let parsed = self.call(batch).await?;

        if let Some(GameResponse::DownloadItemTemplates { timestamp_ms, .. }) = parsed.primary() {
            if let Some(cache) = self.templates.as_mut() {
                cache.save(&CachedTemplates {
                    timestamp_ms,
                    templates: self.state.api.item_templates.clone(),
                });
            }
        }
        Ok(())
    }

    /// Always fetches the profile; marks missing tutorial steps in the same
    /// batch.
    async fn complete_tutorial(&mut self) -> Result<(), RemoteError> {
        debug!("Checking tutorial state...");
        let missing: Vec<u32> = REQUIRED_TUTORIAL_STEPS
            .iter()
            .copied()
            .filter(|s| !self.state.player.tutorial_state.contains(s))
            .collect();

        let mut batch = self.io.client.start_batch();
        batch.add(GameCall::GetPlayerProfile);
        if !missing.is_empty() {
            info!("Completing tutorial steps {:?}", missing);
            batch.add(GameCall::MarkTutorialComplete {
                tutorials: missing.clone(),
            });
        }
        api::always(&mut batch);

        let parsed = self.call(batch).await?;
        for response in parsed.results {
            if let GameResponse::MarkTutorialComplete { success } = response {
                if success {
                    self.state.player.tutorial_state.extend(&missing);
                } else {
                    warn!("Tutorial completion was refused");
                }
            }
        }
        Ok(())
    }

    async fn ready(&mut self) -> Result<(), RemoteError> {
        info!("Session ready");
        self.io
            .observer
            .initialized(&Initialized::from_state(&self.state));
        self.persist();

        self.pause(self.config.delays.walk).await;
        self.refresh_world().await?;
        self.pause(self.config.delays.walk).await;
        Ok(())
    }

    /// One tick of movement: route, step, altitude, then report the position.
    async fn walk(&mut self) {
        self.state.tick += 1;

        match walker::check_path(&mut self.state, self.io.mapping.as_ref(), now_ms()).await {
            Ok(true) => self
                .io
                .observer
                .route(&protocol::route_payload(&self.state)),
            Ok(false) => {}
            Err(e) => warn!("Unable to plan route, holding position: {}", e),
        }

        walker::advance(&mut self.state, self.config.speed_kmh, &mut self.rng);
        let altitude = walker::elevation(self.io.mapping.as_ref(), self.state.position.latlng()).await;
        self.state.position.altitude = Some(altitude);

        self.io.client.set_position(self.state.position);
        self.io.observer.position(&self.state.position);
    }

    /// At most one deferred action, then the refresh gate.
    async fn dispatch(&mut self) -> Result<SessionPhase, RemoteError> {
        let dispatcher = Dispatcher::new(self.io.client.as_ref(), self.io.observer.as_ref(), &self.config);
        dispatcher.process_pending(&mut self.state, &mut self.rng).await?;

        if refresh::is_due(&self.state, Instant::now()) {
            return Ok(SessionPhase::Refreshing);
        }
        self.pause(self.config.delays.walk).await;
        Ok(SessionPhase::Walking)
    }

    async fn refreshing(&mut self) -> Result<(), RemoteError> {
        self.refresh_world().await?;
        self.pause(self.config.delays.walk).await;
        Ok(())
    }

    /// Query the map, then act on whatever is in reach.
    async fn refresh_world(&mut self) -> Result<(), RemoteError> {
        refresh::refresh(&mut self.state, self.io.client.as_ref(), Instant::now()).await?;
        self.persist();
        self.io.observer.pokestops(&self.state.world.pokestops);

        let dispatcher = Dispatcher::new(self.io.client.as_ref(), self.io.observer.as_ref(), &self.config);
        dispatcher.opportunistic(&mut self.state, &mut self.rng).await?;
        self.persist();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn call(&mut self, batch: Batch) -> Result<Parsed, RemoteError> {
        let responses = self.io.client.submit(batch).await?;
        api::parse(&mut self.state, responses)
    }

    fn persist(&mut self) {
        if let Some(writer) = self.snapshots.as_mut() {
            writer.save(&self.state);
        }
    }

    /// Randomised pause.  UI requests are served while waiting.
    async fn pause(&mut self, base_secs: f64) {
        let delay = scaled_delay(base_secs, self.rng.gen_range(0.9..=1.1));
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            let Some(requests) = self.requests.as_mut() else {
                sleep.await;
                return;
            };
            let closed = tokio::select! {
                _ = &mut sleep => return,
                request = requests.recv() => match request {
                    Some(request) => {
                        handle_request(&mut self.state, request);
                        false
                    }
                    None => true,
                },
            };
            if closed {
                debug!("UI request channel closed");
                self.requests = None;
            }
        }
    }
}

fn handle_request(state: &mut SessionState, request: UiRequest) {
    match request {
        UiRequest::Query { query, reply } => {
            debug!("Answering {}", query.event_name());
            let _ = reply.send(protocol::answer(state, query));
        }
        UiRequest::Enqueue(action) => {
            info!("Queued {} from UI", action.name());
            state.enqueue(action);
        }
    }
}
