//! The nearby screen as a single-threaded event loop.
//!
//! [`NearbySession::run`] multiplexes three inputs on one task:
//!
//! - position samples from the [`PositionStream`]
//! - [`UiCommand`]s sent through a [`SessionHandle`]
//! - completed background work (query rounds, fix requests, favorites)
//!
//! All state lives in the session and is only touched between awaits, so
//! samples are handled in arrival order and no locking is needed. Rounds
//! run concurrently as local futures; their results are committed in
//! generation order through the [`ResultBoard`].

use crate::backend::{FavoritesBackend, PositionSource, ProximityBackend, RoutingService, SessionProvider};
use crate::camera::{CameraCommand, CameraFollowController, FollowMode};
use crate::error::{DiscoveryError, LocationError, Result};
use crate::favorites::FavoriteSet;
use crate::model::{ProximityResult, QueryRequest, UserLocation};
use crate::query::{ProximityQueryEngine, QueryOutcome};
use crate::sequence::{Generation, ResultBoard};
use crate::throttle::ReloadThrottler;
use crate::tracker::{PositionSample, PositionStream, TrackerStatus};
use findixi_core::config::ConfigSchema;
use findixi_telemetry::{metrics, names};
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 64;

/// User actions on the nearby screen.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Radius slider moved, in miles; clamped and debounced
    SetRadius(f64),
    /// Category chip selected or cleared
    SetCategory(Option<i64>),
    /// Open-now toggle
    SetOpenNowOnly(bool),
    /// The user dragged the map
    PanDrag,
    /// The visible region changed to this latitude span
    RegionChanged(f64),
    /// Recenter button: follow again from a fresh fix
    Recenter,
    /// Re-resolve favorites and re-annotate the committed results
    RefreshFavorites,
    /// Run the current query again
    Retry,
    /// Stop tracking and finish
    Shutdown,
}

/// Everything the presentation layer needs to render.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Tracking status changed
    Status(TrackerStatus),
    /// The device watch ended
    TrackingStopped,
    /// Animate the map
    Camera(CameraCommand),
    /// A round committed; replaces the displayed list
    Results {
        /// Committed generation
        generation: Generation,
        /// Annotated results
        results: Vec<ProximityResult>,
    },
    /// A round or fix request failed; the displayed list is unchanged
    QueryFailed {
        /// Failed round, if a round was started
        generation: Option<Generation>,
        /// Error text
        message: String,
        /// Actionable hint
        suggestion: &'static str,
        /// Whether to offer a retry action
        recoverable: bool,
    },
    /// The favorite set changed
    FavoritesChanged(FavoriteSet),
}

/// Final state returned by [`NearbySession::run`].
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Generation of the committed results
    pub generation: Option<Generation>,
    /// Committed results
    pub results: Vec<ProximityResult>,
    /// Favorite set used for the committed results
    pub favorites: FavoriteSet,
    /// Latest live position
    pub live: Option<UserLocation>,
    /// Tracking status
    pub status: TrackerStatus,
    /// Camera mode
    pub follow_mode: FollowMode,
    /// Camera zoom
    pub zoom: f64,
}

/// Sends commands to a running session and subscribes to its events.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<UiCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Sends a command. Returns `false` once the session has finished.
    pub async fn send(&self, command: UiCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

enum TaskOutput {
    Round(Generation, Result<QueryOutcome>),
    Fix(std::result::Result<UserLocation, LocationError>),
    Favorites(FavoriteSet),
}

type Tasks = FuturesUnordered<LocalBoxFuture<'static, TaskOutput>>;

/// State of one nearby screen.
pub struct NearbySession<B, R, P> {
    engine: Arc<ProximityQueryEngine<B, R, P>>,
    commands: mpsc::Receiver<UiCommand>,
    events: broadcast::Sender<SessionEvent>,
    camera: CameraFollowController,
    throttler: ReloadThrottler,
    board: ResultBoard<ProximityResult>,
    favorites: FavoriteSet,
    request: QueryRequest,
    radius_bounds: (f64, f64),
    radius_debounce: Duration,
    radius_deadline: Option<Instant>,
    live: Option<UserLocation>,
    status: TrackerStatus,
}

impl<B, R, P> NearbySession<B, R, P>
where
    B: ProximityBackend + SessionProvider + FavoritesBackend + 'static,
    R: RoutingService + 'static,
    P: PositionSource + 'static,
{
    /// Session over `engine`, tuned from configuration.
    pub fn new(engine: Arc<ProximityQueryEngine<B, R, P>>, config: &ConfigSchema) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let session = Self {
            engine,
            commands: command_rx,
            events: event_tx.clone(),
            camera: CameraFollowController::from_config(&config.camera),
            throttler: ReloadThrottler::from_config(&config.reload),
            board: ResultBoard::new(),
            favorites: FavoriteSet::default(),
            request: QueryRequest::from_config(&config.query),
            radius_bounds: (config.query.min_radius_miles, config.query.max_radius_miles),
            radius_debounce: Duration::from_millis(config.query.radius_debounce_ms),
            radius_deadline: None,
            live: None,
            status: TrackerStatus::Pending,
        };
        let handle = SessionHandle {
            commands: command_tx,
            events: event_tx,
        };
        (session, handle)
    }

    /// Replaces the initial query parameters. The radius is clamped to the
    /// configured bounds; the center is always the live position.
    #[must_use]
    pub fn with_request(mut self, request: QueryRequest) -> Self {
        let (min, max) = self.radius_bounds;
        self.request = QueryRequest {
            center: None,
            radius_miles: request.radius_miles.clamp(min, max),
            ..request
        };
        self
    }

    /// Runs until [`UiCommand::Shutdown`] or until every handle is dropped.
    ///
    /// Tracking starts here. On shutdown the subscription is dropped first;
    /// rounds still in flight are then allowed to finish and commit.
    pub async fn run(mut self) -> SessionSnapshot {
        let mut tasks: Tasks = FuturesUnordered::new();
        let mut stream = match self.engine.tracker().subscribe().await {
            Ok(stream) => Some(stream),
            Err(LocationError::PermissionDenied) => {
                warn!("Location permission denied, not tracking");
                self.set_status(TrackerStatus::Denied);
                None
            }
            Err(e) => {
                warn!(error = %e, "Tracking unavailable");
                self.emit_failure(None, &DiscoveryError::from(e));
                None
            }
        };

        loop {
            tokio::select! {
                sample = next_sample(&mut stream) => match sample {
                    Some(sample) => self.on_sample(sample, &mut tasks),
                    None => {
                        stream = None;
                        info!("Location tracking stopped");
                        self.emit(SessionEvent::TrackingStopped);
                    }
                },
                Some(output) = tasks.next(), if !tasks.is_empty() => {
                    self.on_task(output, &mut stream, &mut tasks);
                }
                () = wait_until(self.radius_deadline), if self.radius_deadline.is_some() => {
                    self.radius_deadline = None;
                    self.start_round(&mut tasks);
                }
                command = self.commands.recv() => match command {
                    Some(UiCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command, &mut tasks),
                },
            }
        }

        if let Some(mut stream) = stream.take() {
            stream.close();
        }
        debug!(in_flight = tasks.len(), "Session shutting down");
        while let Some(output) = tasks.next().await {
            if let TaskOutput::Round(generation, result) = output {
                self.on_round(generation, result);
            }
        }

        SessionSnapshot {
            generation: self.board.generation(),
            results: self.board.results().to_vec(),
            favorites: self.favorites,
            live: self.live,
            status: self.status,
            follow_mode: self.camera.mode(),
            zoom: self.camera.zoom(),
        }
    }

    fn on_sample(&mut self, sample: PositionSample, tasks: &mut Tasks) {
        self.set_status(TrackerStatus::Tracking);
        self.live = Some(sample.location);

        if let Some(command) = self.camera.on_sample(&sample) {
            self.emit(SessionEvent::Camera(command));
        }

        let now = Instant::now().into_std();
        if self.throttler.should_trigger(&sample.location, now) {
            let request = self.request.clone().with_center(sample.location);
            self.spawn_round(request, tasks);
        }
    }

    fn on_command(&mut self, command: UiCommand, tasks: &mut Tasks) {
        debug!(?command, "UI command");
        match command {
            UiCommand::SetRadius(miles) => {
                if !miles.is_finite() {
                    return;
                }
                let (min, max) = self.radius_bounds;
                self.request.radius_miles = miles.clamp(min, max);
                self.radius_deadline = Some(Instant::now() + self.radius_debounce);
            }
            UiCommand::SetCategory(category_id) => {
                self.request = self.request.clone().with_category(category_id);
                self.start_round(tasks);
            }
            UiCommand::SetOpenNowOnly(open_now_only) => {
                self.request.open_now_only = open_now_only;
                self.start_round(tasks);
            }
            UiCommand::PanDrag => self.camera.on_pan_drag(),
            UiCommand::RegionChanged(latitude_delta) => self.camera.on_region_change(latitude_delta),
            UiCommand::Recenter => {
                let engine = Arc::clone(&self.engine);
                tasks.push(async move { TaskOutput::Fix(engine.tracker().request_fix().await) }.boxed_local());
            }
            UiCommand::RefreshFavorites => {
                let engine = Arc::clone(&self.engine);
                tasks.push(async move { TaskOutput::Favorites(engine.favorites().resolve().await) }.boxed_local());
            }
            UiCommand::Retry => self.start_round(tasks),
            UiCommand::Shutdown => {}
        }
    }

    fn on_task(&mut self, output: TaskOutput, stream: &mut Option<PositionStream>, tasks: &mut Tasks) {
        match output {
            TaskOutput::Round(generation, result) => self.on_round(generation, result),
            TaskOutput::Fix(Ok(location)) => {
                if let Some(stream) = stream.as_mut() {
                    stream.mark_tracked(location);
                }
                self.live = Some(location);
                let command = self.camera.recenter(&location);
                self.emit(SessionEvent::Camera(command));
                let request = self.request.clone().with_center(location);
                self.spawn_round(request, tasks);
            }
            TaskOutput::Fix(Err(e)) => {
                let error = DiscoveryError::from(e);
                if matches!(error, DiscoveryError::PermissionDenied) {
                    self.set_status(TrackerStatus::Denied);
                }
                self.emit_failure(None, &error);
            }
            TaskOutput::Favorites(favorites) => {
                self.favorites = favorites.clone();
                self.emit(SessionEvent::FavoritesChanged(favorites));
                if let Some(generation) = self.board.generation() {
                    let annotated = self.favorites.annotate(self.board.results());
                    if self.board.replace(generation, annotated) {
                        self.emit(SessionEvent::Results {
                            generation,
                            results: self.board.results().to_vec(),
                        });
                    }
                }
            }
        }
    }

    fn on_round(&mut self, generation: Generation, result: Result<QueryOutcome>) {
        self.throttler.round_finished();

        match result {
            Ok(QueryOutcome::Current(round)) => {
                let center = round.center;
                if !self.board.commit(self.engine.sequencer(), generation, round.results) {
                    metrics().increment(names::QUERIES_SUPERSEDED);
                    return;
                }
                self.throttler.record(&center, Instant::now().into_std());
                self.live.get_or_insert(center);
                self.favorites = round.favorites;

                let count = self.board.results().len();
                metrics().gauge(names::RESULTS_COUNT, count as u64);
                info!(generation = %generation, results = count, "Committed nearby results");
                self.emit(SessionEvent::Results {
                    generation,
                    results: self.board.results().to_vec(),
                });
            }
            Ok(QueryOutcome::Superseded(_)) => {}
            Err(error) => {
                if matches!(error, DiscoveryError::PermissionDenied) {
                    self.set_status(TrackerStatus::Denied);
                }
                self.emit_failure(Some(generation), &error);
            }
        }
    }

    /// Starts a user-triggered round from the current filters and live position.
    fn start_round(&mut self, tasks: &mut Tasks) {
        let mut request = self.request.clone();
        request.center = self.live;
        self.spawn_round(request, tasks);
    }

    fn spawn_round(&mut self, request: QueryRequest, tasks: &mut Tasks) {
        let generation = self.engine.sequencer().next();
        self.throttler.round_started();
        let engine = Arc::clone(&self.engine);
        tasks.push(
            async move {
                let result = engine.query_as(generation, &request).await;
                TaskOutput::Round(generation, result)
            }
            .boxed_local(),
        );
    }

    fn set_status(&mut self, status: TrackerStatus) {
        if self.status != status {
            info!(?status, "Tracker status changed");
            self.status = status;
            self.emit(SessionEvent::Status(status));
        }
    }

    fn emit_failure(&self, generation: Option<Generation>, error: &DiscoveryError) {
        self.emit(SessionEvent::QueryFailed {
            generation,
            message: error.to_string(),
            suggestion: error.suggestion(),
            recoverable: error.is_recoverable(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn next_sample(stream: &mut Option<PositionStream>) -> Option<PositionSample> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
