//! Player session and its fixed-rate tick loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::GameSettings;
use crate::store::SharedStore;
use crate::util::time::{period, unix_millis, Timer};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::collision::{Collision, CollisionEngine};
use super::frame::{FrameBuilder, FrameStats};
use super::path::{InflectionPath, PathError, SnakeView};
use super::registry::SnakeRegistry;
use super::snacks::{Bounds, SnackField};
use super::types::{Coord, SnakeId};
use super::PlayerInput;

/// Outbound messages buffered per client before frames are dropped
const OUTBOUND_CAPACITY: usize = 64;
/// Inbound client messages buffered per session
const INBOUND_CAPACITY: usize = 64;
/// Random spawn samples before scanning the region
const SPAWN_ATTEMPTS: usize = 64;

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Snake is moving
    Playing,
    /// Snake crashed; only rendering continues
    Ended,
}

/// One player's game: their snake, everyone else's mirrors and the snacks.
pub struct GameSession {
    id: SnakeId,
    phase: SessionPhase,
    tick: u64,
    ended_by: Option<Collision>,
    registry: SnakeRegistry,
    snacks: SnackField,
    settings: GameSettings,
    input_rx: mpsc::Receiver<PlayerInput>,
    output_tx: mpsc::Sender<ServerMsg>,
    frames: FrameStats,
}

impl GameSession {
    pub fn new(
        id: SnakeId,
        store: &SharedStore,
        settings: GameSettings,
        mut rng: ChaCha8Rng,
        input_rx: mpsc::Receiver<PlayerInput>,
        output_tx: mpsc::Sender<ServerMsg>,
    ) -> Result<Self, PathError> {
        let spawn = choose_spawn(store, &settings.bounds, &mut rng);
        let registry = SnakeRegistry::new(
            store,
            id.clone(),
            vec![spawn],
            settings.start_direction,
            settings.showcase.iter().cloned(),
        )?;
        let snacks = SnackField::new(store, settings.bounds, rng);

        info!(snake_id = %id, %spawn, "Session created");

        Ok(Self {
            id,
            phase: SessionPhase::Playing,
            tick: 0,
            ended_by: None,
            registry,
            snacks,
            settings,
            input_rx,
            output_tx,
            frames: FrameStats::default(),
        })
    }

    pub fn id(&self) -> &SnakeId {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn ended_by(&self) -> Option<&Collision> {
        self.ended_by.as_ref()
    }

    pub fn registry(&self) -> &SnakeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SnakeRegistry {
        &mut self.registry
    }

    pub fn snacks(&self) -> &SnackField {
        &self.snacks
    }

    pub fn snacks_mut(&mut self) -> &mut SnackField {
        &mut self.snacks
    }

    /// Run until the client leaves or its channels close
    pub async fn run(mut self) {
        info!(snake_id = %self.id, "Session started");

        let tick_period = period(self.settings.tick_rate);
        let mut tick_interval = interval(tick_period);
        // a slow tick pushes the next one back instead of bunching them up
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut frame_interval = interval(period(self.settings.frame_rate));
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick(), if self.phase == SessionPhase::Playing => {
                    let timer = Timer::new();
                    self.step();
                    if timer.elapsed() > tick_period {
                        warn!(snake_id = %self.id, tick = self.tick, elapsed_ms = timer.elapsed().as_millis() as u64, "Tick overran its period");
                    }
                }
                _ = frame_interval.tick() => {
                    if !self.push_frame() {
                        debug!(snake_id = %self.id, "Client channel closed");
                        break;
                    }
                }
                input = self.input_rx.recv() => {
                    match input {
                        Some(input) => {
                            if !self.handle_input(input) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        self.registry.player_mut().release();
        info!(
            snake_id = %self.id,
            ticks = self.tick,
            score = self.registry.player().length(),
            frames_sent = self.frames.sent,
            frames_dropped = self.frames.dropped,
            "Session closed"
        );
    }

    /// Apply one client message. Returns false when the client is leaving.
    pub fn handle_input(&mut self, input: PlayerInput) -> bool {
        if input.snake_id != self.id {
            warn!(snake_id = %self.id, from = %input.snake_id, "Input for another snake, ignoring");
            return true;
        }
        let queued_ms = unix_millis().saturating_sub(input.received_at);

        match input.msg {
            ClientMsg::SetDirection { direction } => {
                if self.phase == SessionPhase::Playing {
                    let pending = self.registry.player_mut().set_direction(direction);
                    debug!(snake_id = %self.id, requested = %direction, %pending, queued_ms, "Direction input");
                }
                true
            }
            ClientMsg::SetBounds { min, max } => {
                let bounds = self.snacks.set_bounds(min, max);
                if bounds.min != min || bounds.max != max {
                    warn!(snake_id = %self.id, %min, %max, "Ignoring inverted snack bounds");
                } else {
                    debug!(snake_id = %self.id, %min, %max, "Snack bounds changed");
                }
                true
            }
            ClientMsg::Ping { t } => {
                self.send(ServerMsg::Pong { t });
                true
            }
            ClientMsg::Leave => {
                info!(snake_id = %self.id, "Client left");
                false
            }
        }
    }

    /// One simulation tick: move, check collisions, eat.
    /// Returns the collision that ended the session on this tick.
    pub fn step(&mut self) -> Option<Collision> {
        if self.phase != SessionPhase::Playing {
            return None;
        }
        self.tick += 1;

        self.registry.sync();
        self.snacks.sync();

        let head = self.registry.player_mut().advance(1);

        let collision = CollisionEngine::evaluate(
            head,
            self.registry.player(),
            self.registry.opponents().map(|m| (m.id(), m)),
        );
        if let Some(collision) = collision {
            self.end(collision.clone());
            return Some(collision);
        }

        if self.snacks.consume(head) {
            let eventual = self.registry.player_mut().grow(1);
            debug!(snake_id = %self.id, %head, eventual, "Snack eaten");
        }
        None
    }

    fn end(&mut self, collision: Collision) {
        self.phase = SessionPhase::Ended;
        self.registry.player_mut().release();

        let score = self.registry.player().length();
        info!(
            snake_id = %self.id,
            tick = self.tick,
            cause = collision.cause(),
            score,
            "Snake crashed"
        );

        self.send(ServerMsg::SessionEnded {
            tick: self.tick,
            cause: collision.clone(),
            score,
        });
        self.ended_by = Some(collision);
    }

    /// Render pass. Reads state only.
    pub fn frame(&self) -> ServerMsg {
        FrameBuilder::build(
            self.tick,
            self.phase == SessionPhase::Playing,
            &self.registry,
            &self.snacks,
        )
    }

    fn push_frame(&mut self) -> bool {
        let frame = self.frame();
        match self.output_tx.try_send(frame) {
            Ok(()) => {
                self.frames.record(true);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.frames.record(false);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Fire-and-forget delivery of a control message
    fn send(&self, msg: ServerMsg) {
        if let Err(e) = self.output_tx.try_send(msg) {
            debug!(snake_id = %self.id, error = %e, "Dropped outbound message");
        }
    }
}

/// Random in-bounds cell no stored snake currently covers
pub fn choose_spawn(store: &SharedStore, bounds: &Bounds, rng: &mut ChaCha8Rng) -> Coord {
    let bodies: Vec<InflectionPath> = store
        .paths()
        .into_iter()
        .map(|(_, points)| InflectionPath::from_points(points))
        .collect();

    let free = |cell: Coord| !bodies.iter().any(|body| body.occupies(cell, true));

    for _ in 0..SPAWN_ATTEMPTS {
        let candidate = bounds.random_cell(rng);
        if free(candidate) {
            return candidate;
        }
    }
    // crowded field, fall back to a scan
    let scanned = (bounds.min.y..=bounds.max.y)
        .flat_map(|y| (bounds.min.x..=bounds.max.x).map(move |x| Coord::new(x, y)))
        .find(|cell| free(*cell));
    scanned.unwrap_or_else(|| {
        warn!(bounds = ?bounds, "No free spawn cell, spawning on an occupied one");
        bounds.random_cell(rng)
    })
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub snake_id: SnakeId,
    pub input_tx: mpsc::Sender<PlayerInput>,
}

/// Registry of all live sessions
pub struct SessionRegistry {
    sessions: DashMap<SnakeId, SessionHandle>,
    /// Sessions ever started, mixed into fixed seeds so sessions differ
    started: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            started: AtomicU64::new(0),
        }
    }

    pub fn get(&self, id: &SnakeId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.snake_id.clone(), handle);
    }

    pub fn remove(&self, id: &SnakeId) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Create a session for a new client and spawn its loop.
    ///
    /// Returns the handle for sending input and the receiver for frames.
    pub fn start(
        self: &Arc<Self>,
        store: &SharedStore,
        settings: &GameSettings,
    ) -> Result<(SessionHandle, mpsc::Receiver<ServerMsg>), PathError> {
        let n = self.started.fetch_add(1, Ordering::Relaxed);
        let seed = settings
            .snack_seed
            .map(|seed| seed.wrapping_add(n))
            .unwrap_or_else(rand::random::<u64>);
        let rng = ChaCha8Rng::seed_from_u64(seed);

        let snake_id = SnakeId::generate();
        let (input_tx, input_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(OUTBOUND_CAPACITY);

        let session = GameSession::new(
            snake_id.clone(),
            store,
            settings.clone(),
            rng,
            input_rx,
            output_tx,
        )?;

        let handle = SessionHandle {
            snake_id: snake_id.clone(),
            input_tx,
        };
        self.insert(handle.clone());

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            session.run().await;
            registry.remove(&snake_id);
            debug!(snake_id = %snake_id, "Session removed from registry");
        });

        Ok((handle, output_rx))
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
