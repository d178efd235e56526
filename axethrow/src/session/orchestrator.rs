//! The session state machine.
//!
//! `Idle → Countdown → Active → Ending → Idle`. All mutable state lives
//! behind one async mutex; every callback (trigger, countdown beat, tracker
//! event, spawn tick, deadline tick) holds it for its whole critical
//! section, paired world calls included. Timer callbacks carry the session
//! generation they were armed for and become no-ops once it moved on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axethrow_core::config::{FeatureFlags, SpawnConfig};
use axethrow_core::{CalibrationGeometry, Point3, ScoreOutcome, intersect_segment_box};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::difficulty::{self, next_target};
use super::state::{GameSession, Phase, Target, TrajectorySample};
use crate::error::HostError;
use crate::host::{GameContext, PlacedVolume};
use crate::observability::{Event, metrics};
use crate::scheduler::TimerSet;
use crate::tracking::{EntitySource, EntityTracker, TrackerEvent, TrackerEventKind};

/// Shown when the start trigger fires before setup has run.
pub const NOT_SET_UP: &str =
    "Axe throw has not been set up yet, if you see this message let an admin know.";

/// Shown when the start trigger fires during someone else's session.
pub const ALREADY_IN_SESSION: &str = "A game is already in session!";

const COUNTDOWN_BEATS: [&str; 3] = ["Ready…", "Set…", "Go!"];

/// Positions tried for one target before it is left out of its wave.
const PLACEMENT_ATTEMPTS: usize = 8;

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new session entered `Countdown`.
    Started,
    /// Another session is running.
    AlreadyRunning,
    /// No calibration geometry.
    NotCalibrated,
}

/// A copy of the observable session state.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub phase: Phase,
    pub generation: u64,
    pub player: Option<String>,
    pub score: u32,
    pub hits: u32,
    pub deadline: Option<Instant>,
    pub targets: Vec<Target>,
}

struct SessionState {
    phase: Phase,
    generation: u64,
    session: Option<GameSession>,
    calibration: Option<CalibrationGeometry>,
    targets: Vec<Target>,
    trajectories: HashMap<String, TrajectorySample>,
    rng: StdRng,
    timers: Option<TimerSet>,
    tracker: Option<Arc<EntityTracker>>,
}

impl SessionState {
    fn is_current(&self, phase: Phase, generation: u64) -> bool {
        self.phase == phase && self.generation == generation
    }
}

/// Runs one game session at a time.
pub struct SessionOrchestrator {
    ctx: GameContext,
    source: Arc<dyn EntitySource>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator").finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Creates an idle, uncalibrated orchestrator.
    ///
    /// `source` feeds the tracker started for each session.
    #[must_use]
    pub fn new(ctx: GameContext, source: Arc<dyn EntitySource>) -> Arc<Self> {
        let rng = ctx
            .config
            .rng_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Arc::new(Self {
            ctx,
            source,
            state: Mutex::new(SessionState {
                phase: Phase::Idle,
                generation: 0,
                session: None,
                calibration: None,
                targets: Vec::new(),
                trajectories: HashMap::new(),
                rng,
                timers: None,
                tracker: None,
            }),
        })
    }

    /// Replaces the calibration geometry used by the next session.
    ///
    /// A running session keeps the geometry it was triggered with.
    pub async fn set_calibration(&self, calibration: Option<CalibrationGeometry>) {
        self.state.lock().await.calibration = calibration;
    }

    /// Returns `true` when calibration geometry is loaded.
    pub async fn is_calibrated(&self) -> bool {
        self.state.lock().await.calibration.is_some()
    }

    /// Returns `true` while a session is counting down, active or ending.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.phase.is_busy()
    }

    /// Returns a copy of the current state.
    pub async fn status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        let session = state.session.as_ref();
        SessionStatus {
            phase: state.phase,
            generation: state.generation,
            player: session.map(|s| s.player.clone()),
            score: session.map_or(0, |s| s.score),
            hits: session.map_or(0, |s| s.hits),
            deadline: session.map(|s| s.deadline),
            targets: state.targets.clone(),
        }
    }

    /// Handles the start trigger for `player`.
    pub async fn trigger(self: &Arc<Self>, player: &str) -> TriggerOutcome {
        let mut state = self.state.lock().await;

        if state.phase.is_busy() {
            debug!(player, phase = %state.phase, "trigger ignored, session running");
            self.ctx.tell(player, ALREADY_IN_SESSION).await;
            return TriggerOutcome::AlreadyRunning;
        }
        let Some(calibration) = state.calibration else {
            self.ctx.tell(player, NOT_SET_UP).await;
            return TriggerOutcome::NotCalibrated;
        };

        state.generation += 1;
        let generation = state.generation;
        state.phase = Phase::Countdown;
        state.session = Some(GameSession::new(
            player,
            calibration,
            Instant::now(),
            self.ctx.config.session.game_length,
        ));

        info!(player, generation, "session started");
        metrics::record_session_started();
        self.ctx.events.emit(Event::SessionStarted {
            timestamp: Utc::now(),
            player: player.to_string(),
            generation,
        });

        self.print(player, COUNTDOWN_BEATS[0]).await;

        let timers = TimerSet::new();
        let orchestrator = Arc::clone(self);
        let mut beat = 0;
        timers.rearm("countdown", self.ctx.config.session.countdown_beat, move || {
            beat += 1;
            let orchestrator = Arc::clone(&orchestrator);
            let current = beat;
            async move { orchestrator.countdown_step(generation, current).await }
        });
        state.timers = Some(timers);

        TriggerOutcome::Started
    }

    /// Stops any running session without recording its score.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if !state.phase.is_busy() {
            return;
        }
        info!(generation = state.generation, "session aborted");
        state.phase = Phase::Ending;
        if let Some(session) = self.teardown(&mut state).await {
            self.take_item(&session.player).await;
        }
        state.phase = Phase::Idle;
    }

    // ------------------------------------------------------------------------
    // Countdown
    // ------------------------------------------------------------------------

    async fn countdown_step(self: &Arc<Self>, generation: u64, beat: usize) -> Option<Duration> {
        let mut state = self.state.lock().await;
        if !state.is_current(Phase::Countdown, generation) {
            return None;
        }
        let player = state.session.as_ref()?.player.clone();

        let message = COUNTDOWN_BEATS.get(beat).copied().unwrap_or("Go!");
        self.print(&player, message).await;

        if beat + 1 < COUNTDOWN_BEATS.len() {
            return Some(self.ctx.config.session.countdown_beat);
        }

        self.begin_active(&mut state, generation).await;
        None
    }

    async fn begin_active(self: &Arc<Self>, state: &mut SessionState, generation: u64) {
        let config = &self.ctx.config;
        let now = Instant::now();
        state.phase = Phase::Active;
        let Some(session) = state.session.as_mut() else {
            return;
        };
        session.active_since = Some(now);
        session.deadline = now + config.session.game_length;
        let player = session.player.clone();

        let Some(timers) = state.timers.as_ref() else {
            return;
        };

        let tracker = Arc::new(EntityTracker::new(
            Arc::clone(&self.source),
            config.feed.poll_interval,
            timers.child_token(),
        ));
        let mut subscription =
            tracker.subscribe(&[TrackerEventKind::Destroyed, TrackerEventKind::Update]);
        tracker.start();

        let orchestrator = Arc::clone(self);
        let cancel = timers.child_token();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => break,
                    event = subscription.events.recv() => event,
                };
                let Some(event) = event else { break };
                orchestrator.on_tracker_event(generation, event).await;
            }
        });

        let orchestrator = Arc::clone(self);
        timers.rearm("spawn", Duration::ZERO, move || {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.spawn_tick(generation).await }
        });

        let orchestrator = Arc::clone(self);
        timers.every("deadline", config.session.deadline_tick, move || {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.deadline_tick(generation).await }
        });

        state.tracker = Some(tracker);
        self.give_item(&player).await;
        debug!(player, generation, "session active");
    }

    // ------------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------------

    async fn on_tracker_event(&self, generation: u64, event: TrackerEvent) {
        let mut state = self.state.lock().await;
        if !state.is_current(Phase::Active, generation) {
            return;
        }

        match event {
            TrackerEvent::Update(snapshot) => {
                for (id, entity) in snapshot.iter() {
                    state
                        .trajectories
                        .entry(id.clone())
                        .and_modify(|sample| sample.push(entity.position))
                        .or_insert_with(|| TrajectorySample::new(entity.position));
                }
            }
            TrackerEvent::Destroyed(entity) => {
                let Some(sample) = state.trajectories.remove(&entity.id) else {
                    return;
                };
                let Some((start, end)) =
                    sample.segment(self.ctx.config.session.trajectory_multiplier)
                else {
                    trace!(id = %entity.id, "single-sample projectile ignored");
                    return;
                };
                self.score_segment(&mut state, &entity.id, start, end).await;
            }
            TrackerEvent::Created(_) => {}
        }
    }

    async fn score_segment(&self, state: &mut SessionState, entity_id: &str, start: Point3, end: Point3) {
        let (hit, kept): (Vec<Target>, Vec<Target>) = std::mem::take(&mut state.targets)
            .into_iter()
            .partition(|target| intersect_segment_box(&target.volume, start, end).is_some());
        state.targets = kept;

        let Some(session) = state.session.as_mut() else {
            return;
        };

        for target in hit {
            session.award(target.points, self.ctx.config.session.hit_bonus);
            debug!(
                player = %session.player,
                entity_id,
                points = target.points,
                score = session.score,
                "target hit"
            );
            metrics::record_target_hit(target.points);
            self.ctx.events.emit(Event::TargetHit {
                timestamp: Utc::now(),
                player: session.player.clone(),
                entity_id: entity_id.to_string(),
                points: target.points,
                score: session.score,
            });
            self.clear(&target).await;
        }
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    async fn spawn_tick(&self, generation: u64) -> Option<Duration> {
        let mut state = self.state.lock().await;
        if !state.is_current(Phase::Active, generation) {
            return None;
        }
        let state = &mut *state;
        let session = state.session.as_ref()?;
        let calibration = session.calibration;
        let spawn = &self.ctx.config.spawn;
        let elapsed = session.difficulty_elapsed(Instant::now());
        let player = session.player.clone();

        for target in std::mem::take(&mut state.targets) {
            self.clear(&target).await;
        }

        let (placed, points) = draw_wave(
            &calibration,
            spawn,
            self.ctx.config.features,
            elapsed,
            &mut state.rng,
        );
        if placed.len() < spawn.targets_per_wave {
            debug!(
                placed = placed.len(),
                wanted = spawn.targets_per_wave,
                "surface too crowded, wave trimmed"
            );
        }

        match self.ctx.world.place_volumes(&placed).await {
            Ok(()) => {
                let now = Instant::now();
                state.targets.extend(placed.iter().zip(&points).map(|(p, &value)| Target {
                    volume: p.volume,
                    points: value,
                    spawned_at: now,
                }));
                metrics::record_targets_spawned(placed.len());
                self.ctx.events.emit(Event::TargetsSpawned {
                    timestamp: Utc::now(),
                    player,
                    points,
                });
            }
            Err(e) => host_failed("place_volumes", &e),
        }

        let ramp = difficulty::ramp(elapsed, spawn.ramp_window);
        Some(difficulty::spawn_interval(spawn, ramp))
    }

    async fn deadline_tick(&self, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        if !state.is_current(Phase::Active, generation) {
            return false;
        }
        let Some(session) = state.session.as_ref() else {
            return false;
        };
        let player = session.player.clone();
        let now = Instant::now();

        self.give_item(&player).await;

        if now > session.deadline {
            self.end(&mut state).await;
            return false;
        }

        let seconds_left = session.seconds_left(now);
        self.print(&player, &seconds_left.to_string()).await;
        true
    }

    // ------------------------------------------------------------------------
    // Ending
    // ------------------------------------------------------------------------

    async fn end(&self, state: &mut SessionState) {
        state.phase = Phase::Ending;
        let Some(session) = self.teardown(state).await else {
            state.phase = Phase::Idle;
            return;
        };
        let player = session.player.as_str();

        self.take_item(player).await;

        let outcome = self.record_score(player, session.score).await;
        if outcome.global_best {
            let lines = [format!(
                "<color=\"ffff77\">{player}</> set a new Axe Throw record with <color=\"44ff44\">{}</> points!",
                session.score
            )];
            if let Err(e) = self.ctx.world.broadcast(&lines).await {
                host_failed("broadcast", &e);
            }
        }

        let mut lines = vec![if self.ctx.config.features.tiered_scoring {
            format!(
                "You hit {} targets for <color=\"44ff44\">{}</> points!",
                session.hits, session.score
            )
        } else {
            format!("You hit {} targets!", session.hits)
        }];
        if outcome.personal_best && session.score > 0 {
            lines.push("That's a new personal best!".to_string());
        }
        self.ctx.tell_lines(player, &lines).await;

        if self.ctx.config.features.finish_teleport {
            if let Err(e) = self
                .ctx
                .world
                .teleport(player, session.calibration.finish_position)
                .await
            {
                host_failed("teleport", &e);
            }
        }

        info!(player, score = session.score, hits = session.hits, "session ended");
        self.ctx.events.emit(Event::SessionEnded {
            timestamp: Utc::now(),
            player: session.player.clone(),
            score: session.score,
            personal_best: outcome.personal_best,
            global_best: outcome.global_best,
        });

        state.phase = Phase::Idle;
    }

    /// Cancels timers, stops the tracker and clears every target.
    async fn teardown(&self, state: &mut SessionState) -> Option<GameSession> {
        if let Some(timers) = state.timers.take() {
            timers.cancel();
        }
        if let Some(tracker) = state.tracker.take() {
            tracker.stop();
        }
        state.trajectories.clear();
        for target in std::mem::take(&mut state.targets) {
            self.clear(&target).await;
        }
        state.session.take()
    }

    async fn record_score(&self, player: &str, score: u32) -> ScoreOutcome {
        let mut leaderboard = match self.ctx.store.leaderboard().await {
            Ok(leaderboard) => leaderboard,
            Err(e) => {
                warn!(player, error = %e, "failed to read leaderboard");
                return ScoreOutcome::default();
            }
        };
        let outcome = leaderboard.record(player, score);
        if outcome.personal_best {
            if let Err(e) = self.ctx.store.set_leaderboard(&leaderboard).await {
                warn!(player, error = %e, "failed to save leaderboard");
            }
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // World helpers
    // ------------------------------------------------------------------------

    async fn clear(&self, target: &Target) {
        if let Err(e) = self.ctx.world.clear_region(&target.volume).await {
            host_failed("clear_region", &e);
        }
    }

    async fn print(&self, player: &str, message: &str) {
        if let Err(e) = self.ctx.world.middle_print(player, message).await {
            host_failed("middle_print", &e);
        }
    }

    async fn give_item(&self, player: &str) {
        let item = &self.ctx.config.session.item;
        if let Err(e) = self.ctx.world.give_item(player, item).await {
            host_failed("give_item", &e);
        }
    }

    async fn take_item(&self, player: &str) {
        let item = &self.ctx.config.session.item;
        if let Err(e) = self.ctx.world.take_item(player, item).await {
            host_failed("take_item", &e);
        }
    }
}

/// Draws one wave of targets on the calibration surface.
///
/// Targets in the same wave never overlap, since clearing one must not cut
/// into another. A target that finds no free spot is dropped.
fn draw_wave<R: Rng + ?Sized>(
    calibration: &CalibrationGeometry,
    spawn: &SpawnConfig,
    features: FeatureFlags,
    elapsed: Duration,
    rng: &mut R,
) -> (Vec<PlacedVolume>, Vec<u32>) {
    let mut placed: Vec<PlacedVolume> = Vec::with_capacity(spawn.targets_per_wave);
    let mut points = Vec::with_capacity(spawn.targets_per_wave);

    for _ in 0..spawn.targets_per_wave {
        let next = next_target(spawn, features, elapsed, rng);
        let free = (0..PLACEMENT_ATTEMPTS).find_map(|_| {
            let (u, v) = (rng.random::<f64>(), rng.random::<f64>());
            let volume = calibration.target_volume(next.half_size, spawn.thickness, u, v);
            (!placed.iter().any(|p| p.volume.overlaps(&volume))).then_some(volume)
        });
        if let Some(volume) = free {
            placed.push(PlacedVolume {
                volume,
                color: next.color,
            });
            points.push(next.points);
        }
    }

    (placed, points)
}

fn host_failed(operation: &'static str, error: &HostError) {
    warn!(operation, error = %error, "world call failed");
    metrics::record_host_error(operation);
}

#[cfg(test)]
mod tests {
    use axethrow_core::{Vec3, Volume};

    use super::*;

    fn wide_surface() -> CalibrationGeometry {
        CalibrationGeometry {
            trigger_position: Vec3::ZERO,
            target_surface: Volume::new(Vec3::new(40.0, 200.0, 25.0), Vec3::new(40.0, 5.0, 25.0)),
            finish_position: Vec3::ZERO,
        }
    }

    #[test]
    fn test_wave_targets_never_overlap() {
        let mut spawn = SpawnConfig::default();
        spawn.targets_per_wave = 3;
        let features = FeatureFlags::default();
        let mut rng = StdRng::seed_from_u64(7);

        for wave in 0..50 {
            let elapsed = Duration::from_secs(wave);
            let (placed, points) = draw_wave(&wide_surface(), &spawn, features, elapsed, &mut rng);
            assert_eq!(placed.len(), points.len());
            for (i, a) in placed.iter().enumerate() {
                for b in &placed[i + 1..] {
                    assert!(
                        !a.volume.overlaps(&b.volume),
                        "wave {wave}: {} overlaps {}",
                        a.volume.position,
                        b.volume.position
                    );
                }
            }
        }
    }

    #[test]
    fn test_crowded_surface_drops_targets() {
        // Every target is centred on a surface smaller than itself.
        let calibration = CalibrationGeometry {
            target_surface: Volume::new(Vec3::new(0.0, 100.0, 0.0), Vec3::new(2.0, 1.0, 2.0)),
            ..wide_surface()
        };
        let mut spawn = SpawnConfig::default();
        spawn.targets_per_wave = 4;
        let mut rng = StdRng::seed_from_u64(1);

        let (placed, points) =
            draw_wave(&calibration, &spawn, FeatureFlags::default(), Duration::ZERO, &mut rng);
        assert_eq!(placed.len(), 1);
        assert_eq!(points.len(), 1);
    }
}
