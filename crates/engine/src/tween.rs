use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::app::plan_sim_steps;

pub const TWEEN_UPDATE_HZ: u32 = 60;
const MAX_STEPS_PER_ADVANCE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TweenId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenChannel {
    pub start: f32,
    pub goal: f32,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TweenError {
    #[error("tween duration must be finite and positive, got {0}")]
    InvalidDuration(f32),
    #[error("tween needs at least one channel")]
    NoChannels,
    #[error("channel {index} has a non-finite endpoint")]
    NonFiniteChannel { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TweenOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenStep {
    /// Values moved; `completed` is set on the step that reaches the duration.
    Advanced { completed: bool },
    /// The tween was cancelled before this step. Values are left untouched.
    Cancelled,
    /// Already resolved. Never reports progress again.
    Resolved,
}

/// Linear interpolation over parallel scalar channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    duration_seconds: f32,
    elapsed_seconds: f32,
    channels: Vec<TweenChannel>,
    active: bool,
    resolved: bool,
}

impl Tween {
    pub fn try_new(duration_seconds: f32, endpoints: &[(f32, f32)]) -> Result<Self, TweenError> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(TweenError::InvalidDuration(duration_seconds));
        }
        if endpoints.is_empty() {
            return Err(TweenError::NoChannels);
        }
        let mut channels = Vec::with_capacity(endpoints.len());
        for (index, (start, goal)) in endpoints.iter().copied().enumerate() {
            if !start.is_finite() || !goal.is_finite() {
                return Err(TweenError::NonFiniteChannel { index });
            }
            channels.push(TweenChannel {
                start,
                goal,
                value: start,
            });
        }
        Ok(Self {
            duration_seconds,
            elapsed_seconds: 0.0,
            channels,
            active: true,
            resolved: false,
        })
    }

    /// Panics on malformed input. Use [`Tween::try_new`] for untrusted values.
    pub fn new(duration_seconds: f32, endpoints: &[(f32, f32)]) -> Self {
        match Self::try_new(duration_seconds, endpoints) {
            Ok(tween) => tween,
            Err(err) => panic!("invalid tween: {err}"),
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration_seconds
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }

    pub fn progress(&self) -> f32 {
        (self.elapsed_seconds / self.duration_seconds).clamp(0.0, 1.0)
    }

    pub fn channels(&self) -> &[TweenChannel] {
        &self.channels
    }

    pub fn values(&self) -> Vec<f32> {
        self.channels.iter().map(|channel| channel.value).collect()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Marks the tween inactive. Returns false when it was already inactive.
    pub fn cancel(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        true
    }

    pub fn step(&mut self, dt_seconds: f32) -> TweenStep {
        if self.resolved {
            return TweenStep::Resolved;
        }
        if !self.active {
            self.resolved = true;
            return TweenStep::Cancelled;
        }

        self.elapsed_seconds =
            (self.elapsed_seconds + dt_seconds.max(0.0)).min(self.duration_seconds);
        let completed = self.elapsed_seconds >= self.duration_seconds;
        let pct = self.progress();
        for channel in &mut self.channels {
            channel.value = if completed {
                channel.goal
            } else {
                channel.start + (channel.goal - channel.start) * pct
            };
        }
        if completed {
            self.active = false;
            self.resolved = true;
        }
        TweenStep::Advanced { completed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenControl {
    Continue,
    /// Ask the scheduler to cancel the tween that just ticked.
    Cancel,
}

/// Receives interpolated values once per scheduler step.
pub trait TweenObserver {
    fn on_tween_tick(&mut self, id: TweenId, values: &[f32]) -> Result<TweenControl, ObserverError>;
}

impl<F> TweenObserver for F
where
    F: FnMut(TweenId, &[f32]) -> Result<TweenControl, ObserverError>,
{
    fn on_tween_tick(&mut self, id: TweenId, values: &[f32]) -> Result<TweenControl, ObserverError> {
        self(id, values)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreTicks;

impl TweenObserver for IgnoreTicks {
    fn on_tween_tick(&mut self, _id: TweenId, _values: &[f32]) -> Result<TweenControl, ObserverError> {
        Ok(TweenControl::Continue)
    }
}

/// Delivered exactly once per begun tween.
#[derive(Debug, Clone, PartialEq)]
pub struct TweenCompletion {
    pub id: TweenId,
    pub outcome: TweenOutcome,
    pub values: Vec<f32>,
}

#[derive(Debug)]
struct ScheduledTween {
    tween: Tween,
    running: bool,
}

/// Fixed-rate clock for a set of tweens. Steps run in id order.
#[derive(Debug)]
pub struct TweenScheduler {
    step: Duration,
    accumulator: Duration,
    max_steps_per_advance: u32,
    next_id: u64,
    tweens: BTreeMap<TweenId, ScheduledTween>,
}

impl Default for TweenScheduler {
    fn default() -> Self {
        Self::new(TWEEN_UPDATE_HZ)
    }
}

impl TweenScheduler {
    pub fn new(update_hz: u32) -> Self {
        Self {
            step: Duration::from_secs_f64(1.0 / update_hz.max(1) as f64),
            accumulator: Duration::ZERO,
            max_steps_per_advance: MAX_STEPS_PER_ADVANCE,
            next_id: 0,
            tweens: BTreeMap::new(),
        }
    }

    pub fn step_duration(&self) -> Duration {
        self.step
    }

    pub fn step_seconds(&self) -> f32 {
        self.step.as_secs_f32()
    }

    /// Registers a tween without starting its clock.
    pub fn create(&mut self, tween: Tween) -> TweenId {
        let id = TweenId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.tweens.insert(
            id,
            ScheduledTween {
                tween,
                running: false,
            },
        );
        id
    }

    /// Starts producing values for a created tween. False if unknown or already begun.
    pub fn begin(&mut self, id: TweenId) -> bool {
        match self.tweens.get_mut(&id) {
            Some(scheduled) if !scheduled.running => {
                scheduled.running = true;
                true
            }
            _ => false,
        }
    }

    pub fn start(&mut self, tween: Tween) -> TweenId {
        let id = self.create(tween);
        self.begin(id);
        id
    }

    /// Marks the tween inactive; the next step resolves it as cancelled.
    pub fn cancel(&mut self, id: TweenId) -> bool {
        self.tweens
            .get_mut(&id)
            .is_some_and(|scheduled| scheduled.tween.cancel())
    }

    /// True until the tween's completion has been delivered.
    pub fn is_live(&self, id: TweenId) -> bool {
        self.tweens.contains_key(&id)
    }

    pub fn get(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.get(&id).map(|scheduled| &scheduled.tween)
    }

    pub fn values(&self, id: TweenId) -> Option<Vec<f32>> {
        self.get(id).map(Tween::values)
    }

    pub fn live_count(&self) -> usize {
        self.tweens.len()
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
        self.accumulator = Duration::ZERO;
    }

    /// Feeds real time into the clock and returns how many steps are due.
    pub fn advance_clock(&mut self, frame_dt: Duration) -> u32 {
        self.accumulator = self.accumulator.saturating_add(frame_dt);
        let plan = plan_sim_steps(self.accumulator, self.step, self.max_steps_per_advance);
        self.accumulator = plan.remaining_accumulator;
        if plan.dropped_backlog > Duration::ZERO {
            debug!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                "tween_clock_backlog_dropped"
            );
        }
        plan.ticks_to_run
    }

    /// Runs one fixed step for every running tween.
    pub fn tick<O: TweenObserver + ?Sized>(&mut self, observer: &mut O) -> Vec<TweenCompletion> {
        let dt_seconds = self.step_seconds();
        let ids: Vec<TweenId> = self
            .tweens
            .iter()
            .filter(|(_, scheduled)| scheduled.running)
            .map(|(id, _)| *id)
            .collect();

        let mut completions = Vec::new();
        for id in ids {
            let Some(scheduled) = self.tweens.get_mut(&id) else {
                continue;
            };
            let outcome = match scheduled.tween.step(dt_seconds) {
                TweenStep::Advanced { completed } => {
                    let values = scheduled.tween.values();
                    match observer.on_tween_tick(id, &values) {
                        Ok(TweenControl::Continue) => {}
                        Ok(TweenControl::Cancel) => {
                            scheduled.tween.cancel();
                        }
                        Err(error) => {
                            warn!(tween = id.0, error = %error, "tween_observer_failed");
                        }
                    }
                    completed.then_some(TweenOutcome::Completed)
                }
                TweenStep::Cancelled | TweenStep::Resolved => Some(TweenOutcome::Cancelled),
            };

            if let Some(outcome) = outcome {
                if let Some(finished) = self.tweens.remove(&id) {
                    completions.push(TweenCompletion {
                        id,
                        outcome,
                        values: finished.tween.values(),
                    });
                }
            }
        }
        completions
    }

    /// Advances the clock and runs every due step.
    pub fn advance<O: TweenObserver + ?Sized>(
        &mut self,
        frame_dt: Duration,
        observer: &mut O,
    ) -> Vec<TweenCompletion> {
        let steps = self.advance_clock(frame_dt);
        let mut completions = Vec::new();
        for _ in 0..steps {
            completions.extend(self.tick(observer));
        }
        completions
    }
}
