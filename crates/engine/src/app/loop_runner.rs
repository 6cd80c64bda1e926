use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::metrics::MetricsAccumulator;
use super::simulation::SimulationRuntime;
use super::{LoopCommand, MetricsHandle, Simulation};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    /// Stops the loop after this many simulation ticks.
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 30,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: Some(60),
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames: u64,
    pub stop_reason: StopReason,
}

pub fn run_simulation(config: LoopConfig, simulation: &mut dyn Simulation) -> RunSummary {
    let metrics_handle = MetricsHandle::default();
    run_simulation_with_metrics(config, simulation, metrics_handle)
}

pub fn run_simulation_with_metrics(
    config: LoopConfig,
    simulation: &mut dyn Simulation,
    metrics_handle: MetricsHandle,
) -> RunSummary {
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut driver = FixedStepDriver::new(&config);

    let mut runtime = SimulationRuntime::new(simulation);
    runtime.load();
    info!(entity_count = runtime.entity_count(), "scene_loaded");

    info!(
        target_tps = driver.target_tps,
        max_frame_delta_ms = driver.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = driver.max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        max_ticks = ?config.max_ticks,
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_logged_title: Option<String> = None;

    let stop_reason = loop {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let report = driver.run_frame(raw_frame_dt, &mut runtime);
        let clamped = report.dropped_backlog > Duration::ZERO;
        if clamped {
            warn!(
                dropped_backlog_ms = report.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = driver.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        // Single pacing sleep point for the frame loop.
        let elapsed_since_last_present =
            Instant::now().saturating_duration_since(last_present_instant);
        let cap_sleep = compute_cap_sleep(elapsed_since_last_present, render_frame_target);
        if cap_sleep > Duration::ZERO {
            thread::sleep(cap_sleep);
        }
        last_present_instant = Instant::now();
        metrics_accumulator.record_frame(raw_frame_dt, report.ticks_run, clamped);

        let next_title = runtime.debug_title();
        if next_title != last_logged_title {
            if let Some(title) = &next_title {
                debug!(title = title.as_str(), "debug_title");
            }
            last_logged_title = next_title;
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now, runtime.entity_count()) {
            metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                worst_frame_time_ms = snapshot.worst_frame_time_ms,
                clamped_frames = snapshot.clamped_frames,
                entity_count = snapshot.entity_count,
                "loop_metrics"
            );
        }

        if let Some(reason) = report.stop_reason {
            break reason;
        }
    };

    runtime.shutdown();
    info!(
        ticks = driver.ticks_total,
        frames = driver.frames_total,
        reason = ?stop_reason,
        "shutdown"
    );
    RunSummary {
        ticks: driver.ticks_total,
        frames: driver.frames_total,
        stop_reason,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameReport {
    ticks_run: u32,
    dropped_backlog: Duration,
    stop_reason: Option<StopReason>,
}

/// Splits real frame time into fixed simulation ticks.
#[derive(Debug)]
struct FixedStepDriver {
    target_tps: u32,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    max_ticks: Option<u64>,
    accumulator: Duration,
    ticks_total: u64,
    frames_total: u64,
}

impl FixedStepDriver {
    fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            target_tps,
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            max_ticks: config.max_ticks,
            accumulator: Duration::ZERO,
            ticks_total: 0,
            frames_total: 0,
        }
    }

    fn run_frame(
        &mut self,
        raw_frame_dt: Duration,
        runtime: &mut SimulationRuntime<'_>,
    ) -> FrameReport {
        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);
        self.frames_total = self.frames_total.saturating_add(1);

        let fixed_dt_seconds = self.fixed_dt.as_secs_f32();
        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = step_plan.remaining_accumulator;

        let mut ticks_run = 0u32;
        let mut stop_reason = None;
        for _ in 0..step_plan.ticks_to_run {
            if self.tick_limit_reached() {
                stop_reason = Some(StopReason::TickLimit);
                break;
            }
            let command = runtime.update(fixed_dt_seconds);
            ticks_run = ticks_run.saturating_add(1);
            self.ticks_total = self.ticks_total.saturating_add(1);
            if command == LoopCommand::Stop {
                stop_reason = Some(StopReason::Requested);
                break;
            }
        }
        if stop_reason.is_none() && self.tick_limit_reached() {
            stop_reason = Some(StopReason::TickLimit);
        }

        runtime.frame(clamped_frame_dt);

        FrameReport {
            ticks_run,
            dropped_backlog: step_plan.dropped_backlog,
            stop_reason,
        }
    }

    fn tick_limit_reached(&self) -> bool {
        self.max_ticks
            .is_some_and(|max_ticks| self.ticks_total >= max_ticks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StepPlan {
    pub(crate) ticks_to_run: u32,
    pub(crate) remaining_accumulator: Duration,
    pub(crate) dropped_backlog: Duration,
}

pub(crate) fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}
