use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn recover_poisoned<T>(operation: &'static str, poisoned: PoisonError<T>) -> T {
    if !POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "loop_metrics_lock_poisoned");
    }
    poisoned.into_inner()
}

/// Rates over one metrics interval of the fixed-step loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_time_ms: f32,
    /// Frames in the interval whose tick backlog was dropped.
    pub clamped_frames: u32,
    pub entity_count: usize,
}

/// Latest published snapshot, readable from outside the loop.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self
            .latest
            .read()
            .unwrap_or_else(|poisoned| recover_poisoned("read", poisoned))
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut latest = self
            .latest
            .write()
            .unwrap_or_else(|poisoned| recover_poisoned("write", poisoned));
        *latest = snapshot;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IntervalCounts {
    frames: u32,
    ticks: u32,
    clamped_frames: u32,
    frame_time_total: Duration,
    worst_frame_time: Duration,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    started_at: Instant,
    counts: IntervalCounts,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            started_at: Instant::now(),
            counts: IntervalCounts::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, ticks_run: u32, clamped: bool) {
        let counts = &mut self.counts;
        counts.frames = counts.frames.saturating_add(1);
        counts.ticks = counts.ticks.saturating_add(ticks_run);
        if clamped {
            counts.clamped_frames = counts.clamped_frames.saturating_add(1);
        }
        counts.frame_time_total = counts.frame_time_total.saturating_add(frame_dt);
        counts.worst_frame_time = counts.worst_frame_time.max(frame_dt);
    }

    /// Closes the interval once it has run its length and starts the next one.
    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        entity_count: usize,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed < self.interval {
            return None;
        }

        let counts = std::mem::take(&mut self.counts);
        self.started_at = now;
        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counts.frames {
            0 => 0.0,
            frames => counts.frame_time_total.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counts.frames as f32 / seconds,
            tps: counts.ticks as f32 / seconds,
            frame_time_ms,
            worst_frame_time_ms: counts.worst_frame_time.as_secs_f32() * 1000.0,
            clamped_frames: counts.clamped_frames,
            entity_count,
        })
    }
}
