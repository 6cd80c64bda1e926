use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    Continue,
    Stop,
}

/// What the headless loop drives: fixed-rate ticks plus a per-frame hook for clocks
/// that run independently of the tick rate.
pub trait Simulation {
    fn load(&mut self);
    fn update(&mut self, fixed_dt_seconds: f32) -> LoopCommand;
    /// Called once per frame after the frame's ticks, with the clamped frame delta.
    fn frame(&mut self, frame_dt: Duration);
    fn unload(&mut self);
    fn entity_count(&self) -> usize {
        0
    }
    fn debug_title(&self) -> Option<String> {
        None
    }
}

pub(crate) struct SimulationRuntime<'a> {
    simulation: &'a mut dyn Simulation,
    is_loaded: bool,
}

impl<'a> SimulationRuntime<'a> {
    pub(crate) fn new(simulation: &'a mut dyn Simulation) -> Self {
        Self {
            simulation,
            is_loaded: false,
        }
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.simulation.load();
        self.is_loaded = true;
    }

    pub(crate) fn update(&mut self, fixed_dt_seconds: f32) -> LoopCommand {
        if !self.is_loaded {
            return LoopCommand::Stop;
        }
        self.simulation.update(fixed_dt_seconds)
    }

    pub(crate) fn frame(&mut self, frame_dt: Duration) {
        if self.is_loaded {
            self.simulation.frame(frame_dt);
        }
    }

    pub(crate) fn entity_count(&self) -> usize {
        self.simulation.entity_count()
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.simulation.debug_title()
    }

    pub(crate) fn shutdown(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.simulation.unload();
        self.is_loaded = false;
    }
}

impl Drop for SimulationRuntime<'_> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
