mod loop_runner;
mod metrics;
mod simulation;

pub(crate) use loop_runner::plan_sim_steps;
pub use loop_runner::{
    run_simulation, run_simulation_with_metrics, LoopConfig, RunSummary, StopReason,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use simulation::{LoopCommand, Simulation};
