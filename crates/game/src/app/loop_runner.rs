use std::process::ExitCode;

use dungeon_engine::run_simulation;
use tracing::info;

use super::bootstrap::AppWiring;
use super::gameplay;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut simulation = gameplay::build_simulation(app.game);
    let summary = run_simulation(app.loop_config, &mut simulation);
    info!(
        ticks = summary.ticks,
        frames = summary.frames,
        stop_reason = ?summary.stop_reason,
        depth = simulation.depth(),
        "run_finished"
    );

    ExitCode::SUCCESS
}
