use dungeon_engine::LoopConfig;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{ConfigError, GameConfig};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) game: GameConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Dungeon Startup ===");

    let game = GameConfig::from_env()?;
    info!(
        seed = game.seed,
        world_size = game.world_size,
        target_tps = game.target_tps,
        max_ticks = ?game.max_ticks,
        autopilot = game.autopilot,
        "config_resolved"
    );
    Ok(wire(game))
}

fn wire(game: GameConfig) -> AppWiring {
    let loop_config = LoopConfig {
        target_tps: game.target_tps,
        max_ticks: game.max_ticks,
        ..LoopConfig::default()
    };
    AppWiring { loop_config, game }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
