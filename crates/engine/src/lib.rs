pub mod app;
pub mod combat;
mod entity;
pub mod grid;
pub mod movement;
pub mod nav;
pub mod suspend;
pub mod tween;

pub use app::{
    run_simulation, run_simulation_with_metrics, LoopCommand, LoopConfig, LoopMetricsSnapshot,
    MetricsHandle, RunSummary, Simulation, StopReason,
};
pub use combat::{ActionSlot, Combatant, DamageOutcome};
pub use entity::{EntityId, EntityIdAllocator, Vec2};
pub use grid::{
    CellCoord, DungeonGrid, GridError, GridQuery, NoOccupants, Occupancy, TileKind,
    NEIGHBOR_OFFSETS,
};
pub use movement::{
    Facing, FollowOutcome, MoveOutcome, MovementCoordinator, MovementEvent, Mover, MoverStore,
    OpenGate, PathId, StepGate, MOVE_TWEEN_SECONDS,
};
pub use nav::{find_path, search_path, PathSearch, PathStatus, Walkable};
pub use suspend::{ResumeContext, Suspension};
pub use tween::{
    IgnoreTicks, ObserverError, Tween, TweenChannel, TweenCompletion, TweenControl, TweenError,
    TweenId, TweenObserver, TweenOutcome, TweenScheduler, TweenStep, TWEEN_UPDATE_HZ,
};
