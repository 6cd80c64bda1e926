use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use dungeon_engine::{
    find_path, search_path, ActionSlot, CellCoord, Combatant, DamageOutcome, DungeonGrid,
    EntityId, EntityIdAllocator, Facing, FollowOutcome, GridError, GridQuery, LoopCommand,
    MoveOutcome, MovementCoordinator, MovementEvent, Mover, MoverStore, ObserverError, Occupancy,
    PathId, PathStatus, ResumeContext, Simulation, StepGate, Suspension, TileKind, Tween,
    TweenControl, TweenId, TweenScheduler, Vec2,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::config::{GameConfig, WeaponConfig};

const PLAYER_SPAWN: CellCoord = CellCoord::new(1, 1);
const CAMERA_TWEEN_SECONDS: f32 = 0.2;
const FADE_TWEEN_SECONDS: f32 = 0.2;
const DESCENT_PAUSE_SECONDS: f64 = 1.0;
const INTERACTION_DEBOUNCE_SECONDS: f64 = 0.1;
const PICKUP_GUARD_SECONDS: f64 = 1.0;
const KEYBOARD_MOVE_INTERVAL_SECONDS: f64 = 1.0 / 60.0;
const UNARMED_COOLDOWN_SECONDS: f64 = 0.5;
const UNARMED_MIN_DAMAGE: u32 = 1;
const UNARMED_MAX_DAMAGE: u32 = 2;
const MIN_LUNGE_SECONDS: f32 = 1.0 / 60.0;
const CHEST_MIN_LOOT: u32 = 1;
const CHEST_MAX_LOOT: u32 = 4;
const CHEST_LOOT_CAP: u32 = 8;
const MOB_SPAWN_CHANCE: f64 = 0.05;
const SPAWN_CLEARANCE_CELLS: u32 = 8;
const ROOM_COLUMN_SPACING: u32 = 5;
const ROOM_HOLE_CHANCE: f64 = 0.1;
const CHEST_CHANCE_AT_DEPTH_ONE: f64 = 0.015;
const DIRT_A_THRESHOLD: f64 = 0.1;
const DIRT_B_THRESHOLD: f64 = 0.2;
const GAMEPLAY_SYSTEM_ORDER_TEXT: &str = "InputIntent>Interaction>AI>StatusEffects>Descent>Cleanup";

include!("types.rs");
include!("systems.rs");
include!("levelgen.rs");
include!("scene_state.rs");
include!("behavior.rs");
include!("scene_impl.rs");
include!("util.rs");

pub(crate) fn build_simulation(config: GameConfig) -> DungeonSimulation {
    DungeonSimulation::new(config, Box::new(ColumnRooms))
}
