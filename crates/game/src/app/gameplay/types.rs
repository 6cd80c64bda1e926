#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ActorKind {
    Player,
    Skeleton,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Regeneration {
    slot: ActionSlot,
    amount: u32,
}

/// A player walk toward a cell it will interact with on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Approach {
    target: CellCoord,
    path: PathId,
}

#[derive(Debug, Clone, PartialEq)]
struct PlayerState {
    strength: u32,
    weapon: Option<WeaponConfig>,
    /// Marked when a chest opens so the same press cannot also grab its loot.
    interaction: ActionSlot,
    pickup: ActionSlot,
    regeneration: Option<Regeneration>,
    target_cell: Option<CellCoord>,
    approach: Option<Approach>,
    backpack: u32,
    backpack_slots: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum SkeletonPhase {
    #[default]
    Idle,
    Walking {
        remaining: VecDeque<CellCoord>,
    },
    Lunging,
    Recovering,
}

#[derive(Debug, Default)]
struct SkeletonBrain {
    phase: SkeletonPhase,
    wait: Option<Suspension<WorldState>>,
}

impl SkeletonBrain {
    fn is_seeking(&self) -> bool {
        self.phase != SkeletonPhase::Idle
    }
}

#[derive(Debug)]
enum Behavior {
    Player(PlayerState),
    Skeleton(SkeletonBrain),
}

#[derive(Debug)]
struct Actor {
    id: EntityId,
    mover: Mover,
    combatant: Combatant,
    attack: ActionSlot,
    behavior: Behavior,
}

impl Actor {
    fn kind(&self) -> ActorKind {
        match self.behavior {
            Behavior::Player(_) => ActorKind::Player,
            Behavior::Skeleton(_) => ActorKind::Skeleton,
        }
    }

    /// Floor cell, plus the cell an in-flight move is heading to.
    fn occupies(&self, cell: CellCoord) -> bool {
        self.mover.cell() == cell || self.mover.move_target() == Some(cell)
    }

    fn player_state(&self) -> Option<&PlayerState> {
        match &self.behavior {
            Behavior::Player(state) => Some(state),
            Behavior::Skeleton(_) => None,
        }
    }

    fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.behavior {
            Behavior::Player(state) => Some(state),
            Behavior::Skeleton(_) => None,
        }
    }

    fn skeleton_brain(&self) -> Option<&SkeletonBrain> {
        match &self.behavior {
            Behavior::Skeleton(brain) => Some(brain),
            Behavior::Player(_) => None,
        }
    }

    fn skeleton_brain_mut(&mut self) -> Option<&mut SkeletonBrain> {
        match &mut self.behavior {
            Behavior::Skeleton(brain) => Some(brain),
            Behavior::Player(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct ActorTable {
    actors: BTreeMap<EntityId, Actor>,
}

impl ActorTable {
    fn insert(&mut self, actor: Actor) {
        self.actors.insert(actor.id, actor);
    }

    fn remove(&mut self, id: EntityId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    fn get(&self, id: EntityId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    fn get_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    fn len(&self) -> usize {
        self.actors.len()
    }

    fn ids_of_kind(&self, kind: ActorKind) -> Vec<EntityId> {
        self.iter()
            .filter(|actor| actor.kind() == kind)
            .map(|actor| actor.id)
            .collect()
    }

    fn living_count(&self, kind: ActorKind) -> usize {
        self.iter()
            .filter(|actor| actor.kind() == kind && actor.combatant.is_alive())
            .count()
    }
}

impl MoverStore for ActorTable {
    fn mover(&self, entity: EntityId) -> Option<&Mover> {
        self.actors.get(&entity).map(|actor| &actor.mover)
    }

    fn mover_mut(&mut self, entity: EntityId) -> Option<&mut Mover> {
        self.actors.get_mut(&entity).map(|actor| &mut actor.mover)
    }
}

/// Living actors and loot markers as seen by one actor (`ignore` is never reported).
struct Occupants<'a> {
    actors: &'a ActorTable,
    loot: &'a BTreeMap<CellCoord, u32>,
    ignore: Option<EntityId>,
}

impl Occupancy for Occupants<'_> {
    fn entity_at(&self, cell: CellCoord) -> Option<EntityId> {
        self.actors
            .iter()
            .find(|actor| {
                Some(actor.id) != self.ignore
                    && actor.combatant.is_alive()
                    && actor.occupies(cell)
            })
            .map(|actor| actor.id)
    }

    fn has_items_at(&self, cell: CellCoord) -> bool {
        self.loot.get(&cell).is_some_and(|count| *count > 0)
    }
}

/// Path steps only enter cells that are passable at the moment the step starts.
struct PassableStep<'a> {
    grid: Option<&'a DungeonGrid>,
    loot: &'a BTreeMap<CellCoord, u32>,
}

impl StepGate<ActorTable> for PassableStep<'_> {
    fn allows_step(&self, store: &ActorTable, entity: EntityId, cell: CellCoord) -> bool {
        let occupants = Occupants {
            actors: store,
            loot: self.loot,
            ignore: Some(entity),
        };
        GridQuery::new(self.grid, &occupants).is_passable(cell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameplayEvent {
    AttackLanded {
        attacker: EntityId,
        target: EntityId,
        dealt: u32,
    },
    EntityDied {
        entity: EntityId,
    },
    ChestOpened {
        cell: CellCoord,
        loot: u32,
    },
    LootCollected {
        cell: CellCoord,
    },
    Descended {
        depth: u32,
    },
    FollowFinished {
        entity: EntityId,
        outcome: FollowOutcome,
    },
    MovePreempted {
        entity: EntityId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameplayEventKind {
    AttackLanded,
    EntityDied,
    ChestOpened,
    LootCollected,
    Descended,
    FollowFinished,
    MovePreempted,
}

impl GameplayEvent {
    fn kind(self) -> GameplayEventKind {
        match self {
            Self::AttackLanded { .. } => GameplayEventKind::AttackLanded,
            Self::EntityDied { .. } => GameplayEventKind::EntityDied,
            Self::ChestOpened { .. } => GameplayEventKind::ChestOpened,
            Self::LootCollected { .. } => GameplayEventKind::LootCollected,
            Self::Descended { .. } => GameplayEventKind::Descended,
            Self::FollowFinished { .. } => GameplayEventKind::FollowFinished,
            Self::MovePreempted { .. } => GameplayEventKind::MovePreempted,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GameplayEventCounts {
    total: u32,
    attack_landed: u32,
    entity_died: u32,
    chest_opened: u32,
    loot_collected: u32,
    descended: u32,
    follow_finished: u32,
    move_preempted: u32,
}

impl GameplayEventCounts {
    fn record(&mut self, kind: GameplayEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            GameplayEventKind::AttackLanded => {
                self.attack_landed = self.attack_landed.saturating_add(1)
            }
            GameplayEventKind::EntityDied => self.entity_died = self.entity_died.saturating_add(1),
            GameplayEventKind::ChestOpened => {
                self.chest_opened = self.chest_opened.saturating_add(1)
            }
            GameplayEventKind::LootCollected => {
                self.loot_collected = self.loot_collected.saturating_add(1)
            }
            GameplayEventKind::Descended => self.descended = self.descended.saturating_add(1),
            GameplayEventKind::FollowFinished => {
                self.follow_finished = self.follow_finished.saturating_add(1)
            }
            GameplayEventKind::MovePreempted => {
                self.move_preempted = self.move_preempted.saturating_add(1)
            }
        }
    }
}

/// Events land here from ticks and from the frame clock between ticks; the next
/// rollover counts both.
#[derive(Default)]
struct GameplayEventBus {
    current_tick_events: Vec<GameplayEvent>,
    last_tick_counts: GameplayEventCounts,
}

impl GameplayEventBus {
    fn emit(&mut self, event: GameplayEvent) {
        self.current_tick_events.push(event);
    }

    fn iter_emitted_so_far(&self) -> impl Iterator<Item = &GameplayEvent> {
        self.current_tick_events.iter()
    }

    fn finish_tick_rollover(&mut self) {
        let mut counts = GameplayEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.current_tick_events.clear();
    }

    fn last_tick_counts(&self) -> GameplayEventCounts {
        self.last_tick_counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameplayIntent {
    /// One keyboard step; each component is clamped to -1..=1.
    Step { dx: i32, dy: i32 },
    InteractCell { cell: CellCoord },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameplayIntentKind {
    Step,
    InteractCell,
}

impl GameplayIntent {
    fn kind(self) -> GameplayIntentKind {
        match self {
            Self::Step { .. } => GameplayIntentKind::Step,
            Self::InteractCell { .. } => GameplayIntentKind::InteractCell,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GameplayIntentApplyStats {
    total: u32,
    step: u32,
    interact_cell: u32,
    ignored: u32,
}

impl GameplayIntentApplyStats {
    fn record_intent(&mut self, kind: GameplayIntentKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            GameplayIntentKind::Step => self.step = self.step.saturating_add(1),
            GameplayIntentKind::InteractCell => {
                self.interact_cell = self.interact_cell.saturating_add(1)
            }
        }
    }

    fn record_ignored(&mut self) {
        self.ignored = self.ignored.saturating_add(1);
    }
}

#[derive(Default)]
struct GameplayIntentQueue {
    intents: Vec<GameplayIntent>,
    last_tick_apply_stats: GameplayIntentApplyStats,
}

impl GameplayIntentQueue {
    fn enqueue(&mut self, intent: GameplayIntent) {
        self.intents.push(intent);
    }

    fn drain_current_tick(&mut self) -> Vec<GameplayIntent> {
        std::mem::take(&mut self.intents)
    }

    fn set_last_tick_apply_stats(&mut self, stats: GameplayIntentApplyStats) {
        self.last_tick_apply_stats = stats;
    }

    fn last_tick_apply_stats(&self) -> GameplayIntentApplyStats {
        self.last_tick_apply_stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HaltReason {
    PlayerDied,
    LevelGenerationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescentStage {
    FadingOut,
    AwaitingPlayer,
    Pausing,
    FadingIn,
}

#[derive(Debug)]
struct DescentTask {
    stage: DescentStage,
    wait: Option<Suspension<WorldState>>,
}

#[derive(Debug, Clone, Serialize)]
struct ActorSnapshot {
    id: EntityId,
    kind: ActorKind,
    position: Vec2,
    cell: CellCoord,
    moving: bool,
    facing: Facing,
    health: u32,
    max_health: u32,
    path: Vec<CellCoord>,
}

#[derive(Debug, Clone, Serialize)]
struct LootSnapshot {
    cell: CellCoord,
    count: u32,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Serialize)]
struct WorldSnapshot {
    depth: u32,
    descending: bool,
    camera: Vec2,
    fade_alpha: f32,
    attack_readiness: f32,
    backpack: u32,
    actors: Vec<ActorSnapshot>,
    loot: Vec<LootSnapshot>,
}
