use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::grid::CellCoord;
use crate::tween::{
    ObserverError, Tween, TweenCompletion, TweenControl, TweenId, TweenObserver, TweenOutcome,
    TweenScheduler,
};
use crate::{EntityId, Vec2};

pub const MOVE_TWEEN_SECONDS: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PathId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    /// Horizontal delta decides facing; zero keeps the current one.
    pub fn toward(self, delta_x: f32) -> Self {
        if delta_x < 0.0 {
            Self::Left
        } else if delta_x > 0.0 {
            Self::Right
        } else {
            self
        }
    }
}

/// Movable capability shared by every actor kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Mover {
    pub position: Vec2,
    pub facing: Facing,
    moving: bool,
    move_target: Option<CellCoord>,
    locomotion: Option<TweenId>,
    gesture: Option<TweenId>,
    rest_cell: CellCoord,
    current_path: Option<PathId>,
    path_cells: Vec<CellCoord>,
    last_move_seconds: Option<f64>,
}

impl Mover {
    pub fn at_cell(cell: CellCoord) -> Self {
        Self {
            position: cell.to_vec2(),
            facing: Facing::default(),
            moving: false,
            move_target: None,
            locomotion: None,
            gesture: None,
            rest_cell: cell,
            current_path: None,
            path_cells: Vec::new(),
            last_move_seconds: None,
        }
    }

    /// Logical cell. A lunge in progress does not leave the cell it started from.
    pub fn cell(&self) -> CellCoord {
        if self.gesture.is_some() && !self.moving {
            self.rest_cell
        } else {
            CellCoord::from_position(self.position)
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Cell the in-flight move will land on.
    pub fn move_target(&self) -> Option<CellCoord> {
        self.move_target
    }

    pub fn locomotion_tween(&self) -> Option<TweenId> {
        self.locomotion
    }

    pub fn gesture_tween(&self) -> Option<TweenId> {
        self.gesture
    }

    pub fn current_path(&self) -> Option<PathId> {
        self.current_path
    }

    /// Cells still ahead on the followed path, for a debug overlay.
    pub fn path_cells(&self) -> &[CellCoord] {
        &self.path_cells
    }

    pub fn last_move_seconds(&self) -> Option<f64> {
        self.last_move_seconds
    }

    pub fn face_toward(&mut self, cell: CellCoord) {
        self.facing = self.facing.toward(cell.x as f32 - self.position.x);
    }
}

/// Lookup from entity ids to their movers.
pub trait MoverStore {
    fn mover(&self, entity: EntityId) -> Option<&Mover>;
    fn mover_mut(&mut self, entity: EntityId) -> Option<&mut Mover>;
}

impl MoverStore for BTreeMap<EntityId, Mover> {
    fn mover(&self, entity: EntityId) -> Option<&Mover> {
        self.get(&entity)
    }

    fn mover_mut(&mut self, entity: EntityId) -> Option<&mut Mover> {
        self.get_mut(&entity)
    }
}

/// Lazy per-step check consulted before each path step is animated.
pub trait StepGate<S: ?Sized> {
    fn allows_step(&self, store: &S, entity: EntityId, cell: CellCoord) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl<S: ?Sized> StepGate<S> for OpenGate {
    fn allows_step(&self, _store: &S, _entity: EntityId, _cell: CellCoord) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Started {
        tween: TweenId,
        preempted: Option<TweenId>,
    },
    Teleported,
    UnknownEntity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    Completed,
    /// The entity's current path changed, or the entity is gone.
    Interrupted,
    /// The next step failed the step gate.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementEvent {
    MovePreempted {
        entity: EntityId,
        tween: TweenId,
    },
    MoveSettled {
        entity: EntityId,
        cell: CellCoord,
        outcome: TweenOutcome,
    },
    LungeReached {
        entity: EntityId,
    },
    LungeFinished {
        entity: EntityId,
    },
    FollowFinished {
        entity: EntityId,
        path: PathId,
        outcome: FollowOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GesturePhase {
    Outbound,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TweenBinding {
    Locomotion {
        entity: EntityId,
        target: CellCoord,
    },
    Gesture {
        entity: EntityId,
        phase: GesturePhase,
        origin: CellCoord,
        seconds: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct PathFollower {
    entity: EntityId,
    remaining: VecDeque<CellCoord>,
    waiting_on: Option<TweenId>,
}

/// Owns every locomotion and gesture tween and the path followers driving them.
///
/// Position writes follow a single-writer rule: a locomotion tick writes only while the
/// entity is still moving under that same tween, and a gesture tick writes only while
/// the entity is not moving at all.
#[derive(Debug)]
pub struct MovementCoordinator {
    tweens: TweenScheduler,
    move_seconds: f32,
    bindings: BTreeMap<TweenId, TweenBinding>,
    followers: BTreeMap<PathId, PathFollower>,
    finished_follows: BTreeMap<PathId, (EntityId, FollowOutcome)>,
    pending_events: Vec<MovementEvent>,
    next_path_id: u64,
}

impl Default for MovementCoordinator {
    fn default() -> Self {
        Self::new(TweenScheduler::default(), MOVE_TWEEN_SECONDS)
    }
}

impl MovementCoordinator {
    pub fn new(tweens: TweenScheduler, move_seconds: f32) -> Self {
        Self {
            tweens,
            move_seconds,
            bindings: BTreeMap::new(),
            followers: BTreeMap::new(),
            finished_follows: BTreeMap::new(),
            pending_events: Vec::new(),
            next_path_id: 0,
        }
    }

    pub fn move_seconds(&self) -> f32 {
        self.move_seconds
    }

    pub fn is_tween_live(&self, id: TweenId) -> bool {
        self.tweens.is_live(id)
    }

    pub fn is_following(&self, path: PathId) -> bool {
        self.followers.contains_key(&path)
    }

    pub fn follow_outcome(&self, path: PathId) -> Option<FollowOutcome> {
        self.finished_follows.get(&path).map(|(_, outcome)| *outcome)
    }

    pub fn take_follow_outcome(&mut self, path: PathId) -> Option<FollowOutcome> {
        self.finished_follows.remove(&path).map(|(_, outcome)| outcome)
    }

    /// Outcomes recorded and not yet taken. At most one per entity.
    pub fn finished_follow_count(&self) -> usize {
        self.finished_follows.len()
    }

    pub fn live_tween_count(&self) -> usize {
        self.tweens.live_count()
    }

    /// Moves an entity to a cell. A direct move replaces whatever path the entity was
    /// following.
    pub fn move_to<S: MoverStore + ?Sized>(
        &mut self,
        store: &mut S,
        entity: EntityId,
        cell: CellCoord,
        animated: bool,
        now_seconds: f64,
    ) -> MoveOutcome {
        let Some(mover) = store.mover_mut(entity) else {
            return MoveOutcome::UnknownEntity;
        };
        mover.current_path = None;
        mover.path_cells.clear();
        self.start_locomotion(store, entity, cell, animated, now_seconds)
    }

    /// Walks `cells` one animated step at a time. Each step waits for the previous one
    /// to settle and re-checks `gate` first.
    pub fn follow_path<S, G>(
        &mut self,
        store: &mut S,
        gate: &G,
        entity: EntityId,
        cells: Vec<CellCoord>,
        now_seconds: f64,
    ) -> Option<PathId>
    where
        S: MoverStore + ?Sized,
        G: StepGate<S> + ?Sized,
    {
        let mover = store.mover_mut(entity)?;
        let path = PathId(self.next_path_id);
        self.next_path_id = self.next_path_id.saturating_add(1);
        mover.current_path = Some(path);
        mover.path_cells = cells.clone();
        self.finished_follows.retain(|_, (owner, _)| *owner != entity);

        self.followers.insert(
            path,
            PathFollower {
                entity,
                remaining: cells.into(),
                waiting_on: None,
            },
        );
        let mut events = std::mem::take(&mut self.pending_events);
        self.advance_follower(path, store, gate, now_seconds, &mut events);
        events.append(&mut self.pending_events);
        self.pending_events = events;
        Some(path)
    }

    /// Plays a two-part lunge: halfway toward `toward`, then back to the rest cell.
    /// Returns the outbound tween, or `None` while the entity is moving.
    pub fn lunge<S: MoverStore + ?Sized>(
        &mut self,
        store: &mut S,
        entity: EntityId,
        toward: CellCoord,
        seconds: f32,
    ) -> Option<TweenId> {
        let mover = store.mover_mut(entity)?;
        if mover.moving {
            return None;
        }
        let origin = mover.cell();
        if let Some(previous) = mover.gesture.take() {
            self.tweens.cancel(previous);
        }
        mover.rest_cell = origin;

        let goal_x = origin.x as f32 + (toward.x - origin.x) as f32 / 2.0;
        let goal_y = origin.y as f32 + (toward.y - origin.y) as f32 / 2.0;
        let id = self.tweens.start(Tween::new(
            seconds,
            &[(mover.position.x, goal_x), (mover.position.y, goal_y)],
        ));
        mover.gesture = Some(id);
        self.bindings.insert(
            id,
            TweenBinding::Gesture {
                entity,
                phase: GesturePhase::Outbound,
                origin,
                seconds,
            },
        );
        Some(id)
    }

    /// Drops every tween and follower owned by an entity that is leaving the world.
    pub fn release_entity<S: MoverStore + ?Sized>(&mut self, store: &mut S, entity: EntityId) {
        if let Some(mover) = store.mover_mut(entity) {
            if let Some(id) = mover.locomotion.take() {
                self.tweens.cancel(id);
            }
            if let Some(id) = mover.gesture.take() {
                self.tweens.cancel(id);
            }
            mover.moving = false;
            mover.move_target = None;
            mover.current_path = None;
            mover.path_cells.clear();
        }
        self.followers.retain(|_, follower| follower.entity != entity);
        self.finished_follows.retain(|_, (owner, _)| *owner != entity);
    }

    pub fn advance<S, G>(
        &mut self,
        frame_dt: Duration,
        store: &mut S,
        gate: &G,
        now_seconds: f64,
    ) -> Vec<MovementEvent>
    where
        S: MoverStore + ?Sized,
        G: StepGate<S> + ?Sized,
    {
        let steps = self.tweens.advance_clock(frame_dt);
        let mut events = std::mem::take(&mut self.pending_events);
        for _ in 0..steps {
            self.step(store, gate, now_seconds, &mut events);
        }
        events
    }

    /// Runs exactly one tween step, settling whatever completes in it.
    pub fn step<S, G>(
        &mut self,
        store: &mut S,
        gate: &G,
        now_seconds: f64,
        events: &mut Vec<MovementEvent>,
    ) where
        S: MoverStore + ?Sized,
        G: StepGate<S> + ?Sized,
    {
        events.append(&mut self.pending_events);
        let completions = {
            let mut writer = PositionWriter {
                store: &mut *store,
                bindings: &self.bindings,
            };
            self.tweens.tick(&mut writer)
        };
        for completion in completions {
            self.settle(completion, store, gate, now_seconds, events);
        }
    }

    fn start_locomotion<S: MoverStore + ?Sized>(
        &mut self,
        store: &mut S,
        entity: EntityId,
        cell: CellCoord,
        animated: bool,
        now_seconds: f64,
    ) -> MoveOutcome {
        let Some(mover) = store.mover_mut(entity) else {
            return MoveOutcome::UnknownEntity;
        };
        mover.last_move_seconds = Some(now_seconds);

        let preempted = mover.locomotion.take();
        if let Some(previous) = preempted {
            self.tweens.cancel(previous);
            debug!(entity = entity.0, tween = previous.0, "move_preempted");
        }
        // The gesture binding stays until its cancellation settles. Moves start from
        // the rest cell.
        if let Some(gesture) = mover.gesture {
            if self.tweens.cancel(gesture) {
                mover.position = mover.rest_cell.to_vec2();
            }
        }

        let target = cell.to_vec2();
        if !animated {
            mover.moving = false;
            mover.move_target = None;
            mover.position = target;
            mover.rest_cell = cell;
            return MoveOutcome::Teleported;
        }

        mover.facing = mover.facing.toward(target.x - mover.position.x);
        let id = self.tweens.start(Tween::new(
            self.move_seconds,
            &[
                (mover.position.x, target.x),
                (mover.position.y, target.y),
            ],
        ));
        mover.locomotion = Some(id);
        mover.moving = true;
        mover.move_target = Some(cell);
        self.bindings.insert(
            id,
            TweenBinding::Locomotion {
                entity,
                target: cell,
            },
        );
        MoveOutcome::Started {
            tween: id,
            preempted,
        }
    }

    fn settle<S, G>(
        &mut self,
        completion: TweenCompletion,
        store: &mut S,
        gate: &G,
        now_seconds: f64,
        events: &mut Vec<MovementEvent>,
    ) where
        S: MoverStore + ?Sized,
        G: StepGate<S> + ?Sized,
    {
        let Some(binding) = self.bindings.remove(&completion.id) else {
            return;
        };
        match binding {
            TweenBinding::Locomotion { entity, target } => {
                if let Some(mover) = store.mover_mut(entity) {
                    if mover.locomotion == Some(completion.id) {
                        mover.locomotion = None;
                        mover.moving = false;
                        mover.move_target = None;
                        mover.position = target.to_vec2();
                        mover.rest_cell = target;
                        events.push(MovementEvent::MoveSettled {
                            entity,
                            cell: target,
                            outcome: completion.outcome,
                        });
                    } else {
                        events.push(MovementEvent::MovePreempted {
                            entity,
                            tween: completion.id,
                        });
                    }
                }

                let waiting = self
                    .followers
                    .iter()
                    .find(|(_, follower)| follower.waiting_on == Some(completion.id))
                    .map(|(path, _)| *path);
                if let Some(path) = waiting {
                    self.advance_follower(path, store, gate, now_seconds, events);
                }
            }
            TweenBinding::Gesture {
                entity,
                phase,
                origin,
                seconds,
            } => {
                let Some(mover) = store.mover_mut(entity) else {
                    return;
                };
                if mover.gesture != Some(completion.id) {
                    return;
                }
                mover.gesture = None;

                let returning = phase == GesturePhase::Outbound
                    && completion.outcome == TweenOutcome::Completed
                    && !mover.moving;
                if !returning {
                    if !mover.moving {
                        mover.position = mover.rest_cell.to_vec2();
                    }
                    events.push(MovementEvent::LungeFinished { entity });
                    return;
                }

                let home = origin.to_vec2();
                let id = self.tweens.start(Tween::new(
                    seconds,
                    &[(mover.position.x, home.x), (mover.position.y, home.y)],
                ));
                mover.gesture = Some(id);
                self.bindings.insert(
                    id,
                    TweenBinding::Gesture {
                        entity,
                        phase: GesturePhase::Return,
                        origin,
                        seconds,
                    },
                );
                events.push(MovementEvent::LungeReached { entity });
            }
        }
    }

    fn advance_follower<S, G>(
        &mut self,
        path: PathId,
        store: &mut S,
        gate: &G,
        now_seconds: f64,
        events: &mut Vec<MovementEvent>,
    ) where
        S: MoverStore + ?Sized,
        G: StepGate<S> + ?Sized,
    {
        let Some(follower) = self.followers.get_mut(&path) else {
            return;
        };
        let entity = follower.entity;
        follower.waiting_on = None;

        let owns_path = store
            .mover(entity)
            .is_some_and(|mover| mover.current_path == Some(path));
        let outcome = if !owns_path {
            Some(FollowOutcome::Interrupted)
        } else {
            match follower.remaining.front().copied() {
                None => Some(FollowOutcome::Completed),
                Some(next) if !gate.allows_step(store, entity, next) => {
                    Some(FollowOutcome::Blocked)
                }
                Some(_) => None,
            }
        };

        if let Some(outcome) = outcome {
            self.finish_follow(path, entity, outcome, store, events);
            return;
        }

        let Some(next) = follower.remaining.pop_front() else {
            return;
        };
        if let Some(mover) = store.mover_mut(entity) {
            if !mover.path_cells.is_empty() {
                mover.path_cells.remove(0);
            }
        }
        if let MoveOutcome::Started { tween, .. } =
            self.start_locomotion(store, entity, next, true, now_seconds)
        {
            if let Some(follower) = self.followers.get_mut(&path) {
                follower.waiting_on = Some(tween);
            }
        }
    }

    fn finish_follow<S: MoverStore + ?Sized>(
        &mut self,
        path: PathId,
        entity: EntityId,
        outcome: FollowOutcome,
        store: &mut S,
        events: &mut Vec<MovementEvent>,
    ) {
        self.followers.remove(&path);
        if let Some(mover) = store.mover_mut(entity) {
            if mover.current_path == Some(path) {
                mover.current_path = None;
                mover.path_cells.clear();
            }
        }
        if outcome != FollowOutcome::Completed {
            debug!(entity = entity.0, path = path.0, outcome = ?outcome, "path_interrupted");
        }
        let superseded = store.mover(entity).is_some_and(|mover| {
            mover.current_path.is_some_and(|current| current != path)
        });
        if !superseded {
            self.finished_follows.retain(|_, (owner, _)| *owner != entity);
            self.finished_follows.insert(path, (entity, outcome));
        }
        events.push(MovementEvent::FollowFinished {
            entity,
            path,
            outcome,
        });
    }
}

struct PositionWriter<'a, S: ?Sized> {
    store: &'a mut S,
    bindings: &'a BTreeMap<TweenId, TweenBinding>,
}

impl<S: MoverStore + ?Sized> TweenObserver for PositionWriter<'_, S> {
    fn on_tween_tick(&mut self, id: TweenId, values: &[f32]) -> Result<TweenControl, ObserverError> {
        let Some(binding) = self.bindings.get(&id) else {
            return Ok(TweenControl::Continue);
        };
        let &[x, y] = values else {
            return Err(ObserverError::new(format!(
                "position tween {} has {} channels",
                id.0,
                values.len()
            )));
        };

        match *binding {
            TweenBinding::Locomotion { entity, .. } => {
                let Some(mover) = self.store.mover_mut(entity) else {
                    return Ok(TweenControl::Cancel);
                };
                if mover.moving && mover.locomotion == Some(id) {
                    mover.position = Vec2 { x, y };
                }
                Ok(TweenControl::Continue)
            }
            TweenBinding::Gesture { entity, .. } => {
                let Some(mover) = self.store.mover_mut(entity) else {
                    return Ok(TweenControl::Cancel);
                };
                if mover.moving || mover.gesture != Some(id) {
                    return Ok(TweenControl::Cancel);
                }
                mover.position = Vec2 { x, y };
                Ok(TweenControl::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 0.0;

    fn store_with(entity: EntityId, cell: CellCoord) -> BTreeMap<EntityId, Mover> {
        BTreeMap::from([(entity, Mover::at_cell(cell))])
    }

    fn run_until_idle(
        coordinator: &mut MovementCoordinator,
        store: &mut BTreeMap<EntityId, Mover>,
        gate: &dyn StepGate<BTreeMap<EntityId, Mover>>,
    ) -> Vec<MovementEvent> {
        let mut events = Vec::new();
        for _ in 0..500 {
            coordinator.step(store, gate, NOW, &mut events);
            if coordinator.live_tween_count() == 0 {
                break;
            }
        }
        events
    }

    fn position_of(store: &BTreeMap<EntityId, Mover>, entity: EntityId) -> Vec2 {
        store.mover(entity).expect("mover").position
    }

    struct BlockCell(CellCoord);

    impl<S: ?Sized> StepGate<S> for BlockCell {
        fn allows_step(&self, _store: &S, _entity: EntityId, cell: CellCoord) -> bool {
            cell != self.0
        }
    }

    #[test]
    fn animated_move_interpolates_and_lands_on_integer_cell() {
        let entity = EntityId(1);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();

        let outcome = coordinator.move_to(&mut store, entity, CellCoord::new(2, 1), true, NOW);
        assert!(matches!(outcome, MoveOutcome::Started { preempted: None, .. }));
        assert!(store.mover(entity).expect("mover").is_moving());
        assert_eq!(
            store.mover(entity).expect("mover").move_target(),
            Some(CellCoord::new(2, 1))
        );

        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);
        let midway = position_of(&store, entity);
        assert!(midway.x > 1.0 && midway.x < 2.0);

        events.extend(run_until_idle(&mut coordinator, &mut store, &OpenGate));
        let mover = store.mover(entity).expect("mover");
        assert_eq!(mover.position, Vec2::new(2.0, 1.0));
        assert!(!mover.is_moving());
        assert!(mover.move_target().is_none());
        assert!(events.contains(&MovementEvent::MoveSettled {
            entity,
            cell: CellCoord::new(2, 1),
            outcome: TweenOutcome::Completed,
        }));
    }

    #[test]
    fn second_move_preempts_first_and_wins() {
        let entity = EntityId(1);
        let mut store = store_with(entity, CellCoord::new(3, 3));
        let mut coordinator = MovementCoordinator::default();

        let first = coordinator.move_to(&mut store, entity, CellCoord::new(4, 3), true, NOW);
        let MoveOutcome::Started { tween: first_tween, .. } = first else {
            panic!("first move should start");
        };
        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);

        let second = coordinator.move_to(&mut store, entity, CellCoord::new(3, 4), true, NOW);
        assert!(matches!(
            second,
            MoveOutcome::Started { preempted: Some(id), .. } if id == first_tween
        ));

        let mut xs = Vec::new();
        for _ in 0..40 {
            coordinator.step(&mut store, &OpenGate, NOW, &mut events);
            xs.push(position_of(&store, entity).x);
        }
        assert!(xs.windows(2).all(|pair| pair[1] <= pair[0]));
        assert_eq!(position_of(&store, entity), Vec2::new(3.0, 4.0));
        assert!(!store.mover(entity).expect("mover").is_moving());
        assert!(events.contains(&MovementEvent::MovePreempted {
            entity,
            tween: first_tween
        }));
        let settled = events
            .iter()
            .filter(|event| matches!(event, MovementEvent::MoveSettled { .. }))
            .count();
        assert_eq!(settled, 1);
    }

    #[test]
    fn teleport_settles_in_flight_move() {
        let entity = EntityId(7);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();
        coordinator.move_to(&mut store, entity, CellCoord::new(2, 2), true, NOW);
        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);

        let outcome = coordinator.move_to(&mut store, entity, CellCoord::new(9, 9), false, NOW);
        assert_eq!(outcome, MoveOutcome::Teleported);
        assert_eq!(position_of(&store, entity), Vec2::new(9.0, 9.0));
        assert!(!store.mover(entity).expect("mover").is_moving());

        run_until_idle(&mut coordinator, &mut store, &OpenGate);
        assert_eq!(position_of(&store, entity), Vec2::new(9.0, 9.0));
    }

    #[test]
    fn unknown_entity_is_reported() {
        let mut store: BTreeMap<EntityId, Mover> = BTreeMap::new();
        let mut coordinator = MovementCoordinator::default();
        let outcome = coordinator.move_to(&mut store, EntityId(3), CellCoord::new(1, 1), true, NOW);
        assert_eq!(outcome, MoveOutcome::UnknownEntity);
        assert_eq!(coordinator.live_tween_count(), 0);
    }

    #[test]
    fn facing_follows_horizontal_delta() {
        let entity = EntityId(1);
        let mut store = store_with(entity, CellCoord::new(5, 5));
        let mut coordinator = MovementCoordinator::default();

        coordinator.move_to(&mut store, entity, CellCoord::new(4, 5), false, NOW);
        assert_eq!(store.mover(entity).expect("mover").facing, Facing::Right);

        coordinator.move_to(&mut store, entity, CellCoord::new(3, 6), true, NOW);
        assert_eq!(store.mover(entity).expect("mover").facing, Facing::Left);

        run_until_idle(&mut coordinator, &mut store, &OpenGate);
        coordinator.move_to(&mut store, entity, CellCoord::new(3, 7), true, NOW);
        assert_eq!(store.mover(entity).expect("mover").facing, Facing::Left);
    }

    #[test]
    fn follow_path_walks_every_cell_in_order() {
        let entity = EntityId(2);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();
        let cells = vec![
            CellCoord::new(2, 1),
            CellCoord::new(3, 2),
            CellCoord::new(4, 2),
        ];

        let path = coordinator
            .follow_path(&mut store, &OpenGate, entity, cells, NOW)
            .expect("path id");
        assert_eq!(store.mover(entity).expect("mover").path_cells().len(), 2);
        assert!(coordinator.is_following(path));

        let events = run_until_idle(&mut coordinator, &mut store, &OpenGate);
        let settled: Vec<CellCoord> = events
            .iter()
            .filter_map(|event| match event {
                MovementEvent::MoveSettled { cell, .. } => Some(*cell),
                _ => None,
            })
            .collect();
        assert_eq!(
            settled,
            vec![
                CellCoord::new(2, 1),
                CellCoord::new(3, 2),
                CellCoord::new(4, 2)
            ]
        );
        assert_eq!(position_of(&store, entity), Vec2::new(4.0, 2.0));
        assert!(!coordinator.is_following(path));
        assert_eq!(
            coordinator.take_follow_outcome(path),
            Some(FollowOutcome::Completed)
        );
        let mover = store.mover(entity).expect("mover");
        assert!(mover.current_path().is_none());
        assert!(mover.path_cells().is_empty());
    }

    #[test]
    fn replaced_path_interrupts_previous_follower() {
        let entity = EntityId(2);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();

        let first = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(2, 1), CellCoord::new(3, 1)],
                NOW,
            )
            .expect("first path");
        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);

        let second = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(1, 2), CellCoord::new(1, 3)],
                NOW,
            )
            .expect("second path");
        events.extend(run_until_idle(&mut coordinator, &mut store, &OpenGate));

        assert!(events.contains(&MovementEvent::FollowFinished {
            entity,
            path: first,
            outcome: FollowOutcome::Interrupted,
        }));
        assert!(events.contains(&MovementEvent::FollowFinished {
            entity,
            path: second,
            outcome: FollowOutcome::Completed,
        }));
        assert_eq!(position_of(&store, entity), Vec2::new(1.0, 3.0));
    }

    #[test]
    fn direct_move_interrupts_follower() {
        let entity = EntityId(2);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();
        let path = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(2, 1), CellCoord::new(3, 1), CellCoord::new(4, 1)],
                NOW,
            )
            .expect("path");

        coordinator.move_to(&mut store, entity, CellCoord::new(1, 2), true, NOW);
        run_until_idle(&mut coordinator, &mut store, &OpenGate);

        assert_eq!(
            coordinator.follow_outcome(path),
            Some(FollowOutcome::Interrupted)
        );
        assert_eq!(position_of(&store, entity), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn gate_stops_follower_before_blocked_step() {
        let entity = EntityId(4);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();
        let gate = BlockCell(CellCoord::new(3, 1));

        let path = coordinator
            .follow_path(
                &mut store,
                &gate,
                entity,
                vec![CellCoord::new(2, 1), CellCoord::new(3, 1), CellCoord::new(4, 1)],
                NOW,
            )
            .expect("path");
        run_until_idle(&mut coordinator, &mut store, &gate);

        assert_eq!(coordinator.follow_outcome(path), Some(FollowOutcome::Blocked));
        assert_eq!(position_of(&store, entity), Vec2::new(2.0, 1.0));
        assert!(!store.mover(entity).expect("mover").is_moving());
    }

    #[test]
    fn empty_path_finishes_on_next_advance() {
        let entity = EntityId(4);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();
        let path = coordinator
            .follow_path(&mut store, &OpenGate, entity, Vec::new(), NOW)
            .expect("path");

        let events = coordinator.advance(Duration::ZERO, &mut store, &OpenGate, NOW);
        assert_eq!(
            events,
            vec![MovementEvent::FollowFinished {
                entity,
                path,
                outcome: FollowOutcome::Completed,
            }]
        );
    }

    #[test]
    fn lunge_reaches_halfway_and_returns_without_moving_flag() {
        let entity = EntityId(5);
        let mut store = store_with(entity, CellCoord::new(2, 2));
        let mut coordinator = MovementCoordinator::default();

        let outbound = coordinator
            .lunge(&mut store, entity, CellCoord::new(3, 2), 0.1)
            .expect("lunge");
        let mut events = Vec::new();
        let mut max_x = 2.0f32;
        while coordinator.is_tween_live(outbound) {
            coordinator.step(&mut store, &OpenGate, NOW, &mut events);
            let mover = store.mover(entity).expect("mover");
            assert!(!mover.is_moving());
            max_x = max_x.max(mover.position.x);
        }
        assert!((max_x - 2.5).abs() < 0.0001);
        assert!(events.contains(&MovementEvent::LungeReached { entity }));

        events.extend(run_until_idle(&mut coordinator, &mut store, &OpenGate));
        assert!(events.contains(&MovementEvent::LungeFinished { entity }));
        assert_eq!(position_of(&store, entity), Vec2::new(2.0, 2.0));
        assert!(store.mover(entity).expect("mover").gesture_tween().is_none());
    }

    #[test]
    fn lunge_yields_to_locomotion() {
        let entity = EntityId(5);
        let mut store = store_with(entity, CellCoord::new(2, 2));
        let mut coordinator = MovementCoordinator::default();

        coordinator.lunge(&mut store, entity, CellCoord::new(2, 1), 0.5);
        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);
        coordinator.move_to(&mut store, entity, CellCoord::new(1, 2), true, NOW);
        assert!(coordinator
            .lunge(&mut store, entity, CellCoord::new(2, 1), 0.5)
            .is_none());

        events.extend(run_until_idle(&mut coordinator, &mut store, &OpenGate));
        assert!(events.contains(&MovementEvent::LungeFinished { entity }));
        assert!(!events.contains(&MovementEvent::LungeReached { entity }));
        assert_eq!(position_of(&store, entity), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn lunge_keeps_the_entity_on_its_rest_cell() {
        let entity = EntityId(5);
        let mut store = store_with(entity, CellCoord::new(4, 2));
        let mut coordinator = MovementCoordinator::default();

        coordinator
            .lunge(&mut store, entity, CellCoord::new(3, 2), 0.5)
            .expect("lunge");
        let mut events = Vec::new();
        for _ in 0..3 {
            coordinator.step(&mut store, &OpenGate, NOW, &mut events);
        }
        let mover = store.mover(entity).expect("mover");
        assert!(mover.position.x < 4.0);
        assert_eq!(mover.cell(), CellCoord::new(4, 2));

        coordinator.move_to(&mut store, entity, CellCoord::new(4, 1), true, NOW);
        assert_eq!(position_of(&store, entity), Vec2::new(4.0, 2.0));
        events.extend(run_until_idle(&mut coordinator, &mut store, &OpenGate));

        assert!(events.contains(&MovementEvent::LungeFinished { entity }));
        assert!(!events.contains(&MovementEvent::LungeReached { entity }));
        let mover = store.mover(entity).expect("mover");
        assert_eq!(mover.position, Vec2::new(4.0, 1.0));
        assert_eq!(mover.cell(), CellCoord::new(4, 1));
        assert!(mover.gesture_tween().is_none());
    }

    #[test]
    fn teleport_during_lunge_moves_the_rest_cell() {
        let entity = EntityId(5);
        let mut store = store_with(entity, CellCoord::new(4, 2));
        let mut coordinator = MovementCoordinator::default();

        coordinator.lunge(&mut store, entity, CellCoord::new(3, 2), 0.5);
        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);
        coordinator.move_to(&mut store, entity, CellCoord::new(7, 6), false, NOW);
        assert_eq!(store.mover(entity).expect("mover").cell(), CellCoord::new(7, 6));

        events.extend(run_until_idle(&mut coordinator, &mut store, &OpenGate));
        assert!(events.contains(&MovementEvent::LungeFinished { entity }));
        assert_eq!(position_of(&store, entity), Vec2::new(7.0, 6.0));
    }

    #[test]
    fn replaced_follower_leaves_no_outcome_behind() {
        let entity = EntityId(2);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();

        let first = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(2, 1), CellCoord::new(3, 1)],
                NOW,
            )
            .expect("first path");
        let mut events = Vec::new();
        coordinator.step(&mut store, &OpenGate, NOW, &mut events);
        let second = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(1, 2)],
                NOW,
            )
            .expect("second path");
        run_until_idle(&mut coordinator, &mut store, &OpenGate);

        assert_eq!(coordinator.follow_outcome(first), None);
        assert_eq!(coordinator.finished_follow_count(), 1);
        assert_eq!(
            coordinator.take_follow_outcome(second),
            Some(FollowOutcome::Completed)
        );
        assert_eq!(coordinator.finished_follow_count(), 0);

        let third = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(1, 3)],
                NOW,
            )
            .expect("third path");
        run_until_idle(&mut coordinator, &mut store, &OpenGate);
        let fourth = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(1, 4)],
                NOW,
            )
            .expect("fourth path");
        assert_eq!(coordinator.follow_outcome(third), None);
        run_until_idle(&mut coordinator, &mut store, &OpenGate);
        assert_eq!(coordinator.finished_follow_count(), 1);
        assert_eq!(
            coordinator.follow_outcome(fourth),
            Some(FollowOutcome::Completed)
        );

        coordinator.release_entity(&mut store, entity);
        assert_eq!(coordinator.finished_follow_count(), 0);
    }

    #[test]
    fn release_entity_drops_tweens_and_followers() {
        let entity = EntityId(9);
        let mut store = store_with(entity, CellCoord::new(1, 1));
        let mut coordinator = MovementCoordinator::default();
        let path = coordinator
            .follow_path(
                &mut store,
                &OpenGate,
                entity,
                vec![CellCoord::new(2, 2)],
                NOW,
            )
            .expect("path");

        coordinator.release_entity(&mut store, entity);
        store.remove(&entity);
        run_until_idle(&mut coordinator, &mut store, &OpenGate);

        assert!(!coordinator.is_following(path));
        assert_eq!(coordinator.live_tween_count(), 0);
    }
}
