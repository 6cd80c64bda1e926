/// The whole mutable game world, owned by the simulation and handed to each system.
struct WorldState {
    config: GameConfig,
    generator: Box<dyn RoomGenerator>,
    rng: ChaCha8Rng,
    ids: EntityIdAllocator,
    grid: Option<DungeonGrid>,
    actors: ActorTable,
    loot: BTreeMap<CellCoord, u32>,
    movement: MovementCoordinator,
    /// Camera and fade tweens. Separate from movement so they never share ids.
    presentation: TweenScheduler,
    camera: Vec2,
    camera_focus: Option<CellCoord>,
    camera_tween: Option<TweenId>,
    fade_alpha: f32,
    fade_tween: Option<TweenId>,
    depth: u32,
    descent: Option<DescentTask>,
    player_id: Option<EntityId>,
    now_seconds: f64,
    events: GameplayEventBus,
    intents: GameplayIntentQueue,
    halt: Option<HaltReason>,
}

impl WorldState {
    fn new(config: GameConfig, generator: Box<dyn RoomGenerator>) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            generator,
            rng,
            ids: EntityIdAllocator::default(),
            grid: None,
            actors: ActorTable::default(),
            loot: BTreeMap::new(),
            movement: MovementCoordinator::default(),
            presentation: TweenScheduler::default(),
            camera: PLAYER_SPAWN.to_vec2(),
            camera_focus: None,
            camera_tween: None,
            fade_alpha: 0.0,
            fade_tween: None,
            depth: 0,
            descent: None,
            player_id: None,
            now_seconds: 0.0,
            events: GameplayEventBus::default(),
            intents: GameplayIntentQueue::default(),
            halt: None,
        }
    }

    fn is_descending(&self) -> bool {
        self.descent.is_some()
    }

    fn player(&self) -> Option<&Actor> {
        self.player_id.and_then(|id| self.actors.get(id))
    }

    fn occupants(&self, ignore: Option<EntityId>) -> Occupants<'_> {
        Occupants {
            actors: &self.actors,
            loot: &self.loot,
            ignore,
        }
    }

    fn resume_context(&self) -> ResumeContext<'_, WorldState> {
        ResumeContext {
            now_seconds: self.now_seconds,
            movement: &self.movement,
            state: self,
        }
    }

    fn spawn_player(&mut self) -> EntityId {
        let id = self.ids.allocate();
        let player = &self.config.player;
        let state = PlayerState {
            strength: player.strength,
            weapon: player.weapon.clone(),
            interaction: ActionSlot::new(INTERACTION_DEBOUNCE_SECONDS),
            pickup: ActionSlot::new(PICKUP_GUARD_SECONDS),
            regeneration: player.regeneration.as_ref().map(|regeneration| Regeneration {
                slot: ActionSlot::new(regeneration.cooldown_seconds),
                amount: regeneration.amount,
            }),
            target_cell: None,
            approach: None,
            backpack: 0,
            backpack_slots: player.backpack_slots,
        };
        self.actors.insert(Actor {
            id,
            mover: Mover::at_cell(PLAYER_SPAWN),
            combatant: Combatant::new(player.max_health).with_armor(player.armor),
            attack: ActionSlot::new(attack_cooldown_seconds(player.weapon.as_ref())),
            behavior: Behavior::Player(state),
        });
        self.player_id = Some(id);
        id
    }

    fn spawn_skeleton(&mut self, cell: CellCoord) -> EntityId {
        let id = self.ids.allocate();
        let skeleton = &self.config.skeleton;
        self.actors.insert(Actor {
            id,
            mover: Mover::at_cell(cell),
            combatant: Combatant::new(skeleton.max_health),
            attack: ActionSlot::new(skeleton.strike_pause_seconds),
            behavior: Behavior::Skeleton(SkeletonBrain::default()),
        });
        id
    }

    /// Keyboard step. Interactable targets become cell interactions; a diagonal step
    /// slides along whichever axis is open.
    fn handle_step(&mut self, dx: i32, dy: i32) -> bool {
        let Some(player_id) = self.player_id else {
            return false;
        };
        let Some(player) = self.actors.get(player_id) else {
            return false;
        };
        if !player.combatant.is_alive() || player.mover.is_moving() {
            return false;
        }
        let too_soon = player
            .mover
            .last_move_seconds()
            .is_some_and(|last| self.now_seconds - last < KEYBOARD_MOVE_INTERVAL_SECONDS);
        if too_soon {
            return false;
        }

        let current = player.mover.cell();
        let target = current.offset(dx.signum(), dy.signum());
        if target == current {
            return false;
        }

        let occupants = self.occupants(Some(player_id));
        let query = GridQuery::new(self.grid.as_ref(), &occupants);
        if !query.in_bounds(target) {
            return false;
        }
        let interactable = query.is_interactable(target);
        let blocked_x = !query.is_passable(CellCoord::new(target.x, current.y));
        let blocked_y = !query.is_passable(CellCoord::new(current.x, target.y));
        let blocked = !query.is_passable(target);

        if interactable {
            return self.handle_cell_interaction(target);
        }
        if blocked {
            return false;
        }
        let destination = CellCoord::new(
            if blocked_x { current.x } else { target.x },
            if blocked_y { current.y } else { target.y },
        );
        if destination == current {
            return false;
        }

        self.movement
            .move_to(&mut self.actors, player_id, destination, true, self.now_seconds);
        if let Some(state) = self.actors.get_mut(player_id).and_then(Actor::player_state_mut) {
            state.pickup.reset();
        }
        true
    }

    /// Adjacent cells are handled now; anything further starts an approach walk.
    fn handle_cell_interaction(&mut self, target: CellCoord) -> bool {
        let Some(player_id) = self.player_id else {
            return false;
        };
        let Some(player) = self.actors.get(player_id) else {
            return false;
        };
        let Some(state) = player.player_state() else {
            return false;
        };
        if !player.combatant.is_alive() || !state.interaction.can_perform(self.now_seconds) {
            return false;
        }

        let current = player.mover.cell();
        if !current.is_neighbor_of(target) {
            if state.target_cell == Some(target) {
                return false;
            }
            return self.begin_approach(player_id, current, target);
        }

        self.interact_adjacent(player_id, target);
        true
    }

    fn begin_approach(&mut self, player_id: EntityId, from: CellCoord, target: CellCoord) -> bool {
        let cells = {
            let occupants = self.occupants(Some(player_id));
            let query = GridQuery::new(self.grid.as_ref(), &occupants);
            approach_goal(&query, from, target)
                .map(|goal| {
                    let mut cells = find_path(&query, from, goal);
                    trim_blocked_destination(&query, &mut cells);
                    cells
                })
                .unwrap_or_default()
        };

        if cells.is_empty() {
            if let Some(state) = self.actors.get_mut(player_id).and_then(Actor::player_state_mut) {
                state.target_cell = None;
            }
            debug!(x = target.x, y = target.y, "approach_unreachable");
            return false;
        }

        let steps = cells.len();
        let gate = PassableStep {
            grid: self.grid.as_ref(),
            loot: &self.loot,
        };
        let Some(path) =
            self.movement
                .follow_path(&mut self.actors, &gate, player_id, cells, self.now_seconds)
        else {
            return false;
        };
        if let Some(state) = self.actors.get_mut(player_id).and_then(Actor::player_state_mut) {
            state.target_cell = Some(target);
            state.approach = Some(Approach { target, path });
        }
        debug!(x = target.x, y = target.y, steps, path = path.0, "approach_started");
        true
    }

    /// Finishes an approach once its follower is done, interacting if it ended adjacent.
    fn resolve_approach(&mut self) {
        let Some(player_id) = self.player_id else {
            return;
        };
        let Some(approach) = self
            .player()
            .and_then(Actor::player_state)
            .and_then(|state| state.approach)
        else {
            return;
        };
        if !Suspension::<WorldState>::Follow(approach.path).is_ready(&self.resume_context()) {
            return;
        }

        let outcome = self.movement.take_follow_outcome(approach.path);
        if let Some(state) = self.actors.get_mut(player_id).and_then(Actor::player_state_mut) {
            state.approach = None;
            state.target_cell = None;
        }
        debug!(path = approach.path.0, outcome = ?outcome, "approach_finished");

        let arrived = self.player().is_some_and(|player| {
            player.combatant.is_alive()
                && !player.mover.is_moving()
                && player.mover.cell().is_neighbor_of(approach.target)
        });
        if arrived && !self.is_descending() {
            self.interact_adjacent(player_id, approach.target);
        }
    }

    fn interact_adjacent(&mut self, player_id: EntityId, target: CellCoord) {
        if let Some(player) = self.actors.get_mut(player_id) {
            player.mover.face_toward(target);
        }

        let occupant = {
            let occupants = self.occupants(Some(player_id));
            GridQuery::new(self.grid.as_ref(), &occupants).entity_at(target)
        };
        if let Some(victim) = occupant {
            self.player_attack(player_id, victim, target);
            return;
        }
        if self.loot.get(&target).is_some_and(|count| *count > 0) {
            self.collect_loot(player_id, target);
            return;
        }
        match self.grid.as_ref().and_then(|grid| grid.tile_at(target)) {
            Some(TileKind::LockedChest) => self.open_chest(player_id, target),
            Some(TileKind::StaircaseDown) => self.start_descent(),
            _ => {}
        }
    }

    fn player_attack(&mut self, player_id: EntityId, victim: EntityId, cell: CellCoord) {
        let Some(player) = self.actors.get_mut(player_id) else {
            return;
        };
        if !player.attack.try_perform(self.now_seconds) {
            return;
        }
        let cooldown = player.attack.cooldown_seconds();
        let Some(state) = player.player_state() else {
            return;
        };
        let damage = roll_player_damage(state.weapon.as_ref(), state.strength, &mut self.rng);

        self.movement
            .lunge(&mut self.actors, player_id, cell, lunge_seconds(cooldown));
        self.strike(player_id, victim, damage);
    }

    fn strike(&mut self, attacker: EntityId, victim: EntityId, damage: u32) -> DamageOutcome {
        let Some(target) = self.actors.get_mut(victim) else {
            return DamageOutcome::Ignored;
        };
        let outcome = target.combatant.apply_damage(damage);
        let kind = target.kind();
        match outcome {
            DamageOutcome::Ignored => {}
            DamageOutcome::Damaged { dealt, remaining } => {
                self.events.emit(GameplayEvent::AttackLanded {
                    attacker,
                    target: victim,
                    dealt,
                });
                debug!(
                    attacker = attacker.0,
                    target = victim.0,
                    dealt,
                    remaining,
                    "attack_landed"
                );
            }
            DamageOutcome::Killed { dealt } => {
                self.events.emit(GameplayEvent::AttackLanded {
                    attacker,
                    target: victim,
                    dealt,
                });
                self.events.emit(GameplayEvent::EntityDied { entity: victim });
                info!(entity = victim.0, kind = ?kind, killer = attacker.0, "entity_died");
            }
        }
        outcome
    }

    fn collect_loot(&mut self, player_id: EntityId, cell: CellCoord) {
        let now_seconds = self.now_seconds;
        let Some(state) = self.actors.get_mut(player_id).and_then(Actor::player_state_mut) else {
            return;
        };
        if !state.pickup.try_perform(now_seconds) {
            return;
        }
        if state.backpack >= state.backpack_slots {
            debug!(slots = state.backpack_slots, "backpack_full");
            return;
        }
        let Some(count) = self.loot.get_mut(&cell) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.loot.remove(&cell);
        }
        state.backpack = state.backpack.saturating_add(1);
        self.events.emit(GameplayEvent::LootCollected { cell });
        debug!(x = cell.x, y = cell.y, backpack = state.backpack, "loot_collected");
    }

    fn open_chest(&mut self, player_id: EntityId, cell: CellCoord) {
        if let Some(state) = self.actors.get_mut(player_id).and_then(Actor::player_state_mut) {
            state.interaction.try_perform(self.now_seconds);
        }

        let count = chest_loot_count(self.depth, &mut self.rng);
        for _ in 0..count {
            let neighbors = {
                let occupants = self.occupants(None);
                GridQuery::new(self.grid.as_ref(), &occupants).passable_neighbors(cell)
            };
            let spot = if neighbors.is_empty() {
                cell
            } else {
                neighbors[self.rng.gen_range(0..neighbors.len())]
            };
            *self.loot.entry(spot).or_insert(0) += 1;
        }

        if let Some(grid) = self.grid.as_mut() {
            if let Err(error) = grid.set_tile(cell, TileKind::Empty) {
                warn!(x = cell.x, y = cell.y, error = %error, "chest_clear_failed");
            }
        }
        self.events.emit(GameplayEvent::ChestOpened { cell, loot: count });
        info!(x = cell.x, y = cell.y, loot = count, depth = self.depth, "chest_opened");
    }

    fn start_descent(&mut self) {
        if self.is_descending() {
            return;
        }
        self.depth = self.depth.saturating_add(1);
        let wait = if self.fade_alpha != 0.0 {
            let fade = self.start_fade(0.0);
            Some(fade_finished(fade))
        } else {
            None
        };
        self.descent = Some(DescentTask {
            stage: DescentStage::FadingOut,
            wait,
        });
        info!(depth = self.depth, "descent_started");
    }

    /// Runs the descent task through every stage whose wait is already over.
    fn advance_descent(&mut self) {
        loop {
            let Some(task) = self.descent.as_ref() else {
                return;
            };
            let ready = task
                .wait
                .as_ref()
                .map_or(true, |wait| wait.is_ready(&self.resume_context()));
            if !ready {
                return;
            }
            let Some(mut task) = self.descent.take() else {
                return;
            };

            match task.stage {
                DescentStage::FadingOut => {
                    task.stage = DescentStage::AwaitingPlayer;
                    task.wait = Some(Suspension::until(|world: &WorldState| {
                        world
                            .player()
                            .map_or(true, |player| !player.mover.is_moving())
                    }));
                }
                DescentStage::AwaitingPlayer => {
                    if !self.enter_next_level() {
                        return;
                    }
                    task.stage = DescentStage::Pausing;
                    task.wait = Some(Suspension::pause(self.now_seconds, DESCENT_PAUSE_SECONDS));
                }
                DescentStage::Pausing => {
                    let fade = self.start_fade(1.0);
                    task.stage = DescentStage::FadingIn;
                    task.wait = Some(fade_finished(fade));
                }
                DescentStage::FadingIn => {
                    info!(depth = self.depth, "descended");
                    return;
                }
            }
            self.descent = Some(task);
        }
    }

    fn enter_next_level(&mut self) -> bool {
        let grid = match self
            .generator
            .generate(self.config.world_size, self.depth, &mut self.rng)
        {
            Ok(grid) => grid,
            Err(error) => {
                error!(depth = self.depth, error = %error, "level_generation_failed");
                self.halt = Some(HaltReason::LevelGenerationFailed);
                return false;
            }
        };
        self.grid = Some(grid);

        for entity in self.actors.ids_of_kind(ActorKind::Skeleton) {
            self.movement.release_entity(&mut self.actors, entity);
            self.actors.remove(entity);
        }
        self.loot.clear();

        let max_mobs = self.depth.saturating_mul(self.config.mobs_per_depth);
        let spawned = self.spawn_mobs(max_mobs);
        if let Some(player_id) = self.player_id {
            self.movement
                .move_to(&mut self.actors, player_id, PLAYER_SPAWN, false, self.now_seconds);
        }

        self.events.emit(GameplayEvent::Descended { depth: self.depth });
        info!(depth = self.depth, skeletons = spawned, "level_entered");
        true
    }

    /// Row-major scan placing skeletons on passable cells away from the spawn point.
    fn spawn_mobs(&mut self, max_mobs: u32) -> u32 {
        let Some(cells) = self.grid.as_ref().map(|grid| grid.cells().collect::<Vec<_>>()) else {
            return 0;
        };
        let mut spawned = 0;
        for cell in cells {
            if spawned >= max_mobs {
                break;
            }
            if cell.chebyshev_distance(PLAYER_SPAWN) <= SPAWN_CLEARANCE_CELLS {
                continue;
            }
            let passable = {
                let occupants = self.occupants(self.player_id);
                GridQuery::new(self.grid.as_ref(), &occupants).is_passable(cell)
            };
            if passable && self.rng.gen_bool(MOB_SPAWN_CHANCE) {
                self.spawn_skeleton(cell);
                spawned += 1;
            }
        }
        spawned
    }

    fn start_fade(&mut self, to_alpha: f32) -> TweenId {
        if let Some(previous) = self.fade_tween.take() {
            self.presentation.cancel(previous);
        }
        let id = self
            .presentation
            .start(Tween::new(FADE_TWEEN_SECONDS, &[(self.fade_alpha, to_alpha)]));
        self.fade_tween = Some(id);
        id
    }

    fn apply_regeneration(&mut self) {
        let now_seconds = self.now_seconds;
        let Some(player) = self.player_id.and_then(|id| self.actors.get_mut(id)) else {
            return;
        };
        if !player.combatant.is_alive() {
            return;
        }
        let Actor {
            combatant,
            behavior: Behavior::Player(state),
            ..
        } = player
        else {
            return;
        };
        let Some(regeneration) = state.regeneration.as_mut() else {
            return;
        };
        if !regeneration.slot.try_perform(now_seconds) {
            return;
        }
        let healed = combatant.heal(regeneration.amount);
        if healed > 0 {
            debug!(healed, health = combatant.health(), "regenerated");
        }
    }

    /// Frame-rate work between ticks: movement and presentation tweens, then the camera.
    fn advance_clocks(&mut self, frame_dt: Duration) {
        let gate = PassableStep {
            grid: self.grid.as_ref(),
            loot: &self.loot,
        };
        let movement_events =
            self.movement
                .advance(frame_dt, &mut self.actors, &gate, self.now_seconds);
        for event in movement_events {
            match event {
                MovementEvent::FollowFinished {
                    entity, outcome, ..
                } => self
                    .events
                    .emit(GameplayEvent::FollowFinished { entity, outcome }),
                MovementEvent::MovePreempted { entity, .. } => {
                    self.events.emit(GameplayEvent::MovePreempted { entity })
                }
                MovementEvent::MoveSettled { .. }
                | MovementEvent::LungeReached { .. }
                | MovementEvent::LungeFinished { .. } => {}
            }
        }

        self.advance_presentation(frame_dt);
        self.follow_camera();
    }

    fn advance_presentation(&mut self, frame_dt: Duration) {
        let camera_tween = self.camera_tween;
        let fade_tween = self.fade_tween;
        let camera = &mut self.camera;
        let fade_alpha = &mut self.fade_alpha;
        let mut observer = |id: TweenId, values: &[f32]| -> Result<TweenControl, ObserverError> {
            if Some(id) == camera_tween {
                let &[x, y] = values else {
                    return Err(ObserverError::new("camera tween needs two channels"));
                };
                *camera = Vec2 { x, y };
            } else if Some(id) == fade_tween {
                let Some(alpha) = values.first() else {
                    return Err(ObserverError::new("fade tween has no channel"));
                };
                *fade_alpha = *alpha;
            }
            Ok(TweenControl::Continue)
        };

        for completion in self.presentation.advance(frame_dt, &mut observer) {
            if self.camera_tween == Some(completion.id) {
                self.camera_tween = None;
            }
            if self.fade_tween == Some(completion.id) {
                self.fade_tween = None;
            }
        }
    }

    /// Re-aims the camera whenever the player's destination cell changes.
    fn follow_camera(&mut self) {
        let Some(player) = self.player() else {
            return;
        };
        let focus = player
            .mover
            .move_target()
            .unwrap_or_else(|| player.mover.cell());
        if self.camera_focus == Some(focus) {
            return;
        }
        self.camera_focus = Some(focus);
        if let Some(previous) = self.camera_tween.take() {
            self.presentation.cancel(previous);
        }
        let goal = focus.to_vec2();
        let id = self.presentation.start(Tween::new(
            CAMERA_TWEEN_SECONDS,
            &[(self.camera.x, goal.x), (self.camera.y, goal.y)],
        ));
        self.camera_tween = Some(id);
    }

    fn snapshot(&self) -> WorldSnapshot {
        let player = self.player();
        WorldSnapshot {
            depth: self.depth,
            descending: self.is_descending(),
            camera: self.camera,
            fade_alpha: self.fade_alpha,
            attack_readiness: player.map_or(0.0, |player| player.attack.readiness(self.now_seconds)),
            backpack: player
                .and_then(Actor::player_state)
                .map_or(0, |state| state.backpack),
            actors: self
                .actors
                .iter()
                .map(|actor| ActorSnapshot {
                    id: actor.id,
                    kind: actor.kind(),
                    position: actor.mover.position,
                    cell: actor.mover.cell(),
                    moving: actor.mover.is_moving(),
                    facing: actor.mover.facing,
                    health: actor.combatant.health(),
                    max_health: actor.combatant.max_health(),
                    path: actor.mover.path_cells().to_vec(),
                })
                .collect(),
            loot: self
                .loot
                .iter()
                .map(|(cell, count)| LootSnapshot {
                    cell: *cell,
                    count: *count,
                })
                .collect(),
        }
    }
}

fn fade_finished(fade: TweenId) -> Suspension<WorldState> {
    Suspension::until(move |world: &WorldState| !world.presentation.is_live(fade))
}
