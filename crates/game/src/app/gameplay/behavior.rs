type SkeletonStep = (SkeletonPhase, Option<Suspension<WorldState>>);

impl WorldState {
    /// One resume of a skeleton's behavior. Does nothing while its wait is pending.
    fn advance_skeleton(&mut self, id: EntityId, player_id: EntityId) {
        let Some(actor) = self.actors.get(id) else {
            return;
        };
        if !actor.combatant.is_alive() {
            return;
        }
        let Some(brain) = actor.skeleton_brain() else {
            return;
        };
        if let Some(wait) = &brain.wait {
            if !wait.is_ready(&self.resume_context()) {
                return;
            }
        }

        let Some(brain) = self.actors.get_mut(id).and_then(Actor::skeleton_brain_mut) else {
            return;
        };
        brain.wait = None;
        let phase = std::mem::take(&mut brain.phase);

        let (phase, wait) = match phase {
            SkeletonPhase::Idle => self.skeleton_idle(id, player_id),
            SkeletonPhase::Walking { remaining } => self.skeleton_walk(id, player_id, remaining),
            SkeletonPhase::Lunging => self.skeleton_land_strike(id, player_id),
            SkeletonPhase::Recovering => self.skeleton_engage(id, player_id),
        };
        if let Some(brain) = self.actors.get_mut(id).and_then(Actor::skeleton_brain_mut) {
            brain.phase = phase;
            brain.wait = wait;
        }
    }

    fn skeleton_idle(&mut self, id: EntityId, player_id: EntityId) -> SkeletonStep {
        if !self.rng.gen_bool(self.config.skeleton.seek_chance) {
            return (SkeletonPhase::Idle, None);
        }
        self.skeleton_seek(id, player_id)
    }

    fn skeleton_seek(&mut self, id: EntityId, player_id: EntityId) -> SkeletonStep {
        let (Some(skeleton), Some(player)) = (self.actors.get(id), self.actors.get(player_id))
        else {
            return (SkeletonPhase::Idle, None);
        };
        if !player.combatant.is_alive() {
            return (SkeletonPhase::Idle, None);
        }
        let from = skeleton.mover.cell();
        let goal = player.mover.cell();
        let cells = {
            let occupants = self.occupants(Some(id));
            find_path(&GridQuery::new(self.grid.as_ref(), &occupants), from, goal)
        };
        let remaining: VecDeque<CellCoord> = if cells.is_empty() {
            VecDeque::from([from])
        } else {
            cells.into()
        };
        debug!(entity = id.0, steps = remaining.len(), "skeleton_seeking");
        self.skeleton_walk(id, player_id, remaining)
    }

    /// Strikes first if the player is already adjacent, otherwise takes the next step.
    fn skeleton_walk(
        &mut self,
        id: EntityId,
        player_id: EntityId,
        mut remaining: VecDeque<CellCoord>,
    ) -> SkeletonStep {
        if self.engaged_target_cell(id, player_id).is_some() {
            return self.skeleton_strike(id, player_id);
        }
        let Some(current) = self.actors.get(id).map(|actor| actor.mover.cell()) else {
            return (SkeletonPhase::Idle, None);
        };
        let Some(next) = remaining.pop_front() else {
            return (SkeletonPhase::Idle, None);
        };
        let allowed = next == current || {
            let occupants = self.occupants(Some(id));
            GridQuery::new(self.grid.as_ref(), &occupants).is_passable(next)
        };
        if !allowed {
            debug!(entity = id.0, x = next.x, y = next.y, "skeleton_path_blocked");
            return (SkeletonPhase::Idle, None);
        }

        match self
            .movement
            .move_to(&mut self.actors, id, next, true, self.now_seconds)
        {
            MoveOutcome::Started { tween, .. } => (
                SkeletonPhase::Walking { remaining },
                Some(Suspension::Tween(tween)),
            ),
            MoveOutcome::Teleported | MoveOutcome::UnknownEntity => (SkeletonPhase::Idle, None),
        }
    }

    fn skeleton_strike(&mut self, id: EntityId, player_id: EntityId) -> SkeletonStep {
        let Some(target_cell) = self.engaged_target_cell(id, player_id) else {
            return (SkeletonPhase::Idle, None);
        };
        let now_seconds = self.now_seconds;
        let Some(skeleton) = self.actors.get_mut(id) else {
            return (SkeletonPhase::Idle, None);
        };
        if !skeleton.attack.try_perform(now_seconds) {
            let remaining = skeleton.attack.remaining_seconds(now_seconds);
            return (
                SkeletonPhase::Recovering,
                Some(Suspension::pause(now_seconds, remaining)),
            );
        }
        skeleton.mover.face_toward(target_cell);

        let lunge_seconds = self.config.skeleton.lunge_seconds.max(MIN_LUNGE_SECONDS);
        self.movement
            .lunge(&mut self.actors, id, target_cell, lunge_seconds);
        (
            SkeletonPhase::Lunging,
            Some(Suspension::until(move |world: &WorldState| {
                world
                    .actors
                    .get(id)
                    .map_or(true, |actor| actor.mover.gesture_tween().is_none())
            })),
        )
    }

    fn skeleton_land_strike(&mut self, id: EntityId, player_id: EntityId) -> SkeletonStep {
        let player_alive = self
            .actors
            .get(player_id)
            .is_some_and(|player| player.combatant.is_alive());
        if !player_alive {
            return (SkeletonPhase::Idle, None);
        }
        self.strike(id, player_id, self.config.skeleton.strike_damage);
        (
            SkeletonPhase::Recovering,
            Some(Suspension::pause(
                self.now_seconds,
                self.config.skeleton.strike_pause_seconds,
            )),
        )
    }

    /// After a pause: keep striking while adjacent, otherwise chase again.
    fn skeleton_engage(&mut self, id: EntityId, player_id: EntityId) -> SkeletonStep {
        if self.engaged_target_cell(id, player_id).is_some() {
            return self.skeleton_strike(id, player_id);
        }
        self.skeleton_seek(id, player_id)
    }

    /// The player's cell while both are alive and neighbors.
    fn engaged_target_cell(&self, id: EntityId, player_id: EntityId) -> Option<CellCoord> {
        let skeleton = self.actors.get(id)?;
        let player = self.actors.get(player_id)?;
        if !skeleton.combatant.is_alive() || !player.combatant.is_alive() {
            return None;
        }
        let target = player.mover.cell();
        skeleton.mover.cell().is_neighbor_of(target).then_some(target)
    }

    /// Picks the next intent for the scripted player: fight, loot, then head for the stairs.
    fn plan_autopilot(&self) -> Option<GameplayIntent> {
        if self.is_descending() {
            return None;
        }
        let player_id = self.player_id?;
        let player = self.actors.get(player_id)?;
        let state = player.player_state()?;
        if !player.combatant.is_alive() {
            return None;
        }
        let grid = self.grid.as_ref()?;
        let occupants = self.occupants(Some(player_id));
        let query = GridQuery::new(Some(grid), &occupants);
        let current = player.mover.cell();

        if player.attack.can_perform(self.now_seconds) {
            let foe = current.neighbors().into_iter().find(|cell| {
                query
                    .entity_at(*cell)
                    .and_then(|entity| self.actors.get(entity))
                    .is_some_and(|actor| actor.kind() == ActorKind::Skeleton)
            });
            if let Some(cell) = foe {
                return Some(GameplayIntent::InteractCell { cell });
            }
        }
        if player.mover.is_moving()
            || state.approach.is_some()
            || !state.interaction.can_perform(self.now_seconds)
        {
            return None;
        }

        let wants_loot =
            state.backpack < state.backpack_slots && state.pickup.can_perform(self.now_seconds);
        let nearby = current.neighbors().into_iter().find(|cell| {
            (wants_loot && query.has_items_at(*cell))
                || query.tile_at(*cell) == Some(TileKind::LockedChest)
        });
        if let Some(cell) = nearby {
            return Some(GameplayIntent::InteractCell { cell });
        }

        if let Some(stairs) = grid.find_tile(TileKind::StaircaseDown) {
            if current.is_neighbor_of(stairs)
                || search_path(&query, current, stairs).status == PathStatus::Found
            {
                return Some(GameplayIntent::InteractCell { cell: stairs });
            }
        }

        // Stairs walled off: a chest sitting in a wall gap is the way through.
        grid.cells()
            .filter(|cell| grid.tile_at(*cell) == Some(TileKind::LockedChest))
            .find(|chest| {
                approach_goal(&query, current, *chest).is_some_and(|goal| {
                    search_path(&query, current, goal).status == PathStatus::Found
                })
            })
            .map(|cell| GameplayIntent::InteractCell { cell })
    }
}
