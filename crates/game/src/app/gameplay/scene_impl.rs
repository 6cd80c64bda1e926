pub(crate) struct DungeonSimulation {
    world: WorldState,
    systems: GameplaySystemsHost,
    autopilot: bool,
    max_depth: Option<u32>,
    ticks: u64,
}

impl DungeonSimulation {
    fn new(config: GameConfig, generator: Box<dyn RoomGenerator>) -> Self {
        let autopilot = config.autopilot;
        let max_depth = config.max_depth;
        Self {
            world: WorldState::new(config, generator),
            systems: GameplaySystemsHost::default(),
            autopilot,
            max_depth,
            ticks: 0,
        }
    }

    pub(crate) fn depth(&self) -> u32 {
        self.world.depth
    }

    fn reached_max_depth(&self) -> bool {
        self.max_depth
            .is_some_and(|max_depth| self.world.depth >= max_depth && !self.world.is_descending())
    }
}

impl Simulation for DungeonSimulation {
    fn load(&mut self) {
        let player_id = self.world.spawn_player();
        info!(
            player = player_id.0,
            seed = self.world.config.seed,
            world_size = self.world.config.world_size,
            "dungeon_loaded"
        );
        self.world.start_descent();
    }

    fn update(&mut self, fixed_dt_seconds: f32) -> LoopCommand {
        self.world.now_seconds += f64::from(fixed_dt_seconds);
        self.ticks = self.ticks.saturating_add(1);

        if self.autopilot {
            if let Some(intent) = self.world.plan_autopilot() {
                self.world.intents.enqueue(intent);
            }
        }
        self.systems.run_once_per_tick(&mut self.world);
        self.world.events.finish_tick_rollover();

        if let Some(reason) = self.world.halt {
            info!(reason = ?reason, depth = self.world.depth, ticks = self.ticks, "simulation_halted");
            return LoopCommand::Stop;
        }
        if self.reached_max_depth() {
            info!(depth = self.world.depth, ticks = self.ticks, "max_depth_reached");
            return LoopCommand::Stop;
        }
        LoopCommand::Continue
    }

    fn frame(&mut self, frame_dt: Duration) {
        self.world.advance_clocks(frame_dt);
    }

    fn unload(&mut self) {
        match serde_json::to_string(&self.world.snapshot()) {
            Ok(snapshot) => debug!(snapshot = %snapshot, "final_snapshot"),
            Err(error) => warn!(error = %error, "snapshot_encode_failed"),
        }
        info!(depth = self.world.depth, ticks = self.ticks, "dungeon_unloaded");
    }

    fn entity_count(&self) -> usize {
        self.world.actors.len()
    }

    fn debug_title(&self) -> Option<String> {
        let player = self.world.player()?;
        let counts = self.world.events.last_tick_counts();
        let cell = player.mover.cell();
        Some(format!(
            "Dungeon | Depth {} | HP {}/{} | Cell ({}, {}) | Skeletons {} | Events {}",
            self.world.depth,
            player.combatant.health(),
            player.combatant.max_health(),
            cell.x,
            cell.y,
            self.world.actors.living_count(ActorKind::Skeleton),
            counts.total
        ))
    }
}
