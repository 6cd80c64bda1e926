#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameplaySystemId {
    InputIntent,
    Interaction,
    AI,
    StatusEffects,
    Descent,
    Cleanup,
}

impl GameplaySystemId {
    #[cfg(test)]
    fn name(self) -> &'static str {
        match self {
            Self::InputIntent => "InputIntent",
            Self::Interaction => "Interaction",
            Self::AI => "AI",
            Self::StatusEffects => "StatusEffects",
            Self::Descent => "Descent",
            Self::Cleanup => "Cleanup",
        }
    }
}

const GAMEPLAY_SYSTEM_ORDER: [GameplaySystemId; 6] = [
    GameplaySystemId::InputIntent,
    GameplaySystemId::Interaction,
    GameplaySystemId::AI,
    GameplaySystemId::StatusEffects,
    GameplaySystemId::Descent,
    GameplaySystemId::Cleanup,
];

struct GameplaySystemContext<'a> {
    world: &'a mut WorldState,
}

#[derive(Default)]
struct GameplaySystemsHost {
    last_tick_order: Vec<GameplaySystemId>,
}

impl GameplaySystemsHost {
    fn run_once_per_tick(&mut self, world: &mut WorldState) {
        self.last_tick_order.clear();
        for system_id in GAMEPLAY_SYSTEM_ORDER {
            self.last_tick_order.push(system_id);
            let mut context = GameplaySystemContext { world: &mut *world };
            self.run_system(system_id, &mut context);
        }
    }

    fn run_system(&mut self, system_id: GameplaySystemId, context: &mut GameplaySystemContext<'_>) {
        match system_id {
            GameplaySystemId::InputIntent => Self::input_intent_system(context),
            GameplaySystemId::Interaction => Self::interaction_system(context),
            GameplaySystemId::AI => Self::ai_system(context),
            GameplaySystemId::StatusEffects => Self::status_effects_system(context),
            GameplaySystemId::Descent => Self::descent_system(context),
            GameplaySystemId::Cleanup => Self::cleanup_system(context),
        }
    }

    fn input_intent_system(context: &mut GameplaySystemContext<'_>) {
        let world = &mut *context.world;
        let intents = world.intents.drain_current_tick();
        let mut stats = GameplayIntentApplyStats::default();
        for intent in intents {
            stats.record_intent(intent.kind());
            let applied = if world.is_descending() {
                false
            } else {
                match intent {
                    GameplayIntent::Step { dx, dy } => world.handle_step(dx, dy),
                    GameplayIntent::InteractCell { cell } => world.handle_cell_interaction(cell),
                }
            };
            if !applied {
                stats.record_ignored();
            }
        }
        world.intents.set_last_tick_apply_stats(stats);
    }

    fn interaction_system(context: &mut GameplaySystemContext<'_>) {
        context.world.resolve_approach();
    }

    fn ai_system(context: &mut GameplaySystemContext<'_>) {
        let world = &mut *context.world;
        if world.is_descending() {
            return;
        }
        let Some(player_id) = world.player_id else {
            return;
        };
        for skeleton_id in world.actors.ids_of_kind(ActorKind::Skeleton) {
            world.advance_skeleton(skeleton_id, player_id);
        }
    }

    fn status_effects_system(context: &mut GameplaySystemContext<'_>) {
        context.world.apply_regeneration();
    }

    fn descent_system(context: &mut GameplaySystemContext<'_>) {
        context.world.advance_descent();
    }

    fn cleanup_system(context: &mut GameplaySystemContext<'_>) {
        let world = &mut *context.world;
        let dead: Vec<EntityId> = world
            .actors
            .iter()
            .filter(|actor| actor.kind() != ActorKind::Player && !actor.combatant.is_alive())
            .map(|actor| actor.id)
            .collect();
        for entity in dead {
            world.movement.release_entity(&mut world.actors, entity);
            world.actors.remove(entity);
            debug!(entity = entity.0, "entity_removed");
        }

        let player_dead = world
            .player()
            .is_some_and(|player| !player.combatant.is_alive());
        if player_dead && world.halt.is_none() {
            world.halt = Some(HaltReason::PlayerDied);
            info!(depth = world.depth, "player_died");
        }
    }
}
