fn attack_cooldown_seconds(weapon: Option<&WeaponConfig>) -> f64 {
    weapon.map_or(UNARMED_COOLDOWN_SECONDS, |weapon| weapon.cooldown_seconds)
}

/// The lunge plays at half the attack cooldown.
fn lunge_seconds(cooldown_seconds: f64) -> f32 {
    ((cooldown_seconds / 2.0) as f32).max(MIN_LUNGE_SECONDS)
}

fn roll_player_damage(weapon: Option<&WeaponConfig>, strength: u32, rng: &mut ChaCha8Rng) -> u32 {
    let base = match weapon {
        Some(weapon) => rng.gen_range(weapon.min_damage..=weapon.max_damage),
        None => rng.gen_range(UNARMED_MIN_DAMAGE..=UNARMED_MAX_DAMAGE),
    };
    base.saturating_add(strength)
}

fn chest_loot_count(depth: u32, rng: &mut ChaCha8Rng) -> u32 {
    let rolled = rng.gen_range(CHEST_MIN_LOOT..=CHEST_MAX_LOOT);
    rolled.saturating_add(depth / 2).min(CHEST_LOOT_CAP)
}

/// Where to walk to reach `target`: the cell itself, or for solid targets the passable
/// neighbor closest to `from`.
fn approach_goal<O: Occupancy + ?Sized>(
    query: &GridQuery<'_, O>,
    from: CellCoord,
    target: CellCoord,
) -> Option<CellCoord> {
    if !query.in_bounds(target) {
        return None;
    }
    if !query.is_solid(target) {
        return Some(target);
    }
    query
        .passable_neighbors(target)
        .into_iter()
        .min_by_key(|cell| cell.chebyshev_distance(from))
}

/// Drops the final cell when it cannot be stood on (an interactable or occupied goal).
fn trim_blocked_destination<O: Occupancy + ?Sized>(
    query: &GridQuery<'_, O>,
    cells: &mut Vec<CellCoord>,
) {
    if cells.last().is_some_and(|cell| !query.is_passable(*cell)) {
        cells.pop();
    }
}
