/// Produces the tile layout for one depth.
trait RoomGenerator {
    fn generate(&self, size: u32, depth: u32, rng: &mut ChaCha8Rng)
        -> Result<DungeonGrid, GridError>;
}

/// Brick border, brick walls on every fifth column with one gap each, and the staircase
/// in the far corner.
#[derive(Debug, Clone, Copy, Default)]
struct ColumnRooms;

impl ColumnRooms {
    fn floor_tile(depth: u32, rng: &mut ChaCha8Rng) -> TileKind {
        let roll: f64 = rng.gen();
        if roll < CHEST_CHANCE_AT_DEPTH_ONE / f64::from(depth.max(1)) {
            TileKind::LockedChest
        } else if roll < DIRT_A_THRESHOLD {
            TileKind::DirtA
        } else if roll < DIRT_B_THRESHOLD {
            TileKind::DirtB
        } else {
            TileKind::Empty
        }
    }
}

impl RoomGenerator for ColumnRooms {
    fn generate(
        &self,
        size: u32,
        depth: u32,
        rng: &mut ChaCha8Rng,
    ) -> Result<DungeonGrid, GridError> {
        let last = size.saturating_sub(1);
        let staircase = size.saturating_sub(2);
        let mut column_has_gap = vec![false; size as usize];
        let mut codes = Vec::with_capacity(size as usize * size as usize);

        for y in 0..size {
            for x in 0..size {
                let tile = if x == 0 || y == 0 || x == last || y == last {
                    TileKind::Brick
                } else if x == staircase && y == staircase {
                    TileKind::StaircaseDown
                } else if x % ROOM_COLUMN_SPACING == 0 {
                    let has_gap = column_has_gap[x as usize];
                    let open_here = !has_gap && (rng.gen_bool(ROOM_HOLE_CHANCE) || y == staircase);
                    if open_here {
                        column_has_gap[x as usize] = true;
                        Self::floor_tile(depth, rng)
                    } else {
                        TileKind::Brick
                    }
                } else {
                    Self::floor_tile(depth, rng)
                };
                codes.push(tile.code());
            }
        }

        let mut grid = DungeonGrid::new(size, codes)?;
        if grid.tile_at(PLAYER_SPAWN).is_some_and(TileKind::is_solid) {
            grid.set_tile(PLAYER_SPAWN, TileKind::Empty)?;
        }
        Ok(grid)
    }
}
