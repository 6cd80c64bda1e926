use serde::Serialize;
use thiserror::Error;

use crate::{EntityId, Vec2};

/// Neighbor offsets in scan order: N, NE, E, SE, S, SW, W, NW.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Floor cell of a continuous position.
    pub fn from_position(position: Vec2) -> Self {
        Self {
            x: position.x.floor() as i32,
            y: position.y.floor() as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn neighbors(self) -> [CellCoord; 8] {
        NEIGHBOR_OFFSETS.map(|(dx, dy)| self.offset(dx, dy))
    }

    pub fn is_neighbor_of(self, other: CellCoord) -> bool {
        self.chebyshev_distance(other) == 1
    }

    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn euclidean_distance(self, other: CellCoord) -> f32 {
        let dx = (other.x - self.x) as f32;
        let dy = (other.y - self.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2 {
            x: self.x as f32,
            y: self.y as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Empty,
    DirtA,
    DirtB,
    Brick,
    StaircaseDown,
    LockedChest,
}

impl TileKind {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Empty),
            1 => Some(Self::DirtA),
            2 => Some(Self::DirtB),
            3 => Some(Self::Brick),
            4 => Some(Self::StaircaseDown),
            5 => Some(Self::LockedChest),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Empty => 0,
            Self::DirtA => 1,
            Self::DirtB => 2,
            Self::Brick => 3,
            Self::StaircaseDown => 4,
            Self::LockedChest => 5,
        }
    }

    pub fn is_solid(self) -> bool {
        matches!(self, Self::Brick | Self::LockedChest)
    }

    pub fn is_interactable(self) -> bool {
        matches!(self, Self::LockedChest | Self::StaircaseDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("unknown tile code {code} at ({x}, {y})")]
    UnknownTileCode { code: u16, x: i32, y: i32 },
    #[error("border cell ({x}, {y}) holds non-solid tile {tile:?}")]
    OpenBorder { x: i32, y: i32, tile: TileKind },
    #[error("cell ({x}, {y}) is outside the {size}x{size} grid")]
    OutOfBounds { x: i32, y: i32, size: u32 },
}

/// Square tile grid for one dungeon depth. Border cells always hold solid tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DungeonGrid {
    size: u32,
    tiles: Vec<TileKind>,
}

impl DungeonGrid {
    /// Builds a grid from row-major tile codes.
    pub fn new(size: u32, codes: Vec<u16>) -> Result<Self, GridError> {
        let expected = size as usize * size as usize;
        let actual = codes.len();
        if expected != actual {
            return Err(GridError::TileCountMismatch { expected, actual });
        }

        let mut tiles = Vec::with_capacity(expected);
        for (index, code) in codes.into_iter().enumerate() {
            let x = (index % size as usize) as i32;
            let y = (index / size as usize) as i32;
            let tile = TileKind::from_code(code).ok_or(GridError::UnknownTileCode { code, x, y })?;
            tiles.push(tile);
        }

        let grid = Self { size, tiles };
        for cell in grid.cells() {
            let Some(tile) = grid.tile_at(cell) else {
                continue;
            };
            if grid.is_border(cell) && !tile.is_solid() {
                return Err(GridError::OpenBorder {
                    x: cell.x,
                    y: cell.y,
                    tile,
                });
            }
        }
        Ok(grid)
    }

    /// Brick ring around an empty interior.
    pub fn walled(size: u32) -> Self {
        let last = size.saturating_sub(1);
        let mut tiles = Vec::with_capacity(size as usize * size as usize);
        for y in 0..size {
            for x in 0..size {
                let on_border = x == 0 || y == 0 || x == last || y == last;
                tiles.push(if on_border {
                    TileKind::Brick
                } else {
                    TileKind::Empty
                });
            }
        }
        Self { size, tiles }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        self.index_of(cell).is_some()
    }

    pub fn is_border(&self, cell: CellCoord) -> bool {
        let last = self.size as i32 - 1;
        self.in_bounds(cell) && (cell.x == 0 || cell.y == 0 || cell.x == last || cell.y == last)
    }

    pub fn tile_at(&self, cell: CellCoord) -> Option<TileKind> {
        self.index_of(cell)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// True for blocking tiles and for anything outside the grid.
    pub fn is_solid(&self, cell: CellCoord) -> bool {
        self.tile_at(cell).map_or(true, TileKind::is_solid)
    }

    /// The only write path. Border cells only accept solid tiles.
    pub fn set_tile(&mut self, cell: CellCoord, tile: TileKind) -> Result<TileKind, GridError> {
        let index = self.index_of(cell).ok_or(GridError::OutOfBounds {
            x: cell.x,
            y: cell.y,
            size: self.size,
        })?;
        if self.is_border(cell) && !tile.is_solid() {
            return Err(GridError::OpenBorder {
                x: cell.x,
                y: cell.y,
                tile,
            });
        }
        Ok(std::mem::replace(&mut self.tiles[index], tile))
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let size = self.size as i32;
        (0..size).flat_map(move |y| (0..size).map(move |x| CellCoord { x, y }))
    }

    pub fn find_tile(&self, tile: TileKind) -> Option<CellCoord> {
        self.cells().find(|cell| self.tile_at(*cell) == Some(tile))
    }

    fn index_of(&self, cell: CellCoord) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        let (x, y) = (cell.x as u32, cell.y as u32);
        if x >= self.size || y >= self.size {
            return None;
        }
        Some(y as usize * self.size as usize + x as usize)
    }
}

/// Who or what stands on a cell. Implemented by the owner of the entity table.
pub trait Occupancy {
    fn entity_at(&self, cell: CellCoord) -> Option<EntityId>;

    fn has_items_at(&self, _cell: CellCoord) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOccupants;

impl Occupancy for NoOccupants {
    fn entity_at(&self, _cell: CellCoord) -> Option<EntityId> {
        None
    }
}

/// Read-only view combining tiles with occupancy. A missing grid reports every cell
/// out of bounds.
pub struct GridQuery<'a, O: ?Sized> {
    grid: Option<&'a DungeonGrid>,
    occupancy: &'a O,
}

impl<'a, O: Occupancy + ?Sized> GridQuery<'a, O> {
    pub fn new(grid: Option<&'a DungeonGrid>, occupancy: &'a O) -> Self {
        Self { grid, occupancy }
    }

    pub fn grid(&self) -> Option<&'a DungeonGrid> {
        self.grid
    }

    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        self.grid.is_some_and(|grid| grid.in_bounds(cell))
    }

    pub fn tile_at(&self, cell: CellCoord) -> Option<TileKind> {
        self.grid.and_then(|grid| grid.tile_at(cell))
    }

    pub fn is_solid(&self, cell: CellCoord) -> bool {
        self.tile_at(cell).map_or(true, TileKind::is_solid)
    }

    pub fn entity_at(&self, cell: CellCoord) -> Option<EntityId> {
        if !self.in_bounds(cell) {
            return None;
        }
        self.occupancy.entity_at(cell)
    }

    pub fn has_items_at(&self, cell: CellCoord) -> bool {
        self.in_bounds(cell) && self.occupancy.has_items_at(cell)
    }

    pub fn is_interactable(&self, cell: CellCoord) -> bool {
        let Some(tile) = self.tile_at(cell) else {
            return false;
        };
        tile.is_interactable() || self.has_items_at(cell) || self.entity_at(cell).is_some()
    }

    pub fn is_passable(&self, cell: CellCoord) -> bool {
        self.in_bounds(cell)
            && !self.is_solid(cell)
            && !self.is_interactable(cell)
            && self.entity_at(cell).is_none()
    }

    pub fn passable_neighbors(&self, cell: CellCoord) -> Vec<CellCoord> {
        cell.neighbors()
            .into_iter()
            .filter(|neighbor| self.is_passable(*neighbor))
            .collect()
    }
}
