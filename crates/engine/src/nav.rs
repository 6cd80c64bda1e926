use std::collections::HashMap;

use crate::grid::{CellCoord, DungeonGrid, GridQuery, Occupancy};

/// What the pathfinder needs to know about the map.
pub trait Walkable {
    fn in_bounds(&self, cell: CellCoord) -> bool;
    fn is_solid(&self, cell: CellCoord) -> bool;
}

impl Walkable for DungeonGrid {
    fn in_bounds(&self, cell: CellCoord) -> bool {
        DungeonGrid::in_bounds(self, cell)
    }

    fn is_solid(&self, cell: CellCoord) -> bool {
        DungeonGrid::is_solid(self, cell)
    }
}

impl<O: Occupancy + ?Sized> Walkable for GridQuery<'_, O> {
    fn in_bounds(&self, cell: CellCoord) -> bool {
        GridQuery::in_bounds(self, cell)
    }

    fn is_solid(&self, cell: CellCoord) -> bool {
        GridQuery::is_solid(self, cell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    Found,
    AlreadyThere,
    /// Goal outside the grid, or no grid loaded.
    InvalidTarget,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSearch {
    pub status: PathStatus,
    /// Start excluded, goal included. Empty unless `status` is `Found`.
    pub cells: Vec<CellCoord>,
    pub expanded: usize,
}

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    cell: CellCoord,
    g_cost: f32,
    f_cost: f32,
    parent: Option<usize>,
    closed: bool,
}

pub fn find_path<W: Walkable + ?Sized>(
    walkable: &W,
    start: CellCoord,
    goal: CellCoord,
) -> Vec<CellCoord> {
    search_path(walkable, start, goal).cells
}

/// A* over 8-connected cells with unit step cost and a Euclidean heuristic.
///
/// The open list is stably re-sorted by `f` after every expansion so equal scores keep
/// insertion order. Closed nodes are never reopened, so routes are not guaranteed to be
/// shortest around obstacles.
pub fn search_path<W: Walkable + ?Sized>(
    walkable: &W,
    start: CellCoord,
    goal: CellCoord,
) -> PathSearch {
    if start == goal {
        return PathSearch {
            status: PathStatus::AlreadyThere,
            cells: Vec::new(),
            expanded: 0,
        };
    }
    if !walkable.in_bounds(goal) {
        return PathSearch {
            status: PathStatus::InvalidTarget,
            cells: Vec::new(),
            expanded: 0,
        };
    }

    let mut nodes = vec![SearchNode {
        cell: start,
        g_cost: 0.0,
        f_cost: start.euclidean_distance(goal),
        parent: None,
        closed: false,
    }];
    let mut index_by_cell = HashMap::from([(start, 0usize)]);
    let mut open = vec![0usize];
    let mut expanded = 0usize;

    while !open.is_empty() {
        let current_index = open.remove(0);
        nodes[current_index].closed = true;
        expanded = expanded.saturating_add(1);
        let current = nodes[current_index];

        if current.cell == goal {
            return PathSearch {
                status: PathStatus::Found,
                cells: reconstruct_path(&nodes, current_index),
                expanded,
            };
        }

        for neighbor in current.cell.neighbors() {
            if !walkable.in_bounds(neighbor) || walkable.is_solid(neighbor) {
                continue;
            }

            let g_cost = current.g_cost + 1.0;
            match index_by_cell.get(&neighbor).copied() {
                Some(existing) => {
                    let node = &mut nodes[existing];
                    if node.closed || g_cost >= node.g_cost {
                        continue;
                    }
                    node.g_cost = g_cost;
                    node.f_cost = g_cost + neighbor.euclidean_distance(goal);
                    node.parent = Some(current_index);
                }
                None => {
                    let index = nodes.len();
                    nodes.push(SearchNode {
                        cell: neighbor,
                        g_cost,
                        f_cost: g_cost + neighbor.euclidean_distance(goal),
                        parent: Some(current_index),
                        closed: false,
                    });
                    index_by_cell.insert(neighbor, index);
                    open.push(index);
                }
            }
        }

        open.sort_by(|a, b| nodes[*a].f_cost.total_cmp(&nodes[*b].f_cost));
    }

    PathSearch {
        status: PathStatus::Unreachable,
        cells: Vec::new(),
        expanded,
    }
}

fn reconstruct_path(nodes: &[SearchNode], goal_index: usize) -> Vec<CellCoord> {
    let mut cells = Vec::new();
    let mut cursor = goal_index;
    while let Some(parent) = nodes[cursor].parent {
        cells.push(nodes[cursor].cell);
        cursor = parent;
    }
    cells.reverse();
    cells
}

#[cfg(test)]
mod nav_tests {
    use super::*;
    use crate::grid::{NoOccupants, TileKind};

    fn grid_with_bricks(size: u32, bricks: &[(i32, i32)]) -> DungeonGrid {
        let mut grid = DungeonGrid::walled(size);
        for (x, y) in bricks {
            grid.set_tile(CellCoord::new(*x, *y), TileKind::Brick)
                .expect("brick");
        }
        grid
    }

    fn cells(points: &[(i32, i32)]) -> Vec<CellCoord> {
        points.iter().map(|(x, y)| CellCoord::new(*x, *y)).collect()
    }

    #[test]
    fn diagonal_example_on_small_walled_grid() {
        let grid = DungeonGrid::walled(5);
        let path = find_path(&grid, CellCoord::new(1, 1), CellCoord::new(3, 3));
        assert_eq!(path, cells(&[(2, 2), (3, 3)]));
    }

    #[test]
    fn path_to_own_cell_is_empty() {
        let grid = DungeonGrid::walled(5);
        let search = search_path(&grid, CellCoord::new(2, 2), CellCoord::new(2, 2));
        assert_eq!(search.status, PathStatus::AlreadyThere);
        assert!(search.cells.is_empty());
    }

    #[test]
    fn open_grid_paths_are_adjacent_steps_of_chebyshev_length() {
        let grid = DungeonGrid::walled(12);
        for start in grid.cells().filter(|cell| !grid.is_solid(*cell)) {
            for goal in grid.cells().filter(|cell| !grid.is_solid(*cell)) {
                let path = find_path(&grid, start, goal);
                assert_eq!(
                    path.len() as u32,
                    start.chebyshev_distance(goal),
                    "{start:?} -> {goal:?}"
                );
                let mut previous = start;
                for cell in &path {
                    assert!(previous.is_neighbor_of(*cell));
                    previous = *cell;
                }
                if let Some(last) = path.last() {
                    assert_eq!(*last, goal);
                }
            }
        }
    }

    #[test]
    fn walled_off_goal_yields_empty_path() {
        let grid = grid_with_bricks(7, &[(3, 1), (3, 2), (3, 3), (3, 4), (3, 5)]);
        let search = search_path(&grid, CellCoord::new(1, 1), CellCoord::new(5, 1));
        assert_eq!(search.status, PathStatus::Unreachable);
        assert!(search.cells.is_empty());
    }

    #[test]
    fn out_of_bounds_goal_is_invalid_target() {
        let grid = DungeonGrid::walled(5);
        let search = search_path(&grid, CellCoord::new(1, 1), CellCoord::new(9, 1));
        assert_eq!(search.status, PathStatus::InvalidTarget);
        assert_eq!(search.expanded, 0);

        let occupancy = NoOccupants;
        let unloaded = GridQuery::new(None, &occupancy);
        assert!(find_path(&unloaded, CellCoord::new(1, 1), CellCoord::new(2, 2)).is_empty());
    }

    #[test]
    fn route_around_wall_never_touches_solid_cells_and_is_stable() {
        let grid = grid_with_bricks(7, &[(3, 1), (3, 2), (3, 3), (3, 4)]);
        let first = find_path(&grid, CellCoord::new(1, 1), CellCoord::new(5, 1));
        let second = find_path(&grid, CellCoord::new(1, 1), CellCoord::new(5, 1));

        assert_eq!(first, second);
        assert_eq!(
            first,
            cells(&[
                (2, 2),
                (2, 3),
                (2, 4),
                (3, 5),
                (4, 4),
                (5, 3),
                (5, 2),
                (5, 1)
            ])
        );
        assert!(first.iter().all(|cell| !grid.is_solid(*cell)));
    }

    #[test]
    fn solid_goal_is_unreachable() {
        let mut grid = DungeonGrid::walled(6);
        grid.set_tile(CellCoord::new(3, 3), TileKind::LockedChest)
            .expect("chest");
        assert!(find_path(&grid, CellCoord::new(1, 1), CellCoord::new(3, 3)).is_empty());
    }
}
