//! Spatial model - toroidal multi-occupancy cell grid
//!
//! The grid owns occupancy only. It stores entity ids per cell and the
//! reverse id -> cell mapping, so an entity is always in exactly one cell
//! or in none.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::EntityId;

/// Cell position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: u32,
    pub y: u32,
}

impl Pos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({x}, {y}) lies outside the {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    #[error("entity {0} is already placed on the grid")]
    AlreadyPlaced(EntityId),
    #[error("entity {0} is not placed on the grid")]
    NotPlaced(EntityId),
    #[error("grid dimensions {width}x{height} must be non-zero")]
    Empty { width: u32, height: u32 },
}

/// Cell grid with optional wraparound at both axes
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    torus: bool,
    cells: Vec<Vec<EntityId>>,
    positions: HashMap<EntityId, Pos>,
}

impl Grid {
    /// Toroidal grid. Both dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        Self::with_wrapping(width, height, true)
    }

    pub fn with_wrapping(width: u32, height: u32, torus: bool) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty { width, height });
        }
        Ok(Self {
            width,
            height,
            torus,
            cells: vec![Vec::new(); width as usize * height as usize],
            positions: HashMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_torus(&self) -> bool {
        self.torus
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Pos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    /// Map raw coordinates onto the grid, wrapping on a torus.
    pub fn resolve(&self, x: i64, y: i64) -> Result<Pos, GridError> {
        let (w, h) = (self.width as i64, self.height as i64);
        if self.torus {
            return Ok(Pos::new(x.rem_euclid(w) as u32, y.rem_euclid(h) as u32));
        }
        if (0..w).contains(&x) && (0..h).contains(&y) {
            Ok(Pos::new(x as u32, y as u32))
        } else {
            Err(GridError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn offset(&self, pos: Pos, dx: i64, dy: i64) -> Result<Pos, GridError> {
        self.resolve(pos.x as i64 + dx, pos.y as i64 + dy)
    }

    /// Cells at Chebyshev distance 1..=radius from `pos`, row-major.
    ///
    /// On a torus smaller than the neighbourhood a cell can be reached by
    /// more than one offset; it is reported once, and `pos` itself is never
    /// reported.
    pub fn neighbors(&self, pos: Pos, radius: u32) -> Vec<Pos> {
        let r = radius as i64;
        let mut seen = HashSet::new();
        let mut cells = Vec::with_capacity(((2 * r + 1) * (2 * r + 1) - 1).max(0) as usize);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let Ok(cell) = self.offset(pos, dx, dy) else {
                    continue;
                };
                if cell != pos && seen.insert(cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Like [`Grid::neighbors`], optionally led by `pos` itself.
    pub fn neighborhood(&self, pos: Pos, radius: u32, include_center: bool) -> Vec<Pos> {
        let mut cells = Vec::new();
        if include_center {
            cells.push(pos);
        }
        cells.extend(self.neighbors(pos, radius));
        cells
    }

    /// Shortest signed displacement from `from` to `to`.
    pub fn delta(&self, from: Pos, to: Pos) -> (i64, i64) {
        let dx = to.x as i64 - from.x as i64;
        let dy = to.y as i64 - from.y as i64;
        if !self.torus {
            return (dx, dy);
        }
        (
            shortest_wrap(dx, self.width as i64),
            shortest_wrap(dy, self.height as i64),
        )
    }

    /// Manhattan distance, measured across the seam on a torus
    pub fn manhattan(&self, a: Pos, b: Pos) -> u32 {
        let (dx, dy) = self.delta(a, b);
        (dx.unsigned_abs() + dy.unsigned_abs()) as u32
    }

    pub fn chebyshev(&self, a: Pos, b: Pos) -> u32 {
        let (dx, dy) = self.delta(a, b);
        dx.unsigned_abs().max(dy.unsigned_abs()) as u32
    }

    /// Entities in a cell, in placement order
    pub fn occupants(&self, pos: Pos) -> &[EntityId] {
        if !self.contains(pos) {
            return &[];
        }
        &self.cells[self.index(pos)]
    }

    pub fn position_of(&self, id: EntityId) -> Option<Pos> {
        self.positions.get(&id).copied()
    }

    pub fn entity_count(&self) -> usize {
        self.positions.len()
    }

    pub fn place(&mut self, id: EntityId, pos: Pos) -> Result<(), GridError> {
        if self.positions.contains_key(&id) {
            return Err(GridError::AlreadyPlaced(id));
        }
        let pos = self.resolve(pos.x as i64, pos.y as i64)?;
        let index = self.index(pos);
        self.cells[index].push(id);
        self.positions.insert(id, pos);
        Ok(())
    }

    pub fn remove(&mut self, id: EntityId) -> Result<Pos, GridError> {
        let pos = self.positions.remove(&id).ok_or(GridError::NotPlaced(id))?;
        let index = self.index(pos);
        let cell = &mut self.cells[index];
        if let Some(slot) = cell.iter().position(|occupant| *occupant == id) {
            cell.remove(slot);
        }
        Ok(pos)
    }

    /// Remove then place. The target is validated first, so a failed move
    /// leaves the entity where it was.
    pub fn move_to(&mut self, id: EntityId, pos: Pos) -> Result<(), GridError> {
        let target = self.resolve(pos.x as i64, pos.y as i64)?;
        if !self.positions.contains_key(&id) {
            return Err(GridError::NotPlaced(id));
        }
        self.remove(id)?;
        self.place(id, target)
    }

    pub fn is_empty(&self, pos: Pos) -> bool {
        self.occupants(pos).is_empty()
    }

    /// Emptiness with respect to occupants the predicate treats as blocking.
    pub fn is_empty_where(&self, pos: Pos, blocking: impl Fn(EntityId) -> bool) -> bool {
        !self.occupants(pos).iter().any(|id| blocking(*id))
    }
}

fn shortest_wrap(d: i64, span: i64) -> i64 {
    let d = d.rem_euclid(span);
    if d > span / 2 {
        d - span
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> EntityId {
        EntityId::from_raw(raw)
    }

    #[test]
    fn test_neighbors_wrap_at_origin() {
        let grid = Grid::new(10, 10).unwrap();
        let cells = grid.neighbors(Pos::new(0, 0), 1);

        assert_eq!(cells.len(), 8);
        assert!(cells.contains(&Pos::new(9, 9)));
        assert!(cells.contains(&Pos::new(9, 0)));
        assert!(cells.contains(&Pos::new(0, 9)));
        assert!(!cells.contains(&Pos::new(0, 0)));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert_eq!(
            Grid::new(0, 4).unwrap_err(),
            GridError::Empty {
                width: 0,
                height: 4
            }
        );
        assert!(Grid::with_wrapping(3, 0, false).is_err());
    }

    #[test]
    fn test_neighbors_radius_two() {
        let grid = Grid::new(10, 10).unwrap();
        let cells = grid.neighbors(Pos::new(5, 5), 2);
        assert_eq!(cells.len(), 24);
        assert!(cells.iter().all(|c| grid.chebyshev(*c, Pos::new(5, 5)) <= 2));
    }

    #[test]
    fn test_neighbors_deduplicate_on_small_torus() {
        let grid = Grid::new(3, 3).unwrap();
        let cells = grid.neighbors(Pos::new(1, 1), 3);
        assert_eq!(cells.len(), 8);
    }

    #[test]
    fn test_bounded_grid_truncates_corner() {
        let grid = Grid::with_wrapping(10, 10, false).unwrap();
        assert_eq!(grid.neighbors(Pos::new(0, 0), 1).len(), 3);
        assert!(grid.offset(Pos::new(0, 0), -1, 0).is_err());
    }

    #[test]
    fn test_distance_across_seam() {
        let grid = Grid::new(10, 10).unwrap();
        let a = Pos::new(0, 0);
        let b = Pos::new(9, 8);

        assert_eq!(grid.delta(a, b), (-1, -2));
        assert_eq!(grid.manhattan(a, b), 3);
        assert_eq!(grid.chebyshev(a, b), 2);

        let bounded = Grid::with_wrapping(10, 10, false).unwrap();
        assert_eq!(bounded.manhattan(a, b), 17);
    }

    #[test]
    fn test_move_keeps_single_cell() {
        let mut grid = Grid::new(5, 5).unwrap();
        let e = id(1);
        grid.place(e, Pos::new(1, 1)).unwrap();
        grid.move_to(e, Pos::new(2, 3)).unwrap();

        assert!(grid.is_empty(Pos::new(1, 1)));
        assert_eq!(grid.occupants(Pos::new(2, 3)), &[e]);
        assert_eq!(grid.position_of(e), Some(Pos::new(2, 3)));
        assert_eq!(grid.entity_count(), 1);
    }

    #[test]
    fn test_failed_move_leaves_entity_in_place() {
        let mut grid = Grid::with_wrapping(5, 5, false).unwrap();
        let e = id(1);
        grid.place(e, Pos::new(0, 0)).unwrap();

        let err = grid.move_to(e, Pos::new(7, 0)).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { .. }));
        assert_eq!(grid.position_of(e), Some(Pos::new(0, 0)));
    }

    #[test]
    fn test_place_twice_rejected() {
        let mut grid = Grid::new(5, 5).unwrap();
        let e = id(7);
        grid.place(e, Pos::new(0, 0)).unwrap();
        assert_eq!(grid.place(e, Pos::new(1, 0)), Err(GridError::AlreadyPlaced(e)));
        assert_eq!(grid.remove(id(8)), Err(GridError::NotPlaced(id(8))));
    }

    #[test]
    fn test_multi_occupancy_and_filtered_emptiness() {
        let mut grid = Grid::new(5, 5).unwrap();
        let cell = Pos::new(2, 2);
        grid.place(id(1), cell).unwrap();
        grid.place(id(2), cell).unwrap();

        assert_eq!(grid.occupants(cell), &[id(1), id(2)]);
        assert!(!grid.is_empty(cell));
        assert!(grid.is_empty_where(cell, |e| e == id(3)));
        assert!(!grid.is_empty_where(cell, |e| e == id(2)));

        grid.remove(id(1)).unwrap();
        assert_eq!(grid.occupants(cell), &[id(2)]);
    }
}
