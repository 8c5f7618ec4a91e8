//! Turn-point compression of a snake's body
//!
//! A snake is stored as its inflection points, head first: the head, every
//! corner, and the tail tip. Consecutive points always share a row or column,
//! so the full body can be recovered by walking each straight run. The network
//! payload is therefore O(turns) instead of O(length).

use std::cell::OnceCell;

use super::types::Coord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("inflection points {from} and {to} at index {index} do not share a row or column")]
    DiagonalSegment { index: usize, from: Coord, to: Coord },
}

/// Read access shared by locally controlled snakes and remote mirrors
pub trait SnakeView {
    /// Head cell, `None` for an empty mirror
    fn head(&self) -> Option<Coord>;

    /// Number of occupied cells
    fn length(&self) -> usize;

    /// Every occupied cell, head to tail
    fn coords(&self) -> &[Coord];

    /// True if the snake covers `cell`; `include_head = false` skips the head
    fn occupies(&self, cell: Coord, include_head: bool) -> bool;
}

/// Ordered inflection points with a lazily expanded cell list
#[derive(Debug, Clone, Default)]
pub struct InflectionPath {
    points: Vec<Coord>,
    cells: OnceCell<Vec<Coord>>,
}

impl InflectionPath {
    /// Build a path from caller supplied points.
    ///
    /// An empty list becomes a single-cell snake at the origin. Points that
    /// would form a diagonal run are rejected.
    pub fn new(points: Vec<Coord>) -> Result<Self, PathError> {
        if points.is_empty() {
            return Ok(Self::from_points(vec![Coord::ORIGIN]));
        }
        for (index, pair) in points.windows(2).enumerate() {
            if !pair[0].is_aligned_with(pair[1]) {
                return Err(PathError::DiagonalSegment {
                    index,
                    from: pair[0],
                    to: pair[1],
                });
            }
        }
        Ok(Self::from_points(points))
    }

    /// Build a path without validation. Mirrors use this since they may
    /// briefly hold a structurally invalid list between notifications.
    pub fn from_points(points: Vec<Coord>) -> Self {
        Self {
            points,
            cells: OnceCell::new(),
        }
    }

    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn head(&self) -> Option<Coord> {
        self.points.first().copied()
    }

    pub fn last_point(&self) -> Option<Coord> {
        self.points.last().copied()
    }

    /// Cached expansion, head to tail
    pub fn cells(&self) -> &[Coord] {
        self.cells.get_or_init(|| expand(&self.points))
    }

    /// Occupied cell count
    pub fn len(&self) -> usize {
        self.cells().len()
    }

    pub fn occupies(&self, cell: Coord, include_head: bool) -> bool {
        let skip = if include_head { 0 } else { 1 };
        self.cells().iter().skip(skip).any(|c| *c == cell)
    }

    /// Overwrite the point at `index`. Returns false if out of range.
    pub fn set_point(&mut self, index: usize, point: Coord) -> bool {
        match self.points.get_mut(index) {
            Some(slot) => {
                *slot = point;
                self.cells.take();
                true
            }
            None => false,
        }
    }

    /// Insert at `index` (which may equal the point count). Returns false if out of range.
    pub fn insert_point(&mut self, index: usize, point: Coord) -> bool {
        if index > self.points.len() {
            return false;
        }
        self.points.insert(index, point);
        self.cells.take();
        true
    }

    pub fn remove_point(&mut self, index: usize) -> Option<Coord> {
        if index >= self.points.len() {
            return None;
        }
        self.cells.take();
        Some(self.points.remove(index))
    }

    pub fn push_point(&mut self, point: Coord) {
        self.points.push(point);
        self.cells.take();
    }

    pub fn pop_point(&mut self) -> Option<Coord> {
        self.cells.take();
        self.points.pop()
    }

    pub fn replace(&mut self, points: Vec<Coord>) {
        self.points = points;
        self.cells.take();
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }
}

impl PartialEq for InflectionPath {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

impl Eq for InflectionPath {}

/// Walk every straight run between consecutive inflection points
fn expand(points: &[Coord]) -> Vec<Coord> {
    let Some(last) = points.last() else {
        return Vec::new();
    };

    let mut cells = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        // collapsed corner
        if from == to {
            continue;
        }
        let mut cell = from;
        while cell != to {
            cells.push(cell);
            let next = cell.toward(to);
            if next == cell {
                break;
            }
            cell = next;
        }
    }
    cells.push(*last);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(points: &[(i32, i32)]) -> InflectionPath {
        InflectionPath::new(points.iter().map(|&(x, y)| Coord::new(x, y)).collect()).unwrap()
    }

    fn assert_connected(cells: &[Coord]) {
        for pair in cells.windows(2) {
            let manhattan = (pair[0].x - pair[1].x).abs() + (pair[0].y - pair[1].y).abs();
            assert_eq!(manhattan, 1, "gap between {} and {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn empty_list_becomes_origin() {
        let p = InflectionPath::new(Vec::new()).unwrap();
        assert_eq!(p.points(), &[Coord::ORIGIN]);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn straight_run_expands_head_first() {
        let p = path(&[(0, 0), (0, 5)]);
        let cells = p.cells();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], Coord::new(0, 0));
        assert_eq!(cells[5], Coord::new(0, 5));
        assert_connected(cells);
    }

    #[test]
    fn corners_expand_without_duplicates() {
        let p = path(&[(3, -2), (0, -2), (0, 2), (-4, 2)]);
        let cells = p.cells();
        assert_eq!(cells.len(), 3 + 4 + 4 + 1);
        assert_eq!(p.len(), cells.len());
        assert_connected(cells);

        let mut unique = cells.to_vec();
        unique.sort_by_key(|c| (c.x, c.y));
        unique.dedup();
        assert_eq!(unique.len(), cells.len());
    }

    #[test]
    fn duplicate_adjacent_points_contribute_nothing() {
        let with_dup = path(&[(2, 0), (0, 0), (0, 0), (0, 3)]);
        let without = path(&[(2, 0), (0, 0), (0, 3)]);
        assert_eq!(with_dup.cells(), without.cells());

        let collapsed = path(&[(4, 4), (4, 4)]);
        assert_eq!(collapsed.cells(), vec![Coord::new(4, 4)]);
    }

    #[test]
    fn empty_path_has_no_cells() {
        let p = InflectionPath::default();
        assert!(p.cells().is_empty());
        assert_eq!(p.len(), 0);
        assert_eq!(p.head(), None);
        assert!(!p.occupies(Coord::ORIGIN, true));
    }

    #[test]
    fn diagonal_points_are_rejected() {
        let err = InflectionPath::new(vec![Coord::new(0, 0), Coord::new(1, 1)]).unwrap_err();
        assert!(matches!(err, PathError::DiagonalSegment { index: 0, .. }));
    }

    #[test]
    fn occupies_can_skip_the_head() {
        let p = path(&[(0, 0), (0, 2)]);
        assert!(p.occupies(Coord::new(0, 0), true));
        assert!(!p.occupies(Coord::new(0, 0), false));
        assert!(p.occupies(Coord::new(0, 1), false));
        assert!(!p.occupies(Coord::new(1, 1), true));
    }

    #[test]
    fn mutation_invalidates_cached_cells() {
        let mut p = path(&[(0, 0), (0, 2)]);
        assert_eq!(p.len(), 3);
        assert!(p.set_point(1, Coord::new(0, 4)));
        assert_eq!(p.len(), 5);
        assert!(p.insert_point(0, Coord::new(2, 0)));
        assert_eq!(p.len(), 7);
        assert_eq!(p.remove_point(0), Some(Coord::new(2, 0)));
        assert_eq!(p.len(), 5);
        assert!(!p.set_point(9, Coord::ORIGIN));
        assert!(!p.insert_point(9, Coord::ORIGIN));
    }
}
