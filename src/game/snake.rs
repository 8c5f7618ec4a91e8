//! The locally controlled snake
//!
//! The snake mutates its inflection points in place and pushes every change to
//! the shared store. Steady-state movement only rewrites the head and tail
//! points; the whole list is republished only when a turn adds a corner.

use tracing::{debug, warn};

use crate::store::{DisconnectHook, SharedStore};

use super::path::{InflectionPath, PathError, SnakeView};
use super::types::{Coord, Direction, SnakeId};

pub struct LocalSnake {
    id: SnakeId,
    path: InflectionPath,
    direction: Direction,
    pending_direction: Direction,
    /// Occupied cells, kept in step with the path without re-expanding it
    length: usize,
    /// Units of growth not yet materialised
    growth: u32,
    store: SharedStore,
    disconnect: DisconnectHook,
}

impl LocalSnake {
    /// Create the snake and publish its initial path.
    ///
    /// An empty `points` list starts a single-cell snake at the origin.
    pub fn new(
        id: SnakeId,
        points: Vec<Coord>,
        direction: Direction,
        store: SharedStore,
    ) -> Result<Self, PathError> {
        let path = InflectionPath::new(points)?;
        let length = path.len();

        store.set_path(&id, path.points().to_vec());
        let disconnect = store.on_disconnect_remove(&id);

        debug!(snake_id = %id, length, %direction, "Local snake created");

        Ok(Self {
            id,
            path,
            direction,
            pending_direction: direction,
            length,
            growth: 0,
            store,
            disconnect,
        })
    }

    pub fn id(&self) -> &SnakeId {
        &self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn pending_direction(&self) -> Direction {
        self.pending_direction
    }

    pub fn pending_growth(&self) -> u32 {
        self.growth
    }

    pub fn points(&self) -> &[Coord] {
        self.path.points()
    }

    fn head_cell(&self) -> Coord {
        self.path.head().unwrap_or(Coord::ORIGIN)
    }

    /// Request a turn for the next move. Only quarter turns relative to the
    /// committed direction are accepted. Returns the direction the next move
    /// will use.
    pub fn set_direction(&mut self, direction: Direction) -> Direction {
        if self.direction.is_orthogonal_to(direction) {
            self.pending_direction = direction;
        }
        self.pending_direction
    }

    /// Queue `units` of growth. Returns the eventual length.
    pub fn grow(&mut self, units: u32) -> usize {
        self.growth = self.growth.saturating_add(units);
        self.length + self.growth as usize
    }

    /// Move the head `steps` cells and drag the tail behind it.
    ///
    /// Each step first spends a unit of pending growth if there is one, and
    /// only otherwise retracts the tail. Returns the new head.
    pub fn advance(&mut self, steps: u32) -> Coord {
        let head = self.head_cell();
        if steps == 0 {
            return head;
        }
        let steps = steps.min(i32::MAX as u32);

        let turned = self.direction != self.pending_direction;
        self.direction = self.pending_direction;
        if turned {
            self.path.insert_point(0, head);
            self.publish_path();
        }

        let new_head = head.stepped(self.direction, steps as i32);
        self.path.set_point(0, new_head);
        self.publish_point(0, new_head);

        let mut remaining = steps;
        if self.path.point_count() == 1 {
            if self.growth == 0 {
                return new_head;
            }
            // the old head becomes the tail tip
            self.path.push_point(head);
            self.publish_point(1, head);
            self.growth -= 1;
            self.length += 1;
            remaining -= 1;
        }

        for _ in 0..remaining {
            if self.growth > 0 {
                self.growth -= 1;
                self.length += 1;
                continue;
            }
            self.retract_tail();
        }

        new_head
    }

    fn retract_tail(&mut self) {
        let count = self.path.point_count();
        if count < 2 {
            return;
        }
        let last = count - 1;
        let points = self.path.points();
        let corner = points[last - 1];
        let tail = points[last].toward(corner);

        self.path.set_point(last, tail);
        self.publish_point(last, tail);

        // tail reached the corner
        if tail == corner {
            self.path.pop_point();
            self.publish_removal(last);
        }
    }

    /// Remove this snake's store entry now. Further moves stay local.
    pub fn release(&mut self) -> bool {
        self.disconnect.fire()
    }

    pub fn is_published(&self) -> bool {
        self.disconnect.is_armed()
    }

    fn publish_path(&self) {
        if self.is_published() {
            self.store.set_path(&self.id, self.path.points().to_vec());
        }
    }

    fn publish_point(&self, index: usize, point: Coord) {
        if !self.is_published() {
            return;
        }
        if let Err(e) = self.store.set_point(&self.id, index, point) {
            warn!(snake_id = %self.id, error = %e, "Failed to publish point");
        }
    }

    fn publish_removal(&self, index: usize) {
        if !self.is_published() {
            return;
        }
        if let Err(e) = self.store.remove_point(&self.id, index) {
            warn!(snake_id = %self.id, error = %e, "Failed to publish point removal");
        }
    }
}

impl SnakeView for LocalSnake {
    fn head(&self) -> Option<Coord> {
        self.path.head()
    }

    fn length(&self) -> usize {
        self.length
    }

    fn coords(&self) -> &[Coord] {
        self.path.cells()
    }

    fn occupies(&self, cell: Coord, include_head: bool) -> bool {
        self.path.occupies(cell, include_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PathEvent;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn snake_at(points: &[(i32, i32)], direction: Direction) -> (LocalSnake, SharedStore) {
        let store = SharedStore::default();
        let points = points.iter().map(|&(x, y)| Coord::new(x, y)).collect();
        let snake = LocalSnake::new(SnakeId::from("local"), points, direction, store.clone()).unwrap();
        (snake, store)
    }

    #[test]
    fn construction_publishes_initial_path() {
        let (snake, store) = snake_at(&[(2, 2), (2, 4)], Direction::North);
        assert_eq!(store.path(snake.id()), Some(vec![Coord::new(2, 2), Coord::new(2, 4)]));
        assert_eq!(snake.length(), 3);
    }

    #[test]
    fn diagonal_start_is_rejected() {
        let store = SharedStore::default();
        let result = LocalSnake::new(
            SnakeId::from("bad"),
            vec![Coord::new(0, 0), Coord::new(3, 3)],
            Direction::North,
            store.clone(),
        );
        assert!(result.is_err());
        assert_eq!(store.path(&SnakeId::from("bad")), None);
    }

    #[test]
    fn reversal_is_ignored() {
        let (mut snake, _store) = snake_at(&[], Direction::North);
        assert_eq!(snake.set_direction(Direction::South), Direction::North);
        assert_eq!(snake.set_direction(Direction::East), Direction::East);
    }

    #[test]
    fn requests_are_checked_against_committed_direction() {
        let (mut snake, _store) = snake_at(&[], Direction::North);
        assert_eq!(snake.set_direction(Direction::East), Direction::East);
        // still orthogonal to NORTH, so the re-press wins
        assert_eq!(snake.set_direction(Direction::West), Direction::West);
        assert_eq!(snake.set_direction(Direction::South), Direction::West);
        assert_eq!(snake.direction(), Direction::North);

        snake.advance(1);
        assert_eq!(snake.direction(), Direction::West);
        assert_eq!(snake.set_direction(Direction::East), Direction::West);
    }

    #[test]
    fn growth_is_deferred_until_movement() {
        let (mut snake, _store) = snake_at(&[], Direction::North);
        assert_eq!(snake.grow(3), 4);
        assert_eq!(snake.length(), 1);

        snake.advance(1);
        snake.advance(1);
        assert_eq!(snake.length(), 3);
        assert_eq!(snake.pending_growth(), 1);

        snake.advance(1);
        assert_eq!(snake.length(), 4);
        snake.advance(1);
        assert_eq!(snake.length(), 4);
        assert_eq!(snake.coords().len(), 4);
    }

    #[test]
    fn zero_units_and_steps_are_noops() {
        let (mut snake, store) = snake_at(&[(0, 0), (0, 2)], Direction::North);
        assert_eq!(snake.grow(0), 3);
        assert_eq!(snake.advance(0), Coord::new(0, 0));
        assert_eq!(snake.points(), &[Coord::new(0, 0), Coord::new(0, 2)]);
        assert_eq!(store.path(snake.id()), Some(snake.points().to_vec()));
    }

    #[test]
    fn tail_follows_head_on_straight_run() {
        let (mut snake, store) = snake_at(&[(0, 0), (0, 5)], Direction::North);
        assert_eq!(snake.length(), 6);

        let head = snake.advance(1);
        assert_eq!(head, Coord::new(0, -1));
        assert_eq!(snake.points(), &[Coord::new(0, -1), Coord::new(0, 4)]);
        assert_eq!(snake.length(), 6);
        assert_eq!(snake.coords().len(), 6);
        assert_eq!(store.path(snake.id()), Some(snake.points().to_vec()));
    }

    #[test]
    fn turning_inserts_corner_at_previous_head() {
        let (mut snake, store) = snake_at(&[], Direction::North);
        snake.grow(2);
        snake.advance(1);
        assert_eq!(snake.points(), &[Coord::new(0, -1), Coord::new(0, 0)]);

        snake.set_direction(Direction::East);
        snake.advance(1);
        assert_eq!(
            snake.points(),
            &[Coord::new(1, -1), Coord::new(0, -1), Coord::new(0, 0)]
        );
        assert_eq!(snake.length(), 3);
        assert_eq!(store.path(snake.id()), Some(snake.points().to_vec()));
    }

    #[test]
    fn tail_drops_corner_once_it_passes() {
        let (mut snake, store) = snake_at(&[], Direction::North);
        snake.grow(1);
        snake.advance(1);
        snake.set_direction(Direction::East);
        snake.advance(1);
        assert_eq!(snake.points(), &[Coord::new(1, -1), Coord::new(0, -1)]);
        assert_eq!(snake.length(), 2);
        assert_eq!(store.path(snake.id()), Some(snake.points().to_vec()));
    }

    #[test]
    fn single_cell_turn_without_growth_relocates() {
        let (mut snake, _store) = snake_at(&[], Direction::North);
        snake.set_direction(Direction::East);
        assert_eq!(snake.advance(1), Coord::new(1, 0));
        assert_eq!(snake.points(), &[Coord::new(1, 0)]);
        assert_eq!(snake.length(), 1);
    }

    #[test]
    fn multi_step_move_keeps_length_in_sync() {
        let (mut snake, _store) = snake_at(&[], Direction::North);
        snake.grow(1);
        assert_eq!(snake.advance(3), Coord::new(0, -3));
        assert_eq!(snake.length(), 2);
        assert_eq!(snake.coords(), &[Coord::new(0, -3), Coord::new(0, -2)]);

        snake.grow(5);
        snake.advance(2);
        assert_eq!(snake.length(), 4);
        assert_eq!(snake.coords().len(), 4);
    }

    #[test]
    fn random_walk_keeps_cached_length_exact() {
        let (mut snake, store) = snake_at(&[], Direction::North);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let dirs = [Direction::North, Direction::East, Direction::South, Direction::West];

        for _ in 0..500 {
            if rng.gen_bool(0.3) {
                snake.set_direction(dirs[rng.gen_range(0..4)]);
            }
            if rng.gen_bool(0.1) {
                snake.grow(rng.gen_range(1..4));
            }
            snake.advance(rng.gen_range(1..3));
            assert_eq!(snake.length(), snake.coords().len());
            assert_eq!(store.path(snake.id()).as_deref(), Some(snake.points()));
        }
    }

    fn events(sub: &mut crate::store::PathFeed) -> Vec<PathEvent> {
        let mut out = Vec::new();
        while let Ok(event) = sub.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn straight_move_publishes_only_head_and_tail() {
        let (mut snake, store) = snake_at(&[(0, 0), (0, 5)], Direction::North);
        let mut sub = store.subscribe_path(snake.id());

        snake.advance(1);
        assert_eq!(
            events(&mut sub.events),
            vec![
                PathEvent::PointChanged { index: 0, point: Coord::new(0, -1) },
                PathEvent::PointChanged { index: 1, point: Coord::new(0, 4) },
            ]
        );
    }

    #[test]
    fn turn_republishes_whole_path_first() {
        let (mut snake, store) = snake_at(&[(0, 0), (0, 5)], Direction::North);
        let mut sub = store.subscribe_path(snake.id());

        snake.set_direction(Direction::East);
        snake.advance(1);
        assert_eq!(
            events(&mut sub.events),
            vec![
                PathEvent::Value(Some(vec![
                    Coord::new(0, 0),
                    Coord::new(0, 0),
                    Coord::new(0, 5)
                ])),
                PathEvent::PointChanged { index: 0, point: Coord::new(1, 0) },
                PathEvent::PointChanged { index: 2, point: Coord::new(0, 4) },
            ]
        );
    }

    #[test]
    fn tail_passing_a_corner_publishes_removal() {
        let (mut snake, store) = snake_at(&[], Direction::North);
        snake.grow(1);
        snake.advance(1);
        let mut sub = store.subscribe_path(snake.id());

        snake.set_direction(Direction::East);
        snake.advance(1);
        let published = events(&mut sub.events);
        assert_eq!(
            published.last(),
            Some(&PathEvent::PointRemoved { index: 2 })
        );
        assert_eq!(
            published[published.len() - 2],
            PathEvent::PointChanged { index: 2, point: Coord::new(0, -1) }
        );
    }

    #[test]
    fn release_removes_entry_and_stops_publishing() {
        let (mut snake, store) = snake_at(&[], Direction::North);
        assert!(snake.release());
        assert_eq!(store.path(snake.id()), None);

        snake.advance(1);
        assert_eq!(store.path(snake.id()), None);
        assert!(!snake.release());
    }
}
