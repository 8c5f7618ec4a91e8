//! Head-on-body collision checks over the snake read interface

use serde::{Deserialize, Serialize};

use super::path::SnakeView;
use super::types::{Coord, SnakeId};

/// What ended a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Collision {
    /// Head ran into the player's own body
    OwnBody,
    /// Head ran into any cell of another snake, head included
    Opponent { snake_id: SnakeId },
}

impl Collision {
    pub fn cause(&self) -> &'static str {
        match self {
            Collision::OwnBody => "self",
            Collision::Opponent { .. } => "opponent",
        }
    }
}

/// Collision rules for a freshly moved head
pub struct CollisionEngine;

impl CollisionEngine {
    /// Head overlaps one of the snake's own non-head cells
    pub fn hits_self(head: Coord, player: &impl SnakeView) -> bool {
        player.occupies(head, false)
    }

    /// First opponent with any cell under `head`
    pub fn hit_opponent<'a, V>(
        head: Coord,
        opponents: impl IntoIterator<Item = (&'a SnakeId, &'a V)>,
    ) -> Option<&'a SnakeId>
    where
        V: SnakeView + 'a,
    {
        opponents
            .into_iter()
            .find(|(_, snake)| snake.occupies(head, true))
            .map(|(id, _)| id)
    }

    /// Self-collision first, then opponents
    pub fn evaluate<'a, V>(
        head: Coord,
        player: &impl SnakeView,
        opponents: impl IntoIterator<Item = (&'a SnakeId, &'a V)>,
    ) -> Option<Collision>
    where
        V: SnakeView + 'a,
    {
        if Self::hits_self(head, player) {
            return Some(Collision::OwnBody);
        }
        Self::hit_opponent(head, opponents).map(|id| Collision::Opponent {
            snake_id: id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::path::InflectionPath;

    /// Fixed body for injecting positions a real snake could not reach in one move
    struct Pinned(InflectionPath);

    impl Pinned {
        fn new(points: &[(i32, i32)]) -> Self {
            Self(InflectionPath::from_points(
                points.iter().map(|&(x, y)| Coord::new(x, y)).collect(),
            ))
        }
    }

    impl SnakeView for Pinned {
        fn head(&self) -> Option<Coord> {
            self.0.head()
        }
        fn length(&self) -> usize {
            self.0.len()
        }
        fn coords(&self) -> &[Coord] {
            self.0.cells()
        }
        fn occupies(&self, cell: Coord, include_head: bool) -> bool {
            self.0.occupies(cell, include_head)
        }
    }

    #[test]
    fn head_on_own_body_is_detected() {
        // body {(0,0),(0,1),(0,2)} with the head forced back onto (0,1)
        let player = Pinned::new(&[(0, 1), (0, 0), (0, 2)]);
        let none: Vec<(&SnakeId, &Pinned)> = Vec::new();
        assert_eq!(
            CollisionEngine::evaluate(Coord::new(0, 1), &player, none),
            Some(Collision::OwnBody)
        );
    }

    #[test]
    fn head_alone_is_not_a_collision() {
        let player = Pinned::new(&[(0, -1), (0, 2)]);
        assert!(!CollisionEngine::hits_self(Coord::new(0, -1), &player));
    }

    #[test]
    fn opponent_head_counts() {
        let player = Pinned::new(&[(5, 5)]);
        let id = SnakeId::from("rival");
        let rival = Pinned::new(&[(5, 5), (8, 5)]);
        let result = CollisionEngine::evaluate(Coord::new(5, 5), &player, [(&id, &rival)]);
        // own head is excluded, rival's head is not
        assert_eq!(result, Some(Collision::Opponent { snake_id: id }));
    }

    #[test]
    fn opponent_body_counts_and_misses_pass() {
        let a = SnakeId::from("a");
        let b = SnakeId::from("b");
        let snake_a = Pinned::new(&[(0, 0), (0, 4)]);
        let snake_b = Pinned::new(&[(3, 3), (6, 3)]);
        let opponents = [(&a, &snake_a), (&b, &snake_b)];

        assert_eq!(CollisionEngine::hit_opponent(Coord::new(5, 3), opponents), Some(&b));
        assert_eq!(CollisionEngine::hit_opponent(Coord::new(1, 1), opponents), None);
    }
}
