//! Grid primitives shared by the simulation and the store

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cell on the infinite integer plane. North is towards negative `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This coordinate shifted `steps` cells along `direction`
    pub fn stepped(self, direction: Direction, steps: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x.saturating_add(dx.saturating_mul(steps)),
            y: self.y.saturating_add(dy.saturating_mul(steps)),
        }
    }

    /// This coordinate moved a single cell towards `target` along the shared axis.
    /// Pairs that share neither axis are walked along x.
    pub fn toward(self, target: Coord) -> Self {
        if self.x == target.x {
            Self {
                x: self.x,
                y: self.y + (target.y - self.y).signum(),
            }
        } else {
            Self {
                x: self.x + (target.x - self.x).signum(),
                y: self.y,
            }
        }
    }

    /// True if the two cells share a row or a column
    pub fn is_aligned_with(self, other: Coord) -> bool {
        self.x == other.x || self.y == other.y
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Heading of a snake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    /// True if turning from `self` to `other` is a quarter turn
    pub fn is_orthogonal_to(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::North | Direction::South, Direction::East | Direction::West)
                | (Direction::East | Direction::West, Direction::North | Direction::South)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "NORTH",
            Direction::South => "SOUTH",
            Direction::East => "EAST",
            Direction::West => "WEST",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not NORTH, EAST, SOUTH, or WEST")]
pub struct DirectionError(pub String);

impl FromStr for Direction {
    type Err = DirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORTH" => Ok(Direction::North),
            "SOUTH" => Ok(Direction::South),
            "EAST" => Ok(Direction::East),
            "WEST" => Ok(Direction::West),
            _ => Err(DirectionError(s.to_string())),
        }
    }
}

/// Identity of a snake, used as its key in the shared store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnakeId(String);

impl SnakeId {
    /// Fresh process-wide unique identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SnakeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SnakeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SnakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque key of a snack in the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnackId(Uuid);

impl SnackId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SnackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn north_is_negative_y() {
        assert_eq!(Coord::ORIGIN.stepped(Direction::North, 3), Coord::new(0, -3));
        assert_eq!(Coord::ORIGIN.stepped(Direction::West, 2), Coord::new(-2, 0));
    }

    #[test]
    fn long_steps_clamp_at_the_edge_of_the_plane() {
        let edge = Coord::new(i32::MAX - 1, i32::MIN + 1);
        assert_eq!(edge.stepped(Direction::East, i32::MAX), Coord::new(i32::MAX, i32::MIN + 1));
        assert_eq!(edge.stepped(Direction::North, i32::MAX), Coord::new(i32::MAX - 1, i32::MIN));
    }

    #[test]
    fn default_direction_is_north() {
        assert_eq!(Direction::default(), Direction::North);
    }

    #[test]
    fn reversal_is_not_orthogonal() {
        assert!(!Direction::North.is_orthogonal_to(Direction::South));
        assert!(!Direction::North.is_orthogonal_to(Direction::North));
        assert!(Direction::North.is_orthogonal_to(Direction::East));
        assert!(Direction::West.is_orthogonal_to(Direction::South));
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("east".parse::<Direction>(), Ok(Direction::East));
        assert_eq!(" NORTH ".parse::<Direction>(), Ok(Direction::North));
        assert!("UP".parse::<Direction>().is_err());
    }

    #[test]
    fn direction_serializes_uppercase() {
        let json = serde_json::to_string(&Direction::South).unwrap();
        assert_eq!(json, "\"SOUTH\"");
    }

    #[test]
    fn toward_moves_one_cell_on_shared_axis() {
        assert_eq!(Coord::new(0, 5).toward(Coord::new(0, 0)), Coord::new(0, 4));
        assert_eq!(Coord::new(-3, 2).toward(Coord::new(4, 2)), Coord::new(-2, 2));
    }
}
