//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::collision::Collision;
use crate::game::snacks::Bounds;
use crate::game::types::{Coord, Direction, SnakeId};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Steer the player's snake; applied on the next tick
    SetDirection { direction: Direction },

    /// Region this client wants replacement snacks placed in, usually its viewport
    SetBounds { min: Coord, max: Coord },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// End the session
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        snake_id: SnakeId,
        server_time: u64,
        /// Simulation ticks per second
        tick_rate: u32,
        /// Region snacks spawn in
        bounds: Bounds,
    },

    /// Everything needed to draw one frame
    Frame {
        tick: u64,
        /// Local snake, head first
        player: Vec<Coord>,
        /// Each active opponent, head first
        opponents: Vec<Vec<Coord>>,
        /// Showcase snakes drawn in the background
        showcase: Vec<Vec<Coord>>,
        snacks: Vec<Coord>,
        /// One length per snake, local player first
        scores: Vec<usize>,
        playing: bool,
    },

    /// The player's snake crashed
    SessionEnded {
        tick: u64,
        cause: Collision,
        score: usize,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_direction_parses_from_json() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"set_direction","direction":"EAST"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::SetDirection { direction: Direction::East }));
    }

    #[test]
    fn set_bounds_parses_corners() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"set_bounds","min":{"x":-5,"y":-4},"max":{"x":5,"y":4}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMsg::SetBounds { min, max } if min == Coord::new(-5, -4) && max == Coord::new(5, 4)
        ));
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let msg = serde_json::from_str::<ClientMsg>(r#"{"type":"set_direction","direction":"UP"}"#);
        assert!(msg.is_err());
    }

    #[test]
    fn session_end_carries_cause() {
        let msg = ServerMsg::SessionEnded {
            tick: 9,
            cause: Collision::Opponent {
                snake_id: SnakeId::from("rival"),
            },
            score: 4,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "session_ended");
        assert_eq!(json["cause"]["kind"], "opponent");
        assert_eq!(json["cause"]["snake_id"], "rival");
    }
}
