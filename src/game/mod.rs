//! Game simulation modules

pub mod collision;
pub mod frame;
pub mod mirror;
pub mod path;
pub mod registry;
pub mod session;
pub mod snacks;
pub mod snake;
pub mod types;

pub use session::{GameSession, SessionHandle, SessionPhase, SessionRegistry};

use crate::ws::protocol::ClientMsg;
use types::SnakeId;

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub snake_id: SnakeId,
    pub msg: ClientMsg,
    pub received_at: u64,
}
