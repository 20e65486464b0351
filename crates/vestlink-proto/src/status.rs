use serde::{Deserialize, Serialize};
use strum::FromRepr;

/// Game-wide status derived from connectivity and player state.
///
/// This is never stored as independently mutated truth; it is recomputed
/// after every event from the three inputs of [`GameStatus::derive`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRepr)]
pub enum GameStatus {
    Offline = 0,
    Idle = 1,
    Dead = 2,
    Running = 3,
}

impl GameStatus {
    /// Pure transition function. Server reachability dominates, then the
    /// game-running flag, then whether this player is alive.
    pub fn derive(server_online: bool, game_running: bool, player_alive: bool) -> Self {
        if !server_online {
            Self::Offline
        } else if !game_running {
            Self::Idle
        } else if !player_alive {
            Self::Dead
        } else {
            Self::Running
        }
    }
}
