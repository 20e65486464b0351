//! Typed wireless messages.
//!
//! Device-link messages carry a fixed byte layout (see [`crate::wire`]).
//! Server-link messages are delivered as typed values by the server
//! transport; they derive `serde` so transport implementations can pick
//! their own encoding. Roster snapshots never cross the device link.

use serde::{Deserialize, Serialize};
use strum::FromRepr;

use crate::{opcode::Opcode, player::Player, status::GameStatus, wire::DeviceWire};

/// Tag identifying which physical or simulated device a transport serves.
/// Carried as the value byte of connect/disconnect events.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum DeviceKind {
    Gun = 1,
    Vest = 2,
    Debug = 3,
}

/// The generic 2-byte event: opcode plus one payload byte.
///
/// The opcode stays raw so unknown-but-well-formed opcodes can flow through
/// the default forwarding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub opcode: u8,
    pub value: u8,
}

impl EventMessage {
    pub fn new(opcode: Opcode, value: u8) -> Self {
        Self {
            opcode: opcode as u8,
            value,
        }
    }

    /// Interpret the opcode, if it is a known one.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_repr(self.opcode)
    }
}

impl DeviceWire for EventMessage {
    fn opcode_byte(&self) -> u8 {
        self.opcode
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode);
        out.push(self.value);
    }
}

/// Keepalive reply, answered in-kind on the link a ping arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat;

impl DeviceWire for Heartbeat {
    fn opcode_byte(&self) -> u8 {
        Opcode::Ping as u8
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(Opcode::Ping as u8);
        out.push(0);
    }
}

/// Game-start announcement from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStart {
    pub team_play: bool,
    pub duration_minutes: u8,
}

/// Periodic roster/clock snapshot from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub game_running: bool,
    pub team_play: bool,
    pub timer_seconds: u16,
    pub players: Vec<Player>,
}

/// Countdown readout pushed to the UI once per second while the game runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockMessage {
    pub minutes: u8,
    pub seconds: u8,
}

/// Outbound state push to the vest.
///
/// Wire form (5 payload bytes): `[opcode, player_id, team_id, status,
/// bullets_in_magazine]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStateMessage {
    pub player_id: u8,
    pub team_id: u8,
    pub status: GameStatus,
    pub bullets_in_magazine: u8,
}

impl DeviceWire for PlayerStateMessage {
    fn opcode_byte(&self) -> u8 {
        Opcode::PlayerState as u8
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(Opcode::PlayerState as u8);
        out.push(self.player_id);
        out.push(self.team_id);
        out.push(self.status as u8);
        out.push(self.bullets_in_magazine);
    }
}

/// Event forwarded to the game server, carrying this player's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventToServer {
    pub opcode: u8,
    pub player_id: u8,
    pub value: u8,
    pub health: u8,
}

impl EventToServer {
    pub fn new(opcode: u8, player: &Player, value: u8) -> Self {
        Self {
            opcode,
            player_id: player.id,
            value,
            health: player.health,
        }
    }
}

/// Everything the server link can deliver to the event loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Pure keepalive; never surfaces as an application event.
    Heartbeat,
    Event(EventMessage),
    GameStart(GameStart),
    Snapshot(RosterSnapshot),
    /// Raw device-frame payload to re-inject into the debug loopback.
    MockDeviceEvent(Vec<u8>),
}
