use strum::FromRepr;

/// Opcode space shared by the device and server protocols.
///
/// The opcode travels as the first byte of a device frame and as the tag of
/// server events. Messages keep the raw `u8` so unknown-but-well-formed
/// opcodes still flow through the default forwarding rules; use
/// [`Opcode::from_repr`] to interpret known values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum Opcode {
    /// Keepalive. Answered on the link it arrived on, never surfaced.
    Ping = 1,

    // Device-originated events.
    GunShot = 10,
    GunReload = 11,
    GotHit = 12,
    Respawn = 13,
    GotHealth = 14,
    GotAmmo = 15,

    // Remap targets produced by reconciliation, never sent by hardware.
    GunNoBullets = 20,
    RespawnPointWrong = 21,
    YouKilled = 22,

    // Synthesized by the transport layer; the value byte carries the
    // device kind.
    DeviceConnected = 30,
    DeviceDisconnected = 31,

    // Server-originated events.
    YouHitSomeone = 40,
    GameOver = 41,
    GameStart = 42,
    YouScored = 43,
    GiveHealth = 44,
    GiveAmmo = 45,
    Snapshot = 46,
    GameTimer = 47,
    MockDeviceEvent = 48,

    // Outbound to the device.
    PlayerState = 50,
}
