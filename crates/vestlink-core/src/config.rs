use crate::link::radio::PairedDevices;

/// Static per-device configuration, assigned at setup.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub player_id: u8,
    pub team_id: u8,
    /// Health ceiling; `give-health` and respawns cap here.
    pub max_health: u8,
    pub magazine_size: u8,
    /// Reserve ammunition ceiling.
    pub max_bullets: u16,
    /// Radio peer name of the vest, resolved against `paired`.
    pub vest_peer: String,
    pub paired: PairedDevices,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_id: 1,
            team_id: 0,
            max_health: 100,
            magazine_size: 12,
            max_bullets: 120,
            vest_peer: "LaserVest".to_string(),
            paired: PairedDevices::new(),
        }
    }
}
