use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One player's combat state.
///
/// The local instance ("this device's player") is created at startup and only
/// ever mutated inside the event loop's consumer context. Roster entries are
/// copies of other players' public stats merged from server snapshots; their
/// magazine and reserve counts are private to the owning device and never
/// carried by a snapshot merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: u8,
    pub name: String,
    pub team_id: u8,
    pub health: u8,
    pub score: u16,
    /// Damage this player inflicts per hit.
    pub damage: u8,
    pub bullets_in_magazine: u8,
    pub bullets_total: u16,
    pub bullets_max: u16,
    /// The point the player must visit to respawn; consumed by a respawn.
    pub assigned_respawn_point: Option<u8>,
}

impl Player {
    pub fn new(id: u8, team_id: u8, health: u8) -> Self {
        Self {
            id,
            name: String::new(),
            team_id,
            health,
            score: 0,
            damage: 0,
            bullets_in_magazine: 0,
            bullets_total: 0,
            bullets_max: 0,
            assigned_respawn_point: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn decrease_health(&mut self, damage: u8) {
        self.health = self.health.saturating_sub(damage);
    }

    pub fn increase_health(&mut self, amount: u8, max_health: u8) {
        self.health = self.health.saturating_add(amount).min(max_health);
    }

    pub fn decrease_bullets(&mut self) {
        self.bullets_in_magazine = self.bullets_in_magazine.saturating_sub(1);
    }

    pub fn increase_bullets(&mut self, amount: u16) {
        self.bullets_total = self.bullets_total.saturating_add(amount).min(self.bullets_max);
    }

    /// Move rounds from the reserve into the magazine.
    ///
    /// Returns `false` when nothing moves: the reserve is empty or the
    /// magazine is already full.
    pub fn reload(&mut self, magazine_size: u8) -> bool {
        if self.bullets_total == 0 || self.bullets_in_magazine >= magazine_size {
            return false;
        }
        let space = u16::from(magazine_size - self.bullets_in_magazine);
        let moved = space.min(self.bullets_total);
        self.bullets_total -= moved;
        self.bullets_in_magazine += moved as u8;
        true
    }

    /// Fully restore health and ammunition and consume the assigned respawn
    /// point. A fresh point arrives with the next roster snapshot.
    pub fn respawn(&mut self, max_health: u8, magazine_size: u8) {
        self.assigned_respawn_point = None;
        self.health = max_health;
        self.bullets_in_magazine = magazine_size;
        self.bullets_total = self.bullets_max;
    }

    /// Merge another entry's public stats into this one.
    ///
    /// The name is only overwritten when the incoming name is non-empty, so a
    /// sparse snapshot does not erase a previously known name.
    pub fn merge_public_stats(&mut self, other: &Player) {
        self.health = other.health;
        self.score = other.score;
        self.team_id = other.team_id;
        self.damage = other.damage;
        self.bullets_max = other.bullets_max;
        self.assigned_respawn_point = other.assigned_respawn_point;
        if !other.name.is_empty() {
            self.name = other.name.clone();
        }
    }

    /// Roster display order: descending score, id as the tie-break so the
    /// order is total.
    pub fn display_order(&self, other: &Player) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.id.cmp(&other.id))
    }
}
