use super::*;
use crate::config::ItemBoxConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemBox {
    pub position: Vec2,
    pub active: bool,
    pub respawn_s: f32,
}

impl ItemBox {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            active: true,
            respawn_s: 0.0,
        }
    }

    pub fn tick(&mut self, dt: f32) {
        if self.active {
            return;
        }
        self.respawn_s -= dt;
        if self.respawn_s <= 0.0 {
            self.respawn_s = 0.0;
            self.active = true;
        }
    }

    pub fn try_consume(&mut self, kart: &Kart, config: &ItemBoxConfig) -> bool {
        if !self.active || kart.ground_position().distance(self.position) > config.pickup_radius {
            return false;
        }
        self.active = false;
        self.respawn_s = config.respawn_seconds;
        true
    }
}
