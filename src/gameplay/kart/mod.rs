mod drift;
mod physics;

pub use drift::{DriftState, SparkColor};
pub(crate) use physics::{coast, drive_stunned};
pub use physics::{
    drive_with_intents, heading_of, integrate_motion, settle_speed, wrap_angle, ControlIntents,
    IntentEdges,
};

use crate::config::{CollisionConfig, EffectsConfig, ItemTuningConfig, KartFile};
use crate::gameplay::items::ItemKind;
use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::f32::consts::TAU;

const MOVING_SPEED_EPSILON: f32 = 0.001;

pub trait KartBody {
    fn kart(&self) -> &Kart;
    fn kart_mut(&mut self) -> &mut Kart;

    fn takes_collisions(&self) -> bool {
        true
    }
}

impl KartBody for Kart {
    fn kart(&self) -> &Kart {
        self
    }

    fn kart_mut(&mut self) -> &mut Kart {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KartStats {
    pub max_speed: f32,
    pub acceleration: f32,
    pub turn_rate: f32,
}

impl KartStats {
    pub fn from_physics(kart: &KartFile) -> Self {
        Self {
            max_speed: kart.physics.max_speed,
            acceleration: kart.physics.acceleration,
            turn_rate: kart.physics.turn_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Hop {
    pub height: f32,
    pub vertical_velocity: f32,
}

impl Hop {
    pub fn airborne(&self) -> bool {
        self.height > 0.0 || self.vertical_velocity > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectTimers {
    pub stun_s: f32,
    pub mushroom_s: f32,
    pub invisible_s: f32,
    pub shrink_s: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitEffect {
    pub stun_s: f32,
    pub speed_factor: f32,
    pub shrink_s: f32,
    pub drops_item: bool,
}

#[derive(Debug, Clone)]
pub struct Kart {
    pub position: Vec3,
    pub heading: f32,
    pub speed: f32,
    pub hop: Hop,
    pub drift: DriftState,
    pub drift_charge_s: f32,
    pub mini_turbo_stage: u8,
    pub mini_turbo_boost_s: f32,
    pub mini_turbo_multiplier: f32,
    pub effects: EffectTimers,
    pub bump: Vec3,
    pub current_speed_limit: f32,
    pub target_speed_limit: f32,
    pub held_item: Option<ItemKind>,
    /// Item a pending Boo hands over once invisibility ends.
    pub boo_loot: Option<ItemKind>,
    pub off_track: bool,
    pub stats: KartStats,
    pub rng: Pcg32,
}

impl Kart {
    pub fn new(position: Vec3, heading: f32, stats: KartStats, seed: u64) -> Self {
        Self {
            position,
            heading,
            speed: 0.0,
            hop: Hop::default(),
            drift: DriftState::Idle,
            drift_charge_s: 0.0,
            mini_turbo_stage: 0,
            mini_turbo_boost_s: 0.0,
            mini_turbo_multiplier: 1.0,
            effects: EffectTimers::default(),
            bump: Vec3::ZERO,
            current_speed_limit: stats.max_speed,
            target_speed_limit: stats.max_speed,
            held_item: None,
            boo_loot: None,
            off_track: false,
            stats,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn set_stats(&mut self, stats: KartStats) {
        self.stats = stats;
        self.current_speed_limit = stats.max_speed;
        self.target_speed_limit = stats.max_speed;
    }

    pub fn forward(&self) -> Vec2 {
        Vec2::new(self.heading.sin(), self.heading.cos())
    }

    pub fn ground_position(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    pub fn is_moving(&self) -> bool {
        self.speed.abs() > MOVING_SPEED_EPSILON
    }

    pub fn is_stunned(&self) -> bool {
        self.effects.stun_s > 0.0
    }

    pub fn is_invisible(&self) -> bool {
        self.effects.invisible_s > 0.0
    }

    pub fn is_shrunk(&self) -> bool {
        self.effects.shrink_s > 0.0
    }

    pub fn is_boosting(&self) -> bool {
        self.effects.mushroom_s > 0.0 || self.mini_turbo_boost_s > 0.0
    }

    pub fn collision_radius(&self, collision: &CollisionConfig, effects: &EffectsConfig) -> f32 {
        if self.is_shrunk() {
            collision.kart_radius * effects.shrink_scale
        } else {
            collision.kart_radius
        }
    }

    pub fn impulse_weight(&self, effects: &EffectsConfig) -> f32 {
        if self.is_shrunk() {
            effects.shrink_scale
        } else {
            1.0
        }
    }

    /// Mushroom wins over a mini-turbo; only one multiplier applies.
    pub fn boost_multiplier(&self, items: &ItemTuningConfig) -> f32 {
        if self.effects.mushroom_s > 0.0 {
            items.mushroom_multiplier
        } else if self.mini_turbo_boost_s > 0.0 {
            self.mini_turbo_multiplier
        } else {
            1.0
        }
    }

    pub fn speed_multiplier(&self, kart: &KartFile, items: &ItemTuningConfig) -> f32 {
        let physics = &kart.physics;
        let mut multiplier = self.boost_multiplier(items);
        if self.drift.is_active() {
            multiplier *= physics.drift_speed_penalty;
        }
        if self.off_track {
            multiplier *= physics.off_road_penalty;
        }
        if self.is_shrunk() {
            multiplier *= physics.shrink_speed_penalty;
        }
        multiplier
    }

    pub fn refresh_speed_limit(&mut self, kart: &KartFile, items: &ItemTuningConfig) {
        self.target_speed_limit = self.stats.max_speed * self.speed_multiplier(kart, items);
        self.current_speed_limit += (self.target_speed_limit - self.current_speed_limit)
            * kart.physics.speed_limit_smoothing;
    }

    pub fn tick_effects(&mut self, dt: f32) -> Option<ItemKind> {
        let was_invisible = self.is_invisible();
        let effects = &mut self.effects;
        effects.stun_s = (effects.stun_s - dt).max(0.0);
        effects.mushroom_s = (effects.mushroom_s - dt).max(0.0);
        effects.invisible_s = (effects.invisible_s - dt).max(0.0);
        effects.shrink_s = (effects.shrink_s - dt).max(0.0);
        self.mini_turbo_boost_s = (self.mini_turbo_boost_s - dt).max(0.0);

        if was_invisible && !self.is_invisible() {
            if let Some(loot) = self.boo_loot.take() {
                self.held_item = Some(loot);
                return Some(loot);
            }
        }
        None
    }

    pub fn apply_hit(&mut self, hit: &HitEffect) -> bool {
        if self.is_invisible() {
            return false;
        }

        self.effects.stun_s = self.effects.stun_s.max(hit.stun_s);
        self.effects.shrink_s = self.effects.shrink_s.max(hit.shrink_s);
        self.speed *= hit.speed_factor;
        self.interrupt_drift();
        if hit.drops_item {
            self.held_item = None;
        }
        true
    }

    pub fn grant_mushroom(&mut self, items: &ItemTuningConfig) {
        self.effects.mushroom_s = items.mushroom_duration_seconds;
        self.mini_turbo_boost_s = 0.0;
        self.mini_turbo_multiplier = 1.0;
    }

    pub fn add_bump(&mut self, impulse: Vec2) {
        self.bump += Vec3::new(impulse.x, 0.0, impulse.y);
    }

    pub fn decay_bump(&mut self, collision: &CollisionConfig) {
        self.bump *= collision.bump_decay;
        if self.bump.length() < collision.bump_rest_threshold {
            self.bump = Vec3::ZERO;
        }
    }

    pub fn random_unit_direction(&mut self) -> Vec2 {
        Vec2::from_angle(self.rng.random_range(0.0..TAU))
    }

    pub fn apply_stun_decay(&mut self, effects: &EffectsConfig) {
        let step = effects.stun_deceleration;
        if self.speed.abs() <= step {
            self.speed = 0.0;
        } else {
            self.speed -= step * self.speed.signum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn test_kart() -> Kart {
        Kart::new(
            Vec3::ZERO,
            0.0,
            KartStats {
                max_speed: 0.8,
                acceleration: 0.012,
                turn_rate: 0.035,
            },
            7,
        )
    }

    #[test]
    fn mushroom_takes_precedence_over_mini_turbo() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = test_kart();
        kart.mini_turbo_boost_s = 1.0;
        kart.mini_turbo_multiplier = 1.3;

        assert!((kart.boost_multiplier(&config.items.items) - 1.3).abs() < 1.0e-6);

        kart.grant_mushroom(&config.items.items);

        assert!((kart.boost_multiplier(&config.items.items) - 1.5).abs() < 1.0e-6);
        assert_eq!(kart.mini_turbo_boost_s, 0.0);
    }

    #[test]
    fn speed_limit_is_smoothed_toward_target() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = test_kart();
        kart.off_track = true;

        kart.refresh_speed_limit(&config.kart, &config.items.items);

        let target = 0.8 * config.kart.physics.off_road_penalty;
        assert!((kart.target_speed_limit - target).abs() < 1.0e-6);
        assert!(kart.current_speed_limit < 0.8);
        assert!(kart.current_speed_limit > target);
    }

    #[test]
    fn invisible_kart_ignores_hits() {
        let mut kart = test_kart();
        kart.speed = 0.8;
        kart.held_item = Some(ItemKind::Banana);
        kart.effects.invisible_s = 2.0;

        let applied = kart.apply_hit(&HitEffect {
            stun_s: 1.0,
            speed_factor: 0.3,
            shrink_s: 4.0,
            drops_item: true,
        });

        assert!(!applied);
        assert_eq!(kart.speed, 0.8);
        assert_eq!(kart.effects.stun_s, 0.0);
        assert_eq!(kart.effects.shrink_s, 0.0);
        assert_eq!(kart.held_item, Some(ItemKind::Banana));
    }

    #[test]
    fn boo_loot_arrives_when_invisibility_ends() {
        let mut kart = test_kart();
        kart.held_item = Some(ItemKind::Boo);
        kart.boo_loot = Some(ItemKind::RedShell);
        kart.effects.invisible_s = 0.5;

        assert_eq!(kart.tick_effects(0.25), None);
        assert_eq!(kart.held_item, Some(ItemKind::Boo));

        assert_eq!(kart.tick_effects(0.25), Some(ItemKind::RedShell));
        assert_eq!(kart.held_item, Some(ItemKind::RedShell));
        assert!(kart.boo_loot.is_none());
    }

    #[test]
    fn bump_decays_to_rest() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = test_kart();
        kart.add_bump(Vec2::new(0.35, 0.0));

        kart.decay_bump(&config.kart.collision);
        assert!((kart.bump.x - 0.35 * 0.85).abs() < 1.0e-6);

        for _ in 0..200 {
            kart.decay_bump(&config.kart.collision);
        }
        assert_eq!(kart.bump, Vec3::ZERO);
    }
}
