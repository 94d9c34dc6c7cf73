use super::*;
use crate::config::{DriftConfig, MiniTurboConfig};
use serde::Serialize;

/// `Hopping` is an airborne hop whose drift was already released; `DriftPending` is
/// airborne with drift still held. Landing decides whether the drift goes active.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DriftState {
    #[default]
    Idle,
    Hopping,
    DriftPending,
    DriftActive {
        direction: f32,
    },
}

impl DriftState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::DriftActive { .. })
    }

    pub fn is_drifting(&self) -> bool {
        matches!(self, Self::DriftPending | Self::DriftActive { .. })
    }

    pub fn direction(&self) -> Option<f32> {
        match self {
            Self::DriftActive { direction } => Some(*direction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SparkColor {
    Blue,
    Orange,
    Purple,
}

impl SparkColor {
    pub fn for_stage(stage: u8) -> Option<Self> {
        match stage {
            0 => None,
            1 => Some(Self::Blue),
            2 => Some(Self::Orange),
            _ => Some(Self::Purple),
        }
    }
}

pub(super) fn stage_for_charge(charge_s: f32, thresholds: &[f32]) -> u8 {
    thresholds
        .iter()
        .skip(1)
        .take_while(|threshold| charge_s >= **threshold)
        .count() as u8
}

impl Kart {
    pub fn can_request_drift(&self) -> bool {
        self.speed > 0.0 && self.drift == DriftState::Idle && !self.hop.airborne()
    }

    pub fn request_drift(&mut self, drift: &DriftConfig) -> bool {
        if !self.can_request_drift() {
            return false;
        }
        self.hop.vertical_velocity = drift.hop_impulse;
        self.drift = DriftState::DriftPending;
        true
    }

    pub fn release_drift(&mut self, mini_turbo: &MiniTurboConfig) {
        match self.drift {
            DriftState::DriftPending => self.drift = DriftState::Hopping,
            DriftState::DriftActive { .. } => {
                self.end_drift(mini_turbo);
            }
            DriftState::Idle | DriftState::Hopping => {}
        }
    }

    pub fn update_hop(&mut self, drift: &DriftConfig, steer: f32) -> bool {
        if !self.hop.airborne() {
            return false;
        }

        self.hop.height += self.hop.vertical_velocity;
        self.hop.vertical_velocity -= drift.gravity;
        if self.hop.height > 0.0 {
            return false;
        }

        self.hop = Hop::default();
        self.drift = match self.drift {
            DriftState::DriftPending if steer != 0.0 => DriftState::DriftActive {
                direction: steer.signum(),
            },
            DriftState::DriftActive { direction } => DriftState::DriftActive { direction },
            _ => DriftState::Idle,
        };
        if !self.drift.is_active() {
            self.reset_mini_turbo_charge();
        }
        true
    }

    pub fn charge_mini_turbo(&mut self, charge_s: f32, mini_turbo: &MiniTurboConfig) {
        if !self.drift.is_active() || charge_s <= 0.0 {
            return;
        }
        self.drift_charge_s += charge_s;
        let stage = stage_for_charge(self.drift_charge_s, &mini_turbo.thresholds_seconds);
        self.mini_turbo_stage = self.mini_turbo_stage.max(stage);
    }

    pub fn end_drift(&mut self, mini_turbo: &MiniTurboConfig) -> Option<f32> {
        let stage = self.mini_turbo_stage as usize;
        let mut granted = None;
        if self.drift.is_active() && stage >= 1 && self.effects.mushroom_s <= 0.0 {
            let index = (stage - 1).min(mini_turbo.boost_durations_seconds.len() - 1);
            self.mini_turbo_boost_s = mini_turbo.boost_durations_seconds[index];
            self.mini_turbo_multiplier = mini_turbo
                .boost_multipliers
                .get(index)
                .copied()
                .unwrap_or(1.0);
            granted = Some(self.mini_turbo_boost_s);
        }

        self.drift = if self.hop.airborne() {
            DriftState::Hopping
        } else {
            DriftState::Idle
        };
        self.reset_mini_turbo_charge();
        granted
    }

    pub fn interrupt_drift(&mut self) {
        if self.drift.is_drifting() {
            self.drift = if self.hop.airborne() {
                DriftState::Hopping
            } else {
                DriftState::Idle
            };
        }
        self.reset_mini_turbo_charge();
    }

    fn reset_mini_turbo_charge(&mut self) {
        self.drift_charge_s = 0.0;
        self.mini_turbo_stage = 0;
    }

    pub fn spark_color(&self) -> Option<SparkColor> {
        SparkColor::for_stage(self.mini_turbo_stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn moving_kart() -> Kart {
        let mut kart = Kart::new(
            Vec3::ZERO,
            0.0,
            KartStats {
                max_speed: 0.8,
                acceleration: 0.012,
                turn_rate: 0.035,
            },
            3,
        );
        kart.speed = 0.6;
        kart
    }

    fn land(kart: &mut Kart, drift: &DriftConfig, steer: f32) {
        for _ in 0..100 {
            if kart.update_hop(drift, steer) {
                return;
            }
        }
        panic!("hop never landed");
    }

    #[test]
    fn stage_thresholds_map_charge_to_stage() {
        let thresholds = [0.0, 1.0, 1.8, 2.8];

        assert_eq!(stage_for_charge(0.5, &thresholds), 0);
        assert_eq!(stage_for_charge(1.0, &thresholds), 1);
        assert_eq!(stage_for_charge(2.0, &thresholds), 2);
        assert_eq!(stage_for_charge(9.0, &thresholds), 3);
    }

    #[test]
    fn drift_needs_forward_speed() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = moving_kart();
        kart.speed = 0.0;

        assert!(!kart.request_drift(&config.kart.drift));
        assert_eq!(kart.drift, DriftState::Idle);
    }

    #[test]
    fn landing_without_steering_cancels_the_drift() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = moving_kart();

        assert!(kart.request_drift(&config.kart.drift));
        assert_eq!(kart.drift, DriftState::DriftPending);
        land(&mut kart, &config.kart.drift, 0.0);

        assert_eq!(kart.drift, DriftState::Idle);
        assert_eq!(kart.hop.height, 0.0);
    }

    #[test]
    fn landing_while_steering_locks_drift_direction() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = moving_kart();

        kart.request_drift(&config.kart.drift);
        land(&mut kart, &config.kart.drift, -1.0);

        assert_eq!(kart.drift, DriftState::DriftActive { direction: -1.0 });
    }

    #[test]
    fn releasing_mid_hop_turns_into_plain_hop() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = moving_kart();

        kart.request_drift(&config.kart.drift);
        kart.update_hop(&config.kart.drift, 1.0);
        kart.release_drift(&config.kart.mini_turbo);
        assert_eq!(kart.drift, DriftState::Hopping);

        land(&mut kart, &config.kart.drift, 1.0);
        assert_eq!(kart.drift, DriftState::Idle);
    }

    #[test]
    fn stage_is_monotonic_while_active_and_pays_out_on_release() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mini_turbo = &config.kart.mini_turbo;
        let mut kart = moving_kart();
        kart.request_drift(&config.kart.drift);
        land(&mut kart, &config.kart.drift, 1.0);

        let mut last_stage = 0;
        for _ in 0..120 {
            kart.charge_mini_turbo(1.0 / 60.0, mini_turbo);
            assert!(kart.mini_turbo_stage >= last_stage);
            last_stage = kart.mini_turbo_stage;
        }
        assert_eq!(kart.mini_turbo_stage, 2);
        assert_eq!(kart.spark_color(), Some(SparkColor::Orange));

        let granted = kart.end_drift(mini_turbo);

        assert_eq!(granted, Some(mini_turbo.boost_durations_seconds[1]));
        assert!((kart.mini_turbo_multiplier - mini_turbo.boost_multipliers[1]).abs() < 1.0e-6);
        assert_eq!(kart.mini_turbo_stage, 0);
        assert_eq!(kart.drift, DriftState::Idle);
    }

    #[test]
    fn short_drift_grants_nothing() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = moving_kart();
        kart.request_drift(&config.kart.drift);
        land(&mut kart, &config.kart.drift, 1.0);
        kart.charge_mini_turbo(0.5, &config.kart.mini_turbo);

        assert_eq!(kart.end_drift(&config.kart.mini_turbo), None);
        assert_eq!(kart.mini_turbo_boost_s, 0.0);
    }

    #[test]
    fn interrupted_drift_resets_without_boost() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut kart = moving_kart();
        kart.request_drift(&config.kart.drift);
        land(&mut kart, &config.kart.drift, 1.0);
        kart.charge_mini_turbo(3.0, &config.kart.mini_turbo);
        assert_eq!(kart.mini_turbo_stage, 3);

        kart.interrupt_drift();

        assert_eq!(kart.mini_turbo_stage, 0);
        assert_eq!(kart.mini_turbo_boost_s, 0.0);
        assert_eq!(kart.drift, DriftState::Idle);
    }
}
