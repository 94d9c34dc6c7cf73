use crate::config::{DifficultyConfig, ItemTuningConfig, KartFile};
use crate::gameplay::items::ItemKind;
use crate::gameplay::kart::{
    coast, drive_stunned, heading_of, settle_speed, wrap_angle, ControlIntents, DriftState, Kart,
    KartStats,
};
use crate::gameplay::track::CenterlinePath;
use bevy::prelude::*;
use rand::Rng;

const LOOK_AHEAD_PER_SPEED: f32 = 15.0;
const LOOK_AHEAD_BASE: f32 = 8.0;
const RETIME_MIN_S: f32 = 0.2;
const RETIME_MAX_S: f32 = 0.6;
const LANE_NUDGE: f32 = 1.5;
const LANE_LIMIT: f32 = 4.0;
const DRIFT_START_ERROR_DEG: f32 = 30.0;
const DRIFT_END_ERROR_DEG: f32 = 24.0;
const DRIFT_CHARGE_FULL_ERROR_DEG: f32 = 45.0;
const DRIFT_MIN_SPEED_RATIO: f32 = 0.5;
const TURN_PENALTY_FULL_DEG: f32 = 90.0;
const TURN_PENALTY: f32 = 0.4;
const OVERSPEED_BRAKE_RATIO: f32 = 1.5;
const STEER_DEADZONE_RAD: f32 = 0.02;
const CALM_HEADING_ERROR_DEG: f32 = 20.0;
const PURSUER_RADIUS: f32 = 12.0;
const RIVAL_AHEAD_RADIUS: f32 = 25.0;
const RIVAL_AHEAD_CONE_COS: f32 = 0.8;
const AUTOPILOT_ITEM_DELAY_S: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentStats {
    pub max_speed: f32,
    pub acceleration: f32,
    pub turn_rate: f32,
    pub target_offset: f32,
    pub item_use_chance: f64,
    pub max_hold_seconds: f32,
}

impl AgentStats {
    pub fn roll<R: Rng + ?Sized>(tuning: &KartFile, difficulty: &DifficultyConfig, rng: &mut R) -> Self {
        let jitter = difficulty.stat_jitter.abs();
        let mut jittered = |value: f32| value * (1.0 + rng.random_range(-jitter..=jitter));
        let max_speed = jittered(tuning.physics.max_speed * difficulty.max_speed_multiplier);
        let acceleration = jittered(tuning.physics.acceleration * difficulty.acceleration_multiplier);
        let turn_rate = jittered(difficulty.turn_rate);
        let spread = difficulty.lane_spread.abs();

        Self {
            max_speed,
            acceleration,
            turn_rate,
            target_offset: rng.random_range(-spread..=spread),
            item_use_chance: difficulty.item_use_chance,
            max_hold_seconds: difficulty.max_hold_seconds,
        }
    }

    pub fn untuned(tuning: &KartFile) -> Self {
        Self {
            max_speed: tuning.physics.max_speed,
            acceleration: tuning.physics.acceleration,
            turn_rate: tuning.physics.turn_speed,
            target_offset: 0.0,
            item_use_chance: 0.0,
            max_hold_seconds: f32::INFINITY,
        }
    }

    pub fn kart_stats(&self) -> KartStats {
        KartStats {
            max_speed: self.max_speed,
            acceleration: self.acceleration,
            turn_rate: self.turn_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemSituation {
    pub rank: usize,
    pub racer_count: usize,
    pub pursuer_behind: bool,
    pub rival_ahead: bool,
}

pub fn scan_rivals(kart: &Kart, others: impl IntoIterator<Item = Vec2>) -> (bool, bool) {
    let position = kart.ground_position();
    let forward = kart.forward();
    let mut pursuer_behind = false;
    let mut rival_ahead = false;

    for other in others {
        let offset = other - position;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            continue;
        }
        let facing = offset.dot(forward) / distance;
        if distance <= PURSUER_RADIUS && facing < 0.0 {
            pursuer_behind = true;
        }
        if distance <= RIVAL_AHEAD_RADIUS && facing >= RIVAL_AHEAD_CONE_COS {
            rival_ahead = true;
        }
    }

    (pursuer_behind, rival_ahead)
}

pub fn look_ahead_target(
    path: &CenterlinePath,
    position: Vec2,
    speed: f32,
    lane_offset: f32,
) -> Option<Vec2> {
    let projection = path.project(position)?;
    let distance = projection.distance_along + speed.abs() * LOOK_AHEAD_PER_SPEED + LOOK_AHEAD_BASE;
    let point = path.point_at(distance)?;
    let tangent = path.tangent_at(distance)?;
    Some(point + tangent.perp() * lane_offset)
}

pub fn heading_error(kart: &Kart, target: Vec2) -> Option<f32> {
    let toward = target - kart.ground_position();
    if toward.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(wrap_angle(heading_of(toward) - kart.heading))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentBrain {
    pub stats: AgentStats,
    pub dynamic_offset: f32,
    retime_s: f32,
    held_item_s: f32,
    last_heading_error: f32,
}

impl AgentBrain {
    pub fn new(stats: AgentStats) -> Self {
        Self {
            stats,
            dynamic_offset: 0.0,
            retime_s: 0.0,
            held_item_s: 0.0,
            last_heading_error: 0.0,
        }
    }

    pub fn lane_offset(&self) -> f32 {
        self.stats.target_offset + self.dynamic_offset
    }

    pub fn last_heading_error(&self) -> f32 {
        self.last_heading_error
    }

    pub fn update_lane_offset<R: Rng + ?Sized>(&mut self, rng: &mut R, dt: f32) {
        self.retime_s -= dt;
        if self.retime_s > 0.0 {
            return;
        }
        self.retime_s = rng.random_range(RETIME_MIN_S..=RETIME_MAX_S);
        self.dynamic_offset = (self.dynamic_offset + rng.random_range(-LANE_NUDGE..=LANE_NUDGE))
            .clamp(-LANE_LIMIT, LANE_LIMIT);
    }

    pub fn drive(
        &mut self,
        kart: &mut Kart,
        path: &CenterlinePath,
        tuning: &KartFile,
        items: &ItemTuningConfig,
        dt: f32,
    ) -> bool {
        if kart.is_stunned() {
            drive_stunned(kart, tuning);
            return true;
        }

        self.update_lane_offset(&mut kart.rng, dt);
        let Some(error) = look_ahead_target(path, kart.ground_position(), kart.speed, self.lane_offset())
            .and_then(|target| heading_error(kart, target))
        else {
            debug!("No centerline to follow; agent coasts this tick.");
            coast(kart, tuning.physics.deceleration);
            settle_speed(kart);
            return false;
        };
        self.last_heading_error = error;

        if kart.is_moving() {
            let turn = error.clamp(-self.stats.turn_rate, self.stats.turn_rate);
            kart.heading = wrap_angle(kart.heading + turn * kart.speed.signum());
        }
        self.drift_decision(kart, error, tuning, dt);
        self.control_speed(kart, error, tuning, items);
        true
    }

    fn drift_decision(&mut self, kart: &mut Kart, error: f32, tuning: &KartFile, dt: f32) {
        let sharpness = error.abs();
        let steer = if sharpness < STEER_DEADZONE_RAD {
            0.0
        } else {
            error.signum()
        };

        if kart.drift == DriftState::Idle
            && sharpness > DRIFT_START_ERROR_DEG.to_radians()
            && kart.speed > self.stats.max_speed * DRIFT_MIN_SPEED_RATIO
        {
            kart.request_drift(&tuning.drift);
        }
        kart.update_hop(&tuning.drift, steer);

        if kart.drift.is_drifting() && sharpness < DRIFT_END_ERROR_DEG.to_radians() {
            kart.release_drift(&tuning.mini_turbo);
        } else if kart.drift.is_drifting() && kart.speed <= 0.0 {
            kart.end_drift(&tuning.mini_turbo);
        } else if kart.drift.is_active() {
            let rate = (sharpness / DRIFT_CHARGE_FULL_ERROR_DEG.to_radians()).min(1.0);
            kart.charge_mini_turbo(dt * rate, &tuning.mini_turbo);
        }
    }

    fn control_speed(&self, kart: &mut Kart, error: f32, tuning: &KartFile, items: &ItemTuningConfig) {
        let turn_penalty =
            1.0 - (error.abs() / TURN_PENALTY_FULL_DEG.to_radians()).min(1.0) * TURN_PENALTY;
        let target = self.stats.max_speed * kart.speed_multiplier(tuning, items) * turn_penalty;
        let acceleration = self.stats.acceleration;

        if kart.speed < target {
            kart.speed = (kart.speed + acceleration).min(target);
        } else {
            kart.speed = (kart.speed - acceleration * OVERSPEED_BRAKE_RATIO).max(target);
        }
        settle_speed(kart);
    }

    pub fn wants_item(&mut self, kart: &mut Kart, situation: &ItemSituation, dt: f32) -> bool {
        let Some(item) = kart.held_item else {
            self.held_item_s = 0.0;
            return false;
        };
        if kart.boo_loot.is_some() {
            return false;
        }

        self.held_item_s += dt;
        if self.held_item_s >= self.stats.max_hold_seconds {
            self.held_item_s = 0.0;
            return true;
        }

        let count = situation.racer_count.max(1);
        let chance = self.stats.item_use_chance * (1.0 + situation.rank as f64 / count as f64);
        if !kart.rng.random_bool(chance.clamp(0.0, 1.0)) {
            return false;
        }

        let calm = self.last_heading_error.abs() < CALM_HEADING_ERROR_DEG.to_radians();
        let back_half = situation.rank > count.div_ceil(2);
        let fire = match item {
            ItemKind::Banana | ItemKind::FakeItemBox => situation.pursuer_behind,
            ItemKind::Mushroom => (situation.rival_ahead || back_half) && calm,
            ItemKind::GreenShell => situation.rival_ahead,
            ItemKind::RedShell => situation.rank > 1,
            ItemKind::Boo => back_half,
            ItemKind::LightningBolt => situation.rank + 1 >= count,
        };
        if fire {
            self.held_item_s = 0.0;
        }
        fire
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AutopilotState {
    held_item_s: f32,
    pressed_use: bool,
}

pub fn autopilot_intents(
    state: &mut AutopilotState,
    kart: &Kart,
    path: &CenterlinePath,
    dt: f32,
) -> ControlIntents {
    let mut intents = ControlIntents {
        forward: true,
        ..default()
    };

    if let Some(error) = look_ahead_target(path, kart.ground_position(), kart.speed, 0.0)
        .and_then(|target| heading_error(kart, target))
    {
        intents.turn_left = error > STEER_DEADZONE_RAD;
        intents.turn_right = error < -STEER_DEADZONE_RAD;

        let sharpness = error.abs();
        intents.drift = if kart.drift.is_drifting() {
            sharpness >= DRIFT_END_ERROR_DEG.to_radians()
        } else {
            sharpness > DRIFT_START_ERROR_DEG.to_radians()
                && kart.speed > kart.stats.max_speed * DRIFT_MIN_SPEED_RATIO
        };
    }

    if kart.held_item.is_some() && kart.boo_loot.is_none() {
        state.held_item_s += dt;
    } else {
        state.held_item_s = 0.0;
    }
    intents.use_item = state.held_item_s >= AUTOPILOT_ITEM_DELAY_S && !state.pressed_use;
    state.pressed_use = intents.use_item;

    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::gameplay::track::Track;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::f32::consts::FRAC_PI_2;

    const DT: f32 = 1.0 / 60.0;

    fn setup() -> (GameConfig, Track) {
        let config = GameConfig::builtin().expect("builtin config should load");
        let track = Track::from_config(&config.track);
        (config, track)
    }

    fn agent(config: &GameConfig, seed: u64) -> (Kart, AgentBrain) {
        let difficulty = config
            .selected_difficulty()
            .expect("difficulty should exist");
        let mut kart = Kart::new(
            Vec3::new(90.0, 0.0, 0.0),
            0.0,
            KartStats::from_physics(&config.kart),
            seed,
        );
        let stats = AgentStats::roll(&config.kart, difficulty, &mut kart.rng);
        kart.set_stats(stats.kart_stats());
        (kart, AgentBrain::new(stats))
    }

    #[test]
    fn rolled_stats_stay_within_jitter_and_spread() {
        let (config, _) = setup();
        let difficulty = config
            .selected_difficulty()
            .expect("difficulty should exist");
        let mut rng = Pcg32::seed_from_u64(3);

        for _ in 0..50 {
            let stats = AgentStats::roll(&config.kart, difficulty, &mut rng);
            let base = config.kart.physics.max_speed * difficulty.max_speed_multiplier;
            assert!((stats.max_speed / base - 1.0).abs() <= difficulty.stat_jitter + 1.0e-5);
            assert!(stats.target_offset.abs() <= difficulty.lane_spread);
        }
    }

    #[test]
    fn look_ahead_grows_with_speed() {
        let (_, track) = setup();
        let start = Vec2::new(90.0, 0.0);

        let slow = look_ahead_target(&track.centerline, start, 0.0, 0.0).expect("path exists");
        let fast = look_ahead_target(&track.centerline, start, 0.8, 0.0).expect("path exists");

        assert!((slow.distance(start) - LOOK_AHEAD_BASE).abs() < 0.5);
        assert!(fast.distance(start) > slow.distance(start) + 10.0);
        assert!(slow.y > 0.0);
    }

    #[test]
    fn lane_offset_stays_clamped_and_is_reproducible() {
        let mut first = AgentBrain::new(AgentStats {
            max_speed: 0.8,
            acceleration: 0.012,
            turn_rate: 0.04,
            target_offset: 1.0,
            item_use_chance: 0.0,
            max_hold_seconds: 10.0,
        });
        let mut second = first.clone();
        let mut rng_a = Pcg32::seed_from_u64(77);
        let mut rng_b = Pcg32::seed_from_u64(77);

        let mut changes = 0;
        let mut previous = first.dynamic_offset;
        for _ in 0..600 {
            first.update_lane_offset(&mut rng_a, DT);
            second.update_lane_offset(&mut rng_b, DT);
            assert!(first.dynamic_offset.abs() <= LANE_LIMIT);
            assert_eq!(first.dynamic_offset, second.dynamic_offset);
            if first.dynamic_offset != previous {
                changes += 1;
                previous = first.dynamic_offset;
            }
        }

        assert!((8..=51).contains(&changes), "changes: {changes}");
    }

    #[test]
    fn turning_is_limited_to_the_turn_rate() {
        let (config, track) = setup();
        let (mut kart, mut brain) = agent(&config, 4);
        kart.speed = 0.5;
        kart.heading = -FRAC_PI_2;

        assert!(brain.drive(&mut kart, &track.centerline, &config.kart, &config.items.items, DT));

        let turned = wrap_angle(kart.heading + FRAC_PI_2).abs();
        assert!(turned > 0.0);
        assert!(turned <= brain.stats.turn_rate + 1.0e-6);
    }

    #[test]
    fn agent_accelerates_along_a_straight() {
        let (config, track) = setup();
        let (mut kart, mut brain) = agent(&config, 8);

        for _ in 0..30 {
            brain.drive(&mut kart, &track.centerline, &config.kart, &config.items.items, DT);
        }

        assert!(kart.speed > 0.3);
        assert!(kart.speed <= kart.current_speed_limit);
    }

    #[test]
    fn sharp_error_at_speed_starts_a_hop_into_drift() {
        let (config, track) = setup();
        let (mut kart, mut brain) = agent(&config, 2);
        kart.speed = 0.7;
        kart.heading = -FRAC_PI_2;

        brain.drive(&mut kart, &track.centerline, &config.kart, &config.items.items, DT);

        assert_eq!(kart.drift, DriftState::DriftPending);
        assert!(kart.hop.airborne());
    }

    #[test]
    fn missing_path_skips_steering() {
        let (config, _) = setup();
        let (mut kart, mut brain) = agent(&config, 1);
        kart.speed = 0.5;
        let empty = CenterlinePath::from_points(Vec::new());

        assert!(!brain.drive(&mut kart, &empty, &config.kart, &config.items.items, DT));
        assert!(kart.speed < 0.5);
        assert_eq!(kart.heading, 0.0);
    }

    #[test]
    fn items_held_too_long_are_used() {
        let (config, _) = setup();
        let (mut kart, mut brain) = agent(&config, 6);
        brain.stats.item_use_chance = 0.0;
        kart.held_item = Some(ItemKind::Banana);
        let situation = ItemSituation {
            rank: 3,
            racer_count: 8,
            pursuer_behind: false,
            rival_ahead: false,
        };

        let ticks = (brain.stats.max_hold_seconds / DT) as usize - 2;
        for _ in 0..ticks {
            assert!(!brain.wants_item(&mut kart, &situation, DT));
        }
        let mut fired = false;
        for _ in 0..4 {
            fired |= brain.wants_item(&mut kart, &situation, DT);
        }
        assert!(fired);
    }

    #[test]
    fn leader_never_fires_a_red_shell_by_choice() {
        let (config, _) = setup();
        let (mut kart, mut brain) = agent(&config, 6);
        brain.stats.item_use_chance = 1.0;
        kart.held_item = Some(ItemKind::RedShell);
        let leading = ItemSituation {
            rank: 1,
            racer_count: 8,
            pursuer_behind: true,
            rival_ahead: true,
        };

        assert!(!brain.wants_item(&mut kart, &leading, DT));
        assert!(brain.wants_item(
            &mut kart,
            &ItemSituation {
                rank: 4,
                ..leading
            },
            DT
        ));
    }

    #[test]
    fn rivals_are_sorted_into_behind_and_ahead() {
        let (config, _) = setup();
        let (kart, _) = agent(&config, 1);

        assert_eq!(scan_rivals(&kart, [Vec2::new(90.0, -5.0)]), (true, false));
        assert_eq!(scan_rivals(&kart, [Vec2::new(90.0, 15.0)]), (false, true));
        assert_eq!(scan_rivals(&kart, [Vec2::new(20.0, 0.0)]), (false, false));
    }

    #[test]
    fn autopilot_steers_toward_the_path_and_taps_items() {
        let (config, track) = setup();
        let mut kart = Kart::new(
            Vec3::new(90.0, 0.0, 0.0),
            0.3,
            KartStats::from_physics(&config.kart),
            1,
        );
        kart.held_item = Some(ItemKind::Mushroom);
        let mut state = AutopilotState::default();

        let first = autopilot_intents(&mut state, &kart, &track.centerline, DT);
        assert!(first.forward);
        assert!(first.turn_right && !first.turn_left);
        assert!(!first.use_item);

        let mut presses = 0;
        let mut previous = false;
        for _ in 0..120 {
            let intents = autopilot_intents(&mut state, &kart, &track.centerline, DT);
            if intents.use_item && !previous {
                presses += 1;
            }
            assert!(!(intents.use_item && previous));
            previous = intents.use_item;
        }
        assert!(presses >= 2);
    }
}
