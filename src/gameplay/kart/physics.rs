use super::*;
use crate::gameplay::collision::{bounce_off_walls, WallSegment};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

const HEADING_EPSILON: f32 = 1.0e-5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlIntents {
    pub forward: bool,
    pub backward: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub drift: bool,
    pub use_item: bool,
    pub rear_view: bool,
}

impl ControlIntents {
    /// +1 turns left (heading increases), -1 turns right.
    pub fn steer(&self) -> f32 {
        match (self.turn_left, self.turn_right) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentEdges {
    drift_held: bool,
    use_item_held: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct EdgeTriggers {
    pub drift_pressed: bool,
    pub drift_released: bool,
    pub use_item_pressed: bool,
}

impl IntentEdges {
    pub(super) fn update(&mut self, intents: &ControlIntents) -> EdgeTriggers {
        let triggers = EdgeTriggers {
            drift_pressed: intents.drift && !self.drift_held,
            drift_released: !intents.drift && self.drift_held,
            use_item_pressed: intents.use_item && !self.use_item_held,
        };
        self.drift_held = intents.drift;
        self.use_item_held = intents.use_item;
        triggers
    }
}

pub fn heading_of(direction: Vec2) -> f32 {
    direction.x.atan2(direction.y)
}

pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

pub fn drive_with_intents(
    kart: &mut Kart,
    intents: &ControlIntents,
    edges: &mut IntentEdges,
    tuning: &KartFile,
    dt: f32,
) -> bool {
    let triggers = edges.update(intents);

    if kart.is_stunned() {
        drive_stunned(kart, tuning);
        return false;
    }

    let steer = intents.steer();
    if triggers.drift_pressed {
        kart.request_drift(&tuning.drift);
    }
    if triggers.drift_released {
        kart.release_drift(&tuning.mini_turbo);
    }
    kart.update_hop(&tuning.drift, steer);

    apply_throttle(kart, intents.forward, intents.backward, tuning);
    apply_steering(kart, steer, tuning, dt);
    settle_speed(kart);

    triggers.use_item_pressed
}

pub(crate) fn drive_stunned(kart: &mut Kart, tuning: &KartFile) {
    kart.apply_stun_decay(&tuning.effects);
    kart.update_hop(&tuning.drift, 0.0);
    if kart.speed <= 0.0 && kart.drift.is_drifting() {
        kart.interrupt_drift();
    }
    settle_speed(kart);
}

fn apply_throttle(kart: &mut Kart, forward: bool, backward: bool, tuning: &KartFile) {
    let physics = &tuning.physics;
    let acceleration = kart.stats.acceleration;
    let limit = kart.current_speed_limit;

    if forward && !backward {
        kart.speed = (kart.speed + acceleration).min(limit.max(kart.speed));
    } else if backward && !forward {
        let reverse_limit = -limit * physics.reverse_speed_ratio;
        kart.speed = (kart.speed - acceleration).max(reverse_limit.min(kart.speed));
    } else {
        coast(kart, physics.deceleration);
    }
}

pub(crate) fn coast(kart: &mut Kart, deceleration: f32) {
    if kart.speed.abs() <= deceleration {
        kart.speed = 0.0;
    } else {
        kart.speed -= deceleration * kart.speed.signum();
    }
}

fn apply_steering(kart: &mut Kart, steer: f32, tuning: &KartFile, dt: f32) {
    if kart.drift.is_drifting() && kart.speed <= 0.0 {
        kart.end_drift(&tuning.mini_turbo);
    }
    if !kart.is_moving() {
        return;
    }

    let drift = &tuning.drift;
    let Some(direction) = kart.drift.direction() else {
        kart.heading = wrap_angle(kart.heading + steer * kart.stats.turn_rate * kart.speed.signum());
        return;
    };

    let (turn, charge_rate) = if steer == 0.0 {
        (direction * drift.momentum_turn_speed, drift.charge_rate_neutral)
    } else if steer.signum() == direction {
        (direction * kart.stats.turn_rate, 1.0)
    } else {
        let counter = (drift.momentum_turn_speed * drift.counter_steer_ratio)
            .max(drift.counter_steer_floor);
        (direction * counter, drift.charge_rate_counter)
    };

    kart.heading = wrap_angle(kart.heading + turn);
    kart.charge_mini_turbo(dt * charge_rate, &tuning.mini_turbo);
}

pub fn settle_speed(kart: &mut Kart) {
    let limit = kart.current_speed_limit.max(0.0);
    kart.speed = kart.speed.clamp(-limit, limit);
}

pub fn integrate_motion(kart: &mut Kart, walls: &[WallSegment], tuning: &KartFile) -> bool {
    let collision = &tuning.collision;
    let bump = Vec2::new(kart.bump.x, kart.bump.z);
    let velocity = kart.forward() * kart.speed + bump;
    let radius = kart.collision_radius(collision, &tuning.effects);
    let mut ground = kart.ground_position();

    let hit_wall = match bounce_off_walls(ground, velocity, radius, walls) {
        Some(bounce) => {
            ground = bounce.position;
            let retained = bounce.velocity * collision.wall_speed_retention;
            let magnitude = retained.length();
            let reversing = kart.speed < 0.0;
            if magnitude > HEADING_EPSILON {
                let facing = if reversing { -retained } else { retained };
                kart.heading = wrap_angle(heading_of(facing));
            }
            kart.speed = if reversing { -magnitude } else { magnitude };
            kart.bump = Vec3::ZERO;
            true
        }
        None => {
            ground += velocity;
            false
        }
    };

    kart.position = Vec3::new(ground.x, kart.hop.height, ground.y);
    kart.decay_bump(collision);
    settle_speed(kart);
    hit_wall
}
