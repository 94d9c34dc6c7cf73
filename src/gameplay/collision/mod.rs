use crate::config::{CollisionConfig, EffectsConfig};
use crate::gameplay::kart::KartBody;
use bevy::prelude::*;

const PARALLEL_EPSILON: f32 = 1.0e-6;
const COINCIDENT_EPSILON: f32 = 1.0e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallSegment {
    pub start: Vec2,
    pub end: Vec2,
}

impl WallSegment {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec2,
    /// Unit normal facing back against the ray.
    pub normal: Vec2,
}

pub fn raycast_segment(
    origin: Vec2,
    direction: Vec2,
    max_distance: f32,
    segment: &WallSegment,
) -> Option<RayHit> {
    let edge = segment.end - segment.start;
    let denom = direction.perp_dot(edge);
    if denom.abs() <= PARALLEL_EPSILON {
        return None;
    }

    let to_start = segment.start - origin;
    let distance = to_start.perp_dot(edge) / denom;
    let along_edge = to_start.perp_dot(direction) / denom;
    if distance < 0.0 || distance > max_distance || !(0.0..=1.0).contains(&along_edge) {
        return None;
    }

    let mut normal = edge.perp().normalize_or_zero();
    if normal.length_squared() <= f32::EPSILON {
        return None;
    }
    if normal.dot(direction) > 0.0 {
        normal = -normal;
    }

    Some(RayHit {
        distance,
        point: origin + direction * distance,
        normal,
    })
}

pub fn raycast_walls(
    origin: Vec2,
    direction: Vec2,
    max_distance: f32,
    walls: &[WallSegment],
) -> Option<RayHit> {
    let direction = direction.normalize_or_zero();
    if direction.length_squared() <= f32::EPSILON {
        return None;
    }

    walls
        .iter()
        .filter_map(|wall| raycast_segment(origin, direction, max_distance, wall))
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

pub fn reflect(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - normal * (2.0 * velocity.dot(normal))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallBounce {
    pub position: Vec2,
    pub velocity: Vec2,
}

pub fn bounce_off_walls(
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    walls: &[WallSegment],
) -> Option<WallBounce> {
    let travel = velocity.length();
    if travel <= f32::EPSILON {
        return None;
    }
    let direction = velocity / travel;
    let hit = raycast_walls(position, direction, travel + radius, walls)?;
    if hit.distance - radius > travel {
        return None;
    }

    Some(WallBounce {
        position: position + direction * (hit.distance - radius).max(0.0),
        velocity: reflect(velocity, hit.normal),
    })
}

pub fn resolve_kart_bumps<K: KartBody>(
    bodies: &mut [K],
    collision: &CollisionConfig,
    effects: &EffectsConfig,
) -> usize {
    let snapshot: Vec<Option<(Vec2, f32, f32)>> = bodies
        .iter()
        .map(|body| {
            body.takes_collisions().then(|| {
                let kart = body.kart();
                (
                    kart.ground_position(),
                    kart.collision_radius(collision, effects),
                    kart.impulse_weight(effects),
                )
            })
        })
        .collect();

    let mut impulses = vec![Vec2::ZERO; bodies.len()];
    let mut contacts = 0;
    for a in 0..snapshot.len() {
        let Some((position_a, radius_a, weight_a)) = snapshot[a] else {
            continue;
        };
        for b in (a + 1)..snapshot.len() {
            let Some((position_b, radius_b, weight_b)) = snapshot[b] else {
                continue;
            };

            let offset = position_a - position_b;
            let distance = offset.length();
            if distance >= radius_a + radius_b {
                continue;
            }

            let normal = if distance <= COINCIDENT_EPSILON {
                bodies[a].kart_mut().random_unit_direction()
            } else {
                offset / distance
            };

            impulses[a] += normal * (collision.bump_strength * weight_b / weight_a);
            impulses[b] -= normal * (collision.bump_strength * weight_a / weight_b);
            contacts += 1;
        }
    }

    for (body, impulse) in bodies.iter_mut().zip(impulses) {
        if impulse != Vec2::ZERO {
            body.kart_mut().add_bump(impulse);
        }
    }

    contacts
}
