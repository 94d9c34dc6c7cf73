use super::*;
use crate::gameplay::collision::{bounce_off_walls, raycast_walls, WallSegment};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HazardBody {
    Dropped(ItemKind),
    Bouncing { velocity: Vec2, bounces_left: u32 },
    Homing { velocity: Vec2, target: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub id: u32,
    pub body: HazardBody,
    pub position: Vec2,
    pub owner: usize,
    pub lifetime_s: f32,
}

impl Hazard {
    pub fn kind(&self) -> ItemKind {
        match self.body {
            HazardBody::Dropped(kind) => kind,
            HazardBody::Bouncing { .. } => ItemKind::GreenShell,
            HazardBody::Homing { .. } => ItemKind::RedShell,
        }
    }

    pub fn is_projectile(&self) -> bool {
        !matches!(self.body, HazardBody::Dropped(_))
    }

    pub fn radius(&self, items: &ItemTuningConfig) -> f32 {
        if self.is_projectile() {
            items.shell_radius
        } else {
            items.hazard_radius
        }
    }

    fn hit_effect(&self, items: &ItemTuningConfig) -> HitEffect {
        let (stun_s, speed_factor) = match self.kind() {
            ItemKind::FakeItemBox => (items.fake_box_stun_seconds, items.fake_box_speed_factor),
            ItemKind::GreenShell => (
                items.green_shell_stun_seconds,
                items.green_shell_hit_speed_factor,
            ),
            ItemKind::RedShell => (items.red_shell_stun_seconds, items.red_shell_hit_speed_factor),
            _ => (items.banana_stun_seconds, items.banana_speed_factor),
        };
        HitEffect {
            stun_s,
            speed_factor,
            shrink_s: 0.0,
            drops_item: false,
        }
    }

    fn can_hit(&self, racer: usize) -> bool {
        match self.body {
            HazardBody::Dropped(_) => true,
            HazardBody::Bouncing { .. } | HazardBody::Homing { .. } => racer != self.owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HazardEvent {
    RacerHit {
        kind: ItemKind,
        owner: usize,
        victim: usize,
    },
    Collided {
        first: ItemKind,
        second: ItemKind,
    },
    Expired {
        kind: ItemKind,
    },
}

#[derive(Debug, Clone, Default)]
pub struct HazardField {
    hazards: Vec<Hazard>,
    next_id: u32,
}

impl HazardField {
    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    pub fn len(&self) -> usize {
        self.hazards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }

    pub fn spawn(&mut self, owner: usize, position: Vec2, body: HazardBody, lifetime_s: f32) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.hazards.push(Hazard {
            id,
            body,
            position,
            owner,
            lifetime_s,
        });
        id
    }

    pub fn update<K: KartBody>(
        &mut self,
        racers: &mut [K],
        walls: &[WallSegment],
        tuning: &KartFile,
        items: &ItemTuningConfig,
        dt: f32,
    ) -> Vec<HazardEvent> {
        let mut events = Vec::new();
        self.advance(racers, walls, items, dt, &mut events);
        self.resolve_hazard_contacts(items, &mut events);
        self.resolve_racer_contacts(racers, tuning, items, &mut events);
        events
    }

    fn advance<K: KartBody>(
        &mut self,
        racers: &[K],
        walls: &[WallSegment],
        items: &ItemTuningConfig,
        dt: f32,
        events: &mut Vec<HazardEvent>,
    ) {
        self.hazards.retain_mut(|hazard| {
            hazard.lifetime_s -= dt;
            if hazard.lifetime_s <= 0.0 {
                events.push(HazardEvent::Expired {
                    kind: hazard.kind(),
                });
                return false;
            }

            match &mut hazard.body {
                HazardBody::Dropped(_) => true,
                HazardBody::Bouncing {
                    velocity,
                    bounces_left,
                } => match bounce_off_walls(hazard.position, *velocity, items.shell_radius, walls) {
                    Some(bounce) => {
                        if *bounces_left == 0 {
                            events.push(HazardEvent::Expired {
                                kind: ItemKind::GreenShell,
                            });
                            return false;
                        }
                        *bounces_left -= 1;
                        hazard.position = bounce.position;
                        *velocity = bounce.velocity;
                        true
                    }
                    None => {
                        hazard.position += *velocity;
                        true
                    }
                },
                HazardBody::Homing { velocity, target } => {
                    if let Some(racer) = racers.get(*target) {
                        let kart = racer.kart();
                        if racer.takes_collisions() && !kart.is_invisible() {
                            let toward = (kart.ground_position() - hazard.position).normalize_or_zero();
                            if toward != Vec2::ZERO {
                                *velocity = toward * velocity.length();
                            }
                        }
                    }

                    let travel = velocity.length();
                    let blocked = raycast_walls(
                        hazard.position,
                        *velocity,
                        travel + items.shell_radius,
                        walls,
                    )
                    .is_some_and(|hit| hit.distance - items.shell_radius <= travel);
                    if blocked {
                        events.push(HazardEvent::Expired {
                            kind: ItemKind::RedShell,
                        });
                        return false;
                    }
                    hazard.position += *velocity;
                    true
                }
            }
        });
    }

    fn resolve_hazard_contacts(&mut self, items: &ItemTuningConfig, events: &mut Vec<HazardEvent>) {
        let mut destroyed = vec![false; self.hazards.len()];
        for a in 0..self.hazards.len() {
            for b in (a + 1)..self.hazards.len() {
                if destroyed[a] || destroyed[b] {
                    continue;
                }
                let (first, second) = (&self.hazards[a], &self.hazards[b]);
                if !first.is_projectile() && !second.is_projectile() {
                    continue;
                }
                let reach = first.radius(items) + second.radius(items);
                if first.position.distance_squared(second.position) < reach * reach {
                    destroyed[a] = true;
                    destroyed[b] = true;
                    events.push(HazardEvent::Collided {
                        first: first.kind(),
                        second: second.kind(),
                    });
                }
            }
        }

        let mut index = 0;
        self.hazards.retain(|_| {
            let keep = !destroyed[index];
            index += 1;
            keep
        });
    }

    fn resolve_racer_contacts<K: KartBody>(
        &mut self,
        racers: &mut [K],
        tuning: &KartFile,
        items: &ItemTuningConfig,
        events: &mut Vec<HazardEvent>,
    ) {
        self.hazards.retain(|hazard| {
            let radius = hazard.radius(items);
            let victim = racers.iter().enumerate().position(|(index, racer)| {
                let kart = racer.kart();
                let reach = radius + kart.collision_radius(&tuning.collision, &tuning.effects);
                hazard.can_hit(index)
                    && racer.takes_collisions()
                    && !kart.is_invisible()
                    && kart.ground_position().distance_squared(hazard.position) < reach * reach
            });
            let Some(victim) = victim else {
                return true;
            };

            racers[victim].kart_mut().apply_hit(&hazard.hit_effect(items));
            events.push(HazardEvent::RacerHit {
                kind: hazard.kind(),
                owner: hazard.owner,
                victim,
            });
            false
        });
    }
}
