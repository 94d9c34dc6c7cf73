mod boxes;
mod hazards;

pub use boxes::ItemBox;
pub use hazards::{Hazard, HazardBody, HazardEvent, HazardField};

use crate::config::{GrantConfig, ItemTuningConfig, ItemsFile, KartFile};
use crate::gameplay::collision::{raycast_walls, reflect, RayHit, WallSegment};
use crate::gameplay::kart::{HitEffect, Kart, KartBody};
use bevy::prelude::*;
use rand::Rng;
use serde::Serialize;

const PROJECTILE_SPAWN_MARGIN: f32 = 0.1;

const FRONT_HALF_ITEMS: [ItemKind; 4] = [
    ItemKind::Mushroom,
    ItemKind::FakeItemBox,
    ItemKind::GreenShell,
    ItemKind::RedShell,
];
const BACK_HALF_ITEMS: [ItemKind; 4] = [
    ItemKind::Mushroom,
    ItemKind::Boo,
    ItemKind::FakeItemBox,
    ItemKind::RedShell,
];
const LAST_PLACE_ITEMS: [ItemKind; 3] = [ItemKind::Boo, ItemKind::LightningBolt, ItemKind::Mushroom];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Mushroom,
    Banana,
    FakeItemBox,
    GreenShell,
    RedShell,
    Boo,
    LightningBolt,
}

impl ItemKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mushroom => "mushroom",
            Self::Banana => "banana",
            Self::FakeItemBox => "fake item box",
            Self::GreenShell => "green shell",
            Self::RedShell => "red shell",
            Self::Boo => "boo",
            Self::LightningBolt => "lightning bolt",
        }
    }

    pub fn is_droppable(self) -> bool {
        matches!(self, Self::Banana | Self::FakeItemBox)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTier {
    Leader,
    FrontHalf,
    BackHalf,
    Last,
}

/// First matching branch wins: leader, then last place, then the back half.
pub fn item_tier(rank: usize, racer_count: usize) -> ItemTier {
    if rank <= 1 {
        ItemTier::Leader
    } else if rank >= racer_count {
        ItemTier::Last
    } else if rank > racer_count.div_ceil(2) {
        ItemTier::BackHalf
    } else {
        ItemTier::FrontHalf
    }
}

pub fn roll_item<R: Rng + ?Sized>(tier: ItemTier, rng: &mut R, grant: &GrantConfig) -> ItemKind {
    let pool: &[ItemKind] = match tier {
        ItemTier::Leader => {
            return if rng.random_bool(grant.first_place_banana_chance) {
                ItemKind::Banana
            } else {
                ItemKind::GreenShell
            };
        }
        ItemTier::FrontHalf => &FRONT_HALF_ITEMS,
        ItemTier::BackHalf => &BACK_HALF_ITEMS,
        ItemTier::Last => &LAST_PLACE_ITEMS,
    };
    pool[rng.random_range(0..pool.len())]
}

pub fn grant_item(
    kart: &mut Kart,
    rank: usize,
    racer_count: usize,
    grant: &GrantConfig,
) -> Option<ItemKind> {
    if kart.held_item.is_some() {
        return None;
    }
    let item = roll_item(item_tier(rank, racer_count), &mut kart.rng, grant);
    kart.held_item = Some(item);
    Some(item)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Consumed,
    Returned,
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct ItemContext<'a> {
    pub items: &'a ItemsFile,
    pub kart: &'a KartFile,
    pub standings: &'a [usize],
    pub walls: &'a [WallSegment],
}

pub fn use_item<K: KartBody>(
    user: usize,
    racers: &mut [K],
    hazards: &mut HazardField,
    rear_view: bool,
    context: &ItemContext,
) -> ItemOutcome {
    let Some(held) = racers.get(user).and_then(|racer| racer.kart().held_item) else {
        return ItemOutcome::Ignored;
    };
    if racers[user].kart().boo_loot.is_some() {
        return ItemOutcome::Ignored;
    }

    let items = &context.items.items;
    let outcome = match held {
        ItemKind::Mushroom => {
            racers[user].kart_mut().grant_mushroom(items);
            ItemOutcome::Consumed
        }
        ItemKind::Banana | ItemKind::FakeItemBox => {
            let kart = racers[user].kart();
            let position = kart.ground_position() - kart.forward() * items.hazard_drop_distance;
            hazards.spawn(
                user,
                position,
                HazardBody::Dropped(held),
                items.hazard_lifetime_seconds,
            );
            ItemOutcome::Consumed
        }
        ItemKind::GreenShell => {
            let kart = racers[user].kart();
            let direction = if rear_view {
                -kart.forward()
            } else {
                kart.forward()
            };
            let speed = context.kart.physics.max_speed * items.green_shell_speed_factor;
            let (position, wall) = projectile_launch(kart, direction, context);
            let body = match wall {
                None => Some(HazardBody::Bouncing {
                    velocity: direction * speed,
                    bounces_left: items.green_shell_bounces,
                }),
                Some(hit) => items
                    .green_shell_bounces
                    .checked_sub(1)
                    .map(|bounces_left| HazardBody::Bouncing {
                        velocity: reflect(direction * speed, hit.normal),
                        bounces_left,
                    }),
            };
            if let Some(body) = body {
                hazards.spawn(user, position, body, items.green_shell_lifetime_seconds);
            }
            ItemOutcome::Consumed
        }
        ItemKind::RedShell => fire_red_shell(user, racers, hazards, context),
        ItemKind::Boo => use_boo(user, racers, items),
        ItemKind::LightningBolt => {
            strike_lightning(user, racers, items);
            ItemOutcome::Consumed
        }
    };

    if outcome == ItemOutcome::Consumed && held != ItemKind::Boo {
        racers[user].kart_mut().held_item = None;
    }
    debug!("Racer {user} used {}: {outcome:?}.", held.label());
    outcome
}

/// Start point for a projectile leaving `kart`. A wall inside the spawn clearance
/// pulls the start point back in front of it and is returned alongside.
fn projectile_launch(kart: &Kart, direction: Vec2, context: &ItemContext) -> (Vec2, Option<RayHit>) {
    let origin = kart.ground_position();
    let shell_radius = context.items.items.shell_radius;
    let clearance = kart.collision_radius(&context.kart.collision, &context.kart.effects)
        + shell_radius
        + PROJECTILE_SPAWN_MARGIN;

    match raycast_walls(origin, direction, clearance + shell_radius, context.walls) {
        Some(hit) => {
            let reach = (hit.distance - shell_radius - PROJECTILE_SPAWN_MARGIN).max(0.0);
            (origin + direction * reach, Some(hit))
        }
        None => (origin + direction * clearance, None),
    }
}

pub fn red_shell_target<K: KartBody>(user: usize, racers: &[K], standings: &[usize]) -> Option<usize> {
    let place = standings.iter().position(|index| *index == user)?;
    standings[..place].iter().rev().copied().find(|index| {
        racers
            .get(*index)
            .is_some_and(|racer| racer.takes_collisions() && !racer.kart().is_invisible())
    })
}

fn fire_red_shell<K: KartBody>(
    user: usize,
    racers: &[K],
    hazards: &mut HazardField,
    context: &ItemContext,
) -> ItemOutcome {
    let Some(target) = red_shell_target(user, racers, context.standings) else {
        return ItemOutcome::Returned;
    };

    let items = &context.items.items;
    let kart = racers[user].kart();
    let toward = (racers[target].kart().ground_position() - kart.ground_position()).normalize_or_zero();
    let direction = if toward == Vec2::ZERO {
        kart.forward()
    } else {
        toward
    };
    let speed = context.kart.physics.max_speed * items.red_shell_speed_factor;
    let (position, wall) = projectile_launch(kart, direction, context);
    if wall.is_some() {
        debug!("Red shell from racer {user} broke on a wall at launch.");
        return ItemOutcome::Consumed;
    }
    hazards.spawn(
        user,
        position,
        HazardBody::Homing {
            velocity: direction * speed,
            target,
        },
        items.red_shell_lifetime_seconds,
    );
    ItemOutcome::Consumed
}

fn use_boo<K: KartBody>(user: usize, racers: &mut [K], items: &ItemTuningConfig) -> ItemOutcome {
    let victims: Vec<usize> = racers
        .iter()
        .enumerate()
        .filter(|(index, racer)| {
            let kart = racer.kart();
            *index != user && !kart.is_invisible() && kart.held_item.is_some()
        })
        .map(|(index, _)| index)
        .collect();

    let loot = if victims.is_empty() {
        ItemKind::Mushroom
    } else {
        let pick = racers[user].kart_mut().rng.random_range(0..victims.len());
        racers[victims[pick]]
            .kart_mut()
            .held_item
            .take()
            .unwrap_or(ItemKind::Mushroom)
    };

    let kart = racers[user].kart_mut();
    kart.effects.invisible_s = items.boo_duration_seconds;
    kart.boo_loot = Some(loot);
    ItemOutcome::Consumed
}

fn strike_lightning<K: KartBody>(user: usize, racers: &mut [K], items: &ItemTuningConfig) {
    let hit = HitEffect {
        stun_s: items.lightning_stun_seconds,
        speed_factor: items.lightning_speed_factor,
        shrink_s: items.lightning_shrink_seconds,
        drops_item: true,
    };
    for (index, racer) in racers.iter_mut().enumerate() {
        if index == user || !racer.takes_collisions() {
            continue;
        }
        racer.kart_mut().apply_hit(&hit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::gameplay::kart::KartStats;
    use crate::gameplay::track::Track;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const DT: f32 = 1.0 / 60.0;

    fn field_of(config: &GameConfig, count: usize) -> Vec<Kart> {
        (0..count)
            .map(|index| {
                Kart::new(
                    Vec3::new(index as f32 * 10.0, 0.0, 0.0),
                    0.0,
                    KartStats::from_physics(&config.kart),
                    index as u64 + 1,
                )
            })
            .collect()
    }

    fn context<'a>(config: &'a GameConfig, standings: &'a [usize]) -> ItemContext<'a> {
        ItemContext {
            items: &config.items,
            kart: &config.kart,
            standings,
            walls: &[],
        }
    }

    #[test]
    fn leader_rolls_mostly_bananas() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut rng = Pcg32::seed_from_u64(42);

        let mut bananas = 0;
        let mut green_shells = 0;
        for _ in 0..100 {
            match roll_item(ItemTier::Leader, &mut rng, &config.items.grant) {
                ItemKind::Banana => bananas += 1,
                ItemKind::GreenShell => green_shells += 1,
                other => panic!("leader should never roll {other:?}"),
            }
        }

        assert!((75..=85).contains(&bananas), "bananas: {bananas}");
        assert!((15..=25).contains(&green_shells), "green shells: {green_shells}");
    }

    #[test]
    fn tier_boundaries_hold_for_small_and_large_fields() {
        for racer_count in 2..=8usize {
            let half = racer_count.div_ceil(2);
            for rank in 1..=racer_count {
                let expected = if rank == 1 {
                    ItemTier::Leader
                } else if rank == racer_count {
                    ItemTier::Last
                } else if rank > half {
                    ItemTier::BackHalf
                } else {
                    ItemTier::FrontHalf
                };
                assert_eq!(item_tier(rank, racer_count), expected, "rank {rank} of {racer_count}");
            }
        }
        assert_eq!(item_tier(2, 2), ItemTier::Last);
        assert_eq!(item_tier(4, 8), ItemTier::FrontHalf);
        assert_eq!(item_tier(5, 8), ItemTier::BackHalf);
    }

    #[test]
    fn tier_pools_only_contain_their_items() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut rng = Pcg32::seed_from_u64(9);

        for _ in 0..200 {
            let last = roll_item(ItemTier::Last, &mut rng, &config.items.grant);
            assert!(LAST_PLACE_ITEMS.contains(&last));
            let back = roll_item(ItemTier::BackHalf, &mut rng, &config.items.grant);
            assert!(BACK_HALF_ITEMS.contains(&back));
            let front = roll_item(ItemTier::FrontHalf, &mut rng, &config.items.grant);
            assert!(FRONT_HALF_ITEMS.contains(&front));
        }
    }

    #[test]
    fn holding_an_item_blocks_new_grants() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 1);
        karts[0].held_item = Some(ItemKind::Boo);

        assert_eq!(grant_item(&mut karts[0], 1, 8, &config.items.grant), None);
        assert_eq!(karts[0].held_item, Some(ItemKind::Boo));
    }

    #[test]
    fn red_shell_is_returned_when_user_leads() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 3);
        karts[0].held_item = Some(ItemKind::RedShell);
        let standings = [0, 1, 2];
        let mut hazards = HazardField::default();

        let outcome = use_item(0, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(outcome, ItemOutcome::Returned);
        assert_eq!(karts[0].held_item, Some(ItemKind::RedShell));
        assert!(hazards.is_empty());
    }

    #[test]
    fn red_shell_skips_invisible_racers_ahead() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 3);
        karts[2].held_item = Some(ItemKind::RedShell);
        karts[1].effects.invisible_s = 2.0;
        let standings = [0, 1, 2];

        assert_eq!(red_shell_target(2, &karts, &standings), Some(0));

        karts[0].effects.invisible_s = 2.0;
        let mut hazards = HazardField::default();
        let outcome = use_item(2, &mut karts, &mut hazards, false, &context(&config, &standings));
        assert_eq!(outcome, ItemOutcome::Returned);
    }

    #[test]
    fn red_shell_locks_onto_the_racer_directly_ahead() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 3);
        karts[2].held_item = Some(ItemKind::RedShell);
        let standings = [0, 1, 2];
        let mut hazards = HazardField::default();

        let outcome = use_item(2, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(outcome, ItemOutcome::Consumed);
        assert_eq!(karts[2].held_item, None);
        assert!(matches!(
            hazards.hazards()[0].body,
            HazardBody::Homing { target: 1, .. }
        ));
    }

    #[test]
    fn green_shell_fires_backward_with_rear_view() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 1);
        karts[0].held_item = Some(ItemKind::GreenShell);
        let standings = [0];
        let mut hazards = HazardField::default();

        use_item(0, &mut karts, &mut hazards, true, &context(&config, &standings));

        let shell = &hazards.hazards()[0];
        assert!(shell.position.y < -1.5);
        let HazardBody::Bouncing { velocity, .. } = shell.body else {
            panic!("green shell should bounce");
        };
        assert!((velocity.y + 0.8 * 1.5).abs() < 1.0e-5);
    }

    #[test]
    fn green_shell_fired_into_an_adjacent_wall_stays_on_the_track() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let track = Track::from_config(&config.track);
        let mut karts = vec![Kart::new(
            Vec3::new(0.0, 0.0, 86.4),
            0.0,
            KartStats::from_physics(&config.kart),
            1,
        )];
        karts[0].held_item = Some(ItemKind::GreenShell);
        let standings = [0];
        let mut hazards = HazardField::default();
        let context = ItemContext {
            walls: &track.walls,
            ..context(&config, &standings)
        };

        let outcome = use_item(0, &mut karts, &mut hazards, false, &context);

        assert_eq!(outcome, ItemOutcome::Consumed);
        let HazardBody::Bouncing {
            velocity,
            bounces_left,
        } = hazards.hazards()[0].body
        else {
            panic!("green shell should bounce");
        };
        assert_eq!(bounces_left, config.items.items.green_shell_bounces - 1);
        assert!(velocity.y < 0.0);

        let outer = track.outer * config.track.walls.outer_scale;
        for _ in 0..30 {
            hazards.update(&mut karts, &track.walls, &config.kart, &config.items.items, DT);
            for shell in hazards.hazards() {
                let p = shell.position;
                assert!(
                    (p.x / outer.x).powi(2) + (p.y / outer.y).powi(2) <= 1.0,
                    "shell left the track through the wall: {p:?}"
                );
            }
        }
    }

    #[test]
    fn red_shell_launched_into_a_wall_breaks() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 2);
        karts[0].position = Vec3::new(0.0, 0.0, 10.0);
        karts[1].position = Vec3::new(0.0, 0.0, 0.5);
        karts[1].held_item = Some(ItemKind::RedShell);
        let walls = [WallSegment::new(Vec2::new(-10.0, 2.0), Vec2::new(10.0, 2.0))];
        let standings = [0, 1];
        let mut hazards = HazardField::default();
        let context = ItemContext {
            walls: &walls,
            ..context(&config, &standings)
        };

        let outcome = use_item(1, &mut karts, &mut hazards, false, &context);

        assert_eq!(outcome, ItemOutcome::Consumed);
        assert_eq!(karts[1].held_item, None);
        assert!(hazards.is_empty());
    }

    #[test]
    fn banana_lands_behind_the_user() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 1);
        karts[0].held_item = Some(ItemKind::Banana);
        let standings = [0];
        let mut hazards = HazardField::default();

        let outcome = use_item(0, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(outcome, ItemOutcome::Consumed);
        assert_eq!(karts[0].held_item, None);
        assert!((hazards.hazards()[0].position - Vec2::new(0.0, -4.0)).length() < 1.0e-5);
    }

    #[test]
    fn boo_steals_now_and_delivers_when_invisibility_ends() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 3);
        karts[0].held_item = Some(ItemKind::Boo);
        karts[2].held_item = Some(ItemKind::RedShell);
        let standings = [1, 2, 0];
        let mut hazards = HazardField::default();

        let outcome = use_item(0, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(outcome, ItemOutcome::Consumed);
        assert_eq!(karts[2].held_item, None);
        assert_eq!(karts[0].held_item, Some(ItemKind::Boo));
        assert!(karts[0].is_invisible());

        let again = use_item(0, &mut karts, &mut hazards, false, &context(&config, &standings));
        assert_eq!(again, ItemOutcome::Ignored);

        let ticks = (config.items.items.boo_duration_seconds / DT).ceil() as usize + 1;
        let mut delivered = None;
        for _ in 0..ticks {
            if let Some(item) = karts[0].tick_effects(DT) {
                delivered = Some(item);
            }
        }

        assert_eq!(delivered, Some(ItemKind::RedShell));
        assert_eq!(karts[0].held_item, Some(ItemKind::RedShell));
        assert!(!karts[0].is_invisible());
    }

    #[test]
    fn boo_without_victims_falls_back_to_a_mushroom() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 3);
        karts[0].held_item = Some(ItemKind::Boo);
        karts[1].held_item = Some(ItemKind::Banana);
        karts[1].effects.invisible_s = 1.0;
        let standings = [1, 2, 0];
        let mut hazards = HazardField::default();

        use_item(0, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(karts[1].held_item, Some(ItemKind::Banana));
        assert_eq!(karts[0].boo_loot, Some(ItemKind::Mushroom));
        assert_eq!(karts[0].held_item, Some(ItemKind::Boo));
    }

    #[test]
    fn lightning_skips_the_user_and_invisible_racers() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let items = &config.items.items;
        let mut karts = field_of(&config, 3);
        for kart in &mut karts {
            kart.speed = 0.6;
        }
        karts[0].held_item = Some(ItemKind::LightningBolt);
        karts[1].held_item = Some(ItemKind::Mushroom);
        karts[2].held_item = Some(ItemKind::Banana);
        karts[2].effects.invisible_s = 2.0;
        let standings = [1, 2, 0];
        let mut hazards = HazardField::default();

        let outcome = use_item(0, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(outcome, ItemOutcome::Consumed);
        assert_eq!(karts[0].held_item, None);
        assert!(!karts[0].is_shrunk());
        assert!((karts[0].speed - 0.6).abs() < 1.0e-6);

        assert!(karts[1].is_shrunk() && karts[1].is_stunned());
        assert_eq!(karts[1].held_item, None);
        assert!((karts[1].speed - 0.6 * items.lightning_speed_factor).abs() < 1.0e-6);

        assert!(!karts[2].is_shrunk());
        assert_eq!(karts[2].held_item, Some(ItemKind::Banana));
    }

    #[test]
    fn using_nothing_is_ignored() {
        let config = GameConfig::builtin().expect("builtin config should load");
        let mut karts = field_of(&config, 2);
        let standings = [0, 1];
        let mut hazards = HazardField::default();

        let outcome = use_item(1, &mut karts, &mut hazards, false, &context(&config, &standings));

        assert_eq!(outcome, ItemOutcome::Ignored);
    }
}
