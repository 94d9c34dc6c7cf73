mod progress;
mod ranking;
mod snapshot;

pub use progress::{Crossing, LapProgress};
pub use ranking::{compute_standings, RankKey};
pub use snapshot::{HazardSnapshot, ItemBoxSnapshot, RaceSnapshot, RacerSnapshot};

use crate::config::{GameConfig, ItemsFile, KartFile, RaceConfig};
use crate::gameplay::collision::resolve_kart_bumps;
use crate::gameplay::items::{
    grant_item, use_item, HazardEvent, HazardField, ItemBox, ItemContext, ItemKind, ItemOutcome,
};
use crate::gameplay::kart::{
    coast, drive_with_intents, integrate_motion, settle_speed, ControlIntents, IntentEdges, Kart,
    KartBody, KartStats,
};
use crate::gameplay::steering::{scan_rivals, AgentBrain, AgentStats, ItemSituation};
use crate::gameplay::track::{GridSlot, Track};
use bevy::prelude::*;
use serde::Serialize;
use std::fmt::{Display, Formatter};

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;
const PLAYER_NAME: &str = "Player";
const AGENT_NAMES: [&str; 7] = ["Vesa", "Kaisa", "Otso", "Aino", "Lauri", "Meri", "Tuuli"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RacerId(pub usize);

impl Display for RacerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Controller {
    Player { edges: IntentEdges, rear_view: bool },
    Agent(AgentBrain),
}

#[derive(Debug, Clone)]
pub struct Racer {
    pub id: RacerId,
    pub name: String,
    pub kart: Kart,
    pub progress: LapProgress,
    pub controller: Controller,
    pub previous_ground: Vec2,
    pub rank: usize,
}

impl Racer {
    pub fn is_player(&self) -> bool {
        matches!(self.controller, Controller::Player { .. })
    }

    pub fn rear_view(&self) -> bool {
        matches!(self.controller, Controller::Player { rear_view: true, .. })
    }
}

impl KartBody for Racer {
    fn kart(&self) -> &Kart {
        &self.kart
    }

    fn kart_mut(&mut self) -> &mut Kart {
        &mut self.kart
    }

    fn takes_collisions(&self) -> bool {
        !self.progress.completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RaceEvent {
    Started,
    CheckpointPassed {
        racer: usize,
        checkpoint: usize,
    },
    LapCompleted {
        racer: usize,
        lap: u32,
        lap_time_s: f32,
    },
    RacerFinished {
        racer: usize,
        position: usize,
        race_time_s: f32,
    },
    ItemGranted {
        racer: usize,
        item: ItemKind,
    },
    ItemUsed {
        racer: usize,
        item: ItemKind,
        outcome: ItemOutcome,
    },
    BooResolved {
        racer: usize,
        item: ItemKind,
    },
    RacerHit {
        kind: ItemKind,
        owner: usize,
        victim: usize,
    },
    HazardsCollided {
        first: ItemKind,
        second: ItemKind,
    },
    Finished {
        finishing_rank: Option<usize>,
        timed_out: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Race {
    tuning: KartFile,
    items: ItemsFile,
    rules: RaceConfig,
    track: Track,
    racers: Vec<Racer>,
    item_boxes: Vec<ItemBox>,
    hazards: HazardField,
    standings: Vec<usize>,
    player: Option<usize>,
    countdown_s: f32,
    elapsed_s: f32,
    next_finish_position: usize,
    finished: bool,
    finishing_rank: Option<usize>,
}

impl Race {
    pub fn new(config: &GameConfig) -> Self {
        Self::with_field(config, config.game.app.agent_count, true)
    }

    pub fn with_field(config: &GameConfig, agent_count: usize, with_player: bool) -> Self {
        let track = Track::from_config(&config.track);
        let total = agent_count + usize::from(with_player);
        let slots = track.grid_slots(total);
        let start_finish = track.start_finish_index().unwrap_or_default();
        let difficulty = config.selected_difficulty();
        if difficulty.is_none() {
            warn!(
                "Difficulty `{}` not found; agents use plain kart stats.",
                config.game.app.difficulty
            );
        }

        let racers: Vec<Racer> = (0..total)
            .map(|index| {
                let slot = slots.get(index).copied().unwrap_or(GridSlot {
                    position: Vec2::ZERO,
                    heading: 0.0,
                });
                let seed = config
                    .game
                    .app
                    .seed
                    .wrapping_add((index as u64 + 1).wrapping_mul(SEED_STRIDE));
                let mut kart = Kart::new(
                    Vec3::new(slot.position.x, 0.0, slot.position.y),
                    slot.heading,
                    KartStats::from_physics(&config.kart),
                    seed,
                );

                let is_player = with_player && index + 1 == total;
                let (name, controller) = if is_player {
                    (
                        PLAYER_NAME.to_string(),
                        Controller::Player {
                            edges: IntentEdges::default(),
                            rear_view: false,
                        },
                    )
                } else {
                    let stats = match difficulty {
                        Some(difficulty) => AgentStats::roll(&config.kart, difficulty, &mut kart.rng),
                        None => AgentStats::untuned(&config.kart),
                    };
                    kart.set_stats(stats.kart_stats());
                    (
                        AGENT_NAMES[index % AGENT_NAMES.len()].to_string(),
                        Controller::Agent(AgentBrain::new(stats)),
                    )
                };

                Racer {
                    id: RacerId(index),
                    name,
                    kart,
                    progress: LapProgress::on_grid(start_finish),
                    controller,
                    previous_ground: slot.position,
                    rank: index + 1,
                }
            })
            .collect();

        let item_boxes = track
            .item_box_positions()
            .into_iter()
            .map(ItemBox::new)
            .collect();

        let mut race = Self {
            tuning: config.kart.clone(),
            items: config.items.clone(),
            rules: config.game.race.clone(),
            player: with_player.then(|| total - 1),
            track,
            racers,
            item_boxes,
            hazards: HazardField::default(),
            standings: Vec::new(),
            countdown_s: config.game.race.countdown_seconds.max(0.0),
            elapsed_s: 0.0,
            next_finish_position: 1,
            finished: false,
            finishing_rank: None,
        };
        race.refresh_standings();
        race
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn racers(&self) -> &[Racer] {
        &self.racers
    }

    pub fn racer(&self, index: usize) -> Option<&Racer> {
        self.racers.get(index)
    }

    pub fn player_index(&self) -> Option<usize> {
        self.player
    }

    pub fn player(&self) -> Option<&Racer> {
        self.player.and_then(|index| self.racers.get(index))
    }

    pub fn standings(&self) -> &[usize] {
        &self.standings
    }

    pub fn hazards(&self) -> &HazardField {
        &self.hazards
    }

    pub fn item_boxes(&self) -> &[ItemBox] {
        &self.item_boxes
    }

    pub fn countdown_remaining(&self) -> f32 {
        self.countdown_s
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed_s
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn finishing_rank(&self) -> Option<usize> {
        self.finishing_rank
    }

    pub fn max_laps(&self) -> u32 {
        self.rules.max_laps
    }

    pub fn step(&mut self, dt: f32, intents: &ControlIntents) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        if self.finished || dt <= 0.0 {
            return events;
        }
        if self.countdown_s > 0.0 {
            self.countdown_s = (self.countdown_s - dt).max(0.0);
            if self.countdown_s <= 0.0 {
                events.push(RaceEvent::Started);
            }
            return events;
        }
        self.elapsed_s += dt;

        let requests = self.drive_racers(dt, intents, &mut events);
        resolve_kart_bumps(&mut self.racers, &self.tuning.collision, &self.tuning.effects);
        self.refresh_standings();
        self.resolve_item_requests(&requests, &mut events);
        self.collect_item_boxes(dt, &mut events);
        self.update_hazards(dt, &mut events);
        self.evaluate_checkpoints(&mut events);
        self.refresh_standings();
        self.check_race_finished(&mut events);
        events
    }

    fn drive_racers(
        &mut self,
        dt: f32,
        intents: &ControlIntents,
        events: &mut Vec<RaceEvent>,
    ) -> Vec<usize> {
        let committed: Vec<Vec2> = self
            .racers
            .iter()
            .map(|racer| racer.kart.ground_position())
            .collect();
        let racer_count = self.racers.len();
        let mut requests = Vec::new();

        for (index, racer) in self.racers.iter_mut().enumerate() {
            racer.previous_ground = committed[index];
            if let Some(item) = racer.kart.tick_effects(dt) {
                events.push(RaceEvent::BooResolved {
                    racer: index,
                    item,
                });
            }
            racer.kart.off_track = self.track.is_off_track(racer.kart.ground_position());
            racer
                .kart
                .refresh_speed_limit(&self.tuning, &self.items.items);

            if racer.progress.completed {
                coast(&mut racer.kart, self.tuning.physics.deceleration);
                settle_speed(&mut racer.kart);
            } else {
                match &mut racer.controller {
                    Controller::Player { edges, rear_view } => {
                        *rear_view = intents.rear_view;
                        if drive_with_intents(&mut racer.kart, intents, edges, &self.tuning, dt) {
                            requests.push(index);
                        }
                    }
                    Controller::Agent(brain) => {
                        brain.drive(
                            &mut racer.kart,
                            &self.track.centerline,
                            &self.tuning,
                            &self.items.items,
                            dt,
                        );
                        let (pursuer_behind, rival_ahead) = scan_rivals(
                            &racer.kart,
                            committed
                                .iter()
                                .enumerate()
                                .filter(|(other, _)| *other != index)
                                .map(|(_, position)| *position),
                        );
                        let situation = ItemSituation {
                            rank: racer.rank,
                            racer_count,
                            pursuer_behind,
                            rival_ahead,
                        };
                        if brain.wants_item(&mut racer.kart, &situation, dt) {
                            requests.push(index);
                        }
                    }
                }
            }

            integrate_motion(&mut racer.kart, &self.track.walls, &self.tuning);
        }

        requests
    }

    fn resolve_item_requests(&mut self, requests: &[usize], events: &mut Vec<RaceEvent>) {
        for &index in requests {
            let Some(item) = self.racers[index].kart.held_item else {
                continue;
            };
            let rear_view = self.racers[index].rear_view();
            let context = ItemContext {
                items: &self.items,
                kart: &self.tuning,
                standings: &self.standings,
                walls: &self.track.walls,
            };

            let outcome = use_item(index, &mut self.racers, &mut self.hazards, rear_view, &context);
            if outcome != ItemOutcome::Ignored {
                events.push(RaceEvent::ItemUsed {
                    racer: index,
                    item,
                    outcome,
                });
            }
        }
    }

    fn collect_item_boxes(&mut self, dt: f32, events: &mut Vec<RaceEvent>) {
        for item_box in &mut self.item_boxes {
            item_box.tick(dt);
        }

        let racer_count = self.racers.len();
        for (index, racer) in self.racers.iter_mut().enumerate() {
            if racer.progress.completed {
                continue;
            }
            for item_box in &mut self.item_boxes {
                if !item_box.try_consume(&racer.kart, &self.items.item_boxes) {
                    continue;
                }
                if let Some(item) =
                    grant_item(&mut racer.kart, racer.rank, racer_count, &self.items.grant)
                {
                    events.push(RaceEvent::ItemGranted { racer: index, item });
                }
            }
        }
    }

    fn update_hazards(&mut self, dt: f32, events: &mut Vec<RaceEvent>) {
        let hazard_events = self.hazards.update(
            &mut self.racers,
            &self.track.walls,
            &self.tuning,
            &self.items.items,
            dt,
        );

        events.extend(hazard_events.into_iter().filter_map(|event| match event {
            HazardEvent::RacerHit {
                kind,
                owner,
                victim,
            } => Some(RaceEvent::RacerHit {
                kind,
                owner,
                victim,
            }),
            HazardEvent::Collided { first, second } => {
                Some(RaceEvent::HazardsCollided { first, second })
            }
            HazardEvent::Expired { .. } => None,
        }));
    }

    fn evaluate_checkpoints(&mut self, events: &mut Vec<RaceEvent>) {
        for (index, racer) in self.racers.iter_mut().enumerate() {
            let Some(crossing) = racer.progress.cross(
                &self.track,
                racer.previous_ground,
                racer.kart.ground_position(),
                self.elapsed_s,
                self.rules.max_laps,
            ) else {
                continue;
            };

            match crossing {
                Crossing::Checkpoint(checkpoint) => {
                    events.push(RaceEvent::CheckpointPassed {
                        racer: index,
                        checkpoint,
                    });
                }
                Crossing::Lap {
                    completed_lap,
                    lap_time_s,
                } => {
                    info!(
                        "{} completed lap {completed_lap} in {lap_time_s:.2}s.",
                        racer.name
                    );
                    events.push(RaceEvent::LapCompleted {
                        racer: index,
                        lap: completed_lap,
                        lap_time_s,
                    });
                }
                Crossing::Finish { race_time_s, .. } => {
                    let position = self.next_finish_position;
                    self.next_finish_position += 1;
                    racer.progress.finish_position = Some(position);
                    info!(
                        "{} finished in position {position} after {race_time_s:.2}s.",
                        racer.name
                    );
                    events.push(RaceEvent::RacerFinished {
                        racer: index,
                        position,
                        race_time_s,
                    });
                }
            }
        }
    }

    fn refresh_standings(&mut self) {
        let keys: Vec<RankKey> = self
            .racers
            .iter()
            .map(|racer| RankKey::of(&racer.progress, racer.kart.ground_position(), &self.track))
            .collect();
        self.standings = compute_standings(&keys);
        for (place, index) in self.standings.iter().enumerate() {
            self.racers[*index].rank = place + 1;
        }
    }

    fn check_race_finished(&mut self, events: &mut Vec<RaceEvent>) {
        let done = match self.player {
            Some(player) => self.racers[player].progress.completed,
            None => !self.racers.is_empty() && self.racers.iter().all(|racer| racer.progress.completed),
        };
        let timed_out =
            self.rules.max_race_seconds > 0.0 && self.elapsed_s >= self.rules.max_race_seconds;
        if !done && !timed_out {
            return;
        }

        self.finished = true;
        self.finishing_rank = self.player().map(|player| {
            player
                .progress
                .finish_position
                .unwrap_or(player.rank)
        });
        info!(
            "Race finished after {:.2}s (finishing rank {:?}, timed out: {}).",
            self.elapsed_s,
            self.finishing_rank,
            !done
        );
        events.push(RaceEvent::Finished {
            finishing_rank: self.finishing_rank,
            timed_out: !done,
        });
    }
}
