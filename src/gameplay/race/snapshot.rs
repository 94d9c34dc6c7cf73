use super::*;
use crate::gameplay::kart::SparkColor;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub elapsed_s: f32,
    pub countdown_s: f32,
    pub max_laps: u32,
    pub finished: bool,
    pub finishing_rank: Option<usize>,
    pub racers: Vec<RacerSnapshot>,
    pub hazards: Vec<HazardSnapshot>,
    pub item_boxes: Vec<ItemBoxSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacerSnapshot {
    pub id: RacerId,
    pub name: String,
    pub is_player: bool,
    pub position: [f32; 3],
    pub heading: f32,
    pub speed: f32,
    pub hop_height: f32,
    pub lap: u32,
    pub rank: usize,
    pub held_item: Option<ItemKind>,
    pub drifting: bool,
    pub mini_turbo_stage: u8,
    pub spark: Option<SparkColor>,
    pub stunned: bool,
    pub invisible: bool,
    pub shrunk: bool,
    pub boosting: bool,
    pub off_track: bool,
    pub rear_view: bool,
    pub finish_position: Option<usize>,
    pub lap_times: Vec<f32>,
    pub best_lap_s: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HazardSnapshot {
    pub kind: ItemKind,
    pub position: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemBoxSnapshot {
    pub position: [f32; 2],
    pub active: bool,
}

impl RacerSnapshot {
    pub(super) fn of(racer: &Racer) -> Self {
        let kart = &racer.kart;
        Self {
            id: racer.id,
            name: racer.name.clone(),
            is_player: racer.is_player(),
            position: kart.position.to_array(),
            heading: kart.heading,
            speed: kart.speed,
            hop_height: kart.hop.height,
            lap: racer.progress.lap,
            rank: racer.rank,
            held_item: kart.held_item,
            drifting: kart.drift.is_active(),
            mini_turbo_stage: kart.mini_turbo_stage,
            spark: kart.spark_color(),
            stunned: kart.is_stunned(),
            invisible: kart.is_invisible(),
            shrunk: kart.is_shrunk(),
            boosting: kart.is_boosting(),
            off_track: kart.off_track,
            rear_view: racer.rear_view(),
            finish_position: racer.progress.finish_position,
            lap_times: racer.progress.lap_times.clone(),
            best_lap_s: racer.progress.best_lap_s,
        }
    }
}

impl Race {
    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            elapsed_s: self.elapsed_s,
            countdown_s: self.countdown_s,
            max_laps: self.rules.max_laps,
            finished: self.finished,
            finishing_rank: self.finishing_rank,
            racers: self.racers.iter().map(RacerSnapshot::of).collect(),
            hazards: self
                .hazards
                .hazards()
                .iter()
                .map(|hazard| HazardSnapshot {
                    kind: hazard.kind(),
                    position: hazard.position.to_array(),
                })
                .collect(),
            item_boxes: self
                .item_boxes
                .iter()
                .map(|item_box| ItemBoxSnapshot {
                    position: item_box.position.to_array(),
                    active: item_box.active,
                })
                .collect(),
        }
    }
}
