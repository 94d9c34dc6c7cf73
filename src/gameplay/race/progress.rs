use super::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing {
    Checkpoint(usize),
    Lap { completed_lap: u32, lap_time_s: f32 },
    Finish { lap_time_s: f32, race_time_s: f32 },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LapProgress {
    pub lap: u32,
    pub checkpoint: usize,
    pub lap_started_s: f32,
    pub lap_times: Vec<f32>,
    pub best_lap_s: Option<f32>,
    pub completed: bool,
    pub finish_position: Option<usize>,
    pub finish_time_s: Option<f32>,
}

impl LapProgress {
    pub fn on_grid(start_finish: usize) -> Self {
        Self {
            lap: 1,
            checkpoint: start_finish,
            ..default()
        }
    }

    pub fn marker(&self, start_finish: Option<usize>) -> usize {
        if Some(self.checkpoint) == start_finish {
            0
        } else {
            self.checkpoint + 1
        }
    }

    pub fn cross(
        &mut self,
        track: &Track,
        previous: Vec2,
        current: Vec2,
        elapsed_s: f32,
        max_laps: u32,
    ) -> Option<Crossing> {
        if self.completed {
            return None;
        }
        let expected = track.next_checkpoint_index(self.checkpoint)?;
        let start_finish = track.start_finish_index()?;

        let mut crossing = None;
        for gate in &track.checkpoints {
            if !gate.crossed_by(previous, current) {
                continue;
            }
            if gate.index != expected {
                debug!(
                    "Ignored out-of-order crossing of `{}` (expected gate {expected}).",
                    gate.label
                );
                continue;
            }

            self.checkpoint = gate.index;
            if gate.index != start_finish {
                crossing = Some(Crossing::Checkpoint(gate.index));
                break;
            }

            let lap_time_s = elapsed_s - self.lap_started_s;
            self.lap_times.push(lap_time_s);
            self.best_lap_s = Some(self.best_lap_s.map_or(lap_time_s, |best| best.min(lap_time_s)));
            self.lap_started_s = elapsed_s;
            let completed_lap = self.lap;
            self.lap += 1;

            crossing = if self.lap > max_laps {
                self.completed = true;
                self.finish_time_s = Some(elapsed_s);
                Some(Crossing::Finish {
                    lap_time_s,
                    race_time_s: elapsed_s,
                })
            } else {
                Some(Crossing::Lap {
                    completed_lap,
                    lap_time_s,
                })
            };
            break;
        }
        crossing
    }
}
