use super::*;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankKey {
    pub finish_position: Option<usize>,
    pub lap: u32,
    pub marker: usize,
    pub distance_to_next: f32,
}

impl RankKey {
    pub fn of(progress: &LapProgress, position: Vec2, track: &Track) -> Self {
        let distance_to_next = track
            .next_checkpoint_index(progress.checkpoint)
            .map_or(f32::INFINITY, |next| track.distance_to_checkpoint(next, position));

        Self {
            finish_position: progress.finish_position,
            lap: progress.lap,
            marker: progress.marker(track.start_finish_index()),
            distance_to_next,
        }
    }

    /// `Less` means `self` is ahead.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.finish_position, other.finish_position) {
            (Some(a), Some(b)) => return a.cmp(&b),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }

        other
            .lap
            .cmp(&self.lap)
            .then_with(|| other.marker.cmp(&self.marker))
            .then_with(|| self.distance_to_next.total_cmp(&other.distance_to_next))
    }
}

pub fn compute_standings(keys: &[RankKey]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|a, b| keys[*a].compare(&keys[*b]).then_with(|| a.cmp(b)));
    order
}
