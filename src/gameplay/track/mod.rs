mod path;

pub use path::{CenterlinePath, PathProjection};

use crate::config::{GridConfig, ItemBoxLayoutConfig, TrackFile};
use crate::gameplay::collision::WallSegment;
use crate::gameplay::kart::heading_of;
use bevy::prelude::*;
use path::sample_ellipse;
use std::f32::consts::TAU;

const MIN_CHECKPOINTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub index: usize,
    pub position: Vec2,
    pub angle: f32,
    pub normal: Vec2,
    pub tangent: Vec2,
    pub half_width: f32,
    pub label: String,
    pub color: String,
}

impl Checkpoint {
    pub fn signed_distance(&self, point: Vec2) -> f32 {
        (point - self.position).dot(self.normal)
    }

    /// `true` when the step `previous -> current` passes through the gate in the
    /// direction of travel.
    pub fn crossed_by(&self, previous: Vec2, current: Vec2) -> bool {
        let before = self.signed_distance(previous);
        let after = self.signed_distance(current);
        if !(before < 0.0 && after >= 0.0) {
            return false;
        }

        let t = before / (before - after);
        let crossing = previous + (current - previous) * t;
        (crossing - self.position).dot(self.tangent).abs() <= self.half_width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSlot {
    pub position: Vec2,
    pub heading: f32,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub outer: Vec2,
    pub inner: Vec2,
    pub centerline: CenterlinePath,
    pub walls: Vec<WallSegment>,
    pub checkpoints: Vec<Checkpoint>,
    grid: GridConfig,
    item_box_layout: ItemBoxLayoutConfig,
}

impl Track {
    pub fn from_config(config: &TrackFile) -> Self {
        let bounds = &config.bounds;
        let outer = Vec2::new(bounds.outer_length, bounds.outer_width) * 0.5;
        let inner = Vec2::new(bounds.inner_length, bounds.inner_width) * 0.5;
        let centerline = CenterlinePath::ellipse((outer + inner) * 0.5, config.centerline.samples);

        let mut walls = Vec::with_capacity(config.walls.segments * 2 + config.walls.extra.len());
        walls.extend(closed_polyline(&sample_ellipse(
            outer * config.walls.outer_scale,
            config.walls.segments,
        )));
        walls.extend(closed_polyline(&sample_ellipse(
            inner * config.walls.inner_scale,
            config.walls.segments,
        )));
        walls.extend(
            config
                .walls
                .extra
                .iter()
                .map(|wall| WallSegment::new(Vec2::from(wall.from), Vec2::from(wall.to))),
        );

        let checkpoints: Vec<Checkpoint> = config
            .checkpoints
            .iter()
            .enumerate()
            .map(|(index, checkpoint)| {
                let angle = checkpoint.angle_degrees.to_radians();
                let normal = Vec2::new(angle.sin(), angle.cos());
                Checkpoint {
                    index,
                    position: Vec2::from(checkpoint.position),
                    angle,
                    normal,
                    tangent: normal.perp(),
                    half_width: checkpoint.half_width,
                    label: checkpoint.label.clone(),
                    color: checkpoint.color.clone(),
                }
            })
            .collect();
        if checkpoints.len() < MIN_CHECKPOINTS {
            warn!(
                "Track has {} checkpoints; lap counting needs at least {MIN_CHECKPOINTS}.",
                checkpoints.len()
            );
        }

        Self {
            outer,
            inner,
            centerline,
            walls,
            checkpoints,
            grid: config.grid.clone(),
            item_box_layout: config.item_boxes.clone(),
        }
    }

    pub fn is_off_track(&self, point: Vec2) -> bool {
        ellipse_value(point, self.outer) > 1.0 || ellipse_value(point, self.inner) < 1.0
    }

    pub fn start_finish_index(&self) -> Option<usize> {
        self.checkpoints.len().checked_sub(1)
    }

    pub fn next_checkpoint_index(&self, current: usize) -> Option<usize> {
        if self.checkpoints.is_empty() {
            return None;
        }
        Some((current + 1) % self.checkpoints.len())
    }

    pub fn distance_to_checkpoint(&self, index: usize, point: Vec2) -> f32 {
        self.checkpoints
            .get(index)
            .map_or(f32::INFINITY, |checkpoint| checkpoint.position.distance(point))
    }

    pub fn grid_slots(&self, count: usize) -> Vec<GridSlot> {
        let gate = self
            .start_finish_index()
            .and_then(|index| self.checkpoints.get(index))
            .map(|start| (start.position, start.normal))
            .or_else(|| Some((self.centerline.point_at(0.0)?, self.centerline.tangent_at(0.0)?)));
        let Some((origin, forward)) = gate else {
            return Vec::new();
        };
        let heading = heading_of(forward);

        (0..count)
            .map(|slot| {
                let row = (slot / 2) as f32;
                let lane = slot % 2;
                let back = self.grid.start_offset
                    + row * self.grid.row_spacing
                    + lane as f32 * self.grid.row_spacing * 0.5;
                let side = if lane == 0 { -0.5 } else { 0.5 };
                GridSlot {
                    position: origin - forward * back + forward.perp() * side * self.grid.lane_spacing,
                    heading,
                }
            })
            .collect()
    }

    pub fn item_box_positions(&self) -> Vec<Vec2> {
        let layout = &self.item_box_layout;
        let length = self.centerline.length();
        let per_row = layout.boxes_per_row.max(1);

        layout
            .row_fractions
            .iter()
            .filter_map(|fraction| {
                let distance = fraction * length;
                Some((
                    self.centerline.point_at(distance)?,
                    self.centerline.tangent_at(distance)?.perp(),
                ))
            })
            .flat_map(|(center, side)| {
                (0..per_row).map(move |slot| {
                    let offset = if per_row == 1 {
                        0.0
                    } else {
                        (slot as f32 / (per_row - 1) as f32 - 0.5) * layout.row_spread
                    };
                    center + side * offset
                })
            })
            .collect()
    }
}

fn ellipse_value(point: Vec2, semi_axes: Vec2) -> f32 {
    let scaled = point / semi_axes;
    scaled.length_squared()
}

fn closed_polyline(points: &[Vec2]) -> Vec<WallSegment> {
    (0..points.len())
        .map(|index| WallSegment::new(points[index], points[(index + 1) % points.len()]))
        .collect()
}
