use super::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathProjection {
    pub distance_along: f32,
    pub point: Vec2,
    pub segment: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CenterlinePath {
    points: Vec<Vec2>,
    cumulative: Vec<f32>,
    length: f32,
}

impl CenterlinePath {
    pub fn from_points(points: Vec<Vec2>) -> Self {
        if points.len() < 2 {
            return Self::default();
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut length = 0.0;
        for (index, point) in points.iter().enumerate() {
            cumulative.push(length);
            let next = points[(index + 1) % points.len()];
            length += (next - *point).length();
        }

        Self {
            points,
            cumulative,
            length,
        }
    }

    pub(super) fn ellipse(semi_axes: Vec2, samples: usize) -> Self {
        Self::from_points(sample_ellipse(semi_axes, samples))
    }

    pub fn is_empty(&self) -> bool {
        self.points.len() < 2 || self.length <= f32::EPSILON
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    fn segment(&self, index: usize) -> (Vec2, Vec2) {
        let start = self.points[index];
        let end = self.points[(index + 1) % self.points.len()];
        (start, end)
    }

    pub fn project(&self, point: Vec2) -> Option<PathProjection> {
        if self.is_empty() {
            return None;
        }

        let mut best: Option<(f32, PathProjection)> = None;
        for index in 0..self.points.len() {
            let (start, end) = self.segment(index);
            let edge = end - start;
            let edge_length_sq = edge.length_squared();
            let t = if edge_length_sq <= f32::EPSILON {
                0.0
            } else {
                ((point - start).dot(edge) / edge_length_sq).clamp(0.0, 1.0)
            };
            let closest = start + edge * t;
            let distance_sq = closest.distance_squared(point);
            if best.is_none_or(|(best_sq, _)| distance_sq < best_sq) {
                best = Some((
                    distance_sq,
                    PathProjection {
                        distance_along: self.cumulative[index] + edge_length_sq.sqrt() * t,
                        point: closest,
                        segment: index,
                    },
                ));
            }
        }

        best.map(|(_, projection)| projection)
    }

    fn locate(&self, distance: f32) -> Option<(usize, f32)> {
        if self.is_empty() {
            return None;
        }
        let wrapped = distance.rem_euclid(self.length);
        let index = self
            .cumulative
            .partition_point(|start| *start <= wrapped)
            .saturating_sub(1);
        Some((index, wrapped - self.cumulative[index]))
    }

    pub fn point_at(&self, distance: f32) -> Option<Vec2> {
        let (index, offset) = self.locate(distance)?;
        let (start, end) = self.segment(index);
        let direction = (end - start).normalize_or_zero();
        Some(start + direction * offset)
    }

    pub fn tangent_at(&self, distance: f32) -> Option<Vec2> {
        let (index, _) = self.locate(distance)?;
        let (start, end) = self.segment(index);
        let tangent = (end - start).normalize_or_zero();
        (tangent != Vec2::ZERO).then_some(tangent)
    }
}

/// Counter-clockwise samples in the `(x, z)` plane, starting on the +x axis.
pub(super) fn sample_ellipse(semi_axes: Vec2, samples: usize) -> Vec<Vec2> {
    (0..samples)
        .map(|index| {
            let angle = index as f32 / samples as f32 * TAU;
            Vec2::new(semi_axes.x * angle.cos(), semi_axes.y * angle.sin())
        })
        .collect()
}
