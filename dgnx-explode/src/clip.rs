//! 裁剪上下文：裁剪边界栈、曲线离散化与折线/多边形裁剪。
//!
//! 目标实体无法携带裁剪状态，因此裁剪生效时所有曲线先离散为折线，再按 XY 投影裁剪。

use std::f64::consts::TAU;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use dgnx_core::geometry::Point2;

use crate::tolerance::{FUZZ, points_equal};

/// 单条曲线离散化的分段上限。
const MAX_SEGMENTS: usize = 4096;

/// 世界 XY 平面上的裁剪多边形。`inverted` 为真时保留边界外部。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipBoundary {
    pub points: Vec<Point2>,
    #[serde(default)]
    pub inverted: bool,
}

impl ClipBoundary {
    pub fn new(points: Vec<Point2>) -> Self {
        Self {
            points,
            inverted: false,
        }
    }

    pub fn inverted(points: Vec<Point2>) -> Self {
        Self {
            points,
            inverted: true,
        }
    }

    /// 少于三个顶点的边界不参与裁剪。
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let count = self.points.len();
        (0..count).map(move |index| {
            (
                self.points[index].as_vec2(),
                self.points[(index + 1) % count].as_vec2(),
            )
        })
    }

    fn signed_area(&self) -> f64 {
        self.edges().map(|(a, b)| a.perp_dot(b)).sum::<f64>() * 0.5
    }

    fn inside_polygon(&self, point: DVec2) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if point.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// 点是否落在保留区域内。
    pub fn contains(&self, point: DVec2) -> bool {
        self.inside_polygon(point) != self.inverted
    }

    pub fn is_convex(&self) -> bool {
        let count = self.points.len();
        if count < 3 {
            return false;
        }
        let mut sign = 0.0_f64;
        for index in 0..count {
            let a = self.points[index].as_vec2();
            let b = self.points[(index + 1) % count].as_vec2();
            let c = self.points[(index + 2) % count].as_vec2();
            let turn = (b - a).perp_dot(c - b);
            if turn.abs() <= FUZZ {
                continue;
            }
            if sign == 0.0 {
                sign = turn.signum();
            } else if turn.signum() != sign {
                return false;
            }
        }
        sign != 0.0
    }

    /// 线段 `a→b` 与边界各边交点的参数 t（开区间 0..1）。
    fn crossings(&self, a: DVec2, b: DVec2) -> Vec<f64> {
        let direction = b - a;
        let mut params = Vec::new();
        for (c, d) in self.edges() {
            let edge = d - c;
            let denom = direction.perp_dot(edge);
            if denom.abs() <= FUZZ {
                continue;
            }
            let offset = c - a;
            let t = offset.perp_dot(edge) / denom;
            let u = offset.perp_dot(direction) / denom;
            if t > FUZZ && t < 1.0 - FUZZ && (-FUZZ..=1.0 + FUZZ).contains(&u) {
                params.push(t);
            }
        }
        params
    }

    /// 逐段裁剪折线，返回保留下来的连续片段（每段至少两个点）。
    pub fn clip_polyline(&self, points: &[DVec3]) -> Vec<Vec<DVec3>> {
        let mut runs = Vec::new();
        let mut current: Vec<DVec3> = Vec::new();
        let flush = |current: &mut Vec<DVec3>, runs: &mut Vec<Vec<DVec3>>| {
            if current.len() >= 2 {
                runs.push(std::mem::take(current));
            } else {
                current.clear();
            }
        };

        for segment in points.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let mut params = vec![0.0];
            params.extend(self.crossings(a.truncate(), b.truncate()));
            params.push(1.0);
            params.sort_by(f64::total_cmp);
            params.dedup_by(|next, prev| (*next - *prev).abs() <= FUZZ);

            for span in params.windows(2) {
                let (t0, t1) = (span[0], span[1]);
                let middle = a.lerp(b, (t0 + t1) * 0.5);
                if !self.contains(middle.truncate()) {
                    flush(&mut current, &mut runs);
                    continue;
                }
                let start = a.lerp(b, t0);
                let end = a.lerp(b, t1);
                match current.last() {
                    Some(last) if points_equal(*last, start) => current.push(end),
                    _ => {
                        flush(&mut current, &mut runs);
                        current.push(start);
                        current.push(end);
                    }
                }
            }
        }
        flush(&mut current, &mut runs);
        runs
    }

    /// 裁剪填充多边形。凸边界用 Sutherland–Hodgman；其余情况按形心整体取舍。
    pub fn clip_polygon(&self, points: &[DVec3]) -> Option<Vec<DVec3>> {
        if points.len() < 3 {
            return None;
        }
        if self.inverted || !self.is_convex() {
            let centroid = points.iter().copied().sum::<DVec3>() / points.len() as f64;
            return self
                .contains(centroid.truncate())
                .then(|| points.to_vec());
        }

        let orientation = self.signed_area().signum();
        let mut output = points.to_vec();
        for (c, d) in self.edges() {
            if output.is_empty() {
                break;
            }
            let edge = d - c;
            let inside = |p: DVec3| orientation * edge.perp_dot(p.truncate() - c) >= -FUZZ;
            let intersect = |p: DVec3, q: DVec3| {
                let t = edge.perp_dot(c - p.truncate()) / edge.perp_dot(q.truncate() - p.truncate());
                p.lerp(q, t)
            };
            let input = std::mem::take(&mut output);
            for (index, current) in input.iter().enumerate() {
                let previous = input[(index + input.len() - 1) % input.len()];
                if inside(*current) {
                    if !inside(previous) {
                        output.push(intersect(previous, *current));
                    }
                    output.push(*current);
                } else if inside(previous) {
                    output.push(intersect(previous, *current));
                }
            }
        }
        output.dedup_by(|next, prev| points_equal(*next, *prev));
        (output.len() >= 3).then_some(output)
    }
}

/// 裁剪边界栈；多个边界同时生效时取交集。
#[derive(Debug, Clone, Default)]
pub struct ClipContext {
    stack: Vec<ClipBoundary>,
}

impl ClipContext {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.boundaries().next().is_some()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// 无效边界被忽略但仍占一层，保证 push/pop 配对。
    pub fn push(&mut self, boundary: ClipBoundary) {
        self.stack.push(boundary);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    fn boundaries(&self) -> impl Iterator<Item = &ClipBoundary> {
        self.stack.iter().filter(|boundary| boundary.is_valid())
    }

    pub fn contains(&self, point: DVec3) -> bool {
        self.boundaries()
            .all(|boundary| boundary.contains(point.truncate()))
    }

    pub fn clip_polyline(&self, points: &[DVec3]) -> Vec<Vec<DVec3>> {
        let mut runs = vec![points.to_vec()];
        for boundary in self.boundaries() {
            runs = runs
                .iter()
                .flat_map(|run| boundary.clip_polyline(run))
                .collect();
        }
        runs.retain(|run| run.len() >= 2);
        runs
    }

    pub fn clip_polygon(&self, points: &[DVec3]) -> Option<Vec<DVec3>> {
        let mut polygon = points.to_vec();
        for boundary in self.boundaries() {
            polygon = boundary.clip_polygon(&polygon)?;
        }
        Some(polygon)
    }
}

/// 按偏差或固定分段数计算弧的分段数。
pub fn segment_count(radius: f64, sweep: f64, deviation: f64, curve_segments: u32) -> usize {
    let sweep = sweep.abs();
    if deviation > FUZZ && deviation < radius {
        let step = 2.0 * (1.0 - deviation / radius).acos();
        if step > FUZZ {
            return ((sweep / step - 1e-9).ceil() as usize).clamp(2, MAX_SEGMENTS);
        }
    }
    let per_circle = f64::from(curve_segments.max(4));
    ((per_circle * sweep / TAU - 1e-9).ceil() as usize).clamp(2, MAX_SEGMENTS)
}

/// 把圆弧离散为折线点，首尾点精确落在弧端点上。
pub fn flatten_arc(
    center: DVec3,
    radius: f64,
    normal: DVec3,
    start_vector: DVec3,
    sweep: f64,
    deviation: f64,
    curve_segments: u32,
) -> Vec<DVec3> {
    let projected = start_vector - normal * start_vector.dot(normal);
    let Some(ax) = projected.try_normalize() else {
        return Vec::new();
    };
    let ay = normal.cross(ax);
    let segments = segment_count(radius, sweep, deviation, curve_segments);
    (0..=segments)
        .map(|step| {
            let angle = sweep * step as f64 / segments as f64;
            center + (ax * angle.cos() + ay * angle.sin()) * radius
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ]
    }

    #[test]
    fn polyline_is_cut_at_boundary() {
        let boundary = ClipBoundary::new(square(10.0));
        let runs = boundary.clip_polyline(&[
            DVec3::new(-5.0, 5.0, 0.0),
            DVec3::new(5.0, 5.0, 0.0),
            DVec3::new(15.0, 5.0, 2.0),
        ]);
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.len(), 3);
        assert!(run[0].abs_diff_eq(DVec3::new(0.0, 5.0, 0.0), 1e-9));
        assert!(run[1].abs_diff_eq(DVec3::new(5.0, 5.0, 0.0), 1e-9));
        assert!(run[2].abs_diff_eq(DVec3::new(10.0, 5.0, 1.0), 1e-9));
    }

    #[test]
    fn inverted_boundary_keeps_outside_pieces() {
        let boundary = ClipBoundary::inverted(square(10.0));
        let runs = boundary.clip_polyline(&[DVec3::new(-5.0, 5.0, 0.0), DVec3::new(15.0, 5.0, 0.0)]);
        assert_eq!(runs.len(), 2);
        assert!(runs[0][1].abs_diff_eq(DVec3::new(0.0, 5.0, 0.0), 1e-9));
        assert!(runs[1][0].abs_diff_eq(DVec3::new(10.0, 5.0, 0.0), 1e-9));
    }

    #[test]
    fn convex_boundary_clips_polygon() {
        let boundary = ClipBoundary::new(square(10.0));
        let clipped = boundary
            .clip_polygon(&[
                DVec3::new(5.0, 5.0, 0.0),
                DVec3::new(15.0, 5.0, 0.0),
                DVec3::new(15.0, 8.0, 0.0),
                DVec3::new(5.0, 8.0, 0.0),
            ])
            .expect("overlapping polygon");
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|p| p.x <= 10.0 + 1e-9));

        let outside = boundary.clip_polygon(&[
            DVec3::new(20.0, 20.0, 0.0),
            DVec3::new(30.0, 20.0, 0.0),
            DVec3::new(30.0, 30.0, 0.0),
        ]);
        assert!(outside.is_none());
    }

    #[test]
    fn concave_boundary_keeps_polygon_by_centroid() {
        let boundary = ClipBoundary::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(5.0, 2.0),
            Point2::new(0.0, 10.0),
        ]);
        assert!(!boundary.is_convex());
        let triangle = [
            DVec3::new(4.0, 0.5, 0.0),
            DVec3::new(6.0, 0.5, 0.0),
            DVec3::new(5.0, 1.5, 0.0),
        ];
        assert_eq!(boundary.clip_polygon(&triangle).map(|p| p.len()), Some(3));
    }

    #[test]
    fn context_intersects_boundaries() {
        let mut context = ClipContext::default();
        assert!(context.contains(DVec3::new(100.0, 100.0, 0.0)));
        context.push(ClipBoundary::new(square(10.0)));
        context.push(ClipBoundary::inverted(square(5.0)));
        assert!(context.contains(DVec3::new(7.0, 7.0, 0.0)));
        assert!(!context.contains(DVec3::new(2.0, 2.0, 0.0)));
        assert!(!context.contains(DVec3::new(12.0, 2.0, 0.0)));
        context.pop();
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn flattening_honours_deviation() {
        assert_eq!(segment_count(10.0, TAU, 0.0, 64), 64);
        assert_eq!(segment_count(10.0, TAU / 4.0, 0.0, 64), 16);
        let coarse = segment_count(10.0, TAU, 0.5, 64);
        let fine = segment_count(10.0, TAU, 0.01, 64);
        assert!(coarse < fine);

        let points = flatten_arc(
            DVec3::ZERO,
            2.0,
            DVec3::Z,
            DVec3::X,
            std::f64::consts::FRAC_PI_2,
            0.0,
            64,
        );
        assert_eq!(points.len(), 17);
        assert!(points[0].abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-12));
        assert!(points[16].abs_diff_eq(DVec3::new(0.0, 2.0, 0.0), 1e-12));
    }
}
