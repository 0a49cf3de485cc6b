//! 容差判断与平面拟合。所有“是否为零”的比较都经过这里。

use glam::DVec3;

/// 长度/面积判零容差。
pub const FUZZ: f64 = 1e-10;

/// 点重合容差。
pub const POINT_FUZZ: f64 = 1e-9;

/// 共面判断的相对容差（乘以点集尺度）。
const PLANE_FUZZ: f64 = 1e-9;

#[inline]
pub fn is_zero(value: f64) -> bool {
    value.abs() <= FUZZ
}

#[inline]
pub fn points_equal(a: DVec3, b: DVec3) -> bool {
    a.distance_squared(b) <= POINT_FUZZ * POINT_FUZZ
}

/// 法向是否与 Z 轴（正或反）平行。
#[inline]
pub fn is_parallel_to_z(normal: DVec3) -> bool {
    normal.x.abs() <= POINT_FUZZ && normal.y.abs() <= POINT_FUZZ
}

/// 点序列的平面性分类结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Planarity {
    /// 位于与 XY 平行的平面内，`elevation` 取首点 Z。
    Flat { elevation: f64 },
    /// 位于法向为 `normal` 的倾斜平面内。
    Planar { normal: DVec3 },
    /// 无法找到一致的法向。
    NonPlanar,
}

/// Newell 法拟合法向；共线或退化时返回 None。
pub fn fit_normal(points: &[DVec3]) -> Option<DVec3> {
    if points.len() < 3 {
        return None;
    }
    let mut normal = DVec3::ZERO;
    for (index, current) in points.iter().enumerate() {
        let next = points[(index + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    if normal.length_squared() > FUZZ * FUZZ {
        return Some(normal.normalize());
    }

    // 自相交（如 8 字形）时 Newell 可能相互抵消，退回到最大叉积。
    let origin = points[0];
    let mut best = DVec3::ZERO;
    for pair in points[1..].windows(2) {
        let candidate = (pair[0] - origin).cross(pair[1] - origin);
        if candidate.length_squared() > best.length_squared() {
            best = candidate;
        }
    }
    if best.length_squared() > FUZZ * FUZZ {
        Some(best.normalize())
    } else {
        None
    }
}

/// 点集的尺度，用于放大相对容差。
fn scale_of(points: &[DVec3]) -> f64 {
    let mut min = DVec3::splat(f64::INFINITY);
    let mut max = DVec3::splat(f64::NEG_INFINITY);
    for point in points {
        min = min.min(*point);
        max = max.max(*point);
    }
    min.distance(max).max(1.0)
}

/// 所有点是否位于过 `points[0]`、法向为 `normal` 的平面上。
pub fn lies_on_plane(points: &[DVec3], normal: DVec3) -> bool {
    let Some(origin) = points.first() else {
        return true;
    };
    let tolerance = PLANE_FUZZ * scale_of(points);
    points
        .iter()
        .all(|point| (*point - *origin).dot(normal).abs() <= tolerance)
}

/// 判定点序列的平面性。`hint` 为调用方提供的法向，零向量视为未提供。
pub fn classify(points: &[DVec3], hint: Option<DVec3>) -> Planarity {
    let Some(first) = points.first() else {
        return Planarity::NonPlanar;
    };
    let normal = hint
        .filter(|normal| normal.length_squared() > FUZZ * FUZZ)
        .map(DVec3::normalize)
        .filter(|normal| lies_on_plane(points, *normal))
        .or_else(|| fit_normal(points));

    match normal {
        Some(normal) if lies_on_plane(points, normal) => {
            if is_parallel_to_z(normal) {
                Planarity::Flat { elevation: first.z }
            } else {
                Planarity::Planar { normal }
            }
        }
        Some(_) => Planarity::NonPlanar,
        None => {
            // 共线点：所有 Z 相同则视为 XY 平面内。
            let tolerance = PLANE_FUZZ * scale_of(points);
            if points.iter().all(|point| (point.z - first.z).abs() <= tolerance) {
                Planarity::Flat { elevation: first.z }
            } else {
                Planarity::NonPlanar
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newell_normal_follows_winding() {
        let ccw = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let normal = fit_normal(&ccw).expect("planar square");
        assert!(normal.abs_diff_eq(DVec3::Z, 1e-12));

        let mut cw = ccw;
        cw.reverse();
        let normal = fit_normal(&cw).expect("planar square");
        assert!(normal.abs_diff_eq(-DVec3::Z, 1e-12));
    }

    #[test]
    fn collinear_points_have_no_normal() {
        let points = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(2.0, 2.0, 2.0),
        ];
        assert!(fit_normal(&points).is_none());
        assert_eq!(classify(&points, None), Planarity::NonPlanar);

        let flat = [
            DVec3::new(0.0, 0.0, 4.0),
            DVec3::new(1.0, 0.0, 4.0),
            DVec3::new(2.0, 0.0, 4.0),
        ];
        assert_eq!(classify(&flat, None), Planarity::Flat { elevation: 4.0 });
    }

    #[test]
    fn tilted_and_warped_point_sets() {
        let tilted = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 1.0),
        ];
        match classify(&tilted, None) {
            Planarity::Planar { normal } => assert!(normal.abs_diff_eq(-DVec3::Y, 1e-12)),
            other => panic!("unexpected planarity: {other:?}"),
        }

        let warped = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        assert_eq!(classify(&warped, None), Planarity::NonPlanar);
    }

    #[test]
    fn hint_normal_off_plane_falls_back_to_fit() {
        let points = [
            DVec3::new(0.0, 0.0, 2.0),
            DVec3::new(3.0, 0.0, 2.0),
            DVec3::new(3.0, 3.0, 2.0),
        ];
        assert_eq!(
            classify(&points, Some(DVec3::X)),
            Planarity::Flat { elevation: 2.0 }
        );
        assert!(is_zero(1e-12));
        assert!(!is_zero(1e-6));
    }
}
