//! 几何重建：把单个图元调用转换为目标实体。
//!
//! 这里的函数都是纯函数：输入几何与已解析的属性快照，输出实体；
//! 退化输入返回空结果而不是错误。

mod shell;

pub use shell::{EdgeSet, MAX_MESH_INDEX, ShellBuffer, grid_faces, mesh, retain_faces, shell};

use std::f64::consts::TAU;
use std::path::Path;

use glam::DVec3;
use tracing::trace;

use dgnx_core::document::{
    Arc, Circle, Entity, EntityProperties, Hatch, HatchEdge, HatchLoop, Line, Polyline,
    Polyline3d, PolylineVertex, RasterImage, RasterImageDefinition, RasterImageDisplayOptions,
    Ray, Solid, XLine,
};
use dgnx_core::geometry::{Point2, Point3, Vector2, Vector3, ocs_axes, world_to_ocs};

use crate::clip::flatten_arc;
use crate::primitives::{ArcType, RasterFrame};
use crate::tolerance::{self, FUZZ, Planarity, is_parallel_to_z, points_equal};

/// 整圆判定的角度容差。
const SWEEP_FUZZ: f64 = 1e-9;

fn to_vecs(points: &[Point3]) -> Vec<DVec3> {
    points.iter().map(|point| point.0).collect()
}

/// 去掉与首点重合的闭合点，返回剩余点与是否闭合。
fn strip_closure(points: &[DVec3]) -> (&[DVec3], bool) {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 3 && points_equal(*first, *last) => {
            (&points[..points.len() - 1], true)
        }
        _ => (points, false),
    }
}

/// 所有点是否重合为一点。
fn is_coincident(points: &[DVec3]) -> bool {
    match points.first() {
        Some(first) => points.iter().all(|point| points_equal(*first, *point)),
        None => true,
    }
}

fn normalize_angle(angle: f64) -> f64 {
    let value = angle.rem_euclid(TAU);
    if value >= TAU - SWEEP_FUZZ { 0.0 } else { value }
}

/// 一般折线：两点为直线，首尾重合为闭合，共面为轻量多段线，否则为三维多段线。
pub fn polyline(
    points: &[Point3],
    normal: Option<Vector3>,
    props: &EntityProperties,
) -> Option<Entity> {
    build_polyline(&to_vecs(points), normal.map(|n| n.0), false, props)
}

/// 未填充多边形：强制闭合的多段线。
pub fn polygon_outline(
    points: &[Point3],
    normal: Option<Vector3>,
    props: &EntityProperties,
) -> Option<Entity> {
    build_polyline(&to_vecs(points), normal.map(|n| n.0), true, props)
}

pub(crate) fn build_polyline(
    points: &[DVec3],
    normal: Option<DVec3>,
    force_closed: bool,
    props: &EntityProperties,
) -> Option<Entity> {
    if points.len() == 2 {
        return line(points[0], points[1], props);
    }
    let (vertices, closed_by_point) = strip_closure(points);
    if vertices.len() < 2 {
        trace!(count = points.len(), "折线点数不足，跳过");
        return None;
    }
    if is_coincident(vertices) {
        trace!(count = points.len(), "折线各点重合，跳过");
        return None;
    }
    let is_closed = force_closed || closed_by_point;

    let entity = match tolerance::classify(vertices, normal) {
        Planarity::Flat { elevation } => Entity::Polyline(Polyline {
            vertices: vertices
                .iter()
                .map(|point| PolylineVertex::new(Point2::new(point.x, point.y)))
                .collect(),
            is_closed,
            elevation,
            properties: props.clone().with_normal(Vector3::Z),
        }),
        Planarity::Planar { normal } => {
            let local: Vec<DVec3> = vertices
                .iter()
                .map(|point| world_to_ocs(*point, normal))
                .collect();
            Entity::Polyline(Polyline {
                vertices: local
                    .iter()
                    .map(|point| PolylineVertex::new(Point2::new(point.x, point.y)))
                    .collect(),
                is_closed,
                elevation: local[0].z,
                properties: props.clone().with_normal(Vector3(normal)),
            })
        }
        Planarity::NonPlanar => Entity::Polyline3d(Polyline3d {
            vertices: vertices.iter().copied().map(Point3).collect(),
            is_closed,
            properties: props.clone(),
        }),
    };
    Some(entity)
}

pub(crate) fn line(start: DVec3, end: DVec3, props: &EntityProperties) -> Option<Entity> {
    if points_equal(start, end) {
        trace!("零长度直线，跳过");
        return None;
    }
    Some(Entity::Line(Line {
        start: Point3(start),
        end: Point3(end),
        properties: props.clone(),
    }))
}

/// 填充多边形的重建结果。
#[derive(Debug)]
pub enum FilledPolygon {
    Entity(Entity),
    /// 非平面：交由壳路径以面表达。
    NonPlanar(Vec<DVec3>),
}

/// 填充多边形：3/4 点为实心面，5 点以上为实心填充图案。
pub fn filled_polygon(
    points: &[Point3],
    normal: Option<Vector3>,
    props: &EntityProperties,
) -> Option<FilledPolygon> {
    fill_points(&to_vecs(points), normal.map(|n| n.0), props)
}

pub(crate) fn fill_points(
    points: &[DVec3],
    normal: Option<DVec3>,
    props: &EntityProperties,
) -> Option<FilledPolygon> {
    let (vertices, _) = strip_closure(points);
    if vertices.len() < 3 {
        trace!(count = vertices.len(), "填充多边形点数不足，跳过");
        return None;
    }
    if tolerance::fit_normal(vertices).is_none() {
        trace!(count = vertices.len(), "填充多边形面积为零，跳过");
        return None;
    }
    let (plane_normal, elevation) = match tolerance::classify(vertices, normal) {
        Planarity::Flat { elevation } => (DVec3::Z, elevation),
        Planarity::Planar { normal } => (normal, world_to_ocs(vertices[0], normal).z),
        Planarity::NonPlanar => return Some(FilledPolygon::NonPlanar(vertices.to_vec())),
    };

    if vertices.len() <= 4 {
        return Some(FilledPolygon::Entity(Entity::Solid(Solid {
            vertices: vertices.iter().copied().map(Point3).collect(),
            properties: props.clone().with_normal(Vector3(plane_normal)),
        })));
    }

    let local: Vec<Point2> = vertices
        .iter()
        .map(|point| {
            let ocs = world_to_ocs(*point, plane_normal);
            Point2::new(ocs.x, ocs.y)
        })
        .collect();
    let edges = (0..local.len())
        .map(|index| HatchEdge::PolylineSegment {
            start: local[index],
            end: local[(index + 1) % local.len()],
            bulge: 0.0,
        })
        .collect();
    let boundary = HatchLoop {
        is_polyline: true,
        is_closed: true,
        edges,
    };
    Some(FilledPolygon::Entity(solid_hatch(
        vec![boundary],
        elevation,
        plane_normal,
        props,
    )))
}

fn solid_hatch(
    loops: Vec<HatchLoop>,
    elevation: f64,
    normal: DVec3,
    props: &EntityProperties,
) -> Entity {
    Entity::Hatch(Hatch {
        pattern_name: "SOLID".to_string(),
        is_solid: true,
        loops,
        elevation,
        properties: props.clone().with_normal(Vector3(normal)),
    })
}

/// 以圆心、半径、法向、起始方向与扫角描述的圆弧。扫角恒为正（绕法向逆时针）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    pub center: DVec3,
    pub radius: f64,
    pub normal: DVec3,
    /// 圆心指向起点的单位向量。
    pub start_vector: DVec3,
    pub sweep: f64,
}

impl ArcGeometry {
    pub fn new(
        center: DVec3,
        radius: f64,
        normal: DVec3,
        start_vector: DVec3,
        sweep: f64,
    ) -> Option<Self> {
        if radius <= FUZZ || !radius.is_finite() || tolerance::is_zero(sweep) {
            return None;
        }
        let mut normal = normal.try_normalize()?;
        let mut sweep = sweep.clamp(-TAU, TAU);
        if is_parallel_to_z(normal) && normal.z < 0.0 {
            // 绕 -Z 逆时针等价于绕 +Z 顺时针。
            normal = DVec3::Z;
            sweep = -sweep;
        }
        let mut start_vector = (start_vector - normal * start_vector.dot(normal)).try_normalize()?;
        if sweep < 0.0 {
            start_vector = rotate_about(start_vector, normal, sweep);
            sweep = -sweep;
        }
        Some(Self {
            center,
            radius,
            normal,
            start_vector,
            sweep,
        })
    }

    /// 过三点的圆弧，从 `start` 经 `mid` 到 `end`。三点共线时返回 None。
    pub fn through(start: DVec3, mid: DVec3, end: DVec3) -> Option<Self> {
        let (center, radius, _) = circumcircle(start, mid, end)?;
        let normal = (mid - start).cross(end - mid).try_normalize()?;
        let from = start - center;
        let to = end - center;
        let mut sweep = from.cross(to).dot(normal).atan2(from.dot(to));
        if sweep <= 0.0 {
            sweep += TAU;
        }
        Self::new(center, radius, normal, from, sweep)
    }

    pub fn is_full_circle(&self) -> bool {
        self.sweep >= TAU - SWEEP_FUZZ
    }

    /// OCS 中的起止角。
    pub fn ocs_angles(&self) -> (f64, f64) {
        let (ax, ay) = ocs_axes(self.normal);
        let start = self.start_vector.dot(ay).atan2(self.start_vector.dot(ax));
        (normalize_angle(start), normalize_angle(start + self.sweep))
    }

    pub fn start_point(&self) -> DVec3 {
        self.center + self.start_vector * self.radius
    }

    pub fn end_point(&self) -> DVec3 {
        self.center + rotate_about(self.start_vector, self.normal, self.sweep) * self.radius
    }

    pub fn flatten(&self, deviation: f64, curve_segments: u32) -> Vec<DVec3> {
        flatten_arc(
            self.center,
            self.radius,
            self.normal,
            self.start_vector,
            self.sweep,
            deviation,
            curve_segments,
        )
    }
}

fn rotate_about(vector: DVec3, axis: DVec3, angle: f64) -> DVec3 {
    vector * angle.cos() + axis.cross(vector) * angle.sin()
}

/// 三点外接圆：圆心、半径与（未定向的）平面法向。
pub fn circumcircle(a: DVec3, b: DVec3, c: DVec3) -> Option<(DVec3, f64, DVec3)> {
    let ac = a - c;
    let bc = b - c;
    let normal = ac.cross(bc);
    let denom = 2.0 * normal.length_squared();
    if denom <= FUZZ * FUZZ {
        trace!("三点共线，无法确定圆");
        return None;
    }
    let center =
        c + (bc * ac.length_squared() - ac * bc.length_squared()).cross(normal) / denom;
    Some((center, center.distance(a), normal.normalize()))
}

pub fn circle(
    center: DVec3,
    radius: f64,
    normal: DVec3,
    props: &EntityProperties,
) -> Option<Entity> {
    if radius <= FUZZ || !radius.is_finite() {
        trace!(radius, "圆半径退化，跳过");
        return None;
    }
    let mut normal = normal.try_normalize()?;
    if is_parallel_to_z(normal) {
        normal = DVec3::Z;
    }
    Some(Entity::Circle(Circle {
        center: Point3(center),
        radius,
        properties: props.clone().with_normal(Vector3(normal)),
    }))
}

/// 圆弧及其闭合形式。填充的扇形/弓形输出实心填充，其余输出弧与闭合线段。
pub fn arc(
    geometry: &ArcGeometry,
    arc_type: ArcType,
    filled: bool,
    props: &EntityProperties,
) -> Vec<Entity> {
    let closed = !matches!(arc_type, ArcType::Simple);
    if closed && filled {
        return vec![arc_hatch(geometry, arc_type, props)];
    }

    let mut entities = Vec::new();
    if geometry.is_full_circle() {
        entities.extend(circle(
            geometry.center,
            geometry.radius,
            geometry.normal,
            props,
        ));
        return entities;
    }

    let (start_angle, end_angle) = geometry.ocs_angles();
    entities.push(Entity::Arc(Arc {
        center: Point3(geometry.center),
        radius: geometry.radius,
        start_angle,
        end_angle,
        properties: props.clone().with_normal(Vector3(geometry.normal)),
    }));
    let start = geometry.start_point();
    let end = geometry.end_point();
    match arc_type {
        ArcType::Simple => {}
        ArcType::Chord => entities.extend(line(end, start, props)),
        ArcType::Sector => {
            entities.extend(line(end, geometry.center, props));
            entities.extend(line(geometry.center, start, props));
        }
    }
    entities
}

fn arc_hatch(geometry: &ArcGeometry, arc_type: ArcType, props: &EntityProperties) -> Entity {
    let normal = geometry.normal;
    let local_center = world_to_ocs(geometry.center, normal);
    let center = Point2::new(local_center.x, local_center.y);
    let to_local = |point: DVec3| {
        let local = world_to_ocs(point, normal);
        Point2::new(local.x, local.y)
    };

    let mut edges = Vec::new();
    if geometry.is_full_circle() {
        edges.push(HatchEdge::Arc {
            center,
            radius: geometry.radius,
            start_angle: 0.0,
            end_angle: TAU,
            is_counter_clockwise: true,
        });
    } else {
        let (start_angle, end_angle) = geometry.ocs_angles();
        let start = to_local(geometry.start_point());
        let end = to_local(geometry.end_point());
        edges.push(HatchEdge::Arc {
            center,
            radius: geometry.radius,
            start_angle,
            end_angle,
            is_counter_clockwise: true,
        });
        if arc_type == ArcType::Sector {
            edges.push(HatchEdge::Line { start: end, end: center });
            edges.push(HatchEdge::Line { start: center, end: start });
        } else {
            edges.push(HatchEdge::Line { start: end, end: start });
        }
    }
    let boundary = HatchLoop {
        is_polyline: false,
        is_closed: true,
        edges,
    };
    solid_hatch(vec![boundary], local_center.z, normal, props)
}

pub fn xline(first: DVec3, second: DVec3, props: &EntityProperties) -> Option<Entity> {
    let direction = (second - first).try_normalize()?;
    Some(Entity::XLine(XLine {
        base: Point3(first),
        direction: Vector3(direction),
        properties: props.clone(),
    }))
}

pub fn ray(base: DVec3, through: DVec3, props: &EntityProperties) -> Option<Entity> {
    let direction = (through - base).try_normalize()?;
    Some(Entity::Ray(Ray {
        base: Point3(base),
        direction: Vector3(direction),
        properties: props.clone(),
    }))
}

/// 栅格图框 → 图像实体与其引用的图像定义。图像定义以小写文件路径为键。
pub fn raster_image(
    frame: &RasterFrame,
    props: &EntityProperties,
) -> Option<(Entity, RasterImageDefinition)> {
    if frame.width_px == 0 || frame.height_px == 0 || frame.file_path.trim().is_empty() {
        trace!(path = %frame.file_path, "图像尺寸或路径无效，跳过");
        return None;
    }
    let u = frame.u.0;
    let v = frame.v.0;
    let normal = u.cross(v).try_normalize()?;
    let width = f64::from(frame.width_px);
    let height = f64::from(frame.height_px);

    let name = frame.name.clone().unwrap_or_else(|| {
        Path::new(&frame.file_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| frame.file_path.clone())
    });
    let definition = RasterImageDefinition {
        name,
        file_path: frame.file_path.clone(),
        image_size_pixels: Some(Vector2::new(width, height)),
    };
    let image = RasterImage {
        image_def: frame.file_path.to_ascii_lowercase(),
        insert: frame.origin,
        u_vector: Vector3(u / width),
        v_vector: Vector3(v / height),
        image_size: Vector2::new(width, height),
        display_options: RasterImageDisplayOptions {
            use_clipping: frame.clip.is_some(),
            brightness: frame.brightness,
            contrast: frame.contrast,
            fade: frame.fade,
            ..RasterImageDisplayOptions::default()
        },
        clip: frame.clip.clone(),
        properties: props.clone().with_normal(Vector3(normal)),
    };
    Some((Entity::RasterImage(image), definition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn props() -> EntityProperties {
        EntityProperties::default()
    }

    #[test]
    fn two_points_become_a_line() {
        let entity = polyline(
            &[Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)],
            None,
            &props(),
        )
        .expect("line");
        match entity {
            Entity::Line(line) => {
                assert_eq!(line.start, Point3::new(1.0, 2.0, 3.0));
                assert_eq!(line.end, Point3::new(4.0, 5.0, 6.0));
            }
            other => panic!("expected line, got {}", other.kind_name()),
        }
    }

    #[test]
    fn closing_point_is_dropped() {
        let points = [
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(4.0, 0.0, 2.0),
            Point3::new(4.0, 4.0, 2.0),
            Point3::new(0.0, 0.0, 2.0),
        ];
        match polyline(&points, None, &props()) {
            Some(Entity::Polyline(polyline)) => {
                assert_eq!(polyline.vertices.len(), 3);
                assert!(polyline.is_closed);
                assert!((polyline.elevation - 2.0).abs() < 1e-12);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn tilted_polyline_uses_ocs() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        match polyline(&points, None, &props()) {
            Some(Entity::Polyline(polyline)) => {
                assert!(
                    polyline
                        .properties
                        .normal
                        .as_vec3()
                        .abs_diff_eq(-DVec3::Y, 1e-12)
                );
                let world = polyline.world_points();
                for (restored, original) in world.iter().zip(points.iter()) {
                    assert!(restored.as_vec3().abs_diff_eq(original.as_vec3(), 1e-9));
                }
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn warped_polyline_is_three_dimensional() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(matches!(
            polyline(&points, None, &props()),
            Some(Entity::Polyline3d(_))
        ));
    }

    #[test]
    fn filled_polygon_thresholds() {
        let triangle = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(matches!(
            filled_polygon(&triangle, None, &props()),
            Some(FilledPolygon::Entity(Entity::Solid(_)))
        ));

        let pentagon: Vec<Point3> = (0..5)
            .map(|i| {
                let angle = TAU * i as f64 / 5.0;
                Point3::new(angle.cos(), angle.sin(), 1.0)
            })
            .collect();
        match filled_polygon(&pentagon, None, &props()) {
            Some(FilledPolygon::Entity(Entity::Hatch(hatch))) => {
                assert!(hatch.is_solid);
                assert_eq!(hatch.loops.len(), 1);
                assert_eq!(hatch.loops[0].edges.len(), 5);
                assert!((hatch.elevation - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let warped = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(matches!(
            filled_polygon(&warped, None, &props()),
            Some(FilledPolygon::NonPlanar(points)) if points.len() == 4
        ));
        assert!(filled_polygon(&triangle[..2], None, &props()).is_none());
    }

    #[test]
    fn coincident_points_produce_nothing() {
        let point = Point3::new(3.0, 4.0, 5.0);
        assert!(polyline(&[point, point, point], None, &props()).is_none());
        assert!(polyline(&[point, point, point, point], Some(Vector3::Z), &props()).is_none());
        assert!(polygon_outline(&[point, point, point], None, &props()).is_none());
        assert!(filled_polygon(&[point, point, point], None, &props()).is_none());
        assert!(filled_polygon(&[point; 6], Some(Vector3::Z), &props()).is_none());
    }

    #[test]
    fn collinear_fill_has_no_area() {
        let collinear = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(filled_polygon(&collinear, Some(Vector3::Z), &props()).is_none());
        assert!(matches!(
            polygon_outline(&collinear, None, &props()),
            Some(Entity::Polyline(_))
        ));
    }

    #[test]
    fn arc_through_three_points() {
        let geometry = ArcGeometry::through(
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
        )
        .expect("arc");
        assert!(geometry.center.abs_diff_eq(DVec3::ZERO, 1e-12));
        assert!((geometry.radius - 1.0).abs() < 1e-12);
        assert!((geometry.sweep - PI).abs() < 1e-12);
        let (start, end) = geometry.ocs_angles();
        assert!(start.abs() < 1e-12);
        assert!((end - PI).abs() < 1e-12);

        assert!(
            ArcGeometry::through(DVec3::ZERO, DVec3::X, DVec3::X * 2.0).is_none()
        );
    }

    #[test]
    fn negative_z_arc_is_normalised() {
        let geometry =
            ArcGeometry::new(DVec3::ZERO, 2.0, -DVec3::Z, DVec3::X, FRAC_PI_2).expect("arc");
        assert_eq!(geometry.normal, DVec3::Z);
        assert!((geometry.sweep - FRAC_PI_2).abs() < 1e-12);
        assert!(geometry.end_point().abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-12));
        assert!(geometry.start_point().abs_diff_eq(DVec3::new(0.0, -2.0, 0.0), 1e-12));
    }

    #[test]
    fn full_sweep_becomes_circle() {
        let geometry = ArcGeometry::new(DVec3::ZERO, 3.0, DVec3::Z, DVec3::X, TAU).expect("arc");
        let entities = arc(&geometry, ArcType::Simple, false, &props());
        assert_eq!(entities.len(), 1);
        assert!(matches!(entities[0], Entity::Circle(_)));
    }

    #[test]
    fn sector_outline_and_fill() {
        let geometry =
            ArcGeometry::new(DVec3::ZERO, 1.0, DVec3::Z, DVec3::X, FRAC_PI_2).expect("arc");
        let outline = arc(&geometry, ArcType::Sector, false, &props());
        let kinds: Vec<_> = outline.iter().map(Entity::kind_name).collect();
        assert_eq!(kinds, vec!["ARC", "LINE", "LINE"]);

        let chord = arc(&geometry, ArcType::Chord, false, &props());
        assert_eq!(chord.len(), 2);

        let filled = arc(&geometry, ArcType::Sector, true, &props());
        match &filled[..] {
            [Entity::Hatch(hatch)] => assert_eq!(hatch.loops[0].edges.len(), 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn raster_frame_scales_vectors_per_pixel() {
        let frame = RasterFrame {
            origin: Point3::new(10.0, 0.0, 0.0),
            u: Vector3::new(200.0, 0.0, 0.0),
            v: Vector3::new(0.0, 100.0, 0.0),
            file_path: "Images/Plan.TIF".to_string(),
            name: None,
            width_px: 400,
            height_px: 200,
            clip: None,
            brightness: Some(50),
            contrast: None,
            fade: None,
        };
        let (entity, definition) = raster_image(&frame, &props()).expect("image");
        assert_eq!(definition.name, "Plan");
        match entity {
            Entity::RasterImage(image) => {
                assert_eq!(image.image_def, "images/plan.tif");
                assert!((image.u_vector.0.x - 0.5).abs() < 1e-12);
                assert!((image.v_vector.0.y - 0.5).abs() < 1e-12);
                assert_eq!(image.display_options.brightness, Some(50));
            }
            other => panic!("unexpected entity: {}", other.kind_name()),
        }
    }

    #[test]
    fn degenerate_infinite_lines_are_skipped() {
        assert!(xline(DVec3::ONE, DVec3::ONE, &props()).is_none());
        assert!(matches!(
            ray(DVec3::ZERO, DVec3::new(0.0, 3.0, 0.0), &props()),
            Some(Entity::Ray(ray)) if ray.direction == Vector3::Y
        ));
    }
}
