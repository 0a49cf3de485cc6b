//! 图元接收端：`Vectorizer` 约定及其炸开实现 `ExplodeSink`。
//!
//! 每个图元调用都在当前绘图状态下重建为实体，并立即盖上解析后的属性快照；
//! 之后对状态的修改不会影响已收集的实体。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

use dgnx_config::ExplodeConfig;
use dgnx_core::document::{Entity, EntityProperties};
use dgnx_core::geometry::{Point3, Vector3, ocs_axes};

use crate::clip::ClipBoundary;
use crate::collector::OutputCollector;
use crate::primitives::{ArcType, Mesh, RasterFrame, Shell, TextRun};
use crate::reconstruct::{
    self, ArcGeometry, FilledPolygon, build_polyline, circumcircle, fill_points, grid_faces,
    retain_faces,
};
use crate::resolve::ResourceResolver;
use crate::state::{DrawingState, StateTracker};
use crate::text::{self, FontRegistry};

/// 裁剪生效时无限长直线截取的半长度。
const UNBOUNDED_EXTENT: f64 = 1.0e6;

/// 当前重生成模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenType {
    #[default]
    Standard,
    /// 消隐/着色：实体与曲面按着色精度细分。
    HideOrShadeCommand,
}

/// 炸开期间可被临时提升的渲染覆盖项。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOverrides {
    pub fill_forced: bool,
    pub regen_type: RegenType,
    /// 曲线/曲面细分的弦高误差；0 表示使用固定分段数。
    pub deviation: f64,
}

/// 源图元绘制时调用的图元接收约定。
///
/// 点数不足（直线少于 2 点、多边形少于 3 点）的调用静默忽略。
pub trait Vectorizer {
    fn state(&self) -> &DrawingState;
    fn state_mut(&mut self) -> &mut DrawingState;
    fn push_state(&mut self);
    fn pop_state(&mut self);
    fn push_clip(&mut self, boundary: ClipBoundary);
    fn pop_clip(&mut self);

    fn deviation(&self) -> f64;
    fn regen_type(&self) -> RegenType;
    fn is_fill_forced(&self) -> bool;

    fn circle(&mut self, center: Point3, radius: f64, normal: Vector3);
    fn circle_3pt(&mut self, first: Point3, second: Point3, third: Point3);
    /// 扫角为正表示绕法向逆时针。
    fn circular_arc(
        &mut self,
        center: Point3,
        normal: Vector3,
        start_vector: Vector3,
        radius: f64,
        sweep: f64,
        arc_type: ArcType,
    );
    fn circular_arc_3pt(&mut self, start: Point3, mid: Point3, end: Point3, arc_type: ArcType);
    fn polyline(&mut self, points: &[Point3], normal: Option<Vector3>);
    fn polygon(&mut self, points: &[Point3], normal: Option<Vector3>);
    fn shell(&mut self, shell: &Shell<'_>);
    fn mesh(&mut self, mesh: &Mesh<'_>);
    fn raster_image(&mut self, frame: &RasterFrame);
    /// 无样式的单行文字。
    fn text(&mut self, run: &TextRun);
    fn styled_text(&mut self, run: &TextRun);
    fn xline(&mut self, first: Point3, second: Point3);
    fn ray(&mut self, base: Point3, through: Point3);
}

/// 炸开用的 `Vectorizer`：把图元调用重建为目标实体并收集。
pub struct ExplodeSink<R: ResourceResolver> {
    resolver: R,
    config: ExplodeConfig,
    tracker: StateTracker,
    overrides: RenderOverrides,
    collector: OutputCollector,
    fonts: FontRegistry,
}

impl<R: ResourceResolver> ExplodeSink<R> {
    pub fn new(config: ExplodeConfig, resolver: R) -> Self {
        let overrides = RenderOverrides {
            fill_forced: config.force_fill,
            ..RenderOverrides::default()
        };
        Self {
            resolver,
            config,
            tracker: StateTracker::default(),
            overrides,
            collector: OutputCollector::default(),
            fonts: FontRegistry::new(),
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn config(&self) -> &ExplodeConfig {
        &self.config
    }

    #[inline]
    pub fn overrides(&self) -> RenderOverrides {
        self.overrides
    }

    pub fn set_overrides(&mut self, overrides: RenderOverrides) {
        self.overrides = overrides;
    }

    pub fn collector(&self) -> &OutputCollector {
        &self.collector
    }

    pub fn collector_mut(&mut self) -> &mut OutputCollector {
        &mut self.collector
    }

    /// 开始绘制新图元：清空状态栈、裁剪栈与未提交的输出。
    pub fn begin(&mut self, initial: DrawingState) {
        self.tracker.reset(initial);
        self.collector.clear();
    }

    fn properties(&self) -> EntityProperties {
        self.tracker.current().resolve(&self.resolver)
    }

    fn emit(&mut self, entity: Entity) {
        trace!(kind = entity.kind_name(), "收集实体");
        self.collector.push(entity);
    }

    fn emit_all(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for entity in entities {
            self.emit(entity);
        }
    }

    fn is_filled(&self) -> bool {
        self.tracker.current().fill || self.overrides.fill_forced
    }

    fn is_clipping(&self) -> bool {
        self.tracker.clip().is_active()
    }

    fn inside_clip(&self, point: DVec3) -> bool {
        !self.is_clipping() || self.tracker.clip().contains(point)
    }

    /// 折线路径；裁剪生效时逐段裁剪，每段独立输出。
    fn stroke_path(&mut self, points: &[DVec3], normal: Option<DVec3>, closed: bool) {
        let props = self.properties();
        if !self.is_clipping() {
            let entity = build_polyline(points, normal, closed, &props);
            self.emit_all(entity);
            return;
        }
        let mut path = points.to_vec();
        if closed {
            path.extend(points.first().copied());
        }
        let pieces = self.tracker.clip().clip_polyline(&path);
        for piece in pieces {
            let entity = build_polyline(&piece, normal, false, &props);
            self.emit_all(entity);
        }
    }

    /// 填充路径；裁剪生效时先做多边形裁剪。
    fn fill_path(&mut self, points: &[DVec3], normal: Option<DVec3>) {
        let props = self.properties();
        let points = if self.is_clipping() {
            match self.tracker.clip().clip_polygon(points) {
                Some(clipped) => clipped,
                None => {
                    trace!("填充多边形位于裁剪区域外，跳过");
                    return;
                }
            }
        } else {
            points.to_vec()
        };
        match fill_points(&points, normal, &props) {
            Some(FilledPolygon::Entity(entity)) => self.emit(entity),
            Some(FilledPolygon::NonPlanar(vertices)) => self.emit_face_loop(&vertices, &props),
            None => {}
        }
    }

    /// 非平面的填充多边形以单个面环的壳表达。
    fn emit_face_loop(&mut self, vertices: &[DVec3], props: &EntityProperties) {
        let vertices: Vec<Point3> = vertices.iter().copied().map(Point3).collect();
        let count = vertices.len() as i32;
        let mut faces = Vec::with_capacity(vertices.len() + 1);
        faces.push(count);
        faces.extend(0..count);
        let entities = reconstruct::shell(&Shell::new(&vertices, &faces), props, &self.resolver);
        self.emit_all(entities);
    }

    fn curve(&mut self, geometry: ArcGeometry, arc_type: ArcType) {
        let full = geometry.is_full_circle();
        let closed = full || arc_type != ArcType::Simple;
        let filled = closed && self.is_filled();

        if self.is_clipping() {
            let mut points = geometry.flatten(self.overrides.deviation, self.config.curve_segments);
            if full {
                points.pop();
            } else if arc_type == ArcType::Sector {
                points.push(geometry.center);
            }
            if filled {
                self.fill_path(&points, Some(geometry.normal));
            } else {
                self.stroke_path(&points, Some(geometry.normal), closed);
            }
            return;
        }

        let arc_type = if full && filled {
            ArcType::Chord
        } else {
            arc_type
        };
        let props = self.properties();
        let entities = reconstruct::arc(&geometry, arc_type, filled, &props);
        self.emit_all(entities);
    }

    fn clipped_segment(&mut self, start: DVec3, end: DVec3) {
        self.stroke_path(&[start, end], None, false);
    }

    fn emit_text(&mut self, run: &TextRun, styled: bool) {
        if !self.inside_clip(run.position.0) {
            trace!("文字插入点位于裁剪区域外，跳过");
            return;
        }
        let props = self.properties();
        let font = self.resolver.font(&run.style.font);
        let record = self.fonts.text_style(&font);
        let style_name = record.as_ref().map(|record| record.name.as_str());
        let entity = if styled {
            text::transcode(run, &font, style_name, &props)
        } else {
            text::simple_text(run, style_name, &props)
        };
        if let Some(entity) = entity {
            if let Some(record) = record {
                self.collector.declare_text_style(record);
            }
            self.emit(entity);
        }
    }
}

impl<R: ResourceResolver> Vectorizer for ExplodeSink<R> {
    fn state(&self) -> &DrawingState {
        self.tracker.current()
    }

    fn state_mut(&mut self) -> &mut DrawingState {
        self.tracker.current_mut()
    }

    fn push_state(&mut self) {
        self.tracker.push();
    }

    fn pop_state(&mut self) {
        self.tracker.pop();
    }

    fn push_clip(&mut self, boundary: ClipBoundary) {
        self.tracker.push_clip(boundary);
    }

    fn pop_clip(&mut self) {
        self.tracker.pop_clip();
    }

    fn deviation(&self) -> f64 {
        self.overrides.deviation
    }

    fn regen_type(&self) -> RegenType {
        self.overrides.regen_type
    }

    fn is_fill_forced(&self) -> bool {
        self.overrides.fill_forced
    }

    fn circle(&mut self, center: Point3, radius: f64, normal: Vector3) {
        let Some(normal) = normal.0.try_normalize() else {
            trace!("圆法向退化，跳过");
            return;
        };
        let (start_vector, _) = ocs_axes(normal);
        if let Some(geometry) =
            ArcGeometry::new(center.0, radius, normal, start_vector, std::f64::consts::TAU)
        {
            self.curve(geometry, ArcType::Simple);
        }
    }

    fn circle_3pt(&mut self, first: Point3, second: Point3, third: Point3) {
        let Some((center, radius, normal)) = circumcircle(first.0, second.0, third.0) else {
            return;
        };
        self.circle(Point3(center), radius, Vector3(normal));
    }

    fn circular_arc(
        &mut self,
        center: Point3,
        normal: Vector3,
        start_vector: Vector3,
        radius: f64,
        sweep: f64,
        arc_type: ArcType,
    ) {
        match ArcGeometry::new(center.0, radius, normal.0, start_vector.0, sweep) {
            Some(geometry) => self.curve(geometry, arc_type),
            None => trace!(radius, sweep, "圆弧参数退化，跳过"),
        }
    }

    fn circular_arc_3pt(&mut self, start: Point3, mid: Point3, end: Point3, arc_type: ArcType) {
        match ArcGeometry::through(start.0, mid.0, end.0) {
            Some(geometry) => self.curve(geometry, arc_type),
            None => trace!("三点圆弧共线，跳过"),
        }
    }

    fn polyline(&mut self, points: &[Point3], normal: Option<Vector3>) {
        if points.len() < 2 {
            return;
        }
        let points: Vec<DVec3> = points.iter().map(|point| point.0).collect();
        self.stroke_path(&points, normal.map(|normal| normal.0), false);
    }

    fn polygon(&mut self, points: &[Point3], normal: Option<Vector3>) {
        if points.len() < 3 {
            trace!(count = points.len(), "多边形点数不足，跳过");
            return;
        }
        let points: Vec<DVec3> = points.iter().map(|point| point.0).collect();
        let normal = normal.map(|normal| normal.0);
        if self.is_filled() {
            self.fill_path(&points, normal);
        } else {
            self.stroke_path(&points, normal, true);
        }
    }

    fn shell(&mut self, shell: &Shell<'_>) {
        let props = self.properties();
        if !self.is_clipping() {
            let entities = reconstruct::shell(shell, &props, &self.resolver);
            self.emit_all(entities);
            return;
        }
        let clip = self.tracker.clip();
        // 面以外环质心决定去留。
        let parts = retain_faces(shell, |points| {
            let centroid = points.iter().sum::<DVec3>() / points.len().max(1) as f64;
            clip.contains(centroid)
        });
        for part in &parts {
            let entities = reconstruct::shell(&part.as_shell(), &props, &self.resolver);
            self.emit_all(entities);
        }
    }

    fn mesh(&mut self, mesh: &Mesh<'_>) {
        if !self.is_clipping() {
            let props = self.properties();
            let entities = reconstruct::mesh(mesh, &props, &self.resolver);
            self.emit_all(entities);
            return;
        }
        let count = mesh.rows.saturating_mul(mesh.columns);
        if mesh.rows < 2 || mesh.columns < 2 || mesh.vertices.len() < count {
            trace!(rows = mesh.rows, columns = mesh.columns, "网格尺寸无效，跳过");
            return;
        }
        let faces = grid_faces(mesh.rows, mesh.columns);
        let grid = Shell::new(&mesh.vertices[..count], &faces)
            .with_vertex_data(mesh.vertex_data)
            .with_face_data(mesh.face_data);
        Vectorizer::shell(self, &grid);
    }

    fn raster_image(&mut self, frame: &RasterFrame) {
        if !self.inside_clip(frame.origin.0) {
            trace!(path = %frame.file_path, "图像插入点位于裁剪区域外，跳过");
            return;
        }
        let props = self.properties();
        if let Some((image, definition)) = reconstruct::raster_image(frame, &props) {
            self.collector.declare_image_definition(definition);
            self.emit(image);
        }
    }

    fn text(&mut self, run: &TextRun) {
        self.emit_text(run, false);
    }

    fn styled_text(&mut self, run: &TextRun) {
        self.emit_text(run, true);
    }

    fn xline(&mut self, first: Point3, second: Point3) {
        if !self.is_clipping() {
            let props = self.properties();
            let entity = reconstruct::xline(first.0, second.0, &props);
            self.emit_all(entity);
            return;
        }
        let Some(direction) = (second.0 - first.0).try_normalize() else {
            return;
        };
        self.clipped_segment(
            first.0 - direction * UNBOUNDED_EXTENT,
            first.0 + direction * UNBOUNDED_EXTENT,
        );
    }

    fn ray(&mut self, base: Point3, through: Point3) {
        if !self.is_clipping() {
            let props = self.properties();
            let entity = reconstruct::ray(base.0, through.0, &props);
            self.emit_all(entity);
            return;
        }
        let Some(direction) = (through.0 - base.0).try_normalize() else {
            return;
        };
        self.clipped_segment(base.0, base.0 + direction * UNBOUNDED_EXTENT);
    }
}
