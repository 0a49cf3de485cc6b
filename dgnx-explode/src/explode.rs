//! 炸开入口：准备覆盖项 → 绘制 → 收集 → 恢复。
//!
//! 绘制阶段的错误与 panic 都在这里被吸收，转换为“未产生实体”；
//! 覆盖项由 `OverrideScope` 在所有路径上恢复。

use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, trace, warn};

use dgnx_config::ExplodeConfig;
use dgnx_core::document::EntityContainer;
use dgnx_core::geometry::{Extents3D, Transform3};

use crate::errors::{DrawError, ExplodeError};
use crate::resolve::ResourceResolver;
use crate::sink::{ExplodeSink, RegenType, RenderOverrides, Vectorizer};
use crate::source::{DimensionDrawable, Drawable, ElementClass};
use crate::state::DrawingState;
use crate::tolerance::FUZZ;

/// 覆盖项作用域：进入时记录原值，离开（含 panic 展开）时恢复。
pub struct OverrideScope<'a, R: ResourceResolver> {
    sink: &'a mut ExplodeSink<R>,
    saved: RenderOverrides,
}

impl<'a, R: ResourceResolver> OverrideScope<'a, R> {
    pub fn enter(sink: &'a mut ExplodeSink<R>) -> Self {
        let saved = sink.overrides();
        Self { sink, saved }
    }

    /// 着色类图元：强制填充、切换到消隐/着色模式，并按包围盒对角线设置弦高误差。
    pub fn elevate_for(&mut self, class: ElementClass, extents: Option<Extents3D>) {
        let config = self.sink.config();
        if !class.needs_shaded_tessellation(config.shapes_as_solids) {
            return;
        }
        let divisor = config.deviation_divisor;
        let mut overrides = self.sink.overrides();
        overrides.fill_forced = true;
        overrides.regen_type = RegenType::HideOrShadeCommand;
        if let Some(extents) = extents {
            let diagonal = extents.diagonal();
            if diagonal > FUZZ && divisor > FUZZ {
                overrides.deviation = diagonal / divisor;
            }
        }
        debug!(?class, deviation = overrides.deviation, "提升渲染覆盖项");
        self.sink.set_overrides(overrides);
    }
}

impl<R: ResourceResolver> Deref for OverrideScope<'_, R> {
    type Target = ExplodeSink<R>;

    fn deref(&self) -> &Self::Target {
        self.sink
    }
}

impl<R: ResourceResolver> DerefMut for OverrideScope<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.sink
    }
}

impl<R: ResourceResolver> Drop for OverrideScope<'_, R> {
    fn drop(&mut self) {
        trace!("恢复渲染覆盖项");
        self.sink.set_overrides(self.saved);
    }
}

/// 把单个图元炸开为目标实体并追加到调用方的容器。
pub struct Exploder<R: ResourceResolver> {
    sink: ExplodeSink<R>,
}

impl<R: ResourceResolver> Exploder<R> {
    pub fn new(config: ExplodeConfig, resolver: R) -> Self {
        Self {
            sink: ExplodeSink::new(config, resolver),
        }
    }

    pub fn sink(&self) -> &ExplodeSink<R> {
        &self.sink
    }

    pub fn resolver(&self) -> &R {
        self.sink.resolver()
    }

    /// 返回追加到 `out` 的实体数；没有产生任何实体时返回 `NothingProduced`，`out` 保持不变。
    pub fn explode<C>(
        &mut self,
        element: &dyn Drawable,
        out: &mut C,
    ) -> Result<usize, ExplodeError>
    where
        C: EntityContainer + ?Sized,
    {
        {
            let mut scope = OverrideScope::enter(&mut self.sink);
            scope.elevate_for(element.element_class(), element.extents());
            draw_guarded(&mut *scope, element.is_invisible(), |sink| {
                if !element.draw(sink)? {
                    element.draw_viewport(sink)?;
                }
                Ok(())
            });
        }
        self.collect(None, out)
    }

    /// 只炸开复合尺寸标注的第 `index` 段，结果变换到标注平面的局部坐标。
    pub fn explode_dimension_segment<C>(
        &mut self,
        dimension: &dyn DimensionDrawable,
        index: usize,
        out: &mut C,
    ) -> Result<usize, ExplodeError>
    where
        C: EntityContainer + ?Sized,
    {
        if index >= dimension.segment_count() {
            debug!(index, count = dimension.segment_count(), "尺寸段序号越界");
            return Err(ExplodeError::NothingProduced);
        }
        {
            let mut scope = OverrideScope::enter(&mut self.sink);
            scope.elevate_for(dimension.element_class(), dimension.extents());
            draw_guarded(&mut *scope, dimension.is_invisible(), |sink| {
                if !dimension.draw_segment(index, sink)? {
                    dimension.draw_viewport(sink)?;
                }
                Ok(())
            });
        }
        let transform = Transform3::world_to_plane(dimension.plane_normal());
        self.collect(Some(&transform), out)
    }

    fn collect<C>(
        &mut self,
        transform: Option<&Transform3>,
        out: &mut C,
    ) -> Result<usize, ExplodeError>
    where
        C: EntityContainer + ?Sized,
    {
        let collector = self.sink.collector_mut();
        if collector.is_empty() {
            collector.clear();
            debug!("图元未产生任何实体");
            return Err(ExplodeError::NothingProduced);
        }
        if let Some(transform) = transform {
            collector.transform_all(transform);
        }
        let count = collector.drain_into(out);
        debug!(count, "炸开完成");
        Ok(count)
    }
}

/// 在 panic 边界内执行绘制。失败时丢弃本次已收集的实体。
fn draw_guarded<R, F>(sink: &mut ExplodeSink<R>, invisible: bool, draw: F)
where
    R: ResourceResolver,
    F: FnOnce(&mut dyn Vectorizer) -> Result<(), DrawError>,
{
    sink.begin(DrawingState {
        visible: !invisible,
        ..DrawingState::default()
    });
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| draw(&mut *sink)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(error = %err, "图元绘制失败，丢弃已收集的实体");
            sink.collector_mut().clear();
        }
        Err(payload) => {
            warn!(
                panic = panic_message(payload.as_ref()),
                "图元绘制时发生 panic，丢弃已收集的实体"
            );
            sink.collector_mut().clear();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("未知 panic")
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::resolve::ResourceTables;
    use dgnx_core::document::Entity;
    use dgnx_core::geometry::{Point3, Vector3};

    fn exploder() -> Exploder<ResourceTables> {
        Exploder::new(ExplodeConfig::default(), ResourceTables::new())
    }

    fn unit_line(sink: &mut dyn Vectorizer) {
        sink.polyline(&[Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)], None);
    }

    /// 记录绘制时看到的覆盖项。
    struct Probe {
        class: ElementClass,
        seen: Cell<Option<RenderOverrides>>,
    }

    impl Probe {
        fn new(class: ElementClass) -> Self {
            Self {
                class,
                seen: Cell::new(None),
            }
        }
    }

    impl Drawable for Probe {
        fn draw(&self, sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
            self.seen.set(Some(RenderOverrides {
                fill_forced: sink.is_fill_forced(),
                regen_type: sink.regen_type(),
                deviation: sink.deviation(),
            }));
            unit_line(sink);
            Ok(true)
        }

        fn element_class(&self) -> ElementClass {
            self.class
        }

        fn extents(&self) -> Option<Extents3D> {
            Some(Extents3D::new(Point3::ORIGIN, Point3::new(3000.0, 4000.0, 0.0)))
        }
    }

    #[test]
    fn solids_elevate_overrides_and_restore_them() {
        let mut exploder = exploder();
        let probe = Probe::new(ElementClass::Solid);
        let mut out: Vec<Entity> = Vec::new();
        assert_eq!(exploder.explode(&probe, &mut out), Ok(1));

        let seen = probe.seen.get().expect("draw ran");
        assert!(seen.fill_forced);
        assert_eq!(seen.regen_type, RegenType::HideOrShadeCommand);
        assert!((seen.deviation - 2.5).abs() < 1e-12);
        assert_eq!(exploder.sink().overrides(), RenderOverrides::default());
    }

    #[test]
    fn shapes_elevate_only_in_solid_mode() {
        let probe = Probe::new(ElementClass::Shape);
        let mut out: Vec<Entity> = Vec::new();
        exploder().explode(&probe, &mut out).expect("explodes");
        assert_eq!(probe.seen.get().map(|seen| seen.fill_forced), Some(false));

        let config = ExplodeConfig {
            shapes_as_solids: true,
            ..ExplodeConfig::default()
        };
        let mut solid_mode = Exploder::new(config, ResourceTables::new());
        solid_mode.explode(&probe, &mut out).expect("explodes");
        assert_eq!(probe.seen.get().map(|seen| seen.fill_forced), Some(true));
    }

    struct ViewportOnly;

    impl Drawable for ViewportOnly {
        fn draw(&self, _sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
            Ok(false)
        }

        fn draw_viewport(&self, sink: &mut dyn Vectorizer) -> Result<(), DrawError> {
            unit_line(sink);
            Ok(())
        }

        fn is_invisible(&self) -> bool {
            true
        }
    }

    #[test]
    fn unhandled_draw_falls_back_to_viewport_draw() {
        let mut out: Vec<Entity> = Vec::new();
        assert_eq!(exploder().explode(&ViewportOnly, &mut out), Ok(1));
        assert!(!out[0].properties().is_visible);
    }

    struct Failing;

    impl Drawable for Failing {
        fn draw(&self, sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
            unit_line(sink);
            Err(DrawError::Geometry("法向计算失败".to_string()))
        }

        fn element_class(&self) -> ElementClass {
            ElementClass::Surface
        }
    }

    #[test]
    fn draw_error_yields_nothing_and_restores_overrides() {
        let mut exploder = exploder();
        let mut out: Vec<Entity> = Vec::new();
        assert_eq!(
            exploder.explode(&Failing, &mut out),
            Err(ExplodeError::NothingProduced)
        );
        assert!(out.is_empty());
        assert_eq!(exploder.sink().overrides(), RenderOverrides::default());
        assert!(exploder.sink().collector().is_empty());
    }

    struct Empty;

    impl Drawable for Empty {
        fn draw(&self, _sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
            Ok(true)
        }
    }

    #[test]
    fn empty_element_reports_nothing_produced() {
        let mut out: Vec<Entity> = Vec::new();
        assert_eq!(
            exploder().explode(&Empty, &mut out),
            Err(ExplodeError::NothingProduced)
        );
    }

    struct Leader;

    impl Drawable for Leader {
        fn draw(&self, sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
            for index in 0..self.segment_count() {
                self.draw_segment(index, sink)?;
            }
            Ok(true)
        }
    }

    impl DimensionDrawable for Leader {
        fn segment_count(&self) -> usize {
            2
        }

        fn draw_segment(&self, index: usize, sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
            let end = if index == 0 {
                Point3::new(0.0, 0.0, 1.0)
            } else {
                Point3::new(2.0, 0.0, 0.0)
            };
            sink.polyline(&[Point3::ORIGIN, end], None);
            Ok(true)
        }

        fn plane_normal(&self) -> Vector3 {
            Vector3::new(0.0, -1.0, 0.0)
        }
    }

    #[test]
    fn dimension_segment_is_moved_into_plane_coordinates() {
        let mut exploder = exploder();
        let mut out: Vec<Entity> = Vec::new();
        assert_eq!(exploder.explode_dimension_segment(&Leader, 0, &mut out), Ok(1));
        match &out[0] {
            Entity::Line(line) => {
                assert!(line.end.0.abs_diff_eq(glam::DVec3::new(0.0, 1.0, 0.0), 1e-12));
            }
            other => panic!("unexpected {}", other.kind_name()),
        }
        assert_eq!(
            exploder.explode_dimension_segment(&Leader, 2, &mut out),
            Err(ExplodeError::NothingProduced)
        );
        assert_eq!(exploder.explode(&Leader, &mut out), Ok(2));
        assert_eq!(out.len(), 3);
    }
}
