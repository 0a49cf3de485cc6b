//! 上游图元约定：可绘制对象把自身绘制为一串图元调用。

use serde::{Deserialize, Serialize};

use dgnx_core::geometry::{Extents3D, Vector3};

use crate::errors::DrawError;
use crate::sink::Vectorizer;

/// 决定渲染覆盖项的图元类别，每个图元只查询一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementClass {
    #[default]
    Plain,
    Solid,
    Surface,
    /// 形（封闭区域）。只有在三维实体导入模式下才提升渲染质量。
    Shape,
    /// 带孔多边形单元。
    PolygonWithHoles,
    /// 携带 B-Rep 数据的单元。
    BrepCell,
}

impl ElementClass {
    /// 是否需要着色模式的细分：强制填充并按包围盒计算弦高误差。
    pub fn needs_shaded_tessellation(self, shapes_as_solids: bool) -> bool {
        match self {
            ElementClass::Solid
            | ElementClass::Surface
            | ElementClass::PolygonWithHoles
            | ElementClass::BrepCell => true,
            ElementClass::Shape => shapes_as_solids,
            ElementClass::Plain => false,
        }
    }
}

pub trait Drawable {
    /// 绘制图元。返回 false 表示图元没有处理视口相关的绘制，需要再调用 `draw_viewport`。
    fn draw(&self, sink: &mut dyn Vectorizer) -> Result<bool, DrawError>;

    fn draw_viewport(&self, _sink: &mut dyn Vectorizer) -> Result<(), DrawError> {
        Ok(())
    }

    fn element_class(&self) -> ElementClass {
        ElementClass::Plain
    }

    fn extents(&self) -> Option<Extents3D> {
        None
    }

    fn is_invisible(&self) -> bool {
        false
    }
}

/// 由若干编号段组成的复合尺寸标注。
pub trait DimensionDrawable: Drawable {
    fn segment_count(&self) -> usize;

    /// 只绘制第 `index` 段，返回值含义同 `Drawable::draw`。
    fn draw_segment(&self, index: usize, sink: &mut dyn Vectorizer) -> Result<bool, DrawError>;

    /// 尺寸标注所在平面的法向。
    fn plane_normal(&self) -> Vector3;
}
