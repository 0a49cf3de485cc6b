//! 绘图状态跟踪：当前属性、状态栈与裁剪栈。

use serde::{Deserialize, Serialize};
use tracing::trace;

use dgnx_core::document::EntityProperties;

use crate::clip::{ClipBoundary, ClipContext};
use crate::resolve::ResourceResolver;

/// 源颜色引用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorRef {
    ByLevel,
    ByCell,
    Index { index: u8 },
    Rgb { r: u8, g: u8, b: u8 },
}

impl Default for ColorRef {
    fn default() -> Self {
        ColorRef::ByLevel
    }
}

/// 源层（level）编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub u32);

/// 源材质编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u32);

/// 源线型引用；0..=7 为保留的内置线型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LineStyleRef {
    ByLevel,
    ByCell,
    Index(u32),
}

impl Default for LineStyleRef {
    fn default() -> Self {
        LineStyleRef::ByLevel
    }
}

/// 源线宽引用，DGN 线宽取值 0..=31。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WeightRef {
    ByLevel,
    ByCell,
    Weight(u8),
}

impl Default for WeightRef {
    fn default() -> Self {
        WeightRef::ByLevel
    }
}

/// 当前图形属性。几何调用只读取，不修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingState {
    pub color: ColorRef,
    pub level: Option<LevelId>,
    pub line_style: LineStyleRef,
    pub line_style_scale: f64,
    pub weight: WeightRef,
    pub material: Option<MaterialId>,
    pub plot_style: Option<String>,
    pub thickness: f64,
    pub fill: bool,
    pub visible: bool,
    /// 0 为不透明，1 为全透明。
    pub transparency: f64,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            color: ColorRef::ByLevel,
            level: None,
            line_style: LineStyleRef::ByLevel,
            line_style_scale: 1.0,
            weight: WeightRef::ByLevel,
            material: None,
            plot_style: None,
            thickness: 0.0,
            fill: false,
            visible: true,
            transparency: 0.0,
        }
    }
}

impl DrawingState {
    /// 按当前属性解析出完整的实体属性快照。法向由调用方另行设置。
    pub fn resolve(&self, resolver: &dyn ResourceResolver) -> EntityProperties {
        let layer = match self.level {
            Some(level) => resolver.layer(level).unwrap_or_else(|| {
                trace!(level = level.0, "层未映射，回退到缺省层");
                resolver.default_layer().to_string()
            }),
            None => resolver.default_layer().to_string(),
        };
        let material = self.material.and_then(|material| resolver.material(material));
        EntityProperties {
            layer,
            color: resolver.color(self.color),
            linetype: resolver.line_type(self.line_style),
            linetype_scale: self.line_style_scale,
            lineweight: resolver.line_weight(self.weight),
            plot_style: self.plot_style.clone(),
            material,
            transparency: transparency_alpha(self.transparency),
            is_visible: self.visible,
            thickness: self.thickness,
            ..EntityProperties::default()
        }
    }
}

/// 透明度 → Alpha；完全不透明时不写入（随层）。
pub fn transparency_alpha(transparency: f64) -> Option<u8> {
    if transparency <= 0.0 || !transparency.is_finite() {
        return None;
    }
    let clamped = transparency.min(1.0);
    Some((255.0 * (1.0 - clamped)).round() as u8)
}

/// 当前状态、状态栈与裁剪上下文。
#[derive(Debug, Default)]
pub struct StateTracker {
    current: DrawingState,
    saved: Vec<DrawingState>,
    clip: ClipContext,
}

impl StateTracker {
    pub fn new(initial: DrawingState) -> Self {
        Self {
            current: initial,
            saved: Vec::new(),
            clip: ClipContext::default(),
        }
    }

    #[inline]
    pub fn current(&self) -> &DrawingState {
        &self.current
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut DrawingState {
        &mut self.current
    }

    pub fn push(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// 弹出状态；栈为空时保持当前状态不变。
    pub fn pop(&mut self) {
        match self.saved.pop() {
            Some(state) => self.current = state,
            None => trace!("状态栈为空，忽略 pop"),
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// 丢弃状态栈与裁剪栈，以 `initial` 重新开始。
    pub fn reset(&mut self, initial: DrawingState) {
        self.current = initial;
        self.saved.clear();
        self.clip.clear();
    }

    #[inline]
    pub fn clip(&self) -> &ClipContext {
        &self.clip
    }

    pub fn push_clip(&mut self, boundary: ClipBoundary) {
        self.clip.push(boundary);
    }

    pub fn pop_clip(&mut self) {
        self.clip.pop();
    }
}
