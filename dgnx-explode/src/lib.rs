//! DGN 图元炸开（explode）核心：把源图元绘制时发出的图元调用重建为目标模型实体。
//!
//! 数据流：`Exploder` 为每个图元准备渲染覆盖项 → 调用 `Drawable::draw` →
//! `ExplodeSink`（`Vectorizer` 实现）把每个图元调用重建为实体并盖上当前属性 →
//! `OutputCollector` 按顺序收集 → 追加到调用方提供的 `EntityContainer`。

pub mod clip;
pub mod collector;
pub mod explode;
pub mod primitives;
pub mod reconstruct;
pub mod resolve;
pub mod sink;
pub mod source;
pub mod state;
pub mod text;
pub mod tolerance;

pub mod errors {
    use thiserror::Error;

    /// 炸开入口唯一的失败结果：图元没有产生任何实体。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
    pub enum ExplodeError {
        #[error("图元未产生任何实体，无法炸开")]
        NothingProduced,
    }

    /// 源图元绘制过程中抛出的错误，在炸开入口被吸收。
    #[derive(Debug, Error)]
    pub enum DrawError {
        #[error("几何计算失败: {0}")]
        Geometry(String),
        #[error("图元数据无效: {0}")]
        InvalidElement(String),
    }
}

pub use errors::{DrawError, ExplodeError};
pub use explode::Exploder;
pub use resolve::{ResourceResolver, ResourceTables};
pub use sink::{ExplodeSink, RegenType, RenderOverrides, Vectorizer};
pub use source::{DimensionDrawable, Drawable, ElementClass};
