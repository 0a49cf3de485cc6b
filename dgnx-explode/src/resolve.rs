//! 源资源引用（颜色、线型、线宽、材质、层、字体）到目标模型的解析。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use dgnx_config::ExplodeConfig;
use dgnx_core::document::{
    Color, DEFAULT_LAYER, LINETYPE_BYBLOCK, LINETYPE_BYLAYER, LINETYPE_CONTINUOUS, LineWeight,
};

use crate::primitives::{FontKind, FontRef};
use crate::state::{ColorRef, LevelId, LineStyleRef, MaterialId, WeightRef};

/// 保留线型索引上限（含）。
pub const RESERVED_LINE_STYLES: u32 = 7;

/// DGN 线宽 0..=31 对应的目标线宽（1/100 毫米）。
const LINE_WEIGHT_TABLE: [i16; 32] = [
    0, 13, 18, 25, 30, 35, 40, 50, 53, 60, 70, 80, 90, 100, 106, 120, 140, 158, 200, 211, 211,
    211, 211, 211, 211, 211, 211, 211, 211, 211, 211, 211,
];

/// 解析后的字体：目标字体名与类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub name: String,
    pub kind: FontKind,
}

pub trait ResourceResolver {
    fn color(&self, color: ColorRef) -> Color;
    fn line_type(&self, style: LineStyleRef) -> String;
    fn line_weight(&self, weight: WeightRef) -> LineWeight;
    fn material(&self, material: MaterialId) -> Option<String>;
    /// 未映射的层返回 None，由调用方回退到缺省层。
    fn layer(&self, level: LevelId) -> Option<String>;
    fn default_layer(&self) -> &str;
    fn font(&self, font: &FontRef) -> ResolvedFont;
}

/// 基于查找表的缺省解析器。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceTables {
    levels: HashMap<u32, String>,
    line_styles: HashMap<u32, String>,
    materials: HashMap<u32, String>,
    /// 调色板：索引 → RGB。
    palette: HashMap<u8, [u8; 3]>,
    /// 源字体名（忽略大小写）→ 目标字体名。
    fonts: HashMap<String, String>,
    promote_indexed_colors: bool,
    default_layer: String,
    fallback_font: String,
}

impl Default for ResourceTables {
    fn default() -> Self {
        Self {
            levels: HashMap::new(),
            line_styles: HashMap::new(),
            materials: HashMap::new(),
            palette: HashMap::new(),
            fonts: HashMap::new(),
            promote_indexed_colors: false,
            default_layer: DEFAULT_LAYER.to_string(),
            fallback_font: "txt".to_string(),
        }
    }
}

impl ResourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// 采用配置中的颜色提升策略、缺省层与回退字体。
    pub fn apply_config(&mut self, config: &ExplodeConfig) {
        self.promote_indexed_colors = config.promote_indexed_colors;
        self.default_layer = config.default_layer.clone();
        self.fallback_font = config.fallback_font.clone();
    }

    pub fn insert_level(&mut self, level: LevelId, name: impl Into<String>) {
        self.levels.insert(level.0, name.into());
    }

    pub fn insert_line_style(&mut self, index: u32, name: impl Into<String>) {
        self.line_styles.insert(index, name.into());
    }

    pub fn insert_material(&mut self, material: MaterialId, name: impl Into<String>) {
        self.materials.insert(material.0, name.into());
    }

    pub fn insert_palette_entry(&mut self, index: u8, rgb: [u8; 3]) {
        self.palette.insert(index, rgb);
    }

    pub fn insert_font(&mut self, source: &str, target: impl Into<String>) {
        self.fonts.insert(source.to_ascii_lowercase(), target.into());
    }

    pub fn set_promote_indexed_colors(&mut self, promote: bool) {
        self.promote_indexed_colors = promote;
    }

    pub fn levels(&self) -> impl Iterator<Item = (&u32, &String)> {
        self.levels.iter()
    }
}

impl ResourceResolver for ResourceTables {
    fn color(&self, color: ColorRef) -> Color {
        match color {
            ColorRef::ByLevel => Color::ByLayer,
            ColorRef::ByCell => Color::ByBlock,
            ColorRef::Rgb { r, g, b } => Color::Rgb { r, g, b },
            ColorRef::Index { index } => match self.palette.get(&index) {
                Some([r, g, b]) if self.promote_indexed_colors => Color::Rgb {
                    r: *r,
                    g: *g,
                    b: *b,
                },
                _ => Color::Index { index },
            },
        }
    }

    fn line_type(&self, style: LineStyleRef) -> String {
        match style {
            LineStyleRef::ByLevel => LINETYPE_BYLAYER.to_string(),
            LineStyleRef::ByCell => LINETYPE_BYBLOCK.to_string(),
            LineStyleRef::Index(0) => LINETYPE_CONTINUOUS.to_string(),
            LineStyleRef::Index(index) if index <= RESERVED_LINE_STYLES => format!("DGN{index}"),
            LineStyleRef::Index(index) => match self.line_styles.get(&index) {
                Some(name) => name.clone(),
                None => {
                    debug!(index, "线型未映射，回退到 CONTINUOUS");
                    LINETYPE_CONTINUOUS.to_string()
                }
            },
        }
    }

    fn line_weight(&self, weight: WeightRef) -> LineWeight {
        match weight {
            WeightRef::ByLevel => LineWeight::ByLayer,
            WeightRef::ByCell => LineWeight::ByBlock,
            WeightRef::Weight(value) => {
                let slot = usize::from(value).min(LINE_WEIGHT_TABLE.len() - 1);
                LineWeight::Hundredths(LINE_WEIGHT_TABLE[slot])
            }
        }
    }

    fn material(&self, material: MaterialId) -> Option<String> {
        let name = self.materials.get(&material.0).cloned();
        if name.is_none() {
            debug!(material = material.0, "材质未映射，忽略");
        }
        name
    }

    fn layer(&self, level: LevelId) -> Option<String> {
        self.levels.get(&level.0).cloned()
    }

    fn default_layer(&self) -> &str {
        &self.default_layer
    }

    fn font(&self, font: &FontRef) -> ResolvedFont {
        let trimmed = font.name.trim();
        if trimmed.is_empty() {
            return ResolvedFont {
                name: self.fallback_font.clone(),
                kind: FontKind::Shape,
            };
        }
        let name = self
            .fonts
            .get(&trimmed.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string());
        ResolvedFont {
            name,
            kind: font.kind,
        }
    }
}
