//! 文字转换：镜像/竖排的文字输出为单行文字，其余输出为带内联格式码的多行文字。

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, trace};

use dgnx_core::document::{Entity, EntityProperties, MText, Text, TextStyleRecord};
use dgnx_core::geometry::{Vector3, ocs_axes};

use crate::primitives::{FontKind, TextRun};
use crate::resolve::ResolvedFont;
use crate::tolerance::{FUZZ, is_zero};

/// 多行文字附着点：左下。
pub const ATTACH_BOTTOM_LEFT: i16 = 7;

/// 由形字体派生的文字样式，首次使用时创建。
#[derive(Debug, Default)]
pub struct FontRegistry {
    styles: HashMap<String, TextStyleRecord>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// TrueType 字体直接以格式码引用，不需要样式记录。
    pub fn text_style(&mut self, font: &ResolvedFont) -> Option<TextStyleRecord> {
        if font.kind != FontKind::Shape {
            return None;
        }
        let key = font.name.to_ascii_lowercase();
        if let Some(record) = self.styles.get(&key) {
            return Some(record.clone());
        }

        let path = Path::new(&font.name);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| font.name.clone());
        let font_file = if path.extension().is_some() {
            font.name.clone()
        } else {
            format!("{}.shx", font.name)
        };
        let record = TextStyleRecord {
            name: stem.to_ascii_uppercase(),
            font_file,
            is_shape_font: true,
        };
        debug!(style = %record.name, file = %record.font_file, "派生形字体文字样式");
        self.styles.insert(key, record.clone());
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// 按样式选择单行或多行文字。空消息（去掉尾部空白后）不输出。
pub fn transcode(
    run: &TextRun,
    font: &ResolvedFont,
    style_name: Option<&str>,
    props: &EntityProperties,
) -> Option<Entity> {
    if run.style.is_simple() {
        simple_text(run, style_name, props)
    } else {
        rich_text(run, font, style_name, props)
    }
}

fn message_body(run: &TextRun) -> Option<&str> {
    let body = run.message.trim_end();
    if body.is_empty() {
        trace!("文字内容为空，跳过");
        return None;
    }
    if run.height <= FUZZ || !run.height.is_finite() {
        trace!(height = run.height, "文字高度无效，跳过");
        return None;
    }
    Some(body)
}

fn plane_normal(run: &TextRun) -> Vector3 {
    run.normal.normalize().unwrap_or(Vector3::Z)
}

/// 基线方向在 OCS 中的角度。
fn rotation(run: &TextRun, normal: Vector3) -> f64 {
    let (ax, ay) = ocs_axes(normal.0);
    let direction = run.direction.0;
    let angle = direction.dot(ay).atan2(direction.dot(ax));
    angle.rem_euclid(std::f64::consts::TAU)
}

/// 单行文字：反向 → X 镜像，倒置 → Y 镜像；下划线/上划线以控制码写在内容前。
pub fn simple_text(
    run: &TextRun,
    style_name: Option<&str>,
    props: &EntityProperties,
) -> Option<Entity> {
    let body = message_body(run)?;
    let mut content = String::new();
    if run.style.underline {
        content.push_str("%%u");
    }
    if run.style.overline {
        content.push_str("%%o");
    }
    if run.raw {
        content.push_str(&body.replace('%', "%%%"));
    } else {
        content.push_str(body);
    }

    let normal = plane_normal(run);
    Some(Entity::Text(Text {
        insert: run.position,
        content,
        height: run.height,
        rotation: rotation(run, normal),
        width_factor: run.width_factor,
        oblique: run.oblique,
        style: style_name.map(str::to_string),
        mirror_x: run.style.backward,
        mirror_y: run.style.upside_down,
        is_vertical: run.style.vertical,
        properties: props.clone().with_normal(normal),
    }))
}

/// 多行文字：`{` + 格式前缀 + 正文 + `}`。
pub fn rich_text(
    run: &TextRun,
    font: &ResolvedFont,
    style_name: Option<&str>,
    props: &EntityProperties,
) -> Option<Entity> {
    let body = message_body(run)?;
    let content = format!("{{{}{}}}", format_prefix(run, font), escape_body(body));
    let normal = plane_normal(run);
    let direction = run.direction.normalize().unwrap_or(Vector3::X);
    let reference_width = if run.style.fitted {
        run.box_width.filter(|width| *width > FUZZ)
    } else {
        None
    };
    Some(Entity::MText(MText {
        insert: run.position,
        content,
        height: run.height,
        reference_width,
        direction,
        attachment_point: ATTACH_BOTTOM_LEFT,
        style: style_name.map(str::to_string),
        properties: props.clone().with_normal(normal),
    }))
}

/// 内联格式前缀：字体、宽度、字距、倾角、上下标、上划线与下划线。
pub fn format_prefix(run: &TextRun, font: &ResolvedFont) -> String {
    let style = &run.style;
    let mut prefix = match font.kind {
        FontKind::TrueType => format!(
            "\\f{}|b{}|i{}|c{}|p{};",
            font.name,
            u8::from(style.bold),
            u8::from(style.italic),
            style.charset,
            style.pitch_family
        ),
        FontKind::Shape => format!("\\F{};", font.name),
    };
    if !is_zero(run.width_factor - 1.0) {
        prefix.push_str(&format!("\\W{};", format_number(run.width_factor)));
    }
    if !is_zero(style.tracking - 1.0) {
        prefix.push_str(&format!("\\T{};", format_number(style.tracking)));
    }
    if !is_zero(run.oblique) {
        prefix.push_str(&format!("\\Q{};", format_number(run.oblique.to_degrees())));
    }
    if style.superscript {
        prefix.push_str("\\H0.5x;\\A2;");
    } else if style.subscript {
        prefix.push_str("\\H0.5x;\\A0;");
    }
    if style.overline {
        prefix.push_str("\\O");
    }
    if style.underline {
        prefix.push_str("\\L");
    }
    prefix
}

/// 只有整段正文恰为单个 `{`、`}` 或 `\` 时才转义。
fn escape_body(body: &str) -> String {
    match body {
        "{" | "}" | "\\" => format!("\\{body}"),
        _ => body.to_string(),
    }
}

/// 最多保留六位小数并去掉尾零。
fn format_number(value: f64) -> String {
    let text = format!("{value:.6}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
