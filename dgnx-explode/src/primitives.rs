//! 图元调用携带的几何载荷：壳、网格、文字段与栅格图框。
//!
//! 壳与网格的缓冲区均为借用，只在一次调用内有效。

use serde::{Deserialize, Serialize};

use dgnx_core::geometry::{Point2, Point3, Vector3};

use crate::state::{ColorRef, MaterialId};

/// 圆弧的闭合方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcType {
    #[default]
    Simple,
    /// 扇形：两端连回圆心。
    Sector,
    /// 弓形：两端以弦相连。
    Chord,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VertexData<'a> {
    pub normals: Option<&'a [Vector3]>,
    pub colors: Option<&'a [ColorRef]>,
    pub tex_coords: Option<&'a [Point2]>,
}

/// 逐面覆盖数据，数组与面（外环）一一对应。
#[derive(Debug, Clone, Copy, Default)]
pub struct FaceData<'a> {
    pub colors: Option<&'a [ColorRef]>,
    pub materials: Option<&'a [Option<MaterialId>]>,
    pub visibility: Option<&'a [bool]>,
    pub transparency: Option<&'a [f64]>,
}

impl FaceData<'_> {
    pub fn is_empty(&self) -> bool {
        self.colors.is_none()
            && self.materials.is_none()
            && self.visibility.is_none()
            && self.transparency.is_none()
    }
}

/// 逐边可见性，边按面表顺序编号（每个环 n 条边，含闭合边）。
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeData<'a> {
    pub visibility: Option<&'a [bool]>,
}

/// 壳：顶点缓冲 + 面表。
///
/// 面表中每个环以顶点数开头，随后是该数目的零起始顶点索引；
/// 顶点数为负表示该环是前一个面的孔。
#[derive(Debug, Clone, Copy)]
pub struct Shell<'a> {
    pub vertices: &'a [Point3],
    pub faces: &'a [i32],
    pub vertex_data: VertexData<'a>,
    pub face_data: FaceData<'a>,
    pub edge_data: EdgeData<'a>,
}

impl<'a> Shell<'a> {
    pub fn new(vertices: &'a [Point3], faces: &'a [i32]) -> Self {
        Self {
            vertices,
            faces,
            vertex_data: VertexData::default(),
            face_data: FaceData::default(),
            edge_data: EdgeData::default(),
        }
    }

    pub fn with_vertex_data(mut self, data: VertexData<'a>) -> Self {
        self.vertex_data = data;
        self
    }

    pub fn with_face_data(mut self, data: FaceData<'a>) -> Self {
        self.face_data = data;
        self
    }

    pub fn with_edge_data(mut self, data: EdgeData<'a>) -> Self {
        self.edge_data = data;
        self
    }
}

/// 行优先的 rows × columns 规则网格；逐面数据按单元格排列。
#[derive(Debug, Clone, Copy)]
pub struct Mesh<'a> {
    pub rows: usize,
    pub columns: usize,
    pub vertices: &'a [Point3],
    pub vertex_data: VertexData<'a>,
    pub face_data: FaceData<'a>,
}

impl<'a> Mesh<'a> {
    pub fn new(rows: usize, columns: usize, vertices: &'a [Point3]) -> Self {
        Self {
            rows,
            columns,
            vertices,
            vertex_data: VertexData::default(),
            face_data: FaceData::default(),
        }
    }

    pub fn with_face_data(mut self, data: FaceData<'a>) -> Self {
        self.face_data = data;
        self
    }

    pub fn cell_count(&self) -> usize {
        self.rows.saturating_sub(1) * self.columns.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontKind {
    TrueType,
    /// 旧式形字体（SHX/RSC），需要转换为派生文字样式。
    #[default]
    Shape,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FontRef {
    pub name: String,
    #[serde(default)]
    pub kind: FontKind,
}

impl FontRef {
    pub fn true_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FontKind::TrueType,
        }
    }

    pub fn shape(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FontKind::Shape,
        }
    }
}

/// 源文字样式标志。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font: FontRef,
    pub bold: bool,
    pub italic: bool,
    pub backward: bool,
    pub upside_down: bool,
    pub vertical: bool,
    pub underline: bool,
    pub overline: bool,
    pub superscript: bool,
    pub subscript: bool,
    /// 文字适配到文字框宽度。
    pub fitted: bool,
    pub charset: u8,
    pub pitch_family: u8,
    /// 字距缩放，1 为标准。
    pub tracking: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontRef::default(),
            bold: false,
            italic: false,
            backward: false,
            upside_down: false,
            vertical: false,
            underline: false,
            overline: false,
            superscript: false,
            subscript: false,
            fitted: false,
            charset: 0,
            pitch_family: 0,
            tracking: 1.0,
        }
    }
}

impl TextStyle {
    /// 只能由单行文字表达的样式（镜像或竖排）。
    pub fn is_simple(&self) -> bool {
        self.backward || self.upside_down || self.vertical
    }
}

/// 一段带样式的文字。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub position: Point3,
    #[serde(default = "default_normal")]
    pub normal: Vector3,
    #[serde(default = "default_direction")]
    pub direction: Vector3,
    pub height: f64,
    #[serde(default = "default_scale")]
    pub width_factor: f64,
    /// 倾斜角（弧度）。
    #[serde(default)]
    pub oblique: f64,
    pub message: String,
    /// 原始字符串：其中的 `%` 没有控制码含义。
    #[serde(default)]
    pub raw: bool,
    #[serde(default)]
    pub box_width: Option<f64>,
    #[serde(default)]
    pub style: TextStyle,
}

impl TextRun {
    pub fn new(position: Point3, height: f64, message: impl Into<String>) -> Self {
        Self {
            position,
            normal: Vector3::Z,
            direction: Vector3::X,
            height,
            width_factor: 1.0,
            oblique: 0.0,
            message: message.into(),
            raw: false,
            box_width: None,
            style: TextStyle::default(),
        }
    }
}

fn default_normal() -> Vector3 {
    Vector3::Z
}

fn default_direction() -> Vector3 {
    Vector3::X
}

fn default_scale() -> f64 {
    1.0
}

/// 栅格图像图框：原点为左下角，U/V 为整幅图像在世界坐标下的边向量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterFrame {
    pub origin: Point3,
    pub u: Vector3,
    pub v: Vector3,
    pub file_path: String,
    #[serde(default)]
    pub name: Option<String>,
    pub width_px: u32,
    pub height_px: u32,
    /// 像素坐标下的裁剪多边形。
    #[serde(default)]
    pub clip: Option<Vec<Point2>>,
    #[serde(default)]
    pub brightness: Option<i16>,
    #[serde(default)]
    pub contrast: Option<i16>,
    #[serde(default)]
    pub fade: Option<i16>,
}
