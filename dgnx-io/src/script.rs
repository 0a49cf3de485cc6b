//! 图元脚本：以 JSON 描述的绘制命令序列，通过 `Drawable` 重放到任意 `Vectorizer`。

use serde::{Deserialize, Serialize};

use dgnx_core::geometry::{Extents3D, Point2, Point3, Vector3};
use dgnx_explode::clip::ClipBoundary;
use dgnx_explode::primitives::{
    ArcType, EdgeData, FaceData, Mesh, RasterFrame, Shell, TextRun, VertexData,
};
use dgnx_explode::resolve::ResourceTables;
use dgnx_explode::state::{ColorRef, DrawingState, LevelId, LineStyleRef, MaterialId, WeightRef};
use dgnx_explode::{DimensionDrawable, DrawError, Drawable, ElementClass, Vectorizer};

use crate::IoError;

/// 当前支持的脚本格式版本。
pub const SCRIPT_VERSION: u32 = 1;

/// 一个脚本文件：资源表 + 图元列表。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSet {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub resources: ResourceTables,
    #[serde(default)]
    pub elements: Vec<ElementScript>,
}

fn default_version() -> u32 {
    SCRIPT_VERSION
}

impl ElementSet {
    pub fn new(resources: ResourceTables) -> Self {
        Self {
            version: SCRIPT_VERSION,
            resources,
            elements: Vec::new(),
        }
    }

    /// 检查重放前就能确定的结构错误：版本号与网格顶点数。
    pub fn validate(&self) -> Result<(), IoError> {
        if self.version != SCRIPT_VERSION {
            return Err(IoError::InvalidScript(format!(
                "不支持的脚本版本 {}（期望 {SCRIPT_VERSION}）",
                self.version
            )));
        }
        for (index, element) in self.elements.iter().enumerate() {
            element
                .validate()
                .map_err(|message| IoError::InvalidScript(format!("图元 #{index}: {message}")))?;
        }
        Ok(())
    }
}

/// 单个源图元。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementScript {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub class: ElementClass,
    #[serde(default)]
    pub invisible: bool,
    /// 缺省时由命令中的坐标推算。
    #[serde(default)]
    pub extents: Option<Extents3D>,
    #[serde(default)]
    pub commands: Vec<DrawCommand>,
    /// 非空时 `draw` 报告未处理视口绘制，由 `draw_viewport` 重放这些命令。
    #[serde(default)]
    pub viewport_commands: Vec<DrawCommand>,
    #[serde(default)]
    pub dimension: Option<DimensionScript>,
}

/// 复合尺寸标注：每段一组命令。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScript {
    #[serde(default = "default_normal")]
    pub plane_normal: Vector3,
    pub segments: Vec<Vec<DrawCommand>>,
}

fn default_normal() -> Vector3 {
    Vector3::Z
}

impl ElementScript {
    pub fn new(commands: Vec<DrawCommand>) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<未命名>")
    }

    pub fn is_dimension(&self) -> bool {
        self.dimension.is_some()
    }

    fn all_commands(&self) -> impl Iterator<Item = &DrawCommand> {
        let segments = self
            .dimension
            .iter()
            .flat_map(|dimension| dimension.segments.iter().flatten());
        self.commands
            .iter()
            .chain(self.viewport_commands.iter())
            .chain(segments)
    }

    fn validate(&self) -> Result<(), String> {
        for command in self.all_commands() {
            command.validate()?;
        }
        Ok(())
    }
}

fn replay(commands: &[DrawCommand], sink: &mut dyn Vectorizer) -> Result<(), DrawError> {
    for command in commands {
        command.apply(sink)?;
    }
    Ok(())
}

impl Drawable for ElementScript {
    fn draw(&self, sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
        replay(&self.commands, sink)?;
        Ok(self.viewport_commands.is_empty())
    }

    fn draw_viewport(&self, sink: &mut dyn Vectorizer) -> Result<(), DrawError> {
        replay(&self.viewport_commands, sink)
    }

    fn element_class(&self) -> ElementClass {
        self.class
    }

    fn extents(&self) -> Option<Extents3D> {
        self.extents.or_else(|| {
            Extents3D::from_points(self.all_commands().flat_map(DrawCommand::points))
        })
    }

    fn is_invisible(&self) -> bool {
        self.invisible
    }
}

impl DimensionDrawable for ElementScript {
    fn segment_count(&self) -> usize {
        self.dimension
            .as_ref()
            .map_or(0, |dimension| dimension.segments.len())
    }

    fn draw_segment(&self, index: usize, sink: &mut dyn Vectorizer) -> Result<bool, DrawError> {
        let segment = self
            .dimension
            .as_ref()
            .and_then(|dimension| dimension.segments.get(index))
            .ok_or_else(|| DrawError::InvalidElement(format!("尺寸段 {index} 不存在")))?;
        replay(segment, sink)?;
        Ok(true)
    }

    fn plane_normal(&self) -> Vector3 {
        self.dimension
            .as_ref()
            .map_or(Vector3::Z, |dimension| dimension.plane_normal)
    }
}

/// 局部修改当前属性，缺省字段保持不变。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributePatch {
    pub color: Option<ColorRef>,
    pub level: Option<LevelId>,
    pub line_style: Option<LineStyleRef>,
    pub line_style_scale: Option<f64>,
    pub weight: Option<WeightRef>,
    pub material: Option<MaterialId>,
    pub plot_style: Option<String>,
    pub thickness: Option<f64>,
    pub fill: Option<bool>,
    pub visible: Option<bool>,
    pub transparency: Option<f64>,
}

impl AttributePatch {
    fn apply_to(&self, state: &mut DrawingState) {
        if let Some(color) = self.color {
            state.color = color;
        }
        if let Some(level) = self.level {
            state.level = Some(level);
        }
        if let Some(style) = self.line_style {
            state.line_style = style;
        }
        if let Some(scale) = self.line_style_scale {
            state.line_style_scale = scale;
        }
        if let Some(weight) = self.weight {
            state.weight = weight;
        }
        if let Some(material) = self.material {
            state.material = Some(material);
        }
        if let Some(plot_style) = &self.plot_style {
            state.plot_style = Some(plot_style.clone());
        }
        if let Some(thickness) = self.thickness {
            state.thickness = thickness;
        }
        if let Some(fill) = self.fill {
            state.fill = fill;
        }
        if let Some(visible) = self.visible {
            state.visible = visible;
        }
        if let Some(transparency) = self.transparency {
            state.transparency = transparency;
        }
    }
}

/// 壳命令的自有缓冲区。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellBuffers {
    pub vertices: Vec<Point3>,
    pub faces: Vec<i32>,
    pub vertex_normals: Option<Vec<Vector3>>,
    pub vertex_colors: Option<Vec<ColorRef>>,
    pub face_colors: Option<Vec<ColorRef>>,
    pub face_materials: Option<Vec<Option<MaterialId>>>,
    pub face_visibility: Option<Vec<bool>>,
    pub face_transparency: Option<Vec<f64>>,
    pub edge_visibility: Option<Vec<bool>>,
}

impl ShellBuffers {
    pub fn as_shell(&self) -> Shell<'_> {
        Shell::new(&self.vertices, &self.faces)
            .with_vertex_data(VertexData {
                normals: self.vertex_normals.as_deref(),
                colors: self.vertex_colors.as_deref(),
                tex_coords: None,
            })
            .with_face_data(FaceData {
                colors: self.face_colors.as_deref(),
                materials: self.face_materials.as_deref(),
                visibility: self.face_visibility.as_deref(),
                transparency: self.face_transparency.as_deref(),
            })
            .with_edge_data(EdgeData {
                visibility: self.edge_visibility.as_deref(),
            })
    }
}

/// 网格命令的自有缓冲区，逐面数据按单元格行优先排列。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshBuffers {
    pub rows: usize,
    pub columns: usize,
    pub vertices: Vec<Point3>,
    pub face_colors: Option<Vec<ColorRef>>,
    pub face_materials: Option<Vec<Option<MaterialId>>>,
    pub face_visibility: Option<Vec<bool>>,
    pub face_transparency: Option<Vec<f64>>,
}

impl MeshBuffers {
    pub fn as_mesh(&self) -> Mesh<'_> {
        Mesh::new(self.rows, self.columns, &self.vertices).with_face_data(FaceData {
            colors: self.face_colors.as_deref(),
            materials: self.face_materials.as_deref(),
            visibility: self.face_visibility.as_deref(),
            transparency: self.face_transparency.as_deref(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Set(AttributePatch),
    PushState,
    PopState,
    PushClip(ClipBoundary),
    PopClip,
    Circle {
        center: Point3,
        radius: f64,
        #[serde(default = "default_normal")]
        normal: Vector3,
    },
    #[serde(rename = "circle_3pt")]
    Circle3pt {
        points: [Point3; 3],
    },
    Arc {
        center: Point3,
        #[serde(default = "default_normal")]
        normal: Vector3,
        start_vector: Vector3,
        radius: f64,
        /// 扫角（弧度）。
        sweep: f64,
        #[serde(default)]
        arc_type: ArcType,
    },
    #[serde(rename = "arc_3pt")]
    Arc3pt {
        start: Point3,
        mid: Point3,
        end: Point3,
        #[serde(default)]
        arc_type: ArcType,
    },
    Polyline {
        points: Vec<Point3>,
        #[serde(default)]
        normal: Option<Vector3>,
    },
    Polygon {
        points: Vec<Point3>,
        #[serde(default)]
        normal: Option<Vector3>,
    },
    Shell(ShellBuffers),
    Mesh(MeshBuffers),
    Raster(RasterFrame),
    Text(TextRun),
    StyledText(TextRun),
    Xline {
        first: Point3,
        second: Point3,
    },
    Ray {
        base: Point3,
        through: Point3,
    },
    /// 模拟绘制过程中的失败。
    Fail {
        message: String,
    },
}

impl DrawCommand {
    pub fn apply(&self, sink: &mut dyn Vectorizer) -> Result<(), DrawError> {
        match self {
            DrawCommand::Set(patch) => patch.apply_to(sink.state_mut()),
            DrawCommand::PushState => sink.push_state(),
            DrawCommand::PopState => sink.pop_state(),
            DrawCommand::PushClip(boundary) => sink.push_clip(boundary.clone()),
            DrawCommand::PopClip => sink.pop_clip(),
            DrawCommand::Circle {
                center,
                radius,
                normal,
            } => sink.circle(*center, *radius, *normal),
            DrawCommand::Circle3pt { points } => sink.circle_3pt(points[0], points[1], points[2]),
            DrawCommand::Arc {
                center,
                normal,
                start_vector,
                radius,
                sweep,
                arc_type,
            } => sink.circular_arc(*center, *normal, *start_vector, *radius, *sweep, *arc_type),
            DrawCommand::Arc3pt {
                start,
                mid,
                end,
                arc_type,
            } => sink.circular_arc_3pt(*start, *mid, *end, *arc_type),
            DrawCommand::Polyline { points, normal } => sink.polyline(points, *normal),
            DrawCommand::Polygon { points, normal } => sink.polygon(points, *normal),
            DrawCommand::Shell(buffers) => sink.shell(&buffers.as_shell()),
            DrawCommand::Mesh(buffers) => sink.mesh(&buffers.as_mesh()),
            DrawCommand::Raster(frame) => sink.raster_image(frame),
            DrawCommand::Text(run) => sink.text(run),
            DrawCommand::StyledText(run) => sink.styled_text(run),
            DrawCommand::Xline { first, second } => sink.xline(*first, *second),
            DrawCommand::Ray { base, through } => sink.ray(*base, *through),
            DrawCommand::Fail { message } => {
                return Err(DrawError::InvalidElement(message.clone()));
            }
        }
        Ok(())
    }

    /// 命令涉及的坐标，用于推算图元包围盒。
    pub fn points(&self) -> Vec<Point3> {
        match self {
            DrawCommand::Circle {
                center,
                radius,
                normal,
            }
            | DrawCommand::Arc {
                center,
                radius,
                normal,
                ..
            } => {
                let (ax, ay) = match normal.normalize() {
                    Some(normal) => dgnx_core::geometry::ocs_axes(normal.0),
                    None => (Vector3::X.0, Vector3::Y.0),
                };
                [ax, -ax, ay, -ay]
                    .into_iter()
                    .map(|axis| Point3(center.0 + axis * *radius))
                    .collect()
            }
            DrawCommand::Circle3pt { points } => points.to_vec(),
            DrawCommand::Arc3pt { start, mid, end, .. } => vec![*start, *mid, *end],
            DrawCommand::Polyline { points, .. } | DrawCommand::Polygon { points, .. } => {
                points.clone()
            }
            DrawCommand::Shell(buffers) => buffers.vertices.clone(),
            DrawCommand::Mesh(buffers) => buffers.vertices.clone(),
            DrawCommand::Raster(frame) => vec![
                frame.origin,
                frame.origin.translate(frame.u),
                frame.origin.translate(frame.v),
                frame.origin.translate(frame.u).translate(frame.v),
            ],
            DrawCommand::Text(run) | DrawCommand::StyledText(run) => vec![run.position],
            DrawCommand::Xline { first, second } => vec![*first, *second],
            DrawCommand::Ray { base, through } => vec![*base, *through],
            DrawCommand::Set(_)
            | DrawCommand::PushState
            | DrawCommand::PopState
            | DrawCommand::PushClip(_)
            | DrawCommand::PopClip
            | DrawCommand::Fail { .. } => Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            DrawCommand::Mesh(buffers) => match buffers.rows.checked_mul(buffers.columns) {
                Some(count) if count == buffers.vertices.len() => Ok(()),
                Some(_) => Err(format!(
                    "网格声明 {}×{}，实际顶点数 {}",
                    buffers.rows,
                    buffers.columns,
                    buffers.vertices.len()
                )),
                None => Err(format!(
                    "网格尺寸 {}×{} 超出范围",
                    buffers.rows, buffers.columns
                )),
            },
            _ => Ok(()),
        }
    }
}

/// 轴对齐矩形裁剪边界。
pub fn rectangle_clip(min: Point2, max: Point2) -> ClipBoundary {
    ClipBoundary::new(vec![
        min,
        Point2::new(max.x(), min.y()),
        max,
        Point2::new(min.x(), max.y()),
    ])
}
