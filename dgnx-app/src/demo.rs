//! 内建演示脚本，覆盖主要的图元调用。

use dgnx_core::geometry::{Point2, Point3, Vector3};
use dgnx_explode::ElementClass;
use dgnx_explode::primitives::{ArcType, FontRef, RasterFrame, TextRun};
use dgnx_explode::resolve::ResourceTables;
use dgnx_explode::state::{ColorRef, LevelId, LineStyleRef, MaterialId, WeightRef};
use dgnx_io::script::{
    AttributePatch, DimensionScript, MeshBuffers, ShellBuffers, rectangle_clip,
};
use dgnx_io::{DrawCommand, ElementScript, ElementSet};

const LEVEL_WALLS: LevelId = LevelId(10);
const LEVEL_NOTES: LevelId = LevelId(20);
const MATERIAL_GLASS: MaterialId = MaterialId(1);

pub fn element_set() -> ElementSet {
    let mut resources = ResourceTables::new();
    resources.insert_level(LEVEL_WALLS, "A-WALL");
    resources.insert_level(LEVEL_NOTES, "A-ANNO");
    resources.insert_material(MATERIAL_GLASS, "Glass");
    resources.insert_line_style(12, "DASHDOT");
    resources.insert_palette_entry(4, [0, 128, 255]);

    let mut set = ElementSet::new(resources);
    set.elements = vec![
        named("外墙", wall()),
        named("楼板", slab()),
        named("门洞弧线", door_swing()),
        named("开洞楼板", slab_with_opening()),
        named("地形网格", terrain()),
        named("图名", title()),
        named("底图", underlay()),
        named("轴线", axis()),
        ElementScript {
            dimension: Some(dimension()),
            ..named("尺寸标注", Vec::new())
        },
        named("损坏图元", vec![
            DrawCommand::Circle {
                center: Point3::ORIGIN,
                radius: 1.0,
                normal: Vector3::Z,
            },
            DrawCommand::Fail {
                message: "图元数据被截断".to_string(),
            },
        ]),
    ];
    set.elements[1].class = ElementClass::Solid;
    set.elements[3].class = ElementClass::PolygonWithHoles;
    set
}

fn named(name: &str, commands: Vec<DrawCommand>) -> ElementScript {
    ElementScript {
        name: Some(name.to_string()),
        ..ElementScript::new(commands)
    }
}

fn wall() -> Vec<DrawCommand> {
    vec![
        DrawCommand::Set(AttributePatch {
            level: Some(LEVEL_WALLS),
            color: Some(ColorRef::Index { index: 4 }),
            weight: Some(WeightRef::Weight(3)),
            ..AttributePatch::default()
        }),
        DrawCommand::Polygon {
            points: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(20.0, 0.0, 0.0),
                Point3::new(20.0, 12.0, 0.0),
                Point3::new(0.0, 12.0, 0.0),
            ],
            normal: Some(Vector3::Z),
        },
    ]
}

fn slab() -> Vec<DrawCommand> {
    vec![
        DrawCommand::Set(AttributePatch {
            material: Some(MATERIAL_GLASS),
            transparency: Some(0.4),
            ..AttributePatch::default()
        }),
        DrawCommand::Polygon {
            points: vec![
                Point3::new(1.0, 1.0, 3.0),
                Point3::new(5.0, 1.0, 3.0),
                Point3::new(6.0, 3.0, 3.0),
                Point3::new(3.0, 5.0, 3.0),
                Point3::new(0.0, 3.0, 3.0),
            ],
            normal: None,
        },
    ]
}

fn door_swing() -> Vec<DrawCommand> {
    vec![
        DrawCommand::Set(AttributePatch {
            line_style: Some(LineStyleRef::Index(12)),
            ..AttributePatch::default()
        }),
        DrawCommand::Arc {
            center: Point3::new(8.0, 0.0, 0.0),
            normal: Vector3::Z,
            start_vector: Vector3::X,
            radius: 1.0,
            sweep: std::f64::consts::FRAC_PI_2,
            arc_type: ArcType::Sector,
        },
    ]
}

fn slab_with_opening() -> Vec<DrawCommand> {
    vec![DrawCommand::Shell(ShellBuffers {
        vertices: vec![
            Point3::new(0.0, 0.0, 6.0),
            Point3::new(10.0, 0.0, 6.0),
            Point3::new(10.0, 8.0, 6.0),
            Point3::new(0.0, 8.0, 6.0),
            Point3::new(3.0, 3.0, 6.0),
            Point3::new(3.0, 5.0, 6.0),
            Point3::new(6.0, 5.0, 6.0),
            Point3::new(6.0, 3.0, 6.0),
        ],
        faces: vec![4, 0, 1, 2, 3, -4, 4, 5, 6, 7],
        ..ShellBuffers::default()
    })]
}

fn terrain() -> Vec<DrawCommand> {
    let (rows, columns) = (4, 5);
    let vertices = (0..rows)
        .flat_map(|row| {
            (0..columns).map(move |column| {
                let (x, y) = (column as f64 * 2.0, row as f64 * 2.0);
                Point3::new(x + 30.0, y, (x * 0.3).sin() + (y * 0.2).cos())
            })
        })
        .collect();
    vec![DrawCommand::Mesh(MeshBuffers {
        rows,
        columns,
        vertices,
        ..MeshBuffers::default()
    })]
}

fn title() -> Vec<DrawCommand> {
    let mut heading = TextRun::new(Point3::new(0.0, -3.0, 0.0), 1.2, "一层平面图");
    heading.style.font = FontRef::true_type("SimSun");
    heading.style.underline = true;

    let mut scale = TextRun::new(Point3::new(0.0, -5.0, 0.0), 0.6, "1:100");
    scale.style.font = FontRef::shape("romans");

    vec![
        DrawCommand::Set(AttributePatch {
            level: Some(LEVEL_NOTES),
            ..AttributePatch::default()
        }),
        DrawCommand::StyledText(heading),
        DrawCommand::Text(scale),
    ]
}

fn underlay() -> Vec<DrawCommand> {
    vec![
        DrawCommand::PushClip(rectangle_clip(Point2::new(-5.0, -5.0), Point2::new(25.0, 15.0))),
        DrawCommand::Raster(RasterFrame {
            origin: Point3::new(-2.0, -2.0, 0.0),
            u: Vector3::new(24.0, 0.0, 0.0),
            v: Vector3::new(0.0, 16.0, 0.0),
            file_path: "underlay/site.png".to_string(),
            name: Some("site".to_string()),
            width_px: 2400,
            height_px: 1600,
            clip: None,
            brightness: None,
            contrast: None,
            fade: Some(40),
        }),
        DrawCommand::Polyline {
            points: vec![Point3::new(-10.0, 6.0, 0.0), Point3::new(30.0, 6.0, 0.0)],
            normal: None,
        },
        DrawCommand::PopClip,
    ]
}

fn axis() -> Vec<DrawCommand> {
    vec![
        DrawCommand::Xline {
            first: Point3::new(10.0, 0.0, 0.0),
            second: Point3::new(10.0, 1.0, 0.0),
        },
        DrawCommand::Ray {
            base: Point3::ORIGIN,
            through: Point3::new(1.0, 1.0, 0.0),
        },
    ]
}

/// 尺寸标注只通过分段重放。
fn dimension() -> DimensionScript {
    DimensionScript {
        plane_normal: Vector3::Z,
        segments: vec![
            vec![DrawCommand::Polyline {
                points: vec![Point3::new(0.0, 14.0, 0.0), Point3::new(20.0, 14.0, 0.0)],
                normal: None,
            }],
            vec![DrawCommand::Text(TextRun::new(
                Point3::new(9.0, 14.5, 0.0),
                0.5,
                "20000",
            ))],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_script_is_valid() {
        let set = element_set();
        set.validate().expect("演示脚本应当有效");
        assert_eq!(set.elements.len(), 10);
    }
}
