use std::path::PathBuf;

use dgnx_config::ExplodeConfig;
use dgnx_core::document::{Color, Entity, LineWeight};
use dgnx_io::{IoError, JsonFacade, ReportSaver, ScriptLoader, explode_all};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_basic_elements() {
    let set = JsonFacade::new()
        .load(&fixture("basic_elements.json"))
        .expect("读取脚本失败");
    assert_eq!(set.elements.len(), 7);
    assert_eq!(set.elements[1].class, dgnx_explode::ElementClass::Solid);
    assert!(set.elements[5].is_dimension());
}

#[test]
fn explode_basic_elements_in_order() {
    let set = JsonFacade::new()
        .load(&fixture("basic_elements.json"))
        .expect("读取脚本失败");
    let run = explode_all(&set, &ExplodeConfig::default());

    assert_eq!(run.exploded(), 6);
    assert_eq!(run.failed(), 1);
    assert_eq!(run.outcomes[4].name.as_deref(), Some("broken"));
    assert!(!run.outcomes[4].is_exploded());
    assert_eq!(run.outcomes[5].entities, 2);

    let entities: Vec<&Entity> = run.document.entities().map(|(_, entity)| entity).collect();
    let kinds: Vec<&str> = entities.iter().map(|entity| entity.kind_name()).collect();
    assert_eq!(
        kinds,
        vec!["LINE", "SOLID", "MTEXT", "TEXT", "LINE", "LWPOLYLINE", "LINE"]
    );

    let wall = entities[0].properties();
    assert_eq!(wall.layer, "WALLS");
    assert_eq!(wall.color, Color::Index { index: 3 });
    assert_eq!(wall.lineweight, LineWeight::Hundredths(18));
    assert_eq!(entities[1].properties().material.as_deref(), Some("Concrete"));
    assert_eq!(entities[2].layer_name(), "ANNOTATION");

    match entities[3] {
        Entity::Text(text) => assert_eq!(text.style.as_deref(), Some("ROMANS")),
        other => panic!("期望单行文字，得到 {}", other.kind_name()),
    }
    let style = run.document.text_style("romans").expect("缺少派生文字样式");
    assert_eq!(style.font_file, "romans.shx");
    assert!(style.is_shape_font);

    match entities[6] {
        Entity::Line(line) => {
            assert!(line.start.x().abs() < 1e-9);
            assert!((line.end.x() - 5.0).abs() < 1e-9);
        }
        other => panic!("期望裁剪后的直线，得到 {}", other.kind_name()),
    }
}

#[test]
fn promoted_palette_colors_follow_config() {
    let set = JsonFacade::new()
        .load(&fixture("basic_elements.json"))
        .expect("读取脚本失败");
    let config = ExplodeConfig {
        promote_indexed_colors: true,
        ..ExplodeConfig::default()
    };
    let run = explode_all(&set, &config);
    let (_, wall) = run.document.entities().next().expect("缺少实体");
    assert_eq!(wall.properties().color, Color::Rgb { r: 255, g: 0, b: 0 });
}

#[test]
fn mismatched_mesh_fixture_is_invalid() {
    let err = JsonFacade::new()
        .load(&fixture("invalid_mesh.json"))
        .unwrap_err();
    assert!(matches!(err, IoError::InvalidScript(_)), "{err}");
}

#[test]
fn missing_script_reports_read_error() {
    let err = JsonFacade::new()
        .load(&fixture("does_not_exist.json"))
        .unwrap_err();
    assert!(matches!(err, IoError::Read { .. }));
}

#[test]
fn report_round_trips_through_file() {
    let set = JsonFacade::new()
        .load(&fixture("basic_elements.json"))
        .expect("读取脚本失败");
    let run = explode_all(&set, &ExplodeConfig::default());

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("report.json");
    JsonFacade::new()
        .save(&run.report(), &path)
        .expect("写出报告失败");

    let text = std::fs::read_to_string(&path).expect("读取报告失败");
    let value: serde_json::Value = serde_json::from_str(&text).expect("报告不是合法 JSON");
    assert_eq!(value["summary"]["elements"], 7);
    assert_eq!(value["summary"]["failed"], 1);
    assert_eq!(value["summary"]["by_kind"]["LINE"], 3);
    assert_eq!(value["entities"].as_array().map(Vec::len), Some(7));
    assert_eq!(value["text_styles"][0]["name"], "ROMANS");
    assert!(value["elements"][4]["error"].is_string());
}

#[test]
fn saving_into_missing_directory_reports_write_error() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let set = JsonFacade::new()
        .load(&fixture("basic_elements.json"))
        .expect("读取脚本失败");
    let run = explode_all(&set, &ExplodeConfig::default());
    let err = JsonFacade::new()
        .save(&run.report(), &dir.path().join("absent").join("report.json"))
        .unwrap_err();
    assert!(matches!(err, IoError::Write { .. }));
}
