//! 炸开流程的外部接口：JSON 图元脚本的读取、批量炸开与结果报告的写出。

pub mod report;
pub mod script;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use dgnx_config::ExplodeConfig;
use dgnx_core::document::Document;
use dgnx_explode::{ExplodeError, Exploder, ResourceTables};

pub use report::{ElementOutcome, ExplodeReport};
pub use script::{DrawCommand, ElementScript, ElementSet};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("读取文件 {path:?} 失败: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("写入文件 {path:?} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析脚本 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("脚本结构无效: {0}")]
    InvalidScript(String),
}

pub trait ScriptLoader {
    fn load(&self, path: &Path) -> Result<ElementSet, IoError>;
}

pub trait ReportSaver {
    fn save(&self, report: &ExplodeReport<'_>, path: &Path) -> Result<(), IoError>;
}

/// JSON 格式的脚本读取与报告写出。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFacade;

impl JsonFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source: &str, path: &Path) -> Result<ElementSet, IoError> {
        let set: ElementSet = serde_json::from_str(source).map_err(|source| IoError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        set.validate()?;
        Ok(set)
    }
}

impl ScriptLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<ElementSet, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let set = self.parse(&data, path)?;
        debug!(path = %path.display(), elements = set.elements.len(), "读取图元脚本");
        Ok(set)
    }
}

impl ReportSaver for JsonFacade {
    fn save(&self, report: &ExplodeReport<'_>, path: &Path) -> Result<(), IoError> {
        let write_error = |source: std::io::Error| IoError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_error)?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .map_err(|err| write_error(err.into()))?;
        debug!(path = %path.display(), "写出炸开报告");
        Ok(())
    }
}

/// 一次批量炸开的结果。
#[derive(Debug, Default)]
pub struct ExplodeRun {
    pub document: Document,
    pub outcomes: Vec<ElementOutcome>,
}

impl ExplodeRun {
    pub fn exploded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_exploded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.exploded()
    }

    pub fn report(&self) -> ExplodeReport<'_> {
        ExplodeReport::new(&self.document, &self.outcomes)
    }
}

/// 依次炸开脚本中的全部图元，结果按顺序追加到同一个文档。
///
/// 单个图元失败不会中断批量处理；尺寸标注按段炸开，任一段成功即视为成功。
pub fn explode_all(set: &ElementSet, config: &ExplodeConfig) -> ExplodeRun {
    let mut resources: ResourceTables = set.resources.clone();
    resources.apply_config(config);
    let mut exploder = Exploder::new(config.clone(), resources);
    let mut run = ExplodeRun {
        document: Document::new(),
        outcomes: Vec::with_capacity(set.elements.len()),
    };

    for element in &set.elements {
        let result = if element.is_dimension() {
            explode_segments(&mut exploder, element, &mut run.document)
        } else {
            exploder.explode(element, &mut run.document)
        };
        if let Err(err) = &result {
            warn!(element = element.label(), error = %err, "图元炸开失败");
        }
        run.outcomes.push(ElementOutcome::new(element.name.clone(), result));
    }
    run
}

fn explode_segments(
    exploder: &mut Exploder<ResourceTables>,
    element: &ElementScript,
    document: &mut Document,
) -> Result<usize, ExplodeError> {
    use dgnx_explode::DimensionDrawable;

    let mut total = 0;
    for index in 0..element.segment_count() {
        match exploder.explode_dimension_segment(element, index, document) {
            Ok(count) => total += count,
            Err(err) => debug!(element = element.label(), index, error = %err, "尺寸段未产生实体"),
        }
    }
    if total == 0 {
        Err(ExplodeError::NothingProduced)
    } else {
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgnx_core::geometry::Point3;

    #[test]
    fn malformed_json_reports_parse_error() {
        let err = JsonFacade::new()
            .parse("{\"elements\": [", Path::new("broken.json"))
            .unwrap_err();
        assert!(matches!(err, IoError::Parse { .. }));
    }

    #[test]
    fn oversized_mesh_dimensions_are_invalid() {
        let source = r#"{"elements": [{"commands": [
            {"op": "mesh", "rows": 4294967296, "columns": 4294967296, "vertices": []}
        ]}]}"#;
        let err = JsonFacade::new()
            .parse(source, Path::new("huge.json"))
            .unwrap_err();
        assert!(
            matches!(&err, IoError::InvalidScript(message) if message.contains("超出范围")),
            "{err}"
        );
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let mut set = ElementSet::new(ResourceTables::new());
        set.elements.push(ElementScript::new(vec![DrawCommand::Fail {
            message: "坏数据".to_string(),
        }]));
        set.elements.push(ElementScript::new(vec![DrawCommand::Polyline {
            points: vec![Point3::ORIGIN, Point3::new(3.0, 4.0, 0.0)],
            normal: None,
        }]));

        let run = explode_all(&set, &ExplodeConfig::default());
        assert_eq!(run.outcomes.len(), 2);
        assert_eq!(run.exploded(), 1);
        assert_eq!(run.failed(), 1);
        assert_eq!(run.document.entities().count(), 1);
    }
}
