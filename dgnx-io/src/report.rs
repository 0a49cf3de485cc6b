//! 炸开结果报告：逐图元结果、按类型的实体统计与实体明细。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use dgnx_core::document::{Document, Entity, RasterImageDefinition, TextStyleRecord};
use dgnx_explode::ExplodeError;

/// 单个图元的炸开结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entities: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ElementOutcome {
    pub fn new(name: Option<String>, result: Result<usize, ExplodeError>) -> Self {
        match result {
            Ok(entities) => Self {
                name,
                entities,
                error: None,
            },
            Err(err) => Self {
                name,
                entities: 0,
                error: Some(err.to_string()),
            },
        }
    }

    pub fn is_exploded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub elements: usize,
    pub exploded: usize,
    pub failed: usize,
    pub entities: usize,
    /// 实体类型名 → 数量，按名称排序。
    pub by_kind: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Serialize)]
pub struct ReportEntity<'a> {
    pub id: u64,
    pub kind: &'static str,
    pub layer: &'a str,
    pub entity: &'a Entity,
}

#[derive(Debug, Serialize)]
pub struct ExplodeReport<'a> {
    pub summary: ReportSummary,
    pub elements: &'a [ElementOutcome],
    pub layers: Vec<&'a str>,
    pub text_styles: Vec<&'a TextStyleRecord>,
    pub image_definitions: Vec<&'a RasterImageDefinition>,
    pub entities: Vec<ReportEntity<'a>>,
}

impl<'a> ExplodeReport<'a> {
    pub fn new(document: &'a Document, outcomes: &'a [ElementOutcome]) -> Self {
        let entities: Vec<ReportEntity<'a>> = document
            .entities()
            .map(|(id, entity)| ReportEntity {
                id: id.get(),
                kind: entity.kind_name(),
                layer: entity.layer_name(),
                entity,
            })
            .collect();

        let mut by_kind = BTreeMap::new();
        for entity in &entities {
            *by_kind.entry(entity.kind).or_insert(0) += 1;
        }
        let exploded = outcomes.iter().filter(|outcome| outcome.is_exploded()).count();

        let mut layers: Vec<&str> = document.layers().map(|layer| layer.name.as_str()).collect();
        layers.sort_unstable();
        let mut text_styles: Vec<&TextStyleRecord> = document.text_styles().collect();
        text_styles.sort_by(|a, b| a.name.cmp(&b.name));
        let mut image_definitions: Vec<&RasterImageDefinition> =
            document.raster_image_definitions().collect();
        image_definitions.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        Self {
            summary: ReportSummary {
                elements: outcomes.len(),
                exploded,
                failed: outcomes.len() - exploded,
                entities: entities.len(),
                by_kind,
            },
            elements: outcomes,
            layers,
            text_styles,
            image_definitions,
            entities,
        }
    }
}
