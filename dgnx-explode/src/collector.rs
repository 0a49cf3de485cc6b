use dgnx_core::document::{Entity, EntityContainer, RasterImageDefinition, TextStyleRecord};
use dgnx_core::geometry::Transform3;

/// 按发出顺序累积一次炸开产生的实体，以及它们引用的文字样式与图像定义。
#[derive(Debug, Default)]
pub struct OutputCollector {
    entities: Vec<Entity>,
    text_styles: Vec<TextStyleRecord>,
    image_definitions: Vec<RasterImageDefinition>,
}

impl OutputCollector {
    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn declare_text_style(&mut self, style: TextStyleRecord) {
        if !self.text_styles.iter().any(|known| known.name == style.name) {
            self.text_styles.push(style);
        }
    }

    pub fn declare_image_definition(&mut self, definition: RasterImageDefinition) {
        if !self
            .image_definitions
            .iter()
            .any(|known| known.file_path == definition.file_path)
        {
            self.image_definitions.push(definition);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// 丢弃已累积的全部内容。
    pub fn clear(&mut self) {
        self.entities.clear();
        self.text_styles.clear();
        self.image_definitions.clear();
    }

    pub fn transform_all(&mut self, transform: &Transform3) {
        if transform.is_identity() {
            return;
        }
        for entity in &mut self.entities {
            entity.transform_by(transform);
        }
    }

    /// 先声明样式与图像定义，再按顺序追加实体；返回追加的实体数。
    pub fn drain_into<C>(&mut self, out: &mut C) -> usize
    where
        C: EntityContainer + ?Sized,
    {
        for style in self.text_styles.drain(..) {
            out.declare_text_style(&style);
        }
        for definition in self.image_definitions.drain(..) {
            out.declare_image_definition(&definition);
        }
        let count = self.entities.len();
        for entity in self.entities.drain(..) {
            out.append(entity);
        }
        count
    }
}
