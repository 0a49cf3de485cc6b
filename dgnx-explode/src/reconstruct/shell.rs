//! 壳与规则网格的重建：直接 3D 面、多面网格、超限拆分，以及多边面/带孔面的三角化。

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use tracing::{debug, trace, warn};

use dgnx_core::document::{
    Color, Entity, EntityProperties, Face, PolyfaceFace, PolyfaceMesh, PolyfaceVertex, PolygonMesh,
};
use dgnx_core::geometry::{Point2, Point3, Vector3, ocs_axes};

use crate::primitives::{EdgeData, FaceData, Mesh, Shell, VertexData};
use crate::resolve::ResourceResolver;
use crate::state::{ColorRef, MaterialId, transparency_alpha};
use crate::tolerance::fit_normal;

/// 多面网格顶点/面索引上限（16 位有符号整数）。
pub const MAX_MESH_INDEX: usize = 0x7FFF;

#[derive(Debug, Clone)]
struct FaceLoop {
    vertices: Vec<usize>,
    /// 以该顶点为起点的边被面表中的负索引标记为隐藏。
    hidden: Vec<bool>,
    /// 该环第一条边在整张面表中的边序号。
    first_edge: usize,
}

impl FaceLoop {
    fn len(&self) -> usize {
        self.vertices.len()
    }

    fn edge(&self, slot: usize) -> (usize, usize) {
        (
            self.vertices[slot],
            self.vertices[(slot + 1) % self.vertices.len()],
        )
    }
}

/// 一个面：外环加若干孔环。
#[derive(Debug, Clone)]
struct FaceGroup {
    /// 面序号，对应逐面数据数组。
    face_index: usize,
    loops: Vec<FaceLoop>,
}

impl FaceGroup {
    fn outer(&self) -> &FaceLoop {
        &self.loops[0]
    }

    fn has_holes(&self) -> bool {
        self.loops.len() > 1
    }

    fn distinct_vertices(&self) -> usize {
        self.loops
            .iter()
            .flat_map(|face_loop| face_loop.vertices.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// 解析面表。越界或少于三个顶点的环被丢弃（孔随其外环一并丢弃）。
fn parse_faces(faces: &[i32], vertex_count: usize) -> Vec<FaceGroup> {
    let mut groups: Vec<FaceGroup> = Vec::new();
    let mut cursor = 0;
    let mut edge = 0;
    let mut face_index = 0;
    let mut outer_kept = false;

    while cursor < faces.len() {
        let count = faces[cursor];
        cursor += 1;
        let len = count.unsigned_abs() as usize;
        if cursor + len > faces.len() {
            trace!(cursor, len, "面表被截断");
            break;
        }
        let raw = &faces[cursor..cursor + len];
        cursor += len;
        let first_edge = edge;
        edge += len;

        let valid = len >= 3
            && raw
                .iter()
                .all(|index| (index.unsigned_abs() as usize) < vertex_count);
        let face_loop = FaceLoop {
            vertices: raw.iter().map(|index| index.unsigned_abs() as usize).collect(),
            hidden: raw.iter().map(|index| *index < 0).collect(),
            first_edge,
        };

        if count < 0 {
            match groups.last_mut() {
                Some(group) if outer_kept && valid => group.loops.push(face_loop),
                _ => trace!(first_edge, "孔环无效或缺少外环，丢弃"),
            }
            continue;
        }

        let index = face_index;
        face_index += 1;
        outer_kept = valid;
        if valid {
            groups.push(FaceGroup {
                face_index: index,
                loops: vec![face_loop],
            });
        } else {
            trace!(face = index, "面索引无效，丢弃");
        }
    }
    groups
}

/// 面表中的轮廓边集合：无向顶点对 → 首次出现的边序号（含每个环的闭合边）。
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    pairs: HashMap<(usize, usize), usize>,
}

impl EdgeSet {
    #[inline]
    fn key(a: usize, b: usize) -> (usize, usize) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// 由壳的面表构建。
    pub fn from_shell(shell: &Shell<'_>) -> Self {
        Self::from_groups(&parse_faces(shell.faces, shell.vertices.len()))
    }

    fn from_groups(groups: &[FaceGroup]) -> Self {
        let mut set = Self::default();
        for face_loop in groups.iter().flat_map(|group| group.loops.iter()) {
            for slot in 0..face_loop.len() {
                let (a, b) = face_loop.edge(slot);
                set.insert(a, b, face_loop.first_edge + slot);
            }
        }
        set
    }

    pub fn insert(&mut self, a: usize, b: usize, edge_index: usize) {
        self.pairs.entry(Self::key(a, b)).or_insert(edge_index);
    }

    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.pairs.contains_key(&Self::key(a, b))
    }

    pub fn source_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.pairs.get(&Self::key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// 源数据中第 `edge` 条边是否可见（负索引或逐边可见性数组均可隐藏）。
fn source_edge_visible(shell: &Shell<'_>, hidden: &[bool], edge: usize) -> bool {
    !hidden.get(edge).copied().unwrap_or(false)
        && shell
            .edge_data
            .visibility
            .and_then(|visibility| visibility.get(edge))
            .copied()
            .unwrap_or(true)
}

/// 按全局边序号展开的负索引隐藏标志。
fn hidden_edges(groups: &[FaceGroup]) -> Vec<bool> {
    let mut hidden = Vec::new();
    for face_loop in groups.iter().flat_map(|group| group.loops.iter()) {
        let end = face_loop.first_edge + face_loop.len();
        if hidden.len() < end {
            hidden.resize(end, false);
        }
        for (slot, flag) in face_loop.hidden.iter().enumerate() {
            hidden[face_loop.first_edge + slot] = *flag;
        }
    }
    hidden
}

/// 重建壳：必要时拆分为多个独立的多面网格。
pub fn shell(
    shell: &Shell<'_>,
    props: &EntityProperties,
    resolver: &dyn ResourceResolver,
) -> Vec<Entity> {
    let mut out = Vec::new();
    emit_shell(shell, props, resolver, &mut out);
    out
}

fn emit_shell(
    shell: &Shell<'_>,
    props: &EntityProperties,
    resolver: &dyn ResourceResolver,
    out: &mut Vec<Entity>,
) {
    let groups = parse_faces(shell.faces, shell.vertices.len());
    if groups.is_empty() {
        trace!("壳没有有效面，跳过");
        return;
    }
    if let Some(face) = direct_face(shell, &groups, props) {
        out.push(face);
        return;
    }
    if shell.vertices.len() <= MAX_MESH_INDEX && groups.len() <= MAX_MESH_INDEX {
        out.push(polyface(shell, &groups, props, resolver));
        return;
    }

    let parts = partition(shell, &groups, |_| true);
    debug!(
        vertices = shell.vertices.len(),
        faces = groups.len(),
        parts = parts.len(),
        "壳超过索引上限，按面组拆分"
    );
    for part in &parts {
        emit_shell(&part.as_shell(), props, resolver, out);
    }
}

/// 顶点不超过 4 个、面表不超过 5 项且没有逐面数据时，直接输出单个 3D 面。
fn direct_face(
    shell: &Shell<'_>,
    groups: &[FaceGroup],
    props: &EntityProperties,
) -> Option<Entity> {
    if shell.vertices.len() > 4 || shell.faces.len() > 5 || !shell.face_data.is_empty() {
        return None;
    }
    let [group] = groups else {
        return None;
    };
    let outer = group.outer();
    if group.has_holes() || !(3..=4).contains(&outer.len()) {
        return None;
    }

    let hidden = hidden_edges(groups);
    let corner = |slot: usize| shell.vertices[outer.vertices[slot.min(outer.len() - 1)]];
    let vertices = [corner(0), corner(1), corner(2), corner(3)];
    let mut invisible_edges = [false; 4];
    for slot in 0..outer.len() {
        invisible_edges[slot] = !source_edge_visible(shell, &hidden, outer.first_edge + slot);
    }
    if outer.len() == 3 {
        // 三角形的闭合边落在第 4 条边上，第 3 条边退化。
        invisible_edges[3] = invisible_edges[2];
    }
    Some(Entity::Face(Face {
        vertices,
        invisible_edges,
        properties: props.clone(),
    }))
}

struct FaceAttributes {
    color: Option<Color>,
    material: Option<String>,
    transparency: Option<u8>,
    is_visible: bool,
}

fn face_attributes(
    data: &FaceData<'_>,
    face_index: usize,
    resolver: &dyn ResourceResolver,
) -> FaceAttributes {
    FaceAttributes {
        color: data
            .colors
            .and_then(|colors| colors.get(face_index))
            .map(|color| resolver.color(*color)),
        material: data
            .materials
            .and_then(|materials| materials.get(face_index))
            .copied()
            .flatten()
            .and_then(|material| resolver.material(material)),
        transparency: data
            .transparency
            .and_then(|values| values.get(face_index))
            .and_then(|value| transparency_alpha(*value)),
        is_visible: data
            .visibility
            .and_then(|flags| flags.get(face_index))
            .copied()
            .unwrap_or(true),
    }
}

fn signed_index(vertex: usize, visible: bool) -> i16 {
    let index = (vertex + 1) as i16;
    if visible { index } else { -index }
}

fn polyface(
    shell: &Shell<'_>,
    groups: &[FaceGroup],
    props: &EntityProperties,
    resolver: &dyn ResourceResolver,
) -> Entity {
    let edges = EdgeSet::from_groups(groups);
    let hidden = hidden_edges(groups);
    let vertices = shell
        .vertices
        .iter()
        .enumerate()
        .map(|(index, position)| PolyfaceVertex {
            position: *position,
            color: shell
                .vertex_data
                .colors
                .and_then(|colors| colors.get(index))
                .map(|color| resolver.color(*color)),
        })
        .collect();

    let mut faces = Vec::with_capacity(groups.len());
    for group in groups {
        let attributes = face_attributes(&shell.face_data, group.face_index, resolver);
        let make_face = |indices: [i16; 4]| PolyfaceFace {
            indices,
            color: attributes.color,
            material: attributes.material.clone(),
            transparency: attributes.transparency,
            is_visible: attributes.is_visible,
        };

        let outer = group.outer();
        if !group.has_holes() && outer.len() <= 4 {
            let mut indices = [0_i16; 4];
            for slot in 0..outer.len() {
                let (a, b) = outer.edge(slot);
                let visible = edges.contains(a, b)
                    && source_edge_visible(shell, &hidden, outer.first_edge + slot);
                indices[slot] = signed_index(a, visible);
            }
            faces.push(make_face(indices));
            continue;
        }

        for [a, b, c] in triangulate(shell, group) {
            let mut indices = [0_i16; 4];
            for (slot, (from, to)) in [(a, b), (b, c), (c, a)].into_iter().enumerate() {
                let visible = edges
                    .source_edge(from, to)
                    .is_some_and(|edge| source_edge_visible(shell, &hidden, edge));
                indices[slot] = signed_index(from, visible);
            }
            faces.push(make_face(indices));
        }
    }

    Entity::PolyfaceMesh(PolyfaceMesh {
        vertices,
        faces,
        properties: props.clone(),
    })
}

/// 在外环拟合平面上用 earcut 三角化，返回壳顶点索引三元组（与外环同向）。
fn triangulate(shell: &Shell<'_>, group: &FaceGroup) -> Vec<[usize; 3]> {
    let outer: Vec<DVec3> = group
        .outer()
        .vertices
        .iter()
        .map(|index| shell.vertices[*index].0)
        .collect();
    let Some(normal) = fit_normal(&outer) else {
        trace!(face = group.face_index, "面退化，无法三角化");
        return Vec::new();
    };
    let (ax, ay) = ocs_axes(normal);

    let mut coords = Vec::new();
    let mut hole_starts = Vec::new();
    let mut lookup = Vec::new();
    for (position, face_loop) in group.loops.iter().enumerate() {
        if position > 0 {
            hole_starts.push(lookup.len());
        }
        for index in &face_loop.vertices {
            let point = shell.vertices[*index].0;
            coords.push(point.dot(ax));
            coords.push(point.dot(ay));
            lookup.push(*index);
        }
    }

    let triangles = match earcutr::earcut(&coords, &hole_starts, 2) {
        Ok(triangles) => triangles,
        Err(_) => {
            trace!(face = group.face_index, "三角化失败");
            return Vec::new();
        }
    };
    triangles
        .chunks_exact(3)
        .filter_map(|triangle| {
            let (a, b, c) = (
                lookup[triangle[0]],
                lookup[triangle[1]],
                lookup[triangle[2]],
            );
            if a == b || b == c || a == c {
                return None;
            }
            let (pa, pb, pc) = (shell.vertices[a].0, shell.vertices[b].0, shell.vertices[c].0);
            if (pb - pa).cross(pc - pa).dot(normal) < 0.0 {
                Some([a, c, b])
            } else {
                Some([a, b, c])
            }
        })
        .collect()
}

/// 拆分/过滤后得到的独立壳数据，所有索引从 0 重新编号。
#[derive(Debug, Clone, Default)]
pub struct ShellBuffer {
    pub vertices: Vec<Point3>,
    pub faces: Vec<i32>,
    pub normals: Option<Vec<Vector3>>,
    pub vertex_colors: Option<Vec<ColorRef>>,
    pub tex_coords: Option<Vec<Point2>>,
    pub face_colors: Option<Vec<ColorRef>>,
    pub face_materials: Option<Vec<Option<MaterialId>>>,
    pub face_visibility: Option<Vec<bool>>,
    pub face_transparency: Option<Vec<f64>>,
    pub edge_visibility: Option<Vec<bool>>,
    face_count: usize,
}

impl ShellBuffer {
    pub fn as_shell(&self) -> Shell<'_> {
        Shell::new(&self.vertices, &self.faces)
            .with_vertex_data(VertexData {
                normals: self.normals.as_deref(),
                colors: self.vertex_colors.as_deref(),
                tex_coords: self.tex_coords.as_deref(),
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

    pub fn face_count(&self) -> usize {
        self.face_count
    }
}

/// 逐面把源壳数据复制进新的零起始缓冲区。
struct BufferBuilder<'s, 'a> {
    source: &'s Shell<'a>,
    hidden: &'s [bool],
    buffer: ShellBuffer,
    remap: HashMap<usize, usize>,
}

impl<'s, 'a> BufferBuilder<'s, 'a> {
    fn new(source: &'s Shell<'a>, hidden: &'s [bool], track_edges: bool) -> Self {
        let vertex_data = &source.vertex_data;
        let face_data = &source.face_data;
        let buffer = ShellBuffer {
            normals: vertex_data.normals.map(|_| Vec::new()),
            vertex_colors: vertex_data.colors.map(|_| Vec::new()),
            tex_coords: vertex_data.tex_coords.map(|_| Vec::new()),
            face_colors: face_data.colors.map(|_| Vec::new()),
            face_materials: face_data.materials.map(|_| Vec::new()),
            face_visibility: face_data.visibility.map(|_| Vec::new()),
            face_transparency: face_data.transparency.map(|_| Vec::new()),
            edge_visibility: track_edges.then(Vec::new),
            ..ShellBuffer::default()
        };
        Self {
            source,
            hidden,
            buffer,
            remap: HashMap::new(),
        }
    }

    fn vertex_count(&self) -> usize {
        self.buffer.vertices.len()
    }

    fn new_vertices(&self, group: &FaceGroup) -> usize {
        group
            .loops
            .iter()
            .flat_map(|face_loop| face_loop.vertices.iter())
            .filter(|index| !self.remap.contains_key(*index))
            .collect::<HashSet<_>>()
            .len()
    }

    fn map_vertex(&mut self, source_index: usize) -> usize {
        if let Some(local) = self.remap.get(&source_index) {
            return *local;
        }
        let local = self.buffer.vertices.len();
        let data = &self.source.vertex_data;
        self.buffer.vertices.push(self.source.vertices[source_index]);
        if let (Some(target), Some(values)) = (&mut self.buffer.normals, data.normals) {
            target.push(values.get(source_index).copied().unwrap_or(Vector3::Z));
        }
        if let (Some(target), Some(values)) = (&mut self.buffer.vertex_colors, data.colors) {
            target.push(values.get(source_index).copied().unwrap_or_default());
        }
        if let (Some(target), Some(values)) = (&mut self.buffer.tex_coords, data.tex_coords) {
            target.push(
                values
                    .get(source_index)
                    .copied()
                    .unwrap_or(Point2::new(0.0, 0.0)),
            );
        }
        self.remap.insert(source_index, local);
        local
    }

    fn push_group(&mut self, group: &FaceGroup) {
        for (position, face_loop) in group.loops.iter().enumerate() {
            let count = face_loop.len() as i32;
            self.buffer
                .faces
                .push(if position == 0 { count } else { -count });
            for (slot, vertex) in face_loop.vertices.iter().enumerate() {
                let local = self.map_vertex(*vertex);
                self.buffer.faces.push(local as i32);
                let visible =
                    source_edge_visible(self.source, self.hidden, face_loop.first_edge + slot);
                if let Some(edges) = &mut self.buffer.edge_visibility {
                    edges.push(visible);
                }
            }
        }

        let data = &self.source.face_data;
        let face = group.face_index;
        if let (Some(target), Some(values)) = (&mut self.buffer.face_colors, data.colors) {
            target.push(values.get(face).copied().unwrap_or_default());
        }
        if let (Some(target), Some(values)) = (&mut self.buffer.face_materials, data.materials) {
            target.push(values.get(face).copied().flatten());
        }
        if let (Some(target), Some(values)) = (&mut self.buffer.face_visibility, data.visibility) {
            target.push(values.get(face).copied().unwrap_or(true));
        }
        if let (Some(target), Some(values)) =
            (&mut self.buffer.face_transparency, data.transparency)
        {
            target.push(values.get(face).copied().unwrap_or(0.0));
        }
        self.buffer.face_count += 1;
    }

    fn finish(self) -> ShellBuffer {
        self.buffer
    }
}

/// 按面组顺序切分，使每组的顶点数与面数都不超过上限。`keep` 用于过滤面。
fn partition(
    shell: &Shell<'_>,
    groups: &[FaceGroup],
    keep: impl Fn(&FaceGroup) -> bool,
) -> Vec<ShellBuffer> {
    let hidden = hidden_edges(groups);
    let track_edges =
        shell.edge_data.visibility.is_some() || hidden.iter().any(|flag| *flag);
    let mut parts = Vec::new();
    let mut builder = BufferBuilder::new(shell, &hidden, track_edges);

    for group in groups.iter().filter(|group| keep(*group)) {
        let distinct = group.distinct_vertices();
        if distinct > MAX_MESH_INDEX {
            warn!(
                face = group.face_index,
                vertices = distinct,
                "单个面的顶点数超过索引上限，丢弃"
            );
            continue;
        }
        let added = builder.new_vertices(group);
        let full = builder.vertex_count() + added > MAX_MESH_INDEX
            || builder.buffer.face_count + 1 > MAX_MESH_INDEX;
        if full && builder.buffer.face_count > 0 {
            let finished =
                std::mem::replace(&mut builder, BufferBuilder::new(shell, &hidden, track_edges));
            parts.push(finished.finish());
        }
        builder.push_group(group);
    }
    if builder.buffer.face_count > 0 {
        parts.push(builder.finish());
    }
    parts
}

/// 只保留外环满足 `keep` 的面，复制为新的零起始壳数据。
pub fn retain_faces(shell: &Shell<'_>, keep: impl Fn(&[DVec3]) -> bool) -> Vec<ShellBuffer> {
    let groups = parse_faces(shell.faces, shell.vertices.len());
    partition(shell, &groups, |group| {
        let points: Vec<DVec3> = group
            .outer()
            .vertices
            .iter()
            .map(|index| shell.vertices[*index].0)
            .collect();
        keep(&points)
    })
}

/// 重建 rows × columns 规则网格。没有逐面数据时输出多边形网格，否则输出逐单元格的多面网格。
pub fn mesh(
    mesh: &Mesh<'_>,
    props: &EntityProperties,
    resolver: &dyn ResourceResolver,
) -> Vec<Entity> {
    let count = mesh.rows.saturating_mul(mesh.columns);
    if mesh.rows < 2 || mesh.columns < 2 || mesh.vertices.len() < count {
        trace!(rows = mesh.rows, columns = mesh.columns, "网格尺寸无效，跳过");
        return Vec::new();
    }
    let vertices = &mesh.vertices[..count];

    if mesh.face_data.is_empty() && count <= MAX_MESH_INDEX {
        return vec![Entity::PolygonMesh(PolygonMesh {
            rows: mesh.rows,
            columns: mesh.columns,
            vertices: vertices.to_vec(),
            properties: props.clone(),
        })];
    }

    let faces = grid_faces(mesh.rows, mesh.columns);
    let grid = Shell::new(vertices, &faces)
        .with_vertex_data(mesh.vertex_data)
        .with_face_data(mesh.face_data);
    shell(&grid, props, resolver)
}

/// 每个单元格一个四边形，按行优先排列。
pub fn grid_faces(rows: usize, columns: usize) -> Vec<i32> {
    let mut faces = Vec::with_capacity(rows.saturating_sub(1) * columns.saturating_sub(1) * 5);
    for row in 0..rows.saturating_sub(1) {
        for column in 0..columns.saturating_sub(1) {
            let base = row * columns + column;
            faces.extend([
                4,
                base as i32,
                (base + 1) as i32,
                (base + columns + 1) as i32,
                (base + columns) as i32,
            ]);
        }
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResourceTables;

    fn square(z: f64) -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(1.0, 0.0, z),
            Point3::new(1.0, 1.0, z),
            Point3::new(0.0, 1.0, z),
        ]
    }

    fn visible_edge_count(mesh: &PolyfaceMesh) -> usize {
        mesh.faces
            .iter()
            .map(|face| {
                (0..face.vertex_count())
                    .filter(|slot| face.is_edge_visible(*slot))
                    .count()
            })
            .sum()
    }

    #[test]
    fn edge_set_includes_closing_edge() {
        let vertices = square(0.0);
        let faces = [4, 0, 1, 2, 3];
        let edges = EdgeSet::from_shell(&Shell::new(&vertices, &faces));
        assert_eq!(edges.len(), 4);
        assert!(edges.contains(3, 0));
        assert!(edges.contains(0, 3));
        assert_eq!(edges.source_edge(0, 3), Some(3));
        assert!(!edges.contains(0, 2));
    }

    #[test]
    fn small_shell_becomes_single_face() {
        let vertices = square(0.0);
        let faces = [4, 0, 1, 2, 3];
        let visibility = [true, false, true, true];
        let shell_data = Shell::new(&vertices, &faces).with_edge_data(EdgeData {
            visibility: Some(&visibility),
        });
        let entities = shell(&shell_data, &EntityProperties::default(), &ResourceTables::new());
        match &entities[..] {
            [Entity::Face(face)] => {
                assert_eq!(face.invisible_edges, [false, true, false, false]);
                assert_eq!(face.vertices[2], Point3::new(1.0, 1.0, 0.0));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn triangle_shell_repeats_last_corner() {
        let vertices = square(0.0);
        let faces = [3, 0, 1, -2];
        let entities = shell(
            &Shell::new(&vertices[..3], &faces),
            &EntityProperties::default(),
            &ResourceTables::new(),
        );
        match &entities[..] {
            [Entity::Face(face)] => {
                assert!(face.is_triangle());
                assert_eq!(face.invisible_edges, [false, false, true, true]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn face_data_forces_polyface_with_attributes() {
        let vertices = square(0.0);
        let faces = [4, 0, 1, 2, 3];
        let colors = [ColorRef::Index { index: 5 }];
        let visibility = [false, true, true, true];
        let shell_data = Shell::new(&vertices, &faces)
            .with_face_data(FaceData {
                colors: Some(&colors),
                ..FaceData::default()
            })
            .with_edge_data(EdgeData {
                visibility: Some(&visibility),
            });
        let entities = shell(&shell_data, &EntityProperties::default(), &ResourceTables::new());
        match &entities[..] {
            [Entity::PolyfaceMesh(mesh)] => {
                assert_eq!(mesh.vertices.len(), 4);
                assert_eq!(mesh.faces.len(), 1);
                assert_eq!(mesh.faces[0].indices, [-1, 2, 3, 4]);
                assert_eq!(mesh.faces[0].color, Some(Color::Index { index: 5 }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn pentagon_is_triangulated_with_hidden_diagonals() {
        let vertices: Vec<Point3> = (0..5)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / 5.0;
                Point3::new(angle.cos(), angle.sin(), 0.0)
            })
            .collect();
        let faces = [5, 0, 1, 2, 3, 4];
        let entities = shell(
            &Shell::new(&vertices, &faces),
            &EntityProperties::default(),
            &ResourceTables::new(),
        );
        match &entities[..] {
            [Entity::PolyfaceMesh(mesh)] => {
                assert_eq!(mesh.faces.len(), 3);
                assert_eq!(visible_edge_count(mesh), 5);
                assert!(mesh.faces.iter().all(|face| face.vertex_count() == 3));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn face_with_hole_keeps_both_contours_visible() {
        let mut vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ];
        vertices.extend([
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
        ]);
        let faces = [4, 0, 1, 2, 3, -4, 4, 5, 6, 7];
        let entities = shell(
            &Shell::new(&vertices, &faces),
            &EntityProperties::default(),
            &ResourceTables::new(),
        );
        match &entities[..] {
            [Entity::PolyfaceMesh(mesh)] => {
                assert_eq!(mesh.faces.len(), 8);
                assert_eq!(visible_edge_count(mesh), 8);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn invalid_indices_are_dropped() {
        let vertices = square(0.0);
        let faces = [3, 0, 1, 9, 3, 0, 1, 2];
        let groups = parse_faces(&faces, vertices.len());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].face_index, 1);
        assert_eq!(groups[0].outer().first_edge, 3);
    }

    #[test]
    fn oversized_shell_is_split_and_reassembles() {
        let quads = 10_000;
        let mut vertices = Vec::with_capacity(quads * 4);
        let mut faces = Vec::with_capacity(quads * 5);
        for quad in 0..quads {
            let x = quad as f64;
            let base = vertices.len() as i32;
            vertices.extend([
                Point3::new(x, 0.0, 0.0),
                Point3::new(x + 0.5, 0.0, 0.0),
                Point3::new(x + 0.5, 1.0, 0.0),
                Point3::new(x, 1.0, 0.0),
            ]);
            faces.extend([4, base, base + 1, base + 2, base + 3]);
        }
        assert!(vertices.len() > MAX_MESH_INDEX);

        let entities = shell(
            &Shell::new(&vertices, &faces),
            &EntityProperties::default(),
            &ResourceTables::new(),
        );
        assert!(entities.len() >= 2);

        let mut reassembled = Vec::new();
        for entity in &entities {
            let Entity::PolyfaceMesh(mesh) = entity else {
                panic!("expected polyface, got {}", entity.kind_name());
            };
            assert!(mesh.vertices.len() <= MAX_MESH_INDEX);
            for face in &mesh.faces {
                let corners: Vec<Point3> = (0..face.vertex_count())
                    .filter_map(|slot| face.vertex_index(slot))
                    .map(|index| mesh.vertices[index].position)
                    .collect();
                reassembled.push(corners);
            }
        }
        let original: Vec<Vec<Point3>> = vertices.chunks(4).map(|quad| quad.to_vec()).collect();
        assert_eq!(reassembled, original);
    }

    #[test]
    fn split_copies_face_and_edge_data() {
        let vertices = square(0.0);
        let faces = [3, 0, 1, 2, 3, 0, 2, 3];
        let colors = [ColorRef::Index { index: 1 }, ColorRef::Index { index: 2 }];
        let edges = [true, true, true, false, true, true];
        let source = Shell::new(&vertices, &faces)
            .with_face_data(FaceData {
                colors: Some(&colors),
                ..FaceData::default()
            })
            .with_edge_data(EdgeData {
                visibility: Some(&edges),
            });
        let parts = retain_faces(&source, |points| points.iter().any(|p| p.x < 0.5 && p.y > 0.5));
        assert_eq!(parts.len(), 1);
        let part = &parts[0];
        assert_eq!(part.face_count(), 1);
        assert_eq!(part.faces, vec![3, 0, 1, 2]);
        assert_eq!(part.vertices, vec![vertices[0], vertices[2], vertices[3]]);
        assert_eq!(part.face_colors, Some(vec![ColorRef::Index { index: 2 }]));
        assert_eq!(part.edge_visibility, Some(vec![false, true, true]));
    }

    #[test]
    fn regular_mesh_without_face_data_is_polygon_mesh() {
        let vertices: Vec<Point3> = (0..9)
            .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
            .collect();
        let entities = mesh(
            &Mesh::new(3, 3, &vertices),
            &EntityProperties::default(),
            &ResourceTables::new(),
        );
        assert!(matches!(
            &entities[..],
            [Entity::PolygonMesh(mesh)] if mesh.rows == 3 && mesh.columns == 3
        ));
        assert!(
            mesh(
                &Mesh::new(1, 3, &vertices),
                &EntityProperties::default(),
                &ResourceTables::new()
            )
            .is_empty()
        );
    }

    #[test]
    fn regular_mesh_with_face_data_carries_cell_attributes() {
        let vertices: Vec<Point3> = (0..9)
            .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
            .collect();
        let visibility = [true, false, true, true];
        let transparency = [0.0, 0.0, 0.5, 0.0];
        let grid = Mesh::new(3, 3, &vertices).with_face_data(FaceData {
            visibility: Some(&visibility),
            transparency: Some(&transparency),
            ..FaceData::default()
        });
        let entities = mesh(&grid, &EntityProperties::default(), &ResourceTables::new());
        match &entities[..] {
            [Entity::PolyfaceMesh(mesh)] => {
                assert_eq!(mesh.faces.len(), 4);
                assert!(!mesh.faces[1].is_visible);
                assert_eq!(mesh.faces[2].transparency, Some(128));
                assert_eq!(mesh.faces[3].indices, [5, 6, 9, 8]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
