pub mod geometry {
    use glam::{DAffine3, DMat3, DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 任意轴算法阈值（DXF OCS 约定）。
    const ARBITRARY_AXIS_LIMIT: f64 = 1.0 / 64.0;

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点。炸开结果的所有实体都以世界坐标（WCS）三维点存储。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，用于法向、方向与 U/V 轴。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const X: Vector3 = Vector3(DVec3::X);
        pub const Y: Vector3 = Vector3(DVec3::Y);
        pub const Z: Vector3 = Vector3(DVec3::Z);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维范围（源图元的包围盒）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Extents3D {
        pub min: Point3,
        pub max: Point3,
    }

    impl Extents3D {
        #[inline]
        pub fn new(min: Point3, max: Point3) -> Self {
            Self { min, max }
        }

        pub fn from_points<I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = Point3>,
        {
            let mut iter = points.into_iter();
            let first = iter.next()?;
            let mut extents = Self::new(first, first);
            for point in iter {
                extents.include_point(point);
            }
            Some(extents)
        }

        pub fn include_point(&mut self, point: Point3) {
            self.min = Point3(self.min.0.min(point.0));
            self.max = Point3(self.max.0.max(point.0));
        }

        /// 包围盒对角线长度。
        #[inline]
        pub fn diagonal(&self) -> f64 {
            self.min.distance(self.max)
        }
    }

    /// 按任意轴算法由法向推导 OCS 的 X/Y 轴。
    ///
    /// 法向需已归一化；返回值均为单位向量，且 `ax × ay = normal`。
    pub fn ocs_axes(normal: DVec3) -> (DVec3, DVec3) {
        let ax = if normal.x.abs() < ARBITRARY_AXIS_LIMIT && normal.y.abs() < ARBITRARY_AXIS_LIMIT
        {
            DVec3::Y.cross(normal)
        } else {
            DVec3::Z.cross(normal)
        }
        .normalize();
        let ay = normal.cross(ax).normalize();
        (ax, ay)
    }

    /// 世界坐标 → OCS 坐标。
    pub fn world_to_ocs(point: DVec3, normal: DVec3) -> DVec3 {
        let (ax, ay) = ocs_axes(normal);
        DVec3::new(point.dot(ax), point.dot(ay), point.dot(normal))
    }

    /// OCS 坐标 → 世界坐标。
    pub fn ocs_to_world(point: DVec3, normal: DVec3) -> DVec3 {
        let (ax, ay) = ocs_axes(normal);
        ax * point.x + ay * point.y + normal * point.z
    }

    /// 刚体变换，封装 `glam::DAffine3`。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Transform3(pub DAffine3);

    impl Transform3 {
        /// 世界坐标到以 `normal` 为 Z 轴的局部平面坐标的旋转。
        pub fn world_to_plane(normal: Vector3) -> Self {
            let normal = normal.normalize().map(|n| n.0).unwrap_or(DVec3::Z);
            let (ax, ay) = ocs_axes(normal);
            let rotation = DMat3::from_cols(ax, ay, normal).transpose();
            Self(DAffine3::from_mat3(rotation))
        }

        #[inline]
        pub fn apply_point(&self, point: Point3) -> Point3 {
            Point3(self.0.transform_point3(point.0))
        }

        #[inline]
        pub fn apply_vector(&self, vector: Vector3) -> Vector3 {
            Vector3(self.0.transform_vector3(vector.0))
        }

        /// 变换法向（刚体变换下等同于旋转），结果重新归一化。
        pub fn apply_normal(&self, normal: Vector3) -> Vector3 {
            self.apply_vector(normal).normalize().unwrap_or(Vector3::Z)
        }

        pub fn is_identity(&self) -> bool {
            self.0.abs_diff_eq(DAffine3::IDENTITY, 1e-12)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn ocs_axes_for_z_normal_are_world_axes() {
            let (ax, ay) = ocs_axes(DVec3::Z);
            assert!(ax.abs_diff_eq(DVec3::X, 1e-12));
            assert!(ay.abs_diff_eq(DVec3::Y, 1e-12));
        }

        #[test]
        fn ocs_round_trip_for_tilted_normal() {
            let normal = DVec3::new(1.0, 1.0, 1.0).normalize();
            let point = DVec3::new(3.0, -2.0, 7.5);
            let local = world_to_ocs(point, normal);
            let back = ocs_to_world(local, normal);
            assert!(back.abs_diff_eq(point, 1e-9));
            let (ax, ay) = ocs_axes(normal);
            assert!(ax.cross(ay).abs_diff_eq(normal, 1e-12));
        }

        #[test]
        fn world_to_plane_maps_normal_onto_z() {
            let normal = Vector3::new(0.0, -1.0, 0.0);
            let transform = Transform3::world_to_plane(normal);
            let mapped = transform.apply_vector(normal).as_vec3();
            assert!(mapped.abs_diff_eq(DVec3::Z, 1e-12));
            assert!(!transform.is_identity());
            assert!(Transform3::world_to_plane(Vector3::Z).is_identity());
        }

        #[test]
        fn extents_diagonal() {
            let extents = Extents3D::from_points([
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(3.0, 4.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ])
            .expect("non-empty");
            assert!((extents.diagonal() - 5.0).abs() < 1e-12);
            assert!(Extents3D::from_points(std::iter::empty()).is_none());
        }
    }
}

pub mod document {
    use std::collections::HashMap;
    use std::f64::consts::TAU;

    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    use crate::geometry::{
        Point2, Point3, Transform3, Vector2, Vector3, ocs_axes, ocs_to_world, world_to_ocs,
    };

    /// 缺省图层（“0 层”）名称。
    pub const DEFAULT_LAYER: &str = "0";
    pub const LINETYPE_BYLAYER: &str = "BYLAYER";
    pub const LINETYPE_BYBLOCK: &str = "BYBLOCK";
    pub const LINETYPE_CONTINUOUS: &str = "CONTINUOUS";

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
            }
        }
    }

    /// 目标模型颜色：随层、随块、索引色或真彩色。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum Color {
        ByLayer,
        ByBlock,
        Index { index: u8 },
        Rgb { r: u8, g: u8, b: u8 },
    }

    impl Default for Color {
        fn default() -> Self {
            Color::ByLayer
        }
    }

    /// 线宽，数值以 1/100 毫米计。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", content = "value", rename_all = "snake_case")]
    pub enum LineWeight {
        ByLayer,
        ByBlock,
        Default,
        Hundredths(i16),
    }

    impl Default for LineWeight {
        fn default() -> Self {
            LineWeight::ByLayer
        }
    }

    /// 每个输出实体携带的完整属性快照。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityProperties {
        pub layer: String,
        pub color: Color,
        pub linetype: String,
        pub linetype_scale: f64,
        pub lineweight: LineWeight,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub plot_style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub material: Option<String>,
        /// Alpha 值（255 为不透明）；`None` 表示随层。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub transparency: Option<u8>,
        pub is_visible: bool,
        pub thickness: f64,
        pub normal: Vector3,
    }

    impl Default for EntityProperties {
        fn default() -> Self {
            Self {
                layer: DEFAULT_LAYER.to_string(),
                color: Color::ByLayer,
                linetype: LINETYPE_BYLAYER.to_string(),
                linetype_scale: 1.0,
                lineweight: LineWeight::ByLayer,
                plot_style: None,
                material: None,
                transparency: None,
                is_visible: true,
                thickness: 0.0,
                normal: Vector3::Z,
            }
        }
    }

    impl EntityProperties {
        pub fn on_layer(layer: impl Into<String>) -> Self {
            Self {
                layer: layer.into(),
                ..Self::default()
            }
        }

        #[inline]
        pub fn with_normal(mut self, normal: Vector3) -> Self {
            self.normal = normal;
            self
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Ray(Ray),
        XLine(XLine),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Polyline3d(Polyline3d),
        Face(Face),
        Solid(Solid),
        PolyfaceMesh(PolyfaceMesh),
        PolygonMesh(PolygonMesh),
        Hatch(Hatch),
        Text(Text),
        MText(MText),
        RasterImage(RasterImage),
    }

    impl Entity {
        pub fn properties(&self) -> &EntityProperties {
            match self {
                Entity::Line(line) => &line.properties,
                Entity::Ray(ray) => &ray.properties,
                Entity::XLine(xline) => &xline.properties,
                Entity::Circle(circle) => &circle.properties,
                Entity::Arc(arc) => &arc.properties,
                Entity::Polyline(polyline) => &polyline.properties,
                Entity::Polyline3d(polyline) => &polyline.properties,
                Entity::Face(face) => &face.properties,
                Entity::Solid(solid) => &solid.properties,
                Entity::PolyfaceMesh(mesh) => &mesh.properties,
                Entity::PolygonMesh(mesh) => &mesh.properties,
                Entity::Hatch(hatch) => &hatch.properties,
                Entity::Text(text) => &text.properties,
                Entity::MText(mtext) => &mtext.properties,
                Entity::RasterImage(image) => &image.properties,
            }
        }

        pub fn properties_mut(&mut self) -> &mut EntityProperties {
            match self {
                Entity::Line(line) => &mut line.properties,
                Entity::Ray(ray) => &mut ray.properties,
                Entity::XLine(xline) => &mut xline.properties,
                Entity::Circle(circle) => &mut circle.properties,
                Entity::Arc(arc) => &mut arc.properties,
                Entity::Polyline(polyline) => &mut polyline.properties,
                Entity::Polyline3d(polyline) => &mut polyline.properties,
                Entity::Face(face) => &mut face.properties,
                Entity::Solid(solid) => &mut solid.properties,
                Entity::PolyfaceMesh(mesh) => &mut mesh.properties,
                Entity::PolygonMesh(mesh) => &mut mesh.properties,
                Entity::Hatch(hatch) => &mut hatch.properties,
                Entity::Text(text) => &mut text.properties,
                Entity::MText(mtext) => &mut mtext.properties,
                Entity::RasterImage(image) => &mut image.properties,
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            &self.properties().layer
        }

        /// DXF 风格的类型名，便于日志与报告输出。
        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Ray(_) => "RAY",
                Entity::XLine(_) => "XLINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Polyline(_) => "LWPOLYLINE",
                Entity::Polyline3d(_) => "POLYLINE3D",
                Entity::Face(_) => "3DFACE",
                Entity::Solid(_) => "SOLID",
                Entity::PolyfaceMesh(_) => "POLYFACE",
                Entity::PolygonMesh(_) => "POLYGONMESH",
                Entity::Hatch(_) => "HATCH",
                Entity::Text(_) => "TEXT",
                Entity::MText(_) => "MTEXT",
                Entity::RasterImage(_) => "IMAGE",
            }
        }

        /// 对实体施加刚体变换（仅支持保持手性的旋转 + 平移）。
        pub fn transform_by(&mut self, transform: &Transform3) {
            match self {
                Entity::Line(line) => {
                    line.start = transform.apply_point(line.start);
                    line.end = transform.apply_point(line.end);
                }
                Entity::Ray(ray) => {
                    ray.base = transform.apply_point(ray.base);
                    ray.direction = transform.apply_normal(ray.direction);
                }
                Entity::XLine(xline) => {
                    xline.base = transform.apply_point(xline.base);
                    xline.direction = transform.apply_normal(xline.direction);
                }
                Entity::Circle(circle) => {
                    circle.center = transform.apply_point(circle.center);
                }
                Entity::Arc(arc) => {
                    let normal = arc.properties.normal.as_vec3();
                    let new_normal = transform.apply_normal(arc.properties.normal).as_vec3();
                    arc.start_angle =
                        remap_angle(arc.start_angle, normal, new_normal, transform);
                    arc.end_angle = remap_angle(arc.end_angle, normal, new_normal, transform);
                    arc.center = transform.apply_point(arc.center);
                }
                Entity::Polyline(polyline) => {
                    let normal = polyline.properties.normal.as_vec3();
                    let new_normal = transform.apply_normal(polyline.properties.normal).as_vec3();
                    let mut elevation = None;
                    for vertex in &mut polyline.vertices {
                        let local = remap_ocs_point(
                            vertex.position,
                            polyline.elevation,
                            normal,
                            new_normal,
                            transform,
                        );
                        elevation.get_or_insert(local.z);
                        vertex.position = Point2::new(local.x, local.y);
                    }
                    if let Some(elevation) = elevation {
                        polyline.elevation = elevation;
                    }
                }
                Entity::Polyline3d(polyline) => {
                    for vertex in &mut polyline.vertices {
                        *vertex = transform.apply_point(*vertex);
                    }
                }
                Entity::Face(face) => {
                    for vertex in &mut face.vertices {
                        *vertex = transform.apply_point(*vertex);
                    }
                }
                Entity::Solid(solid) => {
                    for vertex in &mut solid.vertices {
                        *vertex = transform.apply_point(*vertex);
                    }
                }
                Entity::PolyfaceMesh(mesh) => {
                    for vertex in &mut mesh.vertices {
                        vertex.position = transform.apply_point(vertex.position);
                    }
                }
                Entity::PolygonMesh(mesh) => {
                    for vertex in &mut mesh.vertices {
                        *vertex = transform.apply_point(*vertex);
                    }
                }
                Entity::Hatch(hatch) => {
                    let normal = hatch.properties.normal.as_vec3();
                    let new_normal = transform.apply_normal(hatch.properties.normal).as_vec3();
                    let elevation = hatch.elevation;
                    let mut new_elevation = None;
                    let mut remap = |point: Point2| {
                        let local = remap_ocs_point(point, elevation, normal, new_normal, transform);
                        new_elevation.get_or_insert(local.z);
                        Point2::new(local.x, local.y)
                    };
                    for loop_path in &mut hatch.loops {
                        for edge in &mut loop_path.edges {
                            match edge {
                                HatchEdge::Line { start, end }
                                | HatchEdge::PolylineSegment { start, end, .. } => {
                                    *start = remap(*start);
                                    *end = remap(*end);
                                }
                                HatchEdge::Arc {
                                    center,
                                    start_angle,
                                    end_angle,
                                    ..
                                } => {
                                    *start_angle =
                                        remap_angle(*start_angle, normal, new_normal, transform);
                                    *end_angle =
                                        remap_angle(*end_angle, normal, new_normal, transform);
                                    *center = remap(*center);
                                }
                            }
                        }
                    }
                    if let Some(elevation) = new_elevation {
                        hatch.elevation = elevation;
                    }
                }
                Entity::Text(text) => {
                    let normal = text.properties.normal.as_vec3();
                    let new_normal = transform.apply_normal(text.properties.normal).as_vec3();
                    text.rotation = remap_angle(text.rotation, normal, new_normal, transform);
                    text.insert = transform.apply_point(text.insert);
                }
                Entity::MText(mtext) => {
                    mtext.insert = transform.apply_point(mtext.insert);
                    mtext.direction = transform.apply_normal(mtext.direction);
                }
                Entity::RasterImage(image) => {
                    image.insert = transform.apply_point(image.insert);
                    image.u_vector = transform.apply_vector(image.u_vector);
                    image.v_vector = transform.apply_vector(image.v_vector);
                }
            }
            let properties = self.properties_mut();
            properties.normal = transform.apply_normal(properties.normal);
        }
    }

    fn remap_angle(angle: f64, normal: DVec3, new_normal: DVec3, transform: &Transform3) -> f64 {
        let (ax, ay) = ocs_axes(normal);
        let direction = ax * angle.cos() + ay * angle.sin();
        let mapped = transform.0.transform_vector3(direction);
        let (bx, by) = ocs_axes(new_normal);
        normalize_angle(mapped.dot(by).atan2(mapped.dot(bx)))
    }

    fn remap_ocs_point(
        point: Point2,
        elevation: f64,
        normal: DVec3,
        new_normal: DVec3,
        transform: &Transform3,
    ) -> DVec3 {
        let world = ocs_to_world(point.as_vec2().extend(elevation), normal);
        let mapped = transform.0.transform_point3(world);
        world_to_ocs(mapped, new_normal)
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point3,
        pub end: Point3,
        pub properties: EntityProperties,
    }

    /// 射线：自基点沿单位方向无限延伸。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ray {
        pub base: Point3,
        pub direction: Vector3,
        pub properties: EntityProperties,
    }

    /// 构造线：过基点双向无限延伸。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct XLine {
        pub base: Point3,
        pub direction: Vector3,
        pub properties: EntityProperties,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point3,
        pub radius: f64,
        pub properties: EntityProperties,
    }

    /// 圆弧实体，角度以弧度形式储存，相对于法向 OCS 的 X 轴逆时针度量。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point3,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub properties: EntityProperties,
    }

    impl Arc {
        pub fn start_point(&self) -> Point3 {
            self.point_at(self.start_angle)
        }

        pub fn end_point(&self) -> Point3 {
            self.point_at(self.end_angle)
        }

        fn point_at(&self, angle: f64) -> Point3 {
            let (ax, ay) = ocs_axes(self.properties.normal.as_vec3());
            Point3(self.center.0 + (ax * angle.cos() + ay * angle.sin()) * self.radius)
        }
    }

    /// 轻量多段线：顶点为 OCS 二维坐标，`elevation` 为 OCS 高程。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub elevation: f64,
        pub properties: EntityProperties,
    }

    impl Polyline {
        /// 把 OCS 顶点还原为世界坐标。
        pub fn world_points(&self) -> Vec<Point3> {
            let normal = self.properties.normal.as_vec3();
            self.vertices
                .iter()
                .map(|vertex| {
                    Point3(ocs_to_world(
                        vertex.position.as_vec2().extend(self.elevation),
                        normal,
                    ))
                })
                .collect()
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

    }

    /// 非平面（真三维）多段线。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline3d {
        pub vertices: Vec<Point3>,
        pub is_closed: bool,
        pub properties: EntityProperties,
    }

    /// 3D 面（3DFACE）实体。三角形时第四个顶点与第三个重合。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Face {
        pub vertices: [Point3; 4],
        /// 依次表示边 1-4 是否隐藏。
        pub invisible_edges: [bool; 4],
        pub properties: EntityProperties,
    }

    impl Face {
        #[inline]
        pub fn is_triangle(&self) -> bool {
            self.vertices[2] == self.vertices[3]
        }
    }

    /// 实心填充的三角形/四边形，顶点按输入顺序保存（3 或 4 个）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Solid {
        pub vertices: Vec<Point3>,
        pub properties: EntityProperties,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolyfaceVertex {
        pub position: Point3,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<Color>,
    }

    /// 多面网格的面记录：1 起始的顶点索引，负值表示从该顶点出发的边不可见，0 表示未使用。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolyfaceFace {
        pub indices: [i16; 4],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<Color>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub material: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub transparency: Option<u8>,
        pub is_visible: bool,
    }

    impl PolyfaceFace {
        pub fn vertex_count(&self) -> usize {
            self.indices.iter().take_while(|index| **index != 0).count()
        }

        /// 第 `slot` 个顶点的零起始索引。
        pub fn vertex_index(&self, slot: usize) -> Option<usize> {
            match self.indices.get(slot) {
                Some(0) | None => None,
                Some(index) => Some(index.unsigned_abs() as usize - 1),
            }
        }

        /// 以第 `slot` 个顶点为起点的边是否可见。
        pub fn is_edge_visible(&self, slot: usize) -> bool {
            self.indices.get(slot).is_some_and(|index| *index > 0)
        }
    }

    /// 多面网格（POLYFACE），顶点数与面数均受 16 位有符号整数限制。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolyfaceMesh {
        pub vertices: Vec<PolyfaceVertex>,
        pub faces: Vec<PolyfaceFace>,
        pub properties: EntityProperties,
    }

    /// M×N 规则多边形网格，顶点按行优先存储。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolygonMesh {
        pub rows: usize,
        pub columns: usize,
        pub vertices: Vec<Point3>,
        pub properties: EntityProperties,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HatchLoop {
        pub is_polyline: bool,
        pub is_closed: bool,
        pub edges: Vec<HatchEdge>,
    }

    /// 填充边界边，坐标位于填充所在平面的 OCS。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum HatchEdge {
        Line {
            start: Point2,
            end: Point2,
        },
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            is_counter_clockwise: bool,
        },
        PolylineSegment {
            start: Point2,
            end: Point2,
            bulge: f64,
        },
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Hatch {
        pub pattern_name: String,
        pub is_solid: bool,
        pub loops: Vec<HatchLoop>,
        pub elevation: f64,
        pub properties: EntityProperties,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point3,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub width_factor: f64,
        pub oblique: f64,
        pub style: Option<String>,
        pub mirror_x: bool,
        pub mirror_y: bool,
        pub is_vertical: bool,
        pub properties: EntityProperties,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point3,
        pub content: String,
        pub height: f64,
        pub reference_width: Option<f64>,
        pub direction: Vector3,
        pub attachment_point: i16,
        pub style: Option<String>,
        pub properties: EntityProperties,
    }

    impl MText {
        /// 去除内联格式码后的纯文本。
        pub fn plain_text(&self) -> String {
            mtext_plain_text(&self.content)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RasterImageDisplayOptions {
        pub show_image: bool,
        pub show_border: bool,
        pub use_clipping: bool,
        pub brightness: Option<i16>,
        pub contrast: Option<i16>,
        pub fade: Option<i16>,
    }

    impl Default for RasterImageDisplayOptions {
        fn default() -> Self {
            Self {
                show_image: true,
                show_border: false,
                use_clipping: false,
                brightness: None,
                contrast: None,
                fade: None,
            }
        }
    }

    /// 栅格图像框：U/V 向量为单像素在世界坐标下的跨度。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RasterImage {
        pub image_def: String,
        pub insert: Point3,
        pub u_vector: Vector3,
        pub v_vector: Vector3,
        pub image_size: Vector2,
        pub display_options: RasterImageDisplayOptions,
        /// 像素坐标下的裁剪多边形。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub clip: Option<Vec<Point2>>,
        pub properties: EntityProperties,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RasterImageDefinition {
        pub name: String,
        pub file_path: String,
        pub image_size_pixels: Option<Vector2>,
    }

    /// 文字样式记录；由形字体转换而来时 `is_shape_font` 为真。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TextStyleRecord {
        pub name: String,
        pub font_file: String,
        pub is_shape_font: bool,
    }

    /// 炸开结果的目标容器约定：按顺序追加、不去重。
    pub trait EntityContainer {
        fn append(&mut self, entity: Entity);

        /// 声明实体引用的文字样式，缺省忽略。
        fn declare_text_style(&mut self, _style: &TextStyleRecord) {}

        /// 声明栅格图像定义，缺省忽略。
        fn declare_image_definition(&mut self, _definition: &RasterImageDefinition) {}
    }

    impl EntityContainer for Vec<Entity> {
        fn append(&mut self, entity: Entity) {
            self.push(entity);
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        text_styles: HashMap<String, TextStyleRecord>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        image_definitions: HashMap<String, RasterImageDefinition>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer(DEFAULT_LAYER);
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        pub fn add_line(
            &mut self,
            start: Point3,
            end: Point3,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Line(Line {
                start,
                end,
                properties: EntityProperties::on_layer(layer),
            }))
        }

        pub fn add_circle(
            &mut self,
            center: Point3,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                properties: EntityProperties::on_layer(layer),
            }))
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name().to_string());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        /// 登记文字样式，返回是否为首次创建。
        pub fn ensure_text_style(&mut self, style: TextStyleRecord) -> bool {
            let key = style.name.to_ascii_uppercase();
            if self.text_styles.contains_key(&key) {
                return false;
            }
            self.text_styles.insert(key, style);
            true
        }

        pub fn text_style(&self, name: &str) -> Option<&TextStyleRecord> {
            self.text_styles.get(&name.to_ascii_uppercase())
        }

        pub fn text_styles(&self) -> impl Iterator<Item = &TextStyleRecord> {
            self.text_styles.values()
        }

        /// 以文件路径（忽略大小写）去重登记栅格图像定义，返回定义键。
        pub fn add_raster_image_definition(&mut self, definition: RasterImageDefinition) -> String {
            let key = definition.file_path.to_ascii_lowercase();
            self.image_definitions
                .entry(key.clone())
                .or_insert(definition);
            key
        }

        pub fn raster_image_definitions(&self) -> impl Iterator<Item = &RasterImageDefinition> {
            self.image_definitions.values()
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    impl EntityContainer for Document {
        fn append(&mut self, entity: Entity) {
            self.add_entity(entity);
        }

        fn declare_text_style(&mut self, style: &TextStyleRecord) {
            self.ensure_text_style(style.clone());
        }

        fn declare_image_definition(&mut self, definition: &RasterImageDefinition) {
            self.add_raster_image_definition(definition.clone());
        }
    }

    /// 去掉 MTEXT 内联格式码，仅保留可见文本。
    pub fn mtext_plain_text(raw: &str) -> String {
        let mut result = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some('P') | Some('p') => result.push('\n'),
                    Some('~') => result.push(' '),
                    Some(escaped @ ('\\' | '{' | '}')) => result.push(escaped),
                    Some('L' | 'l' | 'O' | 'o' | 'K' | 'k') => {}
                    Some('f' | 'F' | 'H' | 'h' | 'W' | 'w' | 'T' | 't' | 'Q' | 'q' | 'A'
                    | 'a' | 'C' | 'c' | 'S' | 's') => {
                        // 带参数的格式码，参数以分号结束。
                        for next in chars.by_ref() {
                            if next == ';' {
                                break;
                            }
                        }
                    }
                    Some(other) => {
                        result.push('\\');
                        result.push(other);
                    }
                    None => result.push('\\'),
                },
                '{' | '}' => {}
                _ => result.push(ch),
            }
        }
        result
    }

    fn normalize_angle(angle: f64) -> f64 {
        let mut value = angle % TAU;
        if value < 0.0 {
            value += TAU;
        }
        value
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Point3, Vector3};
        use std::f64::consts::FRAC_PI_2;

        #[test]
        fn document_stores_entities() {
            let mut doc = Document::new();
            let id = doc.add_line(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), "0");
            let circle_id = doc.add_circle(Point3::new(5.0, 5.0, 0.0), 2.0, "ANNOT");
            let arc_id = doc.add_entity(Entity::Arc(Arc {
                center: Point3::new(5.0, 0.0, 0.0),
                radius: 3.5,
                start_angle: 0.0,
                end_angle: FRAC_PI_2,
                properties: EntityProperties::on_layer("GEOM"),
            }));

            assert_eq!(id.get(), 0);
            assert_eq!(circle_id.get(), 1);
            assert_eq!(arc_id.get(), 2);
            let layers: Vec<_> = doc.layers().map(|l| l.name.clone()).collect();
            assert!(layers.contains(&"0".to_string()));
            assert!(layers.contains(&"ANNOT".to_string()));
            assert!(layers.contains(&"GEOM".to_string()));
            assert_eq!(doc.entities().count(), 3);

            match doc.entities().find(|(id, _)| *id == arc_id) {
                Some((_, Entity::Arc(arc))) => {
                    assert_eq!(arc.properties.layer, "GEOM");
                    assert!((arc.radius - 3.5).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }

        }

        #[test]
        fn triangle_face_repeats_third_vertex() {
            let face = Face {
                vertices: [
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(10.0, 0.0, 0.0),
                    Point3::new(0.0, 5.0, 0.0),
                    Point3::new(0.0, 5.0, 0.0),
                ],
                invisible_edges: [false; 4],
                properties: EntityProperties::on_layer("3D"),
            };
            assert!(face.is_triangle());
        }

        #[test]
        fn polyface_face_signed_indices() {
            let face = PolyfaceFace {
                indices: [1, -2, 3, 0],
                color: None,
                material: None,
                transparency: None,
                is_visible: true,
            };
            assert_eq!(face.vertex_count(), 3);
            assert_eq!(face.vertex_index(1), Some(1));
            assert_eq!(face.vertex_index(3), None);
            assert!(face.is_edge_visible(0));
            assert!(!face.is_edge_visible(1));
            assert!(!face.is_edge_visible(3));
        }

        #[test]
        fn plain_text_strips_format_codes() {
            let content = "{\\fArial|b1|i0|c0|p34;\\W0.8;\\Q15;\\LHello\\l \\{x\\}}";
            assert_eq!(mtext_plain_text(content), "Hello {x}");
            assert_eq!(mtext_plain_text("Line1\\PLine2"), "Line1\nLine2");
            assert_eq!(mtext_plain_text("\\\\"), "\\");
        }

        #[test]
        fn container_preserves_append_order() {
            let mut out: Vec<Entity> = Vec::new();
            for x in [1.0, 2.0, 3.0] {
                EntityContainer::append(
                    &mut out,
                    Entity::Line(Line {
                        start: Point3::new(0.0, 0.0, 0.0),
                        end: Point3::new(x, 0.0, 0.0),
                        properties: EntityProperties::default(),
                    }),
                );
            }
            let ends: Vec<f64> = out
                .iter()
                .map(|entity| match entity {
                    Entity::Line(line) => line.end.x(),
                    _ => f64::NAN,
                })
                .collect();
            assert_eq!(ends, vec![1.0, 2.0, 3.0]);
        }

        #[test]
        fn text_styles_and_images_are_deduplicated() {
            let mut doc = Document::new();
            let style = TextStyleRecord {
                name: "ENGINEERING".to_string(),
                font_file: "engineering.shx".to_string(),
                is_shape_font: true,
            };
            assert!(doc.ensure_text_style(style.clone()));
            assert!(!doc.ensure_text_style(style));
            assert!(doc.text_style("engineering").is_some());

            let definition = RasterImageDefinition {
                name: "site".to_string(),
                file_path: "Images/Site.png".to_string(),
                image_size_pixels: None,
            };
            let first = doc.add_raster_image_definition(definition.clone());
            let second = doc.add_raster_image_definition(definition);
            assert_eq!(first, second);
            assert_eq!(doc.raster_image_definitions().count(), 1);
        }

        #[test]
        fn transform_moves_arc_into_plane_frame() {
            let normal = Vector3::new(0.0, -1.0, 0.0);
            let mut entity = Entity::Arc(Arc {
                center: Point3::new(1.0, 0.0, 2.0),
                radius: 1.0,
                start_angle: 0.0,
                end_angle: FRAC_PI_2,
                properties: EntityProperties::default().with_normal(normal),
            });
            let start_before = match &entity {
                Entity::Arc(arc) => arc.start_point(),
                _ => unreachable!(),
            };
            let transform = Transform3::world_to_plane(normal);
            entity.transform_by(&transform);
            match &entity {
                Entity::Arc(arc) => {
                    assert!(arc.properties.normal.as_vec3().abs_diff_eq(DVec3::Z, 1e-9));
                    let expected = transform.apply_point(start_before);
                    assert!(arc.start_point().as_vec3().abs_diff_eq(expected.as_vec3(), 1e-9));
                }
                _ => unreachable!(),
            }
        }
    }
}
