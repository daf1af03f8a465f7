pub mod plan;
pub mod transform;

pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，CAD 文档空间与画布空间共用。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        pub const ORIGIN: Point2 = Point2(DVec2::ZERO);

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
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        /// 判断是否恰好位于原点。畸形输入的顶点会被解析为 `(0,0)`。
        #[inline]
        pub fn is_origin(self) -> bool {
            self.0 == DVec2::ZERO
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
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

    /// 三维点，场景图使用 Y 轴朝上，地面为 XZ 平面。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
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
    }

    /// 轴对齐边界框。空框以反向无穷表示，方便逐点累积。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        /// 文档无有效坐标时使用的哨兵范围，与默认画布尺寸一致。
        pub const SENTINEL_WIDTH: f64 = 800.0;
        pub const SENTINEL_HEIGHT: f64 = 500.0;

        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn from_rect(x: f64, y: f64, w: f64, h: f64) -> Self {
            Self::new(Point2::new(x, y), Point2::new(x + w, y + h))
        }

        #[inline]
        pub fn sentinel() -> Self {
            Self::from_rect(0.0, 0.0, Self::SENTINEL_WIDTH, Self::SENTINEL_HEIGHT)
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn min_x(&self) -> f64 {
            self.min.x()
        }

        #[inline]
        pub fn min_y(&self) -> f64 {
            self.min.y()
        }

        #[inline]
        pub fn max_x(&self) -> f64 {
            self.max.x()
        }

        #[inline]
        pub fn max_y(&self) -> f64 {
            self.max.y()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point2::from_vec(self.min.as_vec2().min(point.as_vec2()));
            self.max = Point2::from_vec(self.max.as_vec2().max(point.as_vec2()));
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 包含判定，边界上的点视为在内。
        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            Point2::from_vec((self.min.as_vec2() + self.max.as_vec2()) * 0.5)
        }

        #[inline]
        pub fn expand(&self, margin: f64) -> Self {
            Self::new(
                Point2::new(self.min.x() - margin, self.min.y() - margin),
                Point2::new(self.max.x() + margin, self.max.y() + margin),
            )
        }
    }
}

pub mod document {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    pub const DEFAULT_LAYER: &str = "0";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

    /// 摄取阶段产出的封闭实体集合，解析完成后不可变。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum CadEntity {
        Line(Line),
        Polyline(Polyline),
        Arc(Arc),
        Circle(Circle),
        Spline(Spline),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub closed: bool,
        pub layer: String,
    }

    /// 圆弧，角度以弧度储存，按数学正方向从起始角扫到终止角。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Spline {
        pub control_points: Vec<Point2>,
        pub layer: String,
    }

    /// 实体退化原因，用于摄取报告与日志。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Degeneracy {
        TooFewVertices { found: usize },
        AllVerticesAtOrigin,
        InvalidRadius,
        NonFiniteCoordinate,
    }

    impl fmt::Display for Degeneracy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Degeneracy::TooFewVertices { found } => {
                    write!(f, "顶点数量不足（实际 {found} 个，至少需要 2 个）")
                }
                Degeneracy::AllVerticesAtOrigin => write!(f, "所有顶点均解析为 (0,0)"),
                Degeneracy::InvalidRadius => write!(f, "半径必须为有限正数"),
                Degeneracy::NonFiniteCoordinate => write!(f, "坐标包含 NaN 或无穷值"),
            }
        }
    }

    impl CadEntity {
        #[inline]
        pub fn kind_name(&self) -> &'static str {
            match self {
                CadEntity::Line(_) => "LINE",
                CadEntity::Polyline(_) => "POLYLINE",
                CadEntity::Arc(_) => "ARC",
                CadEntity::Circle(_) => "CIRCLE",
                CadEntity::Spline(_) => "SPLINE",
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                CadEntity::Line(line) => &line.layer,
                CadEntity::Polyline(polyline) => &polyline.layer,
                CadEntity::Arc(arc) => &arc.layer,
                CadEntity::Circle(circle) => &circle.layer,
                CadEntity::Spline(spline) => &spline.layer,
            }
        }

        /// 检查实体是否可参与包围盒与渲染。`None` 表示实体有效。
        pub fn degeneracy(&self) -> Option<Degeneracy> {
            match self {
                CadEntity::Line(line) => vertex_degeneracy(&[line.start, line.end]),
                CadEntity::Polyline(polyline) => vertex_degeneracy(&polyline.vertices),
                CadEntity::Spline(spline) => vertex_degeneracy(&spline.control_points),
                CadEntity::Arc(Arc { center, radius, .. })
                | CadEntity::Circle(Circle { center, radius, .. }) => {
                    if !center.is_finite() {
                        Some(Degeneracy::NonFiniteCoordinate)
                    } else if !radius.is_finite() || *radius <= 0.0 {
                        Some(Degeneracy::InvalidRadius)
                    } else {
                        None
                    }
                }
            }
        }

        #[inline]
        pub fn is_renderable(&self) -> bool {
            self.degeneracy().is_none()
        }
    }

    fn vertex_degeneracy(vertices: &[Point2]) -> Option<Degeneracy> {
        if vertices.len() < 2 {
            return Some(Degeneracy::TooFewVertices {
                found: vertices.len(),
            });
        }
        if vertices.iter().any(|point| !point.is_finite()) {
            return Some(Degeneracy::NonFiniteCoordinate);
        }
        if vertices.iter().all(|point| point.is_origin()) {
            return Some(Degeneracy::AllVerticesAtOrigin);
        }
        None
    }

    /// 解析后的矢量图纸。实体列表可以为空，但文档本身总是存在。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct CadDocument {
        entities: Vec<CadEntity>,
        layers: Vec<Layer>,
        units: Option<i16>,
    }

    impl CadDocument {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn from_entities(entities: Vec<CadEntity>) -> Self {
            let mut document = Self::new();
            for entity in entities {
                document.add_entity(entity);
            }
            document
        }

        /// 追加实体，若实体引用了未登记的图层则自动创建可见图层。
        pub fn add_entity(&mut self, entity: CadEntity) {
            let layer = entity.layer_name();
            if !self.layers.iter().any(|existing| existing.name == layer) {
                self.layers.push(Layer::new(layer));
            }
            self.entities.push(entity);
        }

        /// 登记或覆盖图层定义（来自 TABLES 段）。
        pub fn set_layer(&mut self, layer: Layer) {
            match self.layers.iter_mut().find(|existing| existing.name == layer.name) {
                Some(existing) => *existing = layer,
                None => self.layers.push(layer),
            }
        }

        #[inline]
        pub fn entities(&self) -> &[CadEntity] {
            &self.entities
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        #[inline]
        pub fn units(&self) -> Option<i16> {
            self.units
        }

        #[inline]
        pub fn set_units(&mut self, units: Option<i16>) {
            self.units = units;
        }

        pub fn is_layer_visible(&self, name: &str) -> bool {
            self.layers
                .iter()
                .find(|layer| layer.name == name)
                .map(|layer| layer.is_visible)
                .unwrap_or(true)
        }

        /// 位于可见图层上的实体。
        pub fn visible_entities(&self) -> impl Iterator<Item = &CadEntity> {
            self.entities
                .iter()
                .filter(|entity| self.is_layer_visible(entity.layer_name()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn line(start: Point2, end: Point2) -> CadEntity {
            CadEntity::Line(Line {
                start,
                end,
                layer: DEFAULT_LAYER.to_string(),
            })
        }

        #[test]
        fn all_zero_vertices_are_degenerate() {
            let entity = line(Point2::ORIGIN, Point2::ORIGIN);
            assert_eq!(entity.degeneracy(), Some(Degeneracy::AllVerticesAtOrigin));

            let valid = line(Point2::ORIGIN, Point2::new(1.0, 0.0));
            assert!(valid.is_renderable());
        }

        #[test]
        fn circle_at_origin_is_valid_but_zero_radius_is_not() {
            let circle = CadEntity::Circle(Circle {
                center: Point2::ORIGIN,
                radius: 5.0,
                layer: DEFAULT_LAYER.to_string(),
            });
            assert!(circle.is_renderable());

            let collapsed = CadEntity::Circle(Circle {
                center: Point2::new(3.0, 3.0),
                radius: 0.0,
                layer: DEFAULT_LAYER.to_string(),
            });
            assert_eq!(collapsed.degeneracy(), Some(Degeneracy::InvalidRadius));
        }

        #[test]
        fn short_polyline_is_degenerate() {
            let polyline = CadEntity::Polyline(Polyline {
                vertices: vec![Point2::new(1.0, 1.0)],
                closed: true,
                layer: DEFAULT_LAYER.to_string(),
            });
            assert_eq!(
                polyline.degeneracy(),
                Some(Degeneracy::TooFewVertices { found: 1 })
            );
        }

        #[test]
        fn hidden_layers_filter_visible_entities() {
            let mut document = CadDocument::new();
            document.add_entity(line(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)));
            document.add_entity(CadEntity::Line(Line {
                start: Point2::new(2.0, 2.0),
                end: Point2::new(3.0, 3.0),
                layer: "FURNITURE".to_string(),
            }));
            document.set_layer(Layer {
                name: "FURNITURE".to_string(),
                is_visible: false,
            });

            assert_eq!(document.entities().len(), 2);
            assert_eq!(document.visible_entities().count(), 1);
            assert_eq!(document.layers().count(), 2);
        }
    }
}
