pub mod adjacency;
pub mod command;
pub mod scene;
pub mod scheduler;
pub mod session;
pub mod tessellate;
pub mod zones;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum EngineError {
        #[error("zone with id {0} already exists")]
        DuplicateZone(String),
        #[error("{kind} with id {id} not found")]
        ZoneReference { kind: &'static str, id: String },
    }

    impl EngineError {
        pub(crate) fn unknown_zone(id: &str) -> Self {
            Self::ZoneReference {
                kind: "zone",
                id: id.to_string(),
            }
        }

        pub(crate) fn unknown_device(id: &str) -> Self {
            Self::ZoneReference {
                kind: "device",
                id: id.to_string(),
            }
        }
    }
}

pub mod bounds {
    use floorscape_core::document::{Arc, CadEntity, Circle};
    use floorscape_core::geometry::{Bounds2D, Point2};
    use floorscape_core::transform::{CanvasSize, NormalizationTransform};
    use tracing::debug;

    /// 按实体类型累积包围盒。退化实体与非有限坐标被忽略；没有任何有效坐标时返回哨兵范围。
    pub fn compute_bounds<'a, I>(entities: I) -> Bounds2D
    where
        I: IntoIterator<Item = &'a CadEntity>,
    {
        let mut bounds = Bounds2D::empty();
        for entity in entities {
            if let Some(reason) = entity.degeneracy() {
                debug!(kind = entity.kind_name(), %reason, "退化实体不参与包围盒计算");
                continue;
            }
            include_entity(entity, &mut bounds);
        }

        if bounds.is_empty() {
            debug!("BoundsUnavailable: 文档没有有效坐标，使用哨兵范围");
            return Bounds2D::sentinel();
        }
        bounds
    }

    /// 等比缩放并将包围盒中心对齐到目标画布中心。
    #[inline]
    pub fn normalize(bounds: &Bounds2D, target: CanvasSize) -> NormalizationTransform {
        NormalizationTransform::fit(bounds, target)
    }

    fn include_entity(entity: &CadEntity, bounds: &mut Bounds2D) {
        match entity {
            CadEntity::Line(line) => {
                include_finite(bounds, line.start);
                include_finite(bounds, line.end);
            }
            CadEntity::Polyline(polyline) => {
                for vertex in &polyline.vertices {
                    include_finite(bounds, *vertex);
                }
            }
            CadEntity::Spline(spline) => {
                for point in &spline.control_points {
                    include_finite(bounds, *point);
                }
            }
            CadEntity::Arc(Arc { center, radius, .. })
            | CadEntity::Circle(Circle { center, radius, .. }) => {
                include_finite(bounds, Point2::new(center.x() - radius, center.y() - radius));
                include_finite(bounds, Point2::new(center.x() + radius, center.y() + radius));
            }
        }
    }

    #[inline]
    fn include_finite(bounds: &mut Bounds2D, point: Point2) {
        if point.is_finite() {
            bounds.include_point(point);
        }
    }

    #[cfg(test)]
    mod tests {
        use floorscape_core::document::{DEFAULT_LAYER, Line, Polyline};

        use super::*;

        #[test]
        fn empty_document_uses_sentinel() {
            let bounds = compute_bounds(std::iter::empty::<&CadEntity>());
            assert_eq!(bounds, Bounds2D::sentinel());
            assert_eq!(bounds.width(), 800.0);
            assert_eq!(bounds.height(), 500.0);
        }

        #[test]
        fn circle_contributes_center_plus_radius() {
            let entities = vec![
                CadEntity::Circle(Circle {
                    center: Point2::new(10.0, 10.0),
                    radius: 5.0,
                    layer: DEFAULT_LAYER.to_string(),
                }),
                CadEntity::Line(Line {
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(12.0, 3.0),
                    layer: DEFAULT_LAYER.to_string(),
                }),
            ];
            let bounds = compute_bounds(&entities);
            assert_eq!(bounds.min_x(), 0.0);
            assert_eq!(bounds.min_y(), 0.0);
            assert_eq!(bounds.max_x(), 15.0);
            assert_eq!(bounds.max_y(), 15.0);
        }

        #[test]
        fn degenerate_entities_are_ignored() {
            let entities = vec![
                CadEntity::Polyline(Polyline {
                    vertices: vec![Point2::ORIGIN, Point2::ORIGIN, Point2::ORIGIN],
                    closed: true,
                    layer: DEFAULT_LAYER.to_string(),
                }),
                CadEntity::Line(Line {
                    start: Point2::new(f64::NAN, 1.0),
                    end: Point2::new(2.0, 2.0),
                    layer: DEFAULT_LAYER.to_string(),
                }),
            ];
            assert_eq!(compute_bounds(&entities), Bounds2D::sentinel());
        }

        #[test]
        fn normalize_keeps_positive_scale_for_a_point() {
            let entities = vec![CadEntity::Line(Line {
                start: Point2::new(3.0, 3.0),
                end: Point2::new(3.0, 3.0),
                layer: DEFAULT_LAYER.to_string(),
            })];
            let bounds = compute_bounds(&entities);
            assert_eq!(bounds.width(), 0.0);
            let transform = normalize(&bounds, CanvasSize::default());
            assert!(transform.scale > 0.0);
            let mapped = transform.apply(Point2::new(3.0, 3.0));
            assert!((mapped.x() - 400.0).abs() < 1e-9);
            assert!((mapped.y() - 250.0).abs() < 1e-9);
        }
    }
}
