//! 曲线离散化。输出为扁平线段数组 `[x1, y1, x2, y2, ...]`，每条线段 4 个数。

use std::f64::consts::TAU;

use floorscape_core::document::{Arc, CadDocument, CadEntity, Circle, Polyline};
use floorscape_core::geometry::Point2;
use floorscape_core::transform::NormalizationTransform;

pub const DEFAULT_ARC_SEGMENTS: usize = 32;
const MIN_ARC_SEGMENTS: usize = 4;
pub const MAX_ARC_SEGMENTS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tessellator {
    arc_segments: usize,
}

impl Default for Tessellator {
    fn default() -> Self {
        Self {
            arc_segments: DEFAULT_ARC_SEGMENTS,
        }
    }
}

impl Tessellator {
    pub fn new(arc_segments: usize) -> Self {
        Self {
            arc_segments: arc_segments.clamp(MIN_ARC_SEGMENTS, MAX_ARC_SEGMENTS),
        }
    }

    #[inline]
    pub fn arc_segments(&self) -> usize {
        self.arc_segments
    }

    /// 退化实体（顶点不足、全部落在原点、半径无效）不产生任何线段。
    pub fn tessellate(&self, entity: &CadEntity) -> Vec<f64> {
        let mut out = Vec::new();
        self.tessellate_onto(entity, &mut out);
        out
    }

    /// 可见图层上全部实体的线段，文档空间。
    pub fn tessellate_document(&self, document: &CadDocument) -> Vec<f64> {
        let mut out = Vec::new();
        for entity in document.visible_entities() {
            self.tessellate_onto(entity, &mut out);
        }
        out
    }

    /// 与 [`Self::tessellate_document`] 相同，但线段已映射到画布空间。
    pub fn tessellate_into(
        &self,
        document: &CadDocument,
        transform: &NormalizationTransform,
    ) -> Vec<f64> {
        map_segments(&self.tessellate_document(document), transform)
    }

    fn tessellate_onto(&self, entity: &CadEntity, out: &mut Vec<f64>) {
        if entity.degeneracy().is_some() {
            return;
        }
        match entity {
            CadEntity::Line(line) => push_segment(out, line.start, line.end),
            CadEntity::Polyline(Polyline {
                vertices, closed, ..
            }) => {
                chain(out, vertices);
                if *closed && vertices.len() > 2 {
                    if let (Some(last), Some(first)) = (vertices.last(), vertices.first()) {
                        push_segment(out, *last, *first);
                    }
                }
            }
            CadEntity::Spline(spline) => chain(out, &spline.control_points),
            CadEntity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                ..
            }) => {
                let (start, end) = canonical_sweep(*start_angle, *end_angle);
                let points = sample_sweep(*center, *radius, start, end, self.arc_segments);
                chain(out, &points);
            }
            CadEntity::Circle(Circle { center, radius, .. }) => {
                let points = sample_sweep(*center, *radius, 0.0, TAU, self.arc_segments);
                chain(out, &points);
            }
        }
    }
}

/// 使用默认分辨率离散化单个实体。
#[inline]
pub fn tessellate(entity: &CadEntity) -> Vec<f64> {
    Tessellator::default().tessellate(entity)
}

/// 将文档空间的扁平线段逐点映射到画布空间。
pub fn map_segments(segments: &[f64], transform: &NormalizationTransform) -> Vec<f64> {
    let mut out = Vec::with_capacity(segments.len());
    for (start, end) in segment_pairs(segments) {
        push_segment(&mut out, transform.apply(start), transform.apply(end));
    }
    out
}

/// 以端点对的形式遍历扁平线段数组，末尾不足 4 个数的部分被忽略。
pub fn segment_pairs(segments: &[f64]) -> impl Iterator<Item = (Point2, Point2)> + '_ {
    segments
        .chunks_exact(4)
        .map(|chunk| (Point2::new(chunk[0], chunk[1]), Point2::new(chunk[2], chunk[3])))
}

#[inline]
fn push_segment(out: &mut Vec<f64>, start: Point2, end: Point2) {
    out.extend_from_slice(&[start.x(), start.y(), end.x(), end.y()]);
}

fn chain(out: &mut Vec<f64>, points: &[Point2]) {
    for pair in points.windows(2) {
        push_segment(out, pair[0], pair[1]);
    }
}

/// 按逆时针方向展开角度区间，起止相同视为整圆。
fn canonical_sweep(start_angle: f64, end_angle: f64) -> (f64, f64) {
    let start = normalize_angle(start_angle);
    let mut end = normalize_angle(end_angle);
    if (end - start).abs() < 1e-9 {
        end = start + TAU;
    } else if end < start {
        end += TAU;
    }
    (start, end)
}

fn normalize_angle(angle: f64) -> f64 {
    let mut result = angle % TAU;
    if result < 0.0 {
        result += TAU;
    }
    result
}

fn sample_sweep(center: Point2, radius: f64, start: f64, end: f64, segments: usize) -> Vec<Point2> {
    let span = end - start;
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let angle = if i == segments {
            end
        } else {
            start + span * (i as f64 / segments as f64)
        };
        points.push(Point2::new(
            center.x() + radius * angle.cos(),
            center.y() + radius * angle.sin(),
        ));
    }
    points
}
