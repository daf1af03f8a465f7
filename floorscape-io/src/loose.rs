//! 前端解析器产出的松散 JSON 实体。历史上字段命名并不统一，这里一次性归一为 `CadEntity`。

use floorscape_core::document::{
    Arc, CadDocument, CadEntity, Circle, DEFAULT_LAYER, Line, Polyline, Spline,
};
use floorscape_core::geometry::Point2;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::IngestError;
use crate::dxf::ParsedDrawing;
use crate::ingest::SkippedEntity;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LooseDrawing {
    Bare(Vec<Value>),
    Wrapped {
        #[serde(default)]
        entities: Vec<Value>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LooseEntity {
    #[serde(rename = "type")]
    kind: String,
    layer: Option<String>,
    #[serde(alias = "startPoint")]
    start: Option<LoosePoint>,
    #[serde(alias = "endPoint")]
    end: Option<LoosePoint>,
    vertices: Vec<LoosePoint>,
    #[serde(alias = "shape")]
    closed: Option<bool>,
    center: Option<LoosePoint>,
    radius: Option<f64>,
    start_angle: Option<f64>,
    end_angle: Option<f64>,
    control_points: Vec<LoosePoint>,
}

/// 顶点可能是 `{x,y}` 对象、`[x,y(,z)]` 数组或其它任意值。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoosePoint {
    Object {
        x: f64,
        y: f64,
    },
    Tuple(Vec<f64>),
    Unrecognized(#[allow(dead_code)] Value),
}

impl Default for LoosePoint {
    fn default() -> Self {
        LoosePoint::Unrecognized(Value::Null)
    }
}

impl LoosePoint {
    fn resolve(&self) -> Point2 {
        match self {
            LoosePoint::Object { x, y } => Point2::new(*x, *y),
            LoosePoint::Tuple(components) if components.len() >= 2 => {
                Point2::new(components[0], components[1])
            }
            _ => Point2::ORIGIN,
        }
    }
}

fn resolve_all(points: &[LoosePoint]) -> Vec<Point2> {
    points.iter().map(LoosePoint::resolve).collect()
}

pub(crate) fn parse(bytes: &[u8]) -> Result<ParsedDrawing, IngestError> {
    let drawing: LooseDrawing = serde_json::from_slice(bytes)
        .map_err(|err| IngestError::Parse(format!("实体 JSON 无效: {err}")))?;
    let values = match drawing {
        LooseDrawing::Wrapped { entities } => entities,
        LooseDrawing::Bare(entities) => entities,
    };

    let mut document = CadDocument::new();
    let mut skipped = Vec::new();
    for (index, value) in values.into_iter().enumerate() {
        let loose: LooseEntity = match serde_json::from_value(value) {
            Ok(entity) => entity,
            Err(err) => {
                debug!(index, error = %err, "实体字段结构无法识别，已跳过");
                skipped.push(SkippedEntity {
                    kind: "UNKNOWN".to_string(),
                    reason: err.to_string(),
                    line: None,
                });
                continue;
            }
        };
        let kind = loose.kind.trim().to_ascii_uppercase();
        match loose.into_entity(&kind) {
            Ok(entity) => match entity.degeneracy() {
                None => document.add_entity(entity),
                Some(reason) => skipped.push(SkippedEntity {
                    kind,
                    reason: reason.to_string(),
                    line: None,
                }),
            },
            Err(reason) => skipped.push(SkippedEntity {
                kind,
                reason,
                line: None,
            }),
        }
    }
    Ok(ParsedDrawing { document, skipped })
}

impl LooseEntity {
    fn into_entity(self, kind: &str) -> Result<CadEntity, String> {
        let layer = self
            .layer
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LAYER.to_string());
        match kind {
            "LINE" => {
                let (start, end) = match (&self.start, &self.end) {
                    (Some(start), Some(end)) => (start.resolve(), end.resolve()),
                    _ if self.vertices.len() >= 2 => {
                        (self.vertices[0].resolve(), self.vertices[1].resolve())
                    }
                    _ => return Err("LINE 缺少起点或终点".to_string()),
                };
                Ok(CadEntity::Line(Line { start, end, layer }))
            }
            "LWPOLYLINE" | "POLYLINE" => Ok(CadEntity::Polyline(Polyline {
                vertices: resolve_all(&self.vertices),
                closed: self.closed.unwrap_or(false),
                layer,
            })),
            "ARC" => {
                let center = self.center.as_ref().map(LoosePoint::resolve);
                match (center, self.radius, self.start_angle, self.end_angle) {
                    (Some(center), Some(radius), Some(start_angle), Some(end_angle)) => {
                        Ok(CadEntity::Arc(Arc {
                            center,
                            radius,
                            start_angle,
                            end_angle,
                            layer,
                        }))
                    }
                    _ => Err("ARC 缺少圆心、半径或角度".to_string()),
                }
            }
            "CIRCLE" => match (self.center.as_ref().map(LoosePoint::resolve), self.radius) {
                (Some(center), Some(radius)) => Ok(CadEntity::Circle(Circle {
                    center,
                    radius,
                    layer,
                })),
                _ => Err("CIRCLE 缺少圆心或半径".to_string()),
            },
            "SPLINE" => {
                let points = if self.control_points.is_empty() {
                    &self.vertices
                } else {
                    &self.control_points
                };
                Ok(CadEntity::Spline(Spline {
                    control_points: resolve_all(points),
                    layer,
                }))
            }
            other => Err(format!("暂不支持的实体类型 {other}")),
        }
    }
}
