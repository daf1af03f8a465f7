use floorscape_core::document::{
    Arc, CadDocument, CadEntity, Circle, DEFAULT_LAYER, Layer, Line, Polyline, Spline,
};
use floorscape_core::geometry::Point2;

use crate::DxfError;
use crate::ingest::SkippedEntity;

/// 文本 DXF 的解析结果：文档本体以及被丢弃的实体记录。
pub(crate) struct ParsedDrawing {
    pub document: CadDocument,
    pub skipped: Vec<SkippedEntity>,
}

pub(crate) fn parse(source: &str) -> Result<ParsedDrawing, DxfError> {
    DxfParser::new(source).parse()
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    document: CadDocument,
    skipped: Vec<SkippedEntity>,
}

/// 单个实体（或表记录）的组码集合，起始 `0` 组码之后、下一个 `0` 之前的全部内容。
struct EntityRecord {
    kind: String,
    line: usize,
    pairs: Vec<(i32, String)>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source.trim_start_matches('\u{feff}')),
            document: CadDocument::new(),
            skipped: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<ParsedDrawing, DxfError> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "第 {} 行出现意外的组码 {code}（期望 0 表示 SECTION/EOF）",
                    self.reader.line_number
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "HEADER" => self.parse_header()?,
                        "TABLES" => self.parse_tables()?,
                        "ENTITIES" => self.parse_entities()?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "第 {} 行出现意外的标记 {unexpected}，期望 SECTION 或 EOF",
                        self.reader.line_number
                    )));
                }
            }
        }
        Ok(ParsedDrawing {
            document: self.document,
            skipped: self.skipped,
        })
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_header(&mut self) -> Result<(), DxfError> {
        let mut variable: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some((9, name)) => variable = Some(name.trim().to_string()),
                Some((70, value)) if variable.as_deref() == Some("$INSUNITS") => {
                    // 单位代码只是附加信息，解析失败时忽略
                    self.document.set_units(value.trim().parse::<i16>().ok());
                }
                Some(_) => {}
                None => return Err(DxfError::invalid("HEADER 段提前结束")),
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("TABLES 段提前结束")),
            };
            if code != 0 {
                // TABLE 头部字段（组码 2/5/70 等），无需处理
                continue;
            }
            match value.trim() {
                "ENDSEC" => break,
                "LAYER" => {
                    let record = self.read_record("LAYER")?;
                    if let Some(layer) = record.layer_definition() {
                        self.document.set_layer(layer);
                    }
                }
                kind => {
                    let kind = kind.to_string();
                    self.read_record(&kind)?;
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段第 {} 行遇到组码 {code}（期望 0 表示实体起始）",
                    self.reader.line_number
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "POLYLINE" => self.parse_polyline_sequence()?,
                "VERTEX" | "SEQEND" => {
                    // 游离的序列记录，没有所属的 POLYLINE
                    self.read_record("SEQEND")?;
                }
                kind => {
                    let kind = kind.to_string();
                    let record = self.read_record(&kind)?;
                    let built = match kind.as_str() {
                        "LINE" => record.to_line(),
                        "LWPOLYLINE" => record.to_lwpolyline(),
                        "ARC" => record.to_arc(),
                        "CIRCLE" => record.to_circle(),
                        "SPLINE" => record.to_spline(),
                        other => Err(format!("暂不支持的实体类型 {other}")),
                    };
                    self.accept(&record, built);
                }
            }
        }
        Ok(())
    }

    /// 旧式 POLYLINE：头部记录后跟随若干 VERTEX，以 SEQEND 结束。
    fn parse_polyline_sequence(&mut self) -> Result<(), DxfError> {
        let header = self.read_record("POLYLINE")?;
        let flags = header.int(70).unwrap_or(0);
        let mut vertices: Vec<Point2> = Vec::new();
        let mut fault: Option<String> = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => {
                        let vertex = self.read_record("VERTEX")?;
                        match (vertex.float(10), vertex.float(20)) {
                            (Ok(Some(x)), Ok(Some(y))) => vertices.push(Point2::new(x, y)),
                            _ => {
                                fault.get_or_insert_with(|| {
                                    format!("VERTEX（第 {} 行）缺少有效的 X/Y", vertex.line)
                                });
                            }
                        }
                    }
                    "SEQEND" => {
                        self.read_record("SEQEND")?;
                        break;
                    }
                    other => {
                        // 缺少 SEQEND 的文件，序列在下一个实体处隐式结束
                        self.reader.put_back((0, other.to_string()));
                        break;
                    }
                },
                Some((code, _)) => {
                    return Err(DxfError::invalid(format!(
                        "POLYLINE 序列第 {} 行遇到无效组码 {code}，期望 VERTEX/SEQEND",
                        self.reader.line_number
                    )));
                }
                None => return Err(DxfError::invalid("POLYLINE 缺少 SEQEND")),
            }
        }

        let built = if flags & (0x10 | 0x40) != 0 {
            Err("POLYLINE 网格/多面网格不属于平面轮廓".to_string())
        } else if let Some(reason) = fault {
            Err(reason)
        } else {
            Ok(CadEntity::Polyline(Polyline {
                vertices,
                closed: flags & 0x01 != 0,
                layer: header.layer(),
            }))
        };
        self.accept(&header, built);
        Ok(())
    }

    fn accept(&mut self, record: &EntityRecord, built: Result<CadEntity, String>) {
        match built {
            Ok(entity) => match entity.degeneracy() {
                None => self.document.add_entity(entity),
                Some(reason) => self.skipped.push(SkippedEntity {
                    kind: record.kind.clone(),
                    reason: reason.to_string(),
                    line: Some(record.line),
                }),
            },
            Err(reason) => self.skipped.push(SkippedEntity {
                kind: record.kind.clone(),
                reason,
                line: Some(record.line),
            }),
        }
    }

    fn read_record(&mut self, kind: &str) -> Result<EntityRecord, DxfError> {
        let line = self.reader.line_number.saturating_sub(1);
        let mut pairs = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(pair) => pairs.push(pair),
                None => return Err(DxfError::invalid(format!("{kind} 未正确结束"))),
            }
        }
        Ok(EntityRecord {
            kind: kind.to_string(),
            line,
            pairs,
        })
    }
}

impl EntityRecord {
    fn raw(&self, code: i32) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, value)| value.trim())
    }

    fn layer(&self) -> String {
        match self.raw(8) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_LAYER.to_string(),
        }
    }

    fn float(&self, code: i32) -> Result<Option<f64>, String> {
        match self.raw(code) {
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("{} 组码 {code} 解析失败（值：\"{raw}\"）", self.kind)),
            None => Ok(None),
        }
    }

    fn require(&self, code: i32, label: &str) -> Result<f64, String> {
        self.float(code)?
            .ok_or_else(|| format!("{} 缺少{label}（组码 {code}）", self.kind))
    }

    fn int(&self, code: i32) -> Option<i32> {
        self.raw(code).and_then(|raw| raw.parse::<i32>().ok())
    }

    /// 按出现顺序收集成对的 X/Y 组码（LWPOLYLINE 顶点、SPLINE 控制点等）。
    fn points(&self, x_code: i32, y_code: i32) -> Result<Vec<Point2>, String> {
        let mut points = Vec::new();
        let mut pending_x: Option<f64> = None;
        for (code, value) in &self.pairs {
            if *code == x_code {
                let x = parse_coord(value, &self.kind, *code)?;
                if pending_x.replace(x).is_some() {
                    return Err(format!("{} 顶点缺少对应的 Y（组码 {y_code}）", self.kind));
                }
            } else if *code == y_code {
                let y = parse_coord(value, &self.kind, *code)?;
                let x = pending_x
                    .take()
                    .ok_or_else(|| format!("{} 顶点缺少对应的 X（组码 {x_code}）", self.kind))?;
                points.push(Point2::new(x, y));
            }
        }
        if pending_x.is_some() {
            return Err(format!("{} 检测到不完整的顶点", self.kind));
        }
        Ok(points)
    }

    fn layer_definition(&self) -> Option<Layer> {
        let name = self.raw(2)?.to_string();
        let color_off = self.int(62).map(|color| color < 0).unwrap_or(false);
        let frozen = self.int(70).map(|flags| flags & 0x01 != 0).unwrap_or(false);
        Some(Layer {
            name,
            is_visible: !(color_off || frozen),
        })
    }

    fn to_line(&self) -> Result<CadEntity, String> {
        let sx = self.require(10, "起点 X")?;
        let sy = self.require(20, "起点 Y")?;
        let ex = self.require(11, "终点 X")?;
        let ey = self.require(21, "终点 Y")?;
        Ok(CadEntity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer: self.layer(),
        }))
    }

    fn to_lwpolyline(&self) -> Result<CadEntity, String> {
        let closed = self.int(70).map(|flag| flag & 0x01 == 0x01).unwrap_or(false);
        Ok(CadEntity::Polyline(Polyline {
            vertices: self.points(10, 20)?,
            closed,
            layer: self.layer(),
        }))
    }

    fn to_circle(&self) -> Result<CadEntity, String> {
        let cx = self.require(10, "圆心 X")?;
        let cy = self.require(20, "圆心 Y")?;
        let radius = self.require(40, "半径")?;
        Ok(CadEntity::Circle(Circle {
            center: Point2::new(cx, cy),
            radius,
            layer: self.layer(),
        }))
    }

    fn to_arc(&self) -> Result<CadEntity, String> {
        let cx = self.require(10, "圆心 X")?;
        let cy = self.require(20, "圆心 Y")?;
        let radius = self.require(40, "半径")?;
        let start_angle = self.require(50, "起始角")?;
        let end_angle = self.require(51, "终止角")?;
        Ok(CadEntity::Arc(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle: start_angle.to_radians(),
            end_angle: end_angle.to_radians(),
            layer: self.layer(),
        }))
    }

    /// 没有控制点时退而使用拟合点（组码 11/21）。
    fn to_spline(&self) -> Result<CadEntity, String> {
        let mut control_points = self.points(10, 20)?;
        if control_points.is_empty() {
            control_points = self.points(11, 21)?;
        }
        Ok(CadEntity::Spline(Spline {
            control_points,
            layer: self.layer(),
        }))
    }
}

fn parse_coord(raw: &str, kind: &str, code: i32) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("{kind} 组码 {code} 解析失败（值：\"{raw}\"）"))
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    /// 读取下一组 (组码, 值)，自动跳过 999 注释。
    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        loop {
            let code_line = match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    line
                }
                None => return Ok(None),
            };
            if code_line.trim().is_empty() {
                // 文件末尾的空行
                continue;
            }

            let value_line = match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    line
                }
                None => {
                    return Err(DxfError::invalid(format!(
                        "文件在第 {} 行结束，缺少与组码对应的值行",
                        self.line_number
                    )));
                }
            };

            let code = code_line.trim().parse::<i32>().map_err(|_| {
                if code_line.contains('\0') {
                    DxfError::unsupported("二进制内容无法按文本 DXF 解析")
                } else {
                    DxfError::invalid(format!(
                        "第 {} 行的组码 \"{}\" 无法解析为整数",
                        self.line_number - 1,
                        code_line.trim()
                    ))
                }
            })?;
            if code == 999 {
                continue;
            }
            let value = value_line.trim_end_matches('\r').to_string();
            return Ok(Some((code, value)));
        }
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxf(body: &[&str]) -> String {
        let mut lines = vec!["0", "SECTION", "2", "ENTITIES"];
        lines.extend_from_slice(body);
        lines.extend_from_slice(&["0", "ENDSEC", "0", "EOF"]);
        lines.join("\n")
    }

    #[test]
    fn parses_line_and_converts_arc_angles() {
        let source = dxf(&[
            "0", "LINE", "8", "WALLS", "10", "0", "20", "0", "11", "10", "21", "0", "0", "ARC",
            "10", "5", "20", "5", "40", "2", "50", "0", "51", "90",
        ]);
        let parsed = parse(&source).expect("parse dxf");
        assert!(parsed.skipped.is_empty());
        let entities = parsed.document.entities();
        assert_eq!(entities.len(), 2);
        match &entities[0] {
            CadEntity::Line(line) => {
                assert_eq!(line.layer, "WALLS");
                assert_eq!(line.end, Point2::new(10.0, 0.0));
            }
            other => panic!("expected line, got {other:?}"),
        }
        match &entities[1] {
            CadEntity::Arc(arc) => {
                assert!((arc.end_angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
            }
            other => panic!("expected arc, got {other:?}"),
        }
    }

    #[test]
    fn unknown_and_broken_entities_are_skipped_not_fatal() {
        let source = dxf(&[
            "0", "TEXT", "10", "1", "20", "1", "1", "Lobby", "0", "CIRCLE", "10", "1", "20",
            "abc", "40", "3", "0", "LWPOLYLINE", "90", "1", "10", "4", "20", "4", "0", "LINE",
            "10", "1", "20", "1", "11", "2", "21", "2",
        ]);
        let parsed = parse(&source).expect("parse dxf");
        assert_eq!(parsed.document.entities().len(), 1);
        let kinds: Vec<&str> = parsed.skipped.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["TEXT", "CIRCLE", "LWPOLYLINE"]);
    }

    #[test]
    fn legacy_polyline_sequence_is_collected() {
        let source = dxf(&[
            "0", "POLYLINE", "8", "0", "66", "1", "70", "1", "0", "VERTEX", "10", "0", "20", "0",
            "0", "VERTEX", "10", "4", "20", "0", "0", "VERTEX", "10", "4", "20", "3", "0",
            "SEQEND",
        ]);
        let parsed = parse(&source).expect("parse dxf");
        match parsed.document.entities() {
            [CadEntity::Polyline(polyline)] => {
                assert!(polyline.closed);
                assert_eq!(polyline.vertices.len(), 3);
            }
            other => panic!("unexpected entities {other:?}"),
        }
    }

    #[test]
    fn structural_errors_are_fatal() {
        let err = parse("0\nSECTION\n2\nENTITIES\n0\nLINE\n10").err();
        assert!(matches!(err, Some(DxfError::Invalid { .. })));

        let err = parse("0\nSECTION\n2\nENTITIES\nabc\nLINE\n").err();
        assert!(matches!(err, Some(DxfError::Invalid { .. })));
    }

    #[test]
    fn comments_are_ignored() {
        let source = [
            "999", "exported by test", "0", "SECTION", "2", "ENTITIES", "0", "CIRCLE", "10",
            "0", "20", "0", "40", "1", "0", "ENDSEC", "0", "EOF",
        ]
        .join("\n");
        let parsed = parse(&source).expect("parse dxf");
        assert_eq!(parsed.document.entities().len(), 1);
    }
}
