use std::fs;
use std::path::Path;

use floorscape_core::document::CadDocument;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::converter::CadConverter;
use crate::dxf::ParsedDrawing;
use crate::{FileFormat, IngestError, dxf, loose};

const BINARY_DXF_SENTINEL: &[u8] = b"AutoCAD Binary DXF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestState {
    #[default]
    Idle,
    Parsing,
    Parsed,
    Failed,
}

/// 被丢弃的实体：未知类型、字段缺失或几何退化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    pub kind: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// 一次成功摄取的完整结果。
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub document: CadDocument,
    pub skipped: Vec<SkippedEntity>,
    /// 原始字节的 SHA-256（十六进制）。
    pub fingerprint: String,
    pub format: FileFormat,
}

impl IngestReport {
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.document.entities().len()
    }
}

/// 图纸摄取入口。相同字节与格式重复提交时直接返回缓存的报告。
pub struct CadIngestor {
    converter: Option<Box<dyn CadConverter>>,
    state: IngestState,
    cache: Option<IngestReport>,
}

impl Default for CadIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl CadIngestor {
    pub fn new() -> Self {
        Self {
            converter: None,
            state: IngestState::Idle,
            cache: None,
        }
    }

    pub fn with_converter(converter: Box<dyn CadConverter>) -> Self {
        Self {
            converter: Some(converter),
            ..Self::new()
        }
    }

    #[inline]
    pub fn state(&self) -> IngestState {
        self.state
    }

    #[inline]
    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    pub fn ingest_path(&mut self, path: &Path) -> Result<IngestReport, IngestError> {
        let format = FileFormat::from_path(path).ok_or_else(|| {
            IngestError::UnsupportedFormat(format!("无法根据扩展名识别格式: {}", path.display()))
        })?;
        let bytes = fs::read(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "读取图纸文件失败");
            IngestError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.ingest(&bytes, format)
    }

    pub fn ingest(&mut self, bytes: &[u8], format: FileFormat) -> Result<IngestReport, IngestError> {
        let fingerprint = fingerprint(bytes);
        if let Some(cached) = &self.cache {
            if cached.fingerprint == fingerprint && cached.format == format {
                debug!(fingerprint = %fingerprint, "命中摄取缓存，跳过重复解析");
                self.state = IngestState::Parsed;
                return Ok(cached.clone());
            }
        }

        self.state = IngestState::Parsing;
        match self.parse(bytes, format) {
            Ok(parsed) => {
                for skipped in &parsed.skipped {
                    debug!(
                        kind = %skipped.kind,
                        line = ?skipped.line,
                        reason = %skipped.reason,
                        "跳过无法使用的实体"
                    );
                }
                let report = IngestReport {
                    document: parsed.document,
                    skipped: parsed.skipped,
                    fingerprint,
                    format,
                };
                info!(
                    format = ?format,
                    entities = report.entity_count(),
                    skipped = report.skipped.len(),
                    "图纸解析完成"
                );
                self.state = IngestState::Parsed;
                self.cache = Some(report.clone());
                Ok(report)
            }
            Err(err) => {
                warn!(format = ?format, error = %err, "图纸解析失败");
                self.state = IngestState::Failed;
                Err(err)
            }
        }
    }

    fn parse(&self, bytes: &[u8], format: FileFormat) -> Result<ParsedDrawing, IngestError> {
        match format {
            FileFormat::Dxf => parse_dxf_bytes(bytes),
            FileFormat::EntityJson => loose::parse(bytes),
            FileFormat::Dwg => {
                let converter = self.converter.as_ref().ok_or_else(|| {
                    IngestError::UnsupportedFormat("DWG 需要外部转换器，但未配置".to_string())
                })?;
                debug!(converter = converter.name(), "通过外部转换器处理 DWG");
                let text = converter.convert(bytes)?;
                // 转换器既可以输出 DXF 文本，也可以直接输出实体 JSON
                if text.trim_start().starts_with(['{', '[']) {
                    loose::parse(text.as_bytes())
                } else {
                    dxf::parse(&text).map_err(IngestError::from)
                }
            }
        }
    }
}

fn parse_dxf_bytes(bytes: &[u8]) -> Result<ParsedDrawing, IngestError> {
    if bytes.starts_with(BINARY_DXF_SENTINEL) {
        return Err(IngestError::UnsupportedFormat(
            "二进制 DXF 暂不支持".to_string(),
        ));
    }
    let text = String::from_utf8_lossy(bytes);
    dxf::parse(&text).map_err(IngestError::from)
}

fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
